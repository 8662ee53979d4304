use ndarray::prelude::*;
use std::cmp::Ordering;

/// Indices that sort `v` in ascending order. Equal values keep their original order.
pub fn argsort(v: ArrayView1<f64>) -> Vec<usize> {
    let mut idx = (0..v.len()).collect::<Vec<_>>();
    idx.sort_by(|&i, &j| v[i].partial_cmp(&v[j]).unwrap_or(Ordering::Equal));
    idx
}
