use crate::error::ResponseError;
use crate::model::{DenseModel, DenseModelBuilder};
use crate::response::ResponseEngine;
use indexmap::IndexMap;
use ndarray::prelude::*;

/// H2 in a minimal basis: one occupied and one virtual orbital.
pub fn h2() -> DenseModel {
    let mut gradients: IndexMap<String, Array1<f64>> = IndexMap::new();
    gradients.insert("x".to_string(), array![0.0, 0.0]);
    gradients.insert("y".to_string(), array![0.0, 0.0]);
    gradients.insert("z".to_string(), array![1.86111268, -1.86111268]);

    DenseModelBuilder::default()
        .e2(array![[1.89681370, -0.36242092], [-0.36242092, 1.89681370]])
        .orbital_diagonal(array![4.99878931, 4.99878931])
        .overlap_diagonal(array![2.0, -2.0])
        .gradients(gradients)
        .excitations(vec![(0, 1)])
        .build()
        .unwrap()
}

/// Diagonal dominant model with the paired structure `E2 = [[A, B], [B, A]]` and
/// `S2 = diag(1, -1)` for `n_occ * n_virt` single excitations.
pub fn paired_model(n_occ: usize, n_virt: usize) -> DenseModel {
    let n: usize = n_occ * n_virt;
    let a: Array2<f64> = Array2::from_shape_fn((n, n), |(i, j)| {
        if i == j {
            0.8 + 0.35 * i as f64
        } else {
            0.05 / (1.0 + (i as f64 - j as f64).abs())
        }
    });
    let b: Array2<f64> = Array2::from_shape_fn((n, n), |(i, j)| 0.03 / (1.0 + (i + j) as f64));

    let mut e2: Array2<f64> = Array2::zeros((2 * n, 2 * n));
    e2.slice_mut(s![..n, ..n]).assign(&a);
    e2.slice_mut(s![n.., n..]).assign(&a);
    e2.slice_mut(s![..n, n..]).assign(&b);
    e2.slice_mut(s![n.., ..n]).assign(&b);

    let mut sd: Array1<f64> = Array1::ones(2 * n);
    sd.slice_mut(s![n..]).fill(-1.0);

    let mut od: Array1<f64> = Array1::zeros(2 * n);
    od.slice_mut(s![..n]).assign(&a.diag());
    od.slice_mut(s![n..]).assign(&a.diag());

    // Gradients of real operators are antisymmetric under the X/Y swap.
    let mut gradients: IndexMap<String, Array1<f64>> = IndexMap::new();
    for (op, phase) in [("x", 0.0), ("y", 1.3), ("z", 2.1)] {
        let g: Array1<f64> = Array1::from_shape_fn(n, |i| (phase + 0.7 * i as f64).sin());
        let mut grad: Array1<f64> = Array1::zeros(2 * n);
        grad.slice_mut(s![..n]).assign(&g);
        grad.slice_mut(s![n..]).assign(&(-&g));
        gradients.insert(op.to_string(), grad);
    }
    gradients.insert("zero".to_string(), Array1::zeros(2 * n));

    let excitations: Vec<(usize, usize)> = (0..n)
        .map(|k| (k / n_virt, n_occ + k % n_virt))
        .collect();

    DenseModelBuilder::default()
        .e2(e2)
        .orbital_diagonal(od)
        .overlap_diagonal(sd)
        .gradients(gradients)
        .excitations(excitations)
        .build()
        .unwrap()
}

/// Two-level model with `E2 = w0 S2`, so that `E2 - w0 S2` vanishes.
pub fn resonant_model(w0: f64) -> DenseModel {
    let mut gradients: IndexMap<String, Array1<f64>> = IndexMap::new();
    gradients.insert("z".to_string(), array![1.0, -1.0]);

    DenseModelBuilder::default()
        .e2(array![[w0, 0.0], [0.0, -w0]])
        .orbital_diagonal(array![1.0, 1.0])
        .overlap_diagonal(array![1.0, -1.0])
        .gradients(gradients)
        .excitations(vec![(0, 1)])
        .build()
        .unwrap()
}

/// Wrapper that counts the calls of the operator products.
pub struct CountingEngine<E> {
    pub inner: E,
    pub e2n_calls: usize,
    pub s2n_calls: usize,
}

impl<E> CountingEngine<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            e2n_calls: 0,
            s2n_calls: 0,
        }
    }
}

impl<E: ResponseEngine> ResponseEngine for CountingEngine<E> {
    fn orbital_diagonal(&self, shift: f64) -> Array1<f64> {
        self.inner.orbital_diagonal(shift)
    }

    fn overlap_diagonal(&self) -> Array1<f64> {
        self.inner.overlap_diagonal()
    }

    fn rhs(&self, ops: &[&str]) -> Result<Vec<Array1<f64>>, ResponseError> {
        self.inner.rhs(ops)
    }

    fn e2n(&mut self, b: ArrayView2<f64>) -> Array2<f64> {
        self.e2n_calls += 1;
        self.inner.e2n(b)
    }

    fn s2n(&mut self, b: ArrayView2<f64>) -> Array2<f64> {
        self.s2n_calls += 1;
        self.inner.s2n(b)
    }

    fn excitations(&self) -> Vec<(usize, usize)> {
        self.inner.excitations()
    }
}
