use crate::error::ResponseError;
use crate::response::{Excitation, ResponseEngine, Target, TargetMap};
use crate::utils::argsort;
use ndarray::prelude::*;
use ndarray::OwnedRepr;
use ndarray_linalg::{Eig, Factorize, LUFactorized, ReciprocalConditionNum, Solve};

/// The full matrices `E2` and `S2` are obtained by applying the operators to the
/// identity of the response space.
pub fn get_e2s2<E: ResponseEngine + ?Sized>(
    engine: &mut E,
) -> Result<(Array2<f64>, Array2<f64>), ResponseError> {
    let dim: usize = engine.response_dim();
    let identity: Array2<f64> = Array2::eye(dim);
    let e2: Array2<f64> = engine.e2n(identity.view());
    let s2: Array2<f64> = engine.s2n(identity.view());
    for (name, m) in [("e2n", &e2), ("s2n", &s2)] {
        if m.dim() != (dim, dim) {
            return Err(ResponseError::shape(
                "get_e2s2",
                format!("{} returned shape {:?}, expected ({}, {})", name, m.dim(), dim, dim),
            ));
        }
    }
    Ok((e2, s2))
}

/// LU factorization of a square matrix that fails for (numerically) singular matrices.
pub(crate) fn factorize_checked(
    a: ArrayView2<f64>,
) -> Result<LUFactorized<OwnedRepr<f64>>, String> {
    let lu: LUFactorized<OwnedRepr<f64>> = a.factorize().map_err(|err| err.to_string())?;
    let rcond: f64 = lu.rcond().map_err(|err| err.to_string())?;
    if !(rcond >= f64::EPSILON) {
        return Err(format!("reciprocal condition number {:e}", rcond));
    }
    Ok(lu)
}

/// Solve `(E2 - w S2) N = V` exactly for every operator and frequency.
pub fn direct_lr_solve<E: ResponseEngine + ?Sized>(
    engine: &mut E,
    ops: &[&str],
    freqs: &[f64],
) -> Result<TargetMap<Array1<f64>>, ResponseError> {
    let v1: Vec<Array1<f64>> = engine.rhs(ops)?;
    let (e2, s2): (Array2<f64>, Array2<f64>) = get_e2s2(engine)?;

    let mut solutions: TargetMap<Array1<f64>> = TargetMap::new();
    for &freq in freqs.iter() {
        let lhs: Array2<f64> = &e2 - &(freq * &s2);
        for (op, v) in ops.iter().zip(v1.iter()) {
            let n: Array1<f64> = factorize_checked(lhs.view())
                .and_then(|lu| lu.solve(v).map_err(|err| err.to_string()))
                .map_err(|reason| ResponseError::SingularSystem {
                    op: op.to_string(),
                    freq,
                    reason,
                })?;
            solutions.insert(Target::new(op, freq), n);
        }
    }
    Ok(solutions)
}

/// Lowest `n_states` excitations from the full matrices of the backend.
pub fn direct_ev_solve<E: ResponseEngine + ?Sized>(
    engine: &mut E,
    n_states: usize,
) -> Result<Vec<Excitation>, ResponseError> {
    let (e2, s2): (Array2<f64>, Array2<f64>) = get_e2s2(engine)?;
    solve_eigenproblem(n_states, e2.view(), s2.view())
}

/// Solve the generalized eigenvalue problem `E2 X = w S2 X`.
///
/// The spectrum of a paired problem is symmetric around zero, so after sorting the
/// eigenvalues in ascending order the excitations start at the middle of the
/// spectrum. The eigenvectors are normalized to `X^T S2 X = 1` and their largest
/// component is made positive.
pub fn solve_eigenproblem(
    n_states: usize,
    e2: ArrayView2<f64>,
    s2: ArrayView2<f64>,
) -> Result<Vec<Excitation>, ResponseError> {
    let dim: usize = e2.nrows();
    if e2.dim() != (dim, dim) || s2.dim() != (dim, dim) {
        return Err(ResponseError::shape(
            "solve_eigenproblem",
            format!("E2 {:?} and S2 {:?} must be square and equal", e2.dim(), s2.dim()),
        ));
    }
    if dim == 0 || n_states == 0 {
        return Ok(Vec::new());
    }

    // S2^-1 E2 is formed column by column from the LU factorization of the metric.
    let lu = factorize_checked(s2).map_err(ResponseError::SingularMetric)?;
    let mut s2_inv_e2: Array2<f64> = Array2::zeros((dim, dim));
    for (mut col, e2_col) in s2_inv_e2.axis_iter_mut(Axis(1)).zip(e2.axis_iter(Axis(1))) {
        col.assign(
            &lu.solve(&e2_col)
                .map_err(|err| ResponseError::SingularMetric(err.to_string()))?,
        );
    }

    let (wn, xn) = s2_inv_e2.eig()?;
    // The spectrum is real, the imaginary parts are numerical noise.
    let wn: Array1<f64> = wn.mapv(|w| w.re);
    let xn: Array2<f64> = xn.mapv(|x| x.re);
    let order: Vec<usize> = argsort(wn.view());

    let lo: usize = dim / 2;
    let hi: usize = (dim / 2 + n_states).min(dim);
    order[lo..hi]
        .iter()
        .map(|&i| {
            let x: ArrayView1<f64> = xn.column(i);
            let norm_sq: f64 = x.dot(&s2.dot(&x));
            if norm_sq <= 0.0 {
                return Err(ResponseError::Eigen(format!(
                    "eigenvector of w = {} has a non-positive metric norm {}",
                    wn[i], norm_sq
                )));
            }
            let mut x: Array1<f64> = &x / norm_sq.sqrt();
            fix_phase(&mut x);
            Ok((wn[i], x))
        })
        .collect()
}

/// The sign of a vector is chosen such that its largest component is positive.
pub(crate) fn fix_phase(x: &mut Array1<f64>) {
    let largest: f64 = x
        .iter()
        .fold(0.0, |acc: f64, &v| if v.abs() > acc.abs() { v } else { acc });
    if largest < 0.0 {
        x.mapv_inplace(|v| -v);
    }
}
