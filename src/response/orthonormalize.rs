use crate::error::ResponseError;
use ndarray::prelude::*;
use ndarray_linalg::{Eigh, UPLO};

/// Remove linear dependencies from a set of trial vectors.
///
/// The overlap matrix `S_b = b^T b` of the trial vectors is diagonalized and all
/// eigenvectors with an eigenvalue below `threshold * |b_k|` are skipped. The
/// remaining eigenvectors transform the trial vectors into a basis without (near)
/// null directions. An empty set of vectors is returned unchanged.
pub fn truncate(basis: ArrayView2<f64>, threshold: f64) -> Result<Array2<f64>, ResponseError> {
    if basis.ncols() == 0 {
        return Ok(basis.to_owned());
    }
    // Overlap of the trial vectors.
    let sb: Array2<f64> = basis.t().dot(&basis);
    let (l, t): (Array1<f64>, Array2<f64>) = sb.eigh(UPLO::Upper)?;
    // Norms of the original trial vectors.
    let b_norm: Array1<f64> = sb.diag().mapv(|x| x.max(0.0).sqrt());

    let keep: Vec<usize> = l
        .iter()
        .zip(b_norm.iter())
        .enumerate()
        .filter(|(_, (&li, &bk))| li > threshold * bk)
        .map(|(i, _)| i)
        .collect();

    Ok(basis.dot(&t.select(Axis(1), &keep)))
}

/// Symmetric (Löwdin) orthonormalization: `b (T λ^{-1/2} T^T)` with `b^T b = T λ T^T`.
pub fn lowdin_normalize(basis: ArrayView2<f64>) -> Result<Array2<f64>, ResponseError> {
    if basis.ncols() == 0 {
        return Ok(basis.to_owned());
    }
    let (l, t): (Array1<f64>, Array2<f64>) = basis.t().dot(&basis).eigh(UPLO::Upper)?;
    // The columns of T are scaled with the inverse square roots of the eigenvalues.
    let inverse_sqrt: Array2<f64> = (&t * &l.mapv(|x| 1.0 / x.sqrt())).dot(&t.t());
    Ok(basis.dot(&inverse_sqrt))
}
