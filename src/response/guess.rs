use crate::defaults::SMALL;
use crate::error::ResponseError;
use crate::response::{Excitation, ResponseEngine, Target, TargetMap};
use crate::utils::argsort;
use ndarray::prelude::*;
use ndarray_linalg::Norm;

/// Initial guesses for the linear response equations: the property gradient of every
/// operator divided by the shifted diagonal `od - w * sd`. Operators with a vanishing
/// gradient get the zero vector for all frequencies.
pub fn initial_guess<E: ResponseEngine + ?Sized>(
    engine: &E,
    ops: &[&str],
    freqs: &[f64],
    hessian_diagonal_shift: f64,
) -> Result<TargetMap<Array1<f64>>, ResponseError> {
    let od: Array1<f64> = engine.orbital_diagonal(hessian_diagonal_shift);
    let sd: Array1<f64> = engine.overlap_diagonal();
    let dim: usize = od.len();

    let mut ig: TargetMap<Array1<f64>> = TargetMap::new();
    for (op, grad) in ops.iter().zip(engine.rhs(ops)?.into_iter()) {
        if grad.len() != dim {
            return Err(ResponseError::shape(
                "initial_guess",
                format!("gradient of {} has length {}, expected {}", op, grad.len(), dim),
            ));
        }
        let gn: f64 = grad.norm_l2();
        for &w in freqs.iter() {
            let guess: Array1<f64> = if gn < SMALL {
                Array1::zeros(dim)
            } else {
                &grad / &(&od - &(w * &sd))
            };
            ig.insert(Target::new(op, w), guess);
        }
    }
    Ok(ig)
}

/// Bare excitation vectors for the `n` single excitations with the lowest diagonal
/// excitation energies `od / 2`, in ascending order of these energies.
pub fn initial_excitations<E: ResponseEngine + ?Sized>(engine: &E, n: usize) -> Vec<Excitation> {
    let excitations: Vec<(usize, usize)> = engine.excitations();
    let n_exc: usize = excitations.len();
    // Only the X part of the diagonal belongs to the excitations.
    let od: Array1<f64> = engine.orbital_diagonal(0.0);
    let energies: Array1<f64> = 0.5 * &od.slice(s![..n_exc.min(od.len())]);

    argsort(energies.view())
        .into_iter()
        .take(n)
        .map(|ia| {
            let mut xn: Array1<f64> = Array1::zeros(2 * n_exc);
            xn[ia] = 1.0;
            (energies[ia], xn)
        })
        .collect()
}
