use crate::defaults::SMALL;
use crate::error::ResponseError;
use crate::response::orthonormalize::{lowdin_normalize, truncate};
use crate::response::pairs::swap;
use crate::response::{Excitation, PreconditionerMap, TargetMap};
use ndarray::prelude::*;
use ndarray::stack;
use ndarray_linalg::Norm;
use ordered_float::OrderedFloat;

/// Set up paired trial vectors from a set of initial guesses (or residuals).
///
/// * `vectors` guesses keyed by operator and frequency, divided by the preconditioner
///   of their frequency if `td` is given. Vectors with a vanishing norm are skipped and
///   for non-zero frequencies the swapped partner is added as well.
/// * `excitations` are always added together with their swapped partner.
/// * `b` existing basis, the new vectors are projected onto its orthogonal complement.
/// * `renormalize` removes linear dependencies and orthonormalizes the new vectors.
///
/// The returned matrix has no columns if nothing survived, which means that the trial
/// space cannot be extended any further.
pub fn setup_trials(
    vectors: &TargetMap<Array1<f64>>,
    excitations: &[Excitation],
    td: Option<&PreconditionerMap>,
    b: Option<ArrayView2<f64>>,
    renormalize: bool,
    threshold: f64,
) -> Result<Array2<f64>, ResponseError> {
    let mut trials: Vec<Array1<f64>> = Vec::new();

    for (target, vec) in vectors.iter() {
        let v: Array1<f64> = match td {
            Some(td) => {
                let precond: &Array1<f64> =
                    td.get(&OrderedFloat(target.freq())).ok_or_else(|| {
                        ResponseError::Config(format!(
                            "no preconditioner for frequency {}",
                            target.freq()
                        ))
                    })?;
                vec / precond
            }
            None => vec.to_owned(),
        };
        if v.norm_l2() > SMALL {
            // For static response X = -Y, the swapped vector is already contained.
            if target.freq().abs() > SMALL {
                let partner: Array1<f64> = swap(&v)?;
                trials.push(v);
                trials.push(partner);
            } else {
                trials.push(v);
            }
        }
    }

    for (_, x) in excitations.iter() {
        trials.push(x.to_owned());
        trials.push(swap(x)?);
    }

    // The dimension of the response space is taken from the vectors or the basis.
    let dim: usize = vectors
        .values()
        .next()
        .or_else(|| excitations.first().map(|(_, x)| x))
        .map(|v| v.len())
        .or_else(|| b.map(|b| b.nrows()))
        .unwrap_or(0);
    if trials.is_empty() {
        return Ok(Array2::zeros((dim, 0)));
    }

    let views: Vec<ArrayView1<f64>> = trials.iter().map(|t| t.view()).collect();
    let mut new_trials: Array2<f64> = stack(Axis(1), &views).map_err(|_| {
        ResponseError::shape("setup_trials", "trial vectors differ in length")
    })?;

    if let Some(b) = b {
        if b.nrows() != new_trials.nrows() {
            return Err(ResponseError::shape(
                "setup_trials",
                format!("basis has {} rows, trials have {}", b.nrows(), new_trials.nrows()),
            ));
        }
        new_trials = &new_trials - &b.dot(&b.t().dot(&new_trials));
    }
    if renormalize {
        let truncated: Array2<f64> = truncate(new_trials.view(), threshold)?;
        new_trials = lowdin_normalize(truncated.view())?;
    }
    Ok(new_trials)
}
