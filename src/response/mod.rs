use crate::error::ResponseError;
use indexmap::IndexMap;
use ndarray::prelude::*;
use ordered_float::OrderedFloat;
use std::fmt;

pub use cache::ProductCache;
pub use direct::{direct_ev_solve, direct_lr_solve, get_e2s2, solve_eigenproblem};
pub use guess::{initial_excitations, initial_guess};
pub use logging::{LogObserver, Observer, OutputStream, Recorder};
pub use orthonormalize::{lowdin_normalize, truncate};
pub use pairs::{bappend, swap};
pub use solver::*;
pub use trials::setup_trials;

mod cache;
pub(crate) mod direct;
mod guess;
pub(crate) mod logging;
mod orthonormalize;
mod pairs;
mod solver;
mod trials;

/// Abstract Trait defining the API that a quantum chemistry backend has to provide
/// for the response solvers.
///
/// All vectors live in the doubled (X, Y) space of dimension `2n`, where `n` is the
/// number of single excitations returned by [ResponseEngine::excitations]. The
/// backend applies the electronic Hessian `E2` and the metric `S2` to trial vectors,
/// the full matrices are never requested except by the direct solvers.
pub trait ResponseEngine {
    /// Diagonal of the orbital Hessian (orbital energy differences) for the X and Y
    /// parts. Entries smaller in magnitude than `shift` are replaced by `shift`.
    fn orbital_diagonal(&self, shift: f64) -> Array1<f64>;

    /// Diagonal of the metric `S2`.
    fn overlap_diagonal(&self) -> Array1<f64>;

    /// Property gradients, one for each requested operator label, in that order.
    fn rhs(&self, ops: &[&str]) -> Result<Vec<Array1<f64>>, ResponseError>;

    /// Compute the products `E2 x b_{i}` for each trial vector `b_{i}` (column) in `b`.
    fn e2n(&mut self, b: ArrayView2<f64>) -> Array2<f64>;

    /// Compute the products `S2 x b_{i}` for each trial vector `b_{i}` (column) in `b`.
    fn s2n(&mut self, b: ArrayView2<f64>) -> Array2<f64>;

    /// The single excitations `(occupied, virtual)` in the order used for the X part.
    fn excitations(&self) -> Vec<(usize, usize)>;

    /// Dimension of the doubled response space.
    fn response_dim(&self) -> usize {
        2 * self.excitations().len()
    }
}

/// Label of a linear response equation: operator and frequency.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Target {
    pub op: String,
    freq: OrderedFloat<f64>,
}

impl Target {
    pub fn new(op: &str, freq: f64) -> Self {
        Self {
            op: op.to_owned(),
            freq: OrderedFloat(freq),
        }
    }

    pub fn freq(&self) -> f64 {
        self.freq.into_inner()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<<{};{}>>{}", self.op, self.op, self.freq())
    }
}

/// Insertion ordered map from response equations to vectors or norms.
pub type TargetMap<V> = IndexMap<Target, V>;

/// Preconditioners `od - w * sd` keyed by the frequency `w`.
pub type PreconditionerMap = IndexMap<OrderedFloat<f64>, Array1<f64>>;

/// Excitation energy (or its estimate) together with the response vector.
pub type Excitation = (f64, Array1<f64>);

/// Builds the shifted diagonal preconditioners for all frequencies.
pub fn preconditioners(od: ArrayView1<f64>, sd: ArrayView1<f64>, freqs: &[f64]) -> PreconditionerMap {
    freqs
        .iter()
        .map(|&w| (OrderedFloat(w), &od - &(w * &sd)))
        .collect()
}
