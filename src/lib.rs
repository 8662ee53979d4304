//! Paired linear response solvers.
//!
//! Linear response equations `(E2 - w S2) N = V` and the response eigenvalue
//! problem `E2 X = w S2 X` are solved in a growing subspace of trial vectors. The
//! quantum chemistry backend only has to provide the products of `E2` and `S2` with
//! trial vectors, see [response::ResponseEngine].

pub mod defaults;
pub mod error;
pub mod io;
pub mod model;
pub mod response;
pub mod utils;

pub use error::ResponseError;
pub use model::{DenseModel, DenseModelBuilder};
pub use response::{ResponseEngine, ResponseSolver, SolverOptions, SolverOptionsBuilder};
