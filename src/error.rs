use ndarray_linalg::error::LinalgError;
use thiserror::Error;

/// Errors raised by the response solvers.
///
/// Non-convergence within the iteration limit is not an error, the solvers return
/// their best estimate together with the relative residual norms instead.
#[derive(Error, Debug)]
pub enum ResponseError {
    /// An array does not have the shape that an operation requires.
    #[error("Shape mismatch in {operation}: {reason}")]
    Shape {
        operation: &'static str,
        reason: String,
    },

    /// The projected (or full) linear response system could not be solved.
    #[error("Singular linear response system for <<{op};{op}>>({freq}): {reason}")]
    SingularSystem {
        op: String,
        freq: f64,
        reason: String,
    },

    /// The metric matrix of the generalized eigenvalue problem is singular.
    #[error("Singular metric in the response eigenvalue problem: {0}")]
    SingularMetric(String),

    /// An eigendecomposition failed or produced an unusable eigenvector.
    #[error("Eigendecomposition failed: {0}")]
    Eigen(String),

    /// The backend does not provide a property gradient for this operator label.
    #[error("Unknown operator label: {0}")]
    UnknownOperator(String),

    /// Invalid setup of a solver or a model.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Any other failure of the linear algebra backend.
    #[error(transparent)]
    Linalg(#[from] LinalgError),
}

impl ResponseError {
    pub(crate) fn shape(operation: &'static str, reason: impl Into<String>) -> Self {
        ResponseError::Shape {
            operation,
            reason: reason.into(),
        }
    }
}
