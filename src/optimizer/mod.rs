//! Gauss-Newton step engines.
//!
//! The optimizers here are deliberately step-granular: each call performs
//! exactly one Gauss-Newton (or IRLS-weighted) update and refreshes the
//! cached squared residual sum. Convergence policy, step counts and retry
//! logic belong to the caller. A step that fails for any reason leaves the
//! optimizer exactly as it was, so callers can switch solvers, loosen
//! budgets or simply stop without losing the current iterate.

use crate::core::CoreError;
use crate::linalg::LinAlgError;
use faer::Mat;
use thiserror::Error;
use tracing::error;

pub mod dense;
pub mod sparse;

pub use dense::DenseOptimizer;
pub use sparse::SparseOptimizer;

/// Optimizer-specific error types for nlsq
#[derive(Debug, Clone, Error)]
pub enum OptimizerError {
    /// Linear algebra operation failed
    #[error("Linear algebra error: {0}")]
    LinAlg(#[from] LinAlgError),

    /// Problem or callback shape violation detected during a step
    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl OptimizerError {
    /// Log the error with tracing::error and return self for chaining
    ///
    /// This method allows for a consistent error logging pattern throughout
    /// the optimizer module, ensuring all errors are properly recorded.
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }
}

/// Result type for optimizer operations
pub type OptimizerResult<T> = Result<T, OptimizerError>;

/// Squared residual sum `r·r` of an N×1 residual vector.
pub fn squared_residuals_sum(residual: &Mat<f64>) -> f64 {
    let norm = residual.norm_l2();
    norm * norm
}

/// Add a step vector to a parameter vector in place.
pub(crate) fn apply_parameter_step(params: &mut Mat<f64>, step: &Mat<f64>) -> f64 {
    for i in 0..params.nrows() {
        params[(i, 0)] += step[(i, 0)];
    }
    step.norm_l2()
}

/// Row-scale an N×1 vector by the square roots of diagonal weights.
pub(crate) fn scale_rows_sqrt(vector: &Mat<f64>, weights: &Mat<f64>) -> Mat<f64> {
    Mat::from_fn(vector.nrows(), 1, |i, _| {
        weights[(i, 0)].sqrt() * vector[(i, 0)]
    })
}
