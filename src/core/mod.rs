//! Problem definitions and robust reweighting.

use thiserror::Error;
use tracing::error;

pub mod problem;
pub mod weights;

pub use problem::{DenseProblem, SparseProblem};
pub use weights::irls_weights;

/// Core-specific error types for nlsq
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// A matrix supplied by the caller or produced by a callback has the wrong shape
    #[error("Dimension mismatch in {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Invalid input that is not a pure shape violation
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CoreError {
    /// Log the error with tracing::error and return self for chaining
    ///
    /// This method allows for a consistent error logging pattern throughout
    /// the core module, ensuring all errors are properly recorded.
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;
