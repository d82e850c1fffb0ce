//! Normal-equation solvers backing the optimizers.
//!
//! The dense optimizer always factorizes directly. The sparse optimizer
//! dispatches through [`NormalEquationSolver`], a tagged enum so the
//! active backend can be swapped between steps without trait objects.

pub mod cholesky;
pub mod dense;
pub mod pcg;

use faer::{Mat, sparse::SparseColMat};
use std::{
    fmt,
    fmt::{Display, Formatter},
};
use thiserror::Error;
use tracing::error;

pub use cholesky::SparseCholeskySolver;
pub use dense::DenseNormalSolver;
pub use pcg::PcgSolver;

/// Which backend a sparse optimizer uses for the normal equations
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum NormalEquationSolverType {
    /// Sparse Cholesky factorization
    #[default]
    Direct,
    /// Jacobi-preconditioned conjugate gradient
    Pcg,
}

impl Display for NormalEquationSolverType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            NormalEquationSolverType::Direct => write!(f, "Direct (sparse Cholesky)"),
            NormalEquationSolverType::Pcg => write!(f, "Preconditioned conjugate gradient"),
        }
    }
}

/// Linear algebra specific error types for nlsq
#[derive(Debug, Clone, Error)]
pub enum LinAlgError {
    /// Matrix factorization failed (symbolic analysis, etc.)
    #[error("Matrix factorization failed: {0}")]
    FactorizationFailed(String),

    /// Singular or near-singular matrix detected
    #[error("Singular matrix detected (normal equations are not invertible)")]
    SingularMatrix,

    /// Iterative solver exhausted its iteration budget
    #[error(
        "Iterative solver did not converge within {iterations} iterations (residual norm {residual_norm:.3e})"
    )]
    DidNotConverge { iterations: usize, residual_norm: f64 },

    /// Failed to create sparse matrix from triplets
    #[error("Failed to create sparse matrix: {0}")]
    SparseMatrixCreation(String),

    /// Matrix format conversion failed
    #[error("Matrix conversion failed: {0}")]
    MatrixConversion(String),
}

impl LinAlgError {
    /// Log the error with tracing::error and return self for chaining
    ///
    /// This method allows for a consistent error logging pattern throughout
    /// the linalg module, ensuring all errors are properly recorded.
    ///
    /// # Example
    /// ```ignore
    /// operation()
    ///     .map_err(|e| LinAlgError::from(e).log())?;
    /// ```
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }

    /// Log the error with the original source error from a third-party library
    ///
    /// This method logs both the LinAlgError and the underlying error
    /// from external libraries (e.g., faer's FaerError, LltError, CreationError),
    /// providing full debugging context when errors occur in third-party code.
    ///
    /// # Arguments
    /// * `source_error` - The original error from the third-party library (must implement Debug)
    #[must_use]
    pub fn log_with_source<E: std::fmt::Debug>(self, source_error: E) -> Self {
        error!("{} | Source: {:?}", self, source_error);
        self
    }
}

/// Result type for linear algebra operations
pub type LinAlgResult<T> = Result<T, LinAlgError>;

/// Active sparse normal-equation backend.
///
/// Both variants solve `(JᵀJ)·Δx = −Jᵀr` for the step `Δx`; they differ in
/// how: direct factorization versus an iterative Krylov solve.
pub enum NormalEquationSolver {
    Direct(SparseCholeskySolver),
    Pcg(PcgSolver),
}

impl NormalEquationSolver {
    pub fn solver_type(&self) -> NormalEquationSolverType {
        match self {
            NormalEquationSolver::Direct(_) => NormalEquationSolverType::Direct,
            NormalEquationSolver::Pcg(_) => NormalEquationSolverType::Pcg,
        }
    }

    /// Solve the normal equation: (J^T * J) * dx = -J^T * r
    ///
    /// # Errors
    /// Returns `LinAlgError` if the factorization fails, the system is
    /// singular, or the iterative backend runs out of budget.
    pub fn solve_normal_equation(
        &mut self,
        residuals: &Mat<f64>,
        jacobians: &SparseColMat<usize, f64>,
    ) -> LinAlgResult<Mat<f64>> {
        match self {
            NormalEquationSolver::Direct(solver) => {
                solver.solve_normal_equation(residuals, jacobians)
            }
            NormalEquationSolver::Pcg(solver) => solver.solve_normal_equation(residuals, jacobians),
        }
    }
}
