//! # nlsq
//!
//! Iterative Gauss-Newton optimization for nonlinear least-squares
//! problems, built on the faer linear algebra library.
//!
//! ## Features
//!
//! - **Step-granular API**: each call performs exactly one Gauss-Newton
//!   update; the caller owns the outer loop and convergence policy
//! - **Dense and sparse problems**: `DenseOptimizer` for dense Jacobians,
//!   `SparseOptimizer` for `SparseColMat` Jacobians
//! - **Switchable normal-equation backends**: direct Cholesky or
//!   Jacobi-preconditioned conjugate gradient with a runtime iteration
//!   budget, swappable between steps
//! - **Robust reweighting**: IRLS steps with Huber/MAD weights for data
//!   containing outliers
//! - **Recoverable failures**: a failed step never mutates optimizer state
//!
//! ## Example
//!
//! ```no_run
//! use faer::Mat;
//! use nlsq::{DenseOptimizer, DenseProblem, NlsqResult};
//!
//! fn main() -> NlsqResult<()> {
//!     // Fit y = a*x + b; data columns are observations (row 0: x, row 1: y)
//!     let data = Mat::from_fn(2, 5, |i, j| {
//!         let x = 0.1 * j as f64;
//!         if i == 0 { x } else { 2.0 * x + 1.0 }
//!     });
//!     let problem = DenseProblem::new(
//!         Box::new(|x, data| {
//!             Mat::from_fn(data.ncols(), 1, |i, _| {
//!                 data[(1, i)] - (x[(0, 0)] * data[(0, i)] + x[(1, 0)])
//!             })
//!         }),
//!         Box::new(|_, data| {
//!             Mat::from_fn(data.ncols(), 2, |i, j| {
//!                 if j == 0 { -data[(0, i)] } else { -1.0 }
//!             })
//!         }),
//!         Mat::zeros(2, 1),
//!         data,
//!     )?;
//!
//!     let mut optimizer = DenseOptimizer::new(problem);
//!     for _ in 0..5 {
//!         optimizer.gauss_newton_step()?;
//!     }
//!     println!("fit: {:?}", optimizer.params());
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod error;
pub mod linalg;
pub mod logger;
pub mod optimizer;

pub use crate::core::{CoreError, CoreResult, DenseProblem, SparseProblem, irls_weights};
pub use error::{NlsqError, NlsqResult};
pub use linalg::{
    DenseNormalSolver, LinAlgError, LinAlgResult, NormalEquationSolver, NormalEquationSolverType,
    PcgSolver, SparseCholeskySolver,
};
pub use logger::{init_logger, init_logger_with_level};
pub use optimizer::{DenseOptimizer, OptimizerError, OptimizerResult, SparseOptimizer};
