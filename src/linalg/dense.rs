use faer::{
    Mat, Side,
    linalg::solvers::{Llt, Solve},
};

use crate::linalg::{LinAlgError, LinAlgResult};
use tracing::debug;

/// Direct dense backend for the normal equations.
///
/// Attempts a Cholesky factorization of `JᵀJ` first and falls back to a
/// full-pivot LU when the normal matrix is not numerically positive
/// definite. A step containing NaN or infinity is reported as singular
/// rather than handed back to the optimizer.
#[derive(Debug, Clone, Default)]
pub struct DenseNormalSolver;

impl DenseNormalSolver {
    pub fn new() -> Self {
        DenseNormalSolver
    }

    /// Solve the normal equation: (J^T * J) * dx = -J^T * r
    pub fn solve_normal_equation(
        &mut self,
        residuals: &Mat<f64>,
        jacobians: &Mat<f64>,
    ) -> LinAlgResult<Mat<f64>> {
        // H = J^T * J, g = J^T * r
        let hessian = jacobians.transpose() * jacobians.as_ref();
        let gradient = jacobians.transpose() * residuals.as_ref();

        let dx = match Llt::new(hessian.as_ref(), Side::Lower) {
            Ok(cholesky) => cholesky.solve(-&gradient),
            Err(_) => {
                debug!("Cholesky factorization rejected the normal matrix, retrying with LU");
                hessian.full_piv_lu().solve(-&gradient)
            }
        };

        for i in 0..dx.nrows() {
            if !dx[(i, 0)].is_finite() {
                return Err(LinAlgError::SingularMatrix.log());
            }
        }

        Ok(dx)
    }
}
