use faer::{Mat, sparse::SparseColMat};
use std::ops::Mul;
use tracing::debug;

use crate::linalg::{LinAlgError, LinAlgResult};

/// Default iteration budget for the conjugate gradient loop.
pub const DEFAULT_MAX_ITERATIONS: usize = 20;

/// Relative convergence tolerance on the CG residual norm.
const CG_TOLERANCE: f64 = 1e-10;

/// Curvature values below this are treated as a numerical breakdown.
const MIN_CURVATURE: f64 = 1e-20;

/// Iterative sparse backend: Jacobi-preconditioned conjugate gradient on
/// the normal equations.
///
/// The preconditioner is the inverse diagonal of `JᵀJ`, which costs one
/// pass over the Hessian triplets and captures the column scaling of the
/// Jacobian. The iteration budget is a hard cap: exhausting it without
/// reaching tolerance is an error, so a failed solve never commits a
/// half-converged step.
#[derive(Debug, Clone)]
pub struct PcgSolver {
    max_iterations: usize,
}

impl PcgSolver {
    pub fn new(max_iterations: usize) -> Self {
        PcgSolver { max_iterations }
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn set_max_iterations(&mut self, max_iterations: usize) {
        self.max_iterations = max_iterations;
    }

    /// Solve the normal equation: (J^T * J) * dx = -J^T * r
    pub fn solve_normal_equation(
        &mut self,
        residuals: &Mat<f64>,
        jacobians: &SparseColMat<usize, f64>,
    ) -> LinAlgResult<Mat<f64>> {
        // H = J^T * J
        let jt = jacobians.as_ref().transpose();
        let hessian = jt
            .to_col_major()
            .map_err(|e| {
                LinAlgError::MatrixConversion(
                    "Failed to convert transposed Jacobian to column-major format".to_string(),
                )
                .log_with_source(e)
            })?
            .mul(jacobians.as_ref());

        // b = -J^T * r
        let gradient = jacobians.as_ref().transpose().mul(residuals);
        let b = -&gradient;

        let n = hessian.ncols();

        // Jacobi preconditioner: inverse diagonal of H. A zero diagonal
        // entry means a parameter with no Jacobian support at all.
        let mut m_inv = vec![0.0f64; n];
        for triplet in hessian.triplet_iter() {
            if triplet.row == triplet.col {
                m_inv[triplet.row] = *triplet.val;
            }
        }
        for (i, d) in m_inv.iter_mut().enumerate() {
            if *d <= 0.0 {
                debug!("non-positive Hessian diagonal at column {i}: {d:.3e}");
                return Err(LinAlgError::SingularMatrix.log());
            }
            *d = 1.0 / *d;
        }

        let b_norm = b.norm_l2();
        if b_norm == 0.0 {
            // Gradient already vanished; the zero step is exact
            return Ok(Mat::zeros(n, 1));
        }
        let tolerance = CG_TOLERANCE * b_norm.max(1.0);

        let mut x = Mat::<f64>::zeros(n, 1);
        let mut r = b;
        let mut z = Mat::from_fn(n, 1, |i, _| m_inv[i] * r[(i, 0)]);
        let mut p = z.clone();
        let mut rz_old = dot(&r, &z);
        let mut r_norm = r.norm_l2();

        for iteration in 0..self.max_iterations {
            // H is symmetric, so multiplying by its transpose reuses the
            // row-major view without an extra conversion
            let ap = hessian.as_ref().transpose().mul(&p);
            let p_ap = dot(&p, &ap);
            if p_ap.abs() < MIN_CURVATURE {
                return Err(LinAlgError::SingularMatrix.log());
            }

            let alpha = rz_old / p_ap;
            for i in 0..n {
                x[(i, 0)] += alpha * p[(i, 0)];
                r[(i, 0)] -= alpha * ap[(i, 0)];
            }

            r_norm = r.norm_l2();
            debug!(
                "pcg iteration {}: residual norm {:.3e} (tolerance {:.3e})",
                iteration + 1,
                r_norm,
                tolerance
            );
            if r_norm < tolerance {
                return Ok(x);
            }

            z = Mat::from_fn(n, 1, |i, _| m_inv[i] * r[(i, 0)]);
            let rz_new = dot(&r, &z);
            let beta = rz_new / rz_old;
            for i in 0..n {
                p[(i, 0)] = z[(i, 0)] + beta * p[(i, 0)];
            }
            rz_old = rz_new;
        }

        Err(LinAlgError::DidNotConverge {
            iterations: self.max_iterations,
            residual_norm: r_norm,
        }
        .log())
    }
}

impl Default for PcgSolver {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ITERATIONS)
    }
}

fn dot(a: &Mat<f64>, b: &Mat<f64>) -> f64 {
    let mut sum = 0.0;
    for i in 0..a.nrows() {
        sum += a[(i, 0)] * b[(i, 0)];
    }
    sum
}
