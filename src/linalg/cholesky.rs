use faer::{
    Mat, Side,
    linalg::solvers::Solve,
    sparse::SparseColMat,
    sparse::linalg::solvers::{Llt, SymbolicLlt},
};
use std::ops::Mul;

use crate::linalg::{LinAlgError, LinAlgResult};

/// Direct sparse backend: Cholesky factorization of `JᵀJ`.
#[derive(Debug, Clone, Default)]
pub struct SparseCholeskySolver {
    /// Cached symbolic factorization for reuse across iterations.
    ///
    /// The sparsity pattern of `JᵀJ` is fixed by the Jacobian structure,
    /// which does not change between steps of the same problem, so the
    /// symbolic analysis is done once.
    symbolic_factorization: Option<SymbolicLlt<usize>>,
}

impl SparseCholeskySolver {
    pub fn new() -> Self {
        SparseCholeskySolver {
            symbolic_factorization: None,
        }
    }

    /// Solve the normal equation: (J^T * J) * dx = -J^T * r
    pub fn solve_normal_equation(
        &mut self,
        residuals: &Mat<f64>,
        jacobians: &SparseColMat<usize, f64>,
    ) -> LinAlgResult<Mat<f64>> {
        // Form the normal equations: H = J^T * J
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

        // g = J^T * r
        let gradient = jacobians.as_ref().transpose().mul(residuals);

        let sym = if let Some(ref cached_sym) = self.symbolic_factorization {
            // SymbolicLlt is reference-counted, so clone() is cheap
            cached_sym.clone()
        } else {
            let new_sym = SymbolicLlt::try_new(hessian.symbolic(), Side::Lower).map_err(|e| {
                LinAlgError::FactorizationFailed(
                    "Symbolic Cholesky decomposition failed".to_string(),
                )
                .log_with_source(e)
            })?;
            self.symbolic_factorization = Some(new_sym.clone());
            new_sym
        };

        let cholesky = Llt::try_new_with_symbolic(sym, hessian.as_ref(), Side::Lower)
            .map_err(|e| LinAlgError::SingularMatrix.log_with_source(e))?;

        Ok(cholesky.solve(-&gradient))
    }

    /// Drop the cached symbolic analysis; required when the Jacobian
    /// sparsity pattern changes (i.e. a new problem is adopted).
    pub fn reset_symbolic(&mut self) {
        self.symbolic_factorization = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::sparse::Triplet;

    const TOLERANCE: f64 = 1e-10;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    /// Overdetermined 4×3 system with a well-conditioned normal matrix
    fn create_test_data()
    -> Result<(SparseColMat<usize, f64>, Mat<f64>), faer::sparse::CreationError> {
        let triplets = vec![
            Triplet::new(0, 0, 2.0),
            Triplet::new(0, 1, 1.0),
            Triplet::new(1, 0, 1.0),
            Triplet::new(1, 1, 3.0),
            Triplet::new(1, 2, 1.0),
            Triplet::new(2, 1, 1.0),
            Triplet::new(2, 2, 2.0),
            Triplet::new(3, 0, 1.5),
            Triplet::new(3, 2, 0.5),
        ];
        let jacobian = SparseColMat::try_new_from_triplets(4, 3, &triplets)?;

        let residuals = Mat::from_fn(4, 1, |i, _| match i {
            0 => 1.0,
            1 => -2.0,
            2 => 0.5,
            3 => 1.2,
            _ => 0.0,
        });

        Ok((jacobian, residuals))
    }

    #[test]
    fn test_solve_well_conditioned_system() -> TestResult {
        let mut solver = SparseCholeskySolver::new();
        let (jacobian, residuals) = create_test_data()?;

        let solution = solver.solve_normal_equation(&residuals, &jacobian)?;
        assert_eq!(solution.nrows(), 3);
        assert_eq!(solution.ncols(), 1);
        assert!(solver.symbolic_factorization.is_some());
        Ok(())
    }

    #[test]
    fn test_symbolic_pattern_is_reused() -> TestResult {
        let mut solver = SparseCholeskySolver::new();
        let (jacobian, residuals) = create_test_data()?;

        let sol1 = solver.solve_normal_equation(&residuals, &jacobian)?;
        let sol2 = solver.solve_normal_equation(&residuals, &jacobian)?;

        for i in 0..sol1.nrows() {
            assert!((sol1[(i, 0)] - sol2[(i, 0)]).abs() < TOLERANCE);
        }
        Ok(())
    }

    #[test]
    fn test_identity_jacobian_recovers_negated_residual() -> TestResult {
        let mut solver = SparseCholeskySolver::new();

        let triplets = vec![Triplet::new(0, 0, 1.0), Triplet::new(1, 1, 1.0)];
        let jacobian = SparseColMat::try_new_from_triplets(2, 2, &triplets)?;
        let residuals = Mat::from_fn(2, 1, |i, _| -((i + 1) as f64));

        let solution = solver.solve_normal_equation(&residuals, &jacobian)?;
        // H = I, g = -[1, 2], so dx = [1, 2]
        assert!((solution[(0, 0)] - 1.0).abs() < TOLERANCE);
        assert!((solution[(1, 0)] - 2.0).abs() < TOLERANCE);
        Ok(())
    }

    #[test]
    fn test_rank_deficient_jacobian_is_rejected() -> TestResult {
        let mut solver = SparseCholeskySolver::new();

        // Second row is a multiple of the first: J^T J is singular
        let triplets = vec![
            Triplet::new(0, 0, 1.0),
            Triplet::new(0, 1, 2.0),
            Triplet::new(1, 0, 2.0),
            Triplet::new(1, 1, 4.0),
        ];
        let jacobian = SparseColMat::try_new_from_triplets(2, 2, &triplets)?;
        let residuals = Mat::from_fn(2, 1, |i, _| i as f64);

        let result = solver.solve_normal_equation(&residuals, &jacobian);
        assert!(result.is_err(), "Singular normal matrix should return Err");
        Ok(())
    }

    #[test]
    fn test_reset_symbolic_clears_cache() -> TestResult {
        let mut solver = SparseCholeskySolver::new();
        let (jacobian, residuals) = create_test_data()?;

        solver.solve_normal_equation(&residuals, &jacobian)?;
        assert!(solver.symbolic_factorization.is_some());

        solver.reset_symbolic();
        assert!(solver.symbolic_factorization.is_none());
        Ok(())
    }
}
