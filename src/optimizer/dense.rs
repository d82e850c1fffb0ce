//! Dense Gauss-Newton optimizer.

use faer::Mat;
use tracing::debug;

use crate::core::{CoreError, DenseProblem, irls_weights, weights::weighted_squared_sum};
use crate::linalg::DenseNormalSolver;
use crate::optimizer::{
    OptimizerResult, apply_parameter_step, scale_rows_sqrt, squared_residuals_sum,
};

/// Step-granular Gauss-Newton engine over a [`DenseProblem`].
///
/// The optimizer owns the live parameter vector and a cached squared
/// residual sum which is refreshed after every committed step. Failed
/// steps leave both untouched.
pub struct DenseOptimizer {
    problem: DenseProblem,
    params: Mat<f64>,
    squared_residuals_sum: f64,
    solver: DenseNormalSolver,
}

impl DenseOptimizer {
    /// Adopt a problem, starting from its initial parameters.
    pub fn new(problem: DenseProblem) -> Self {
        let params = problem.initial_params().to_owned();
        let seed = squared_residuals_sum(&problem.residual(&params));
        DenseOptimizer {
            problem,
            params,
            squared_residuals_sum: seed,
            solver: DenseNormalSolver::new(),
        }
    }

    /// Replace the problem and re-seed parameters and the cached sum.
    pub fn initialize(&mut self, problem: DenseProblem) {
        *self = DenseOptimizer::new(problem);
    }

    /// Current parameter estimate (P×1).
    pub fn params(&self) -> &Mat<f64> {
        &self.params
    }

    /// Overwrite the parameter estimate, e.g. to restart from a new guess.
    ///
    /// The cached squared residual sum is left alone; the next step
    /// refreshes it from the new iterate.
    pub fn set_params(&mut self, params: Mat<f64>) -> OptimizerResult<()> {
        if params.nrows() != self.problem.num_params() || params.ncols() != 1 {
            return Err(CoreError::DimensionMismatch {
                what: "parameter vector rows",
                expected: self.problem.num_params(),
                actual: params.nrows(),
            }
            .log()
            .into());
        }
        self.params = params;
        Ok(())
    }

    /// The observation matrix the problem was built with.
    pub fn data(&self) -> &Mat<f64> {
        self.problem.data()
    }

    /// Squared residual sum at the last committed iterate.
    pub fn squared_residuals_sum(&self) -> f64 {
        self.squared_residuals_sum
    }

    /// Perform one Gauss-Newton step: solve `(JᵀJ)·Δx = −Jᵀr`, commit
    /// `x ← x + Δx`, and refresh the cached squared residual sum.
    pub fn gauss_newton_step(&mut self) -> OptimizerResult<()> {
        let residual = self.problem.residual(&self.params);
        self.check_residual(&residual)?;
        let jacobian = self.problem.jacobian(&self.params);
        self.check_jacobian(&jacobian)?;

        let step = self.solver.solve_normal_equation(&residual, &jacobian)?;
        let step_norm = apply_parameter_step(&mut self.params, &step);

        let refreshed = self.problem.residual(&self.params);
        self.squared_residuals_sum = squared_residuals_sum(&refreshed);
        debug!(
            "gauss-newton step: |dx| = {:.3e}, squared residual sum = {:.6e}",
            step_norm, self.squared_residuals_sum
        );
        Ok(())
    }

    /// Perform one IRLS-weighted Gauss-Newton step: solve
    /// `(JᵀWJ)·Δx = −JᵀWr` with Huber/MAD weights computed from the
    /// current residuals, then commit and refresh as usual.
    pub fn gauss_newton_step_irls(&mut self) -> OptimizerResult<()> {
        let residual = self.problem.residual(&self.params);
        self.check_residual(&residual)?;
        let jacobian = self.problem.jacobian(&self.params);
        self.check_jacobian(&jacobian)?;

        let weights = irls_weights(&residual);
        // Row-scaling J and r by sqrt(w) reduces the weighted normal
        // equations to the unweighted solver
        let weighted_residual = scale_rows_sqrt(&residual, &weights);
        let weighted_jacobian = Mat::from_fn(jacobian.nrows(), jacobian.ncols(), |i, j| {
            weights[(i, 0)].sqrt() * jacobian[(i, j)]
        });

        let step = self
            .solver
            .solve_normal_equation(&weighted_residual, &weighted_jacobian)?;
        let step_norm = apply_parameter_step(&mut self.params, &step);

        let refreshed = self.problem.residual(&self.params);
        let refreshed_weights = irls_weights(&refreshed);
        self.squared_residuals_sum = weighted_squared_sum(&refreshed, &refreshed_weights);
        debug!(
            "irls step: |dx| = {:.3e}, weighted squared residual sum = {:.6e}",
            step_norm, self.squared_residuals_sum
        );
        Ok(())
    }

    fn check_residual(&self, residual: &Mat<f64>) -> OptimizerResult<()> {
        let n = self.problem.num_observations();
        if residual.nrows() != n || residual.ncols() != 1 {
            return Err(CoreError::DimensionMismatch {
                what: "residual rows",
                expected: n,
                actual: residual.nrows(),
            }
            .log()
            .into());
        }
        Ok(())
    }

    fn check_jacobian(&self, jacobian: &Mat<f64>) -> OptimizerResult<()> {
        let n = self.problem.num_observations();
        if jacobian.nrows() != n || jacobian.ncols() != self.problem.num_params() {
            return Err(CoreError::DimensionMismatch {
                what: "Jacobian rows",
                expected: n,
                actual: jacobian.nrows(),
            }
            .log()
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::problem::{DenseJacobianFn, ResidualFn};
    use crate::optimizer::OptimizerError;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    /// Exact points of y = 2x + 1; the model is linear so a single
    /// Gauss-Newton step lands on the least-squares solution.
    fn exact_line_problem() -> Result<DenseProblem, CoreError> {
        let data = Mat::from_fn(2, 4, |i, j| {
            let x = j as f64;
            if i == 0 { x } else { 2.0 * x + 1.0 }
        });
        let residual: ResidualFn = Box::new(|x, data| {
            Mat::from_fn(data.ncols(), 1, |i, _| {
                data[(1, i)] - (x[(0, 0)] * data[(0, i)] + x[(1, 0)])
            })
        });
        let jacobian: DenseJacobianFn = Box::new(|_, data| {
            Mat::from_fn(data.ncols(), 2, |i, j| if j == 0 { -data[(0, i)] } else { -1.0 })
        });
        DenseProblem::new(residual, jacobian, Mat::zeros(2, 1), data)
    }

    #[test]
    fn test_linear_problem_converges_in_one_step() -> TestResult {
        let mut optimizer = DenseOptimizer::new(exact_line_problem()?);
        assert!(optimizer.squared_residuals_sum() > 1.0);

        optimizer.gauss_newton_step()?;
        assert!((optimizer.params()[(0, 0)] - 2.0).abs() < 1e-9);
        assert!((optimizer.params()[(1, 0)] - 1.0).abs() < 1e-9);
        assert!(optimizer.squared_residuals_sum() < 1e-18);
        Ok(())
    }

    #[test]
    fn test_set_params_rejects_wrong_length() -> TestResult {
        let mut optimizer = DenseOptimizer::new(exact_line_problem()?);
        let result = optimizer.set_params(Mat::zeros(3, 1));
        assert!(matches!(result, Err(OptimizerError::Core(_))));
        Ok(())
    }

    #[test]
    fn test_set_params_keeps_cached_sum() -> TestResult {
        let mut optimizer = DenseOptimizer::new(exact_line_problem()?);
        let seed = optimizer.squared_residuals_sum();

        optimizer.set_params(Mat::from_fn(2, 1, |_, _| 10.0))?;
        assert_eq!(optimizer.squared_residuals_sum(), seed);
        Ok(())
    }

    #[test]
    fn test_failed_step_leaves_state_untouched() -> TestResult {
        // Zero Jacobian column: parameter 1 is unobservable
        let data = Mat::from_fn(2, 3, |i, j| if i == 0 { j as f64 } else { 1.0 });
        let residual: ResidualFn = Box::new(|x, data| {
            Mat::from_fn(data.ncols(), 1, |i, _| data[(1, i)] - x[(0, 0)] * data[(0, i)])
        });
        let jacobian: DenseJacobianFn = Box::new(|_, data| {
            Mat::from_fn(data.ncols(), 2, |i, j| if j == 0 { -data[(0, i)] } else { 0.0 })
        });
        let problem = DenseProblem::new(residual, jacobian, Mat::zeros(2, 1), data)?;

        let mut optimizer = DenseOptimizer::new(problem);
        let params_before = optimizer.params().to_owned();
        let sum_before = optimizer.squared_residuals_sum();

        let result = optimizer.gauss_newton_step();
        assert!(matches!(result, Err(OptimizerError::LinAlg(_))));
        for i in 0..2 {
            assert_eq!(optimizer.params()[(i, 0)], params_before[(i, 0)]);
        }
        assert_eq!(optimizer.squared_residuals_sum(), sum_before);
        Ok(())
    }

    #[test]
    fn test_step_revalidates_residual_shape() -> TestResult {
        // The callback passes validation at construction and seeding, then
        // drops a row; the step must reject it without touching state
        let calls = std::cell::Cell::new(0usize);
        let residual: ResidualFn = Box::new(move |x, data| {
            calls.set(calls.get() + 1);
            let rows = if calls.get() <= 2 { data.ncols() } else { data.ncols() - 1 };
            Mat::from_fn(rows, 1, |i, _| {
                data[(1, i)] - (x[(0, 0)] * data[(0, i)] + x[(1, 0)])
            })
        });
        let data = Mat::from_fn(2, 4, |i, j| {
            let x = j as f64;
            if i == 0 { x } else { 2.0 * x + 1.0 }
        });
        let jacobian: DenseJacobianFn = Box::new(|_, data| {
            Mat::from_fn(data.ncols(), 2, |i, j| if j == 0 { -data[(0, i)] } else { -1.0 })
        });
        let problem = DenseProblem::new(residual, jacobian, Mat::zeros(2, 1), data)?;

        let mut optimizer = DenseOptimizer::new(problem);
        let params_before = optimizer.params().to_owned();
        let sum_before = optimizer.squared_residuals_sum();

        let result = optimizer.gauss_newton_step();
        assert!(matches!(
            result,
            Err(OptimizerError::Core(CoreError::DimensionMismatch {
                what: "residual rows",
                ..
            }))
        ));
        for i in 0..2 {
            assert_eq!(optimizer.params()[(i, 0)], params_before[(i, 0)]);
        }
        assert_eq!(optimizer.squared_residuals_sum(), sum_before);
        Ok(())
    }

    #[test]
    fn test_irls_step_on_clean_data_matches_gauss_newton() -> TestResult {
        // Without outliers every weight is 1, so the two step kinds agree
        let mut gn = DenseOptimizer::new(exact_line_problem()?);
        let mut irls = DenseOptimizer::new(exact_line_problem()?);

        gn.gauss_newton_step()?;
        irls.gauss_newton_step_irls()?;
        for i in 0..2 {
            assert!((gn.params()[(i, 0)] - irls.params()[(i, 0)]).abs() < 1e-9);
        }
        Ok(())
    }
}
