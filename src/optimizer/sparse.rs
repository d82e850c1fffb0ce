//! Sparse Gauss-Newton optimizer with a switchable normal-equation backend.

use faer::{
    Mat,
    sparse::{SparseColMat, Triplet},
};
use tracing::debug;

use crate::core::{CoreError, SparseProblem, irls_weights, weights::weighted_squared_sum};
use crate::linalg::{
    LinAlgError, NormalEquationSolver, NormalEquationSolverType, PcgSolver, SparseCholeskySolver,
    pcg::DEFAULT_MAX_ITERATIONS,
};
use crate::optimizer::{
    OptimizerResult, apply_parameter_step, scale_rows_sqrt, squared_residuals_sum,
};

/// Step-granular Gauss-Newton engine over a [`SparseProblem`].
///
/// The normal-equation backend can be swapped between steps with
/// [`switch_normal_equation_solver`](Self::switch_normal_equation_solver);
/// the change takes effect on the next step without re-initialization.
/// The PCG iteration budget survives backend switches.
pub struct SparseOptimizer {
    problem: SparseProblem,
    params: Mat<f64>,
    squared_residuals_sum: f64,
    solver: NormalEquationSolver,
    pcg_max_iterations: usize,
}

impl SparseOptimizer {
    /// Adopt a problem, starting from its initial parameters and the
    /// direct Cholesky backend.
    pub fn new(problem: SparseProblem) -> Self {
        let params = problem.initial_params().to_owned();
        let seed = squared_residuals_sum(&problem.residual(&params));
        SparseOptimizer {
            problem,
            params,
            squared_residuals_sum: seed,
            solver: NormalEquationSolver::Direct(SparseCholeskySolver::new()),
            pcg_max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Replace the problem and re-seed parameters and the cached sum.
    ///
    /// The solver selection and the PCG iteration budget are kept, but a
    /// direct backend drops its cached symbolic analysis since the new
    /// Jacobian may have a different sparsity pattern.
    pub fn initialize(&mut self, problem: SparseProblem) {
        self.params = problem.initial_params().to_owned();
        self.squared_residuals_sum = squared_residuals_sum(&problem.residual(&self.params));
        self.problem = problem;
        if let NormalEquationSolver::Direct(solver) = &mut self.solver {
            solver.reset_symbolic();
        }
    }

    /// Select the normal-equation backend for subsequent steps.
    pub fn switch_normal_equation_solver(&mut self, solver_type: NormalEquationSolverType) {
        if self.solver.solver_type() == solver_type {
            return;
        }
        debug!("switching normal-equation solver to {solver_type}");
        self.solver = match solver_type {
            NormalEquationSolverType::Direct => {
                NormalEquationSolver::Direct(SparseCholeskySolver::new())
            }
            NormalEquationSolverType::Pcg => {
                NormalEquationSolver::Pcg(PcgSolver::new(self.pcg_max_iterations))
            }
        };
    }

    /// Currently selected backend.
    pub fn normal_equation_solver(&self) -> NormalEquationSolverType {
        self.solver.solver_type()
    }

    /// Set the PCG iteration budget. Takes effect on the next step and is
    /// remembered across backend switches; the direct backend ignores it.
    pub fn set_max_iterations(&mut self, max_iterations: usize) {
        self.pcg_max_iterations = max_iterations;
        if let NormalEquationSolver::Pcg(solver) = &mut self.solver {
            solver.set_max_iterations(max_iterations);
        }
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

    /// Perform one Gauss-Newton step: solve `(JᵀJ)·Δx = −Jᵀr` with the
    /// selected backend, commit `x ← x + Δx`, and refresh the cached
    /// squared residual sum.
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
            "gauss-newton step ({}): |dx| = {:.3e}, squared residual sum = {:.6e}",
            self.solver.solver_type(),
            step_norm,
            self.squared_residuals_sum
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
        let weighted_residual = scale_rows_sqrt(&residual, &weights);
        let weight_sqrt = sqrt_weight_diagonal(&weights)?;
        // Row-scaling J by sqrt(w) reduces the weighted normal equations
        // to the unweighted solver
        let weighted_jacobian = weight_sqrt * &jacobian;

        let step = self
            .solver
            .solve_normal_equation(&weighted_residual, &weighted_jacobian)?;
        let step_norm = apply_parameter_step(&mut self.params, &step);

        let refreshed = self.problem.residual(&self.params);
        let refreshed_weights = irls_weights(&refreshed);
        self.squared_residuals_sum = weighted_squared_sum(&refreshed, &refreshed_weights);
        debug!(
            "irls step ({}): |dx| = {:.3e}, weighted squared residual sum = {:.6e}",
            self.solver.solver_type(),
            step_norm,
            self.squared_residuals_sum
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

    fn check_jacobian(&self, jacobian: &SparseColMat<usize, f64>) -> OptimizerResult<()> {
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

/// Diagonal sparse matrix holding the square roots of the IRLS weights.
fn sqrt_weight_diagonal(weights: &Mat<f64>) -> Result<SparseColMat<usize, f64>, LinAlgError> {
    let n = weights.nrows();
    let triplets: Vec<Triplet<usize, usize, f64>> = (0..n)
        .map(|i| Triplet::new(i, i, weights[(i, 0)].sqrt()))
        .collect();
    SparseColMat::try_new_from_triplets(n, n, &triplets).map_err(|e| {
        LinAlgError::SparseMatrixCreation("Failed to create IRLS weight matrix".to_string())
            .log_with_source(e)
    })
}
