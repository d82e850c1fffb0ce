//! Least-squares problem definitions.
//!
//! A problem bundles a residual callback, a Jacobian callback, an initial
//! parameter vector and a data matrix. Observations are stored column-wise
//! in the data matrix, so the residual vector must have one row per data
//! column. Both callbacks are evaluated once at construction time to
//! validate their output shapes; after that the optimizer trusts them.

use faer::{Mat, sparse::SparseColMat};

use crate::core::{CoreError, CoreResult};

/// Residual callback: maps (params, data) to an N×1 residual vector.
pub type ResidualFn = Box<dyn Fn(&Mat<f64>, &Mat<f64>) -> Mat<f64>>;

/// Dense Jacobian callback: maps (params, data) to an N×P matrix.
pub type DenseJacobianFn = Box<dyn Fn(&Mat<f64>, &Mat<f64>) -> Mat<f64>>;

/// Sparse Jacobian callback: maps (params, data) to an N×P sparse matrix.
pub type SparseJacobianFn = Box<dyn Fn(&Mat<f64>, &Mat<f64>) -> SparseColMat<usize, f64>>;

fn check_params_shape(initial_params: &Mat<f64>) -> CoreResult<()> {
    if initial_params.ncols() != 1 {
        return Err(CoreError::DimensionMismatch {
            what: "initial parameter columns",
            expected: 1,
            actual: initial_params.ncols(),
        }
        .log());
    }
    if initial_params.nrows() == 0 {
        return Err(CoreError::InvalidInput("empty parameter vector".to_string()).log());
    }
    Ok(())
}

fn check_residual_shape(residual: &Mat<f64>, num_observations: usize) -> CoreResult<()> {
    if residual.ncols() != 1 {
        return Err(CoreError::DimensionMismatch {
            what: "residual columns",
            expected: 1,
            actual: residual.ncols(),
        }
        .log());
    }
    if residual.nrows() != num_observations {
        return Err(CoreError::DimensionMismatch {
            what: "residual rows",
            expected: num_observations,
            actual: residual.nrows(),
        }
        .log());
    }
    Ok(())
}

fn check_jacobian_shape(
    nrows: usize,
    ncols: usize,
    num_observations: usize,
    num_params: usize,
) -> CoreResult<()> {
    if nrows != num_observations {
        return Err(CoreError::DimensionMismatch {
            what: "Jacobian rows",
            expected: num_observations,
            actual: nrows,
        }
        .log());
    }
    if ncols != num_params {
        return Err(CoreError::DimensionMismatch {
            what: "Jacobian columns",
            expected: num_params,
            actual: ncols,
        }
        .log());
    }
    Ok(())
}

/// Problem definition with a dense Jacobian.
pub struct DenseProblem {
    residual_fn: ResidualFn,
    jacobian_fn: DenseJacobianFn,
    initial_params: Mat<f64>,
    data: Mat<f64>,
}

impl DenseProblem {
    /// Build a dense problem, validating callback output shapes at the
    /// initial parameters.
    pub fn new(
        residual_fn: ResidualFn,
        jacobian_fn: DenseJacobianFn,
        initial_params: Mat<f64>,
        data: Mat<f64>,
    ) -> CoreResult<Self> {
        check_params_shape(&initial_params)?;
        let n = data.ncols();
        let p = initial_params.nrows();

        let residual = residual_fn(&initial_params, &data);
        check_residual_shape(&residual, n)?;

        let jacobian = jacobian_fn(&initial_params, &data);
        check_jacobian_shape(jacobian.nrows(), jacobian.ncols(), n, p)?;

        Ok(DenseProblem {
            residual_fn,
            jacobian_fn,
            initial_params,
            data,
        })
    }

    pub fn initial_params(&self) -> &Mat<f64> {
        &self.initial_params
    }

    pub fn data(&self) -> &Mat<f64> {
        &self.data
    }

    pub fn num_observations(&self) -> usize {
        self.data.ncols()
    }

    pub fn num_params(&self) -> usize {
        self.initial_params.nrows()
    }

    /// Evaluate the residual at the given parameters.
    pub fn residual(&self, params: &Mat<f64>) -> Mat<f64> {
        (self.residual_fn)(params, &self.data)
    }

    /// Evaluate the Jacobian at the given parameters.
    pub fn jacobian(&self, params: &Mat<f64>) -> Mat<f64> {
        (self.jacobian_fn)(params, &self.data)
    }
}

/// Problem definition with a sparse Jacobian.
///
/// Residuals stay dense: an N×1 vector is dense by nature and keeping it
/// as `Mat` avoids pointless triplet round-trips in every step.
pub struct SparseProblem {
    residual_fn: ResidualFn,
    jacobian_fn: SparseJacobianFn,
    initial_params: Mat<f64>,
    data: Mat<f64>,
}

impl SparseProblem {
    /// Build a sparse problem, validating callback output shapes at the
    /// initial parameters.
    pub fn new(
        residual_fn: ResidualFn,
        jacobian_fn: SparseJacobianFn,
        initial_params: Mat<f64>,
        data: Mat<f64>,
    ) -> CoreResult<Self> {
        check_params_shape(&initial_params)?;
        let n = data.ncols();
        let p = initial_params.nrows();

        let residual = residual_fn(&initial_params, &data);
        check_residual_shape(&residual, n)?;

        let jacobian = jacobian_fn(&initial_params, &data);
        check_jacobian_shape(jacobian.nrows(), jacobian.ncols(), n, p)?;

        Ok(SparseProblem {
            residual_fn,
            jacobian_fn,
            initial_params,
            data,
        })
    }

    pub fn initial_params(&self) -> &Mat<f64> {
        &self.initial_params
    }

    pub fn data(&self) -> &Mat<f64> {
        &self.data
    }

    pub fn num_observations(&self) -> usize {
        self.data.ncols()
    }

    pub fn num_params(&self) -> usize {
        self.initial_params.nrows()
    }

    /// Evaluate the residual at the given parameters.
    pub fn residual(&self, params: &Mat<f64>) -> Mat<f64> {
        (self.residual_fn)(params, &self.data)
    }

    /// Evaluate the Jacobian at the given parameters.
    pub fn jacobian(&self, params: &Mat<f64>) -> SparseColMat<usize, f64> {
        (self.jacobian_fn)(params, &self.data)
    }
}
