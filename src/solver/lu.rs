use crate::error::SolveError;
use crate::solver::{check_dimensions, residual_norm, to_f64, LinearSolver, SolverReport};
use crate::Real;
use log::debug;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;

/// Direct solver that densifies the matrix and solves with an LU factorization.
///
/// Only meant for small systems.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct DenseLu;

impl<T: Real> LinearSolver<T> for DenseLu {
    fn solve(&self, matrix: &CsrMatrix<T>, rhs: &DVector<T>) -> Result<(DVector<T>, SolverReport), SolveError> {
        check_dimensions(matrix, rhs)?;
        let dense = DMatrix::from(matrix);
        let x = dense.lu().solve(rhs).ok_or(SolveError::Singular)?;
        let residual = to_f64(residual_norm(matrix, &x, rhs));
        if !residual.is_finite() {
            return Err(SolveError::Singular);
        }
        debug!("Dense LU solved {}x{} system, residual {:e}", matrix.nrows(), matrix.ncols(), residual);
        let report = SolverReport {
            solver: "dense-lu".to_string(),
            iterations: 1,
            residual_norm: residual,
            converged: true,
        };
        Ok((x, report))
    }
}
