//! Linear solvers for assembled systems.
//!
//! The assemblers hand their matrix to a [`LinearSolver`] as a [`CsrMatrix`] and never look
//! at how it is solved. Two solvers are provided: a dense LU factorization for small systems
//! and restarted GMRES with Jacobi preconditioning.
use crate::error::SolveError;
use crate::Real;
use nalgebra::{ClosedAdd, ClosedMul, DVector, DVectorView, DVectorViewMut, Scalar};
use nalgebra_sparse::ops::serial::spmm_csr_dense;
use nalgebra_sparse::ops::Op;
use nalgebra_sparse::CsrMatrix;
use num::{One, Zero};
use serde::{Deserialize, Serialize};

mod gmres;
mod lu;

pub use gmres::{Gmres, GmresSettings};
pub use lu::DenseLu;

/// Diagnostics returned by a linear solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverReport {
    pub solver: String,
    pub iterations: usize,
    /// Euclidean norm of the final residual `b - A x`.
    pub residual_norm: f64,
    pub converged: bool,
}

pub trait LinearSolver<T: Real> {
    fn solve(&self, matrix: &CsrMatrix<T>, rhs: &DVector<T>) -> Result<(DVector<T>, SolverReport), SolveError>;
}

impl<'a, T, S> LinearSolver<T> for &'a S
where
    T: Real,
    S: ?Sized + LinearSolver<T>,
{
    fn solve(&self, matrix: &CsrMatrix<T>, rhs: &DVector<T>) -> Result<(DVector<T>, SolverReport), SolveError> {
        <S as LinearSolver<T>>::solve(self, matrix, rhs)
    }
}

/// The action `y = A x` of a linear operator.
pub trait LinearOperator<T: Scalar> {
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>);
}

impl<T> LinearOperator<T> for CsrMatrix<T>
where
    T: Scalar + Zero + One + ClosedMul + ClosedAdd,
{
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) {
        spmm_csr_dense(T::zero(), &mut y, T::one(), Op::NoOp(self), Op::NoOp(&x));
    }
}

/// Diagonal (Jacobi) preconditioner `y = D^{-1} x`.
///
/// Rows without a nonzero diagonal entry are left unscaled.
#[derive(Debug, Clone)]
pub struct JacobiPreconditioner<T: Scalar> {
    inverse_diagonal: DVector<T>,
}

impl<T: Real> JacobiPreconditioner<T> {
    pub fn from_csr(matrix: &CsrMatrix<T>) -> Self {
        let inverse_diagonal = DVector::from_fn(matrix.nrows(), |i, _| {
            let row = matrix.row(i);
            row.col_indices()
                .iter()
                .zip(row.values())
                .find(|&(&j, _)| j == i)
                .map(|(_, &d)| d)
                .filter(|d| !d.is_zero())
                .map(|d| T::one() / d)
                .unwrap_or_else(T::one)
        });
        Self { inverse_diagonal }
    }
}

impl<T: Real> LinearOperator<T> for JacobiPreconditioner<T> {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) {
        for i in 0..y.len() {
            y[i] = self.inverse_diagonal[i] * x[i];
        }
    }
}

/// Euclidean norm of `b - A x`.
pub fn residual_norm<T: Real>(matrix: &CsrMatrix<T>, x: &DVector<T>, rhs: &DVector<T>) -> T {
    let mut r = rhs.clone();
    spmm_csr_dense(T::one(), &mut r, -T::one(), Op::NoOp(matrix), Op::NoOp(x));
    r.norm()
}

pub(crate) fn to_f64<T: Real>(value: T) -> f64 {
    value.to_subset().unwrap_or(f64::NAN)
}

fn check_dimensions<T: Scalar>(matrix: &CsrMatrix<T>, rhs: &DVector<T>) -> Result<(), SolveError> {
    if matrix.nrows() != matrix.ncols() || matrix.nrows() != rhs.len() {
        return Err(SolveError::DimensionMismatch {
            nrows: matrix.nrows(),
            ncols: matrix.ncols(),
            rhs: rhs.len(),
        });
    }
    Ok(())
}
