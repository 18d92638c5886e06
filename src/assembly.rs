//! Block-sparse assembly of bilinear and linear forms over composite spaces.
//!
//! The rows of an assembled system are the concatenated dof ranges of the test space's
//! components followed by one row per algebraic constraint, and the columns are the trial
//! space's ranges followed by one column per constraint.
//!
//! Integrands are evaluated one block at a time: when assembling the coupling between test
//! component `m` and trial component `n`, every shape slot except `m` (test) and `n` (trial)
//! is zero, so an integrand written as a sum over components only contributes the terms of
//! the current block.
mod bilinear;
mod block_matrix;
mod buffers;
mod form;
pub mod integrands;
mod linear;

pub use bilinear::{BilinearForm, ConstraintHandle, FormState, Solution};
pub use block_matrix::BlockMatrix;
pub use form::{
    bilinear_fn, linear_fn, BilinearFn, BilinearIntegrand, FormRequirements, LinearFn, LinearIntegrand,
    QuadraturePoint, ShapeValue,
};
pub use linear::LinearForm;
