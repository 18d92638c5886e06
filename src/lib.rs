//! Degree-of-freedom numbering and block-sparse assembly for multi-field finite element problems.
//!
//! A [`FiniteElementSpace`](space::FiniteElementSpace) numbers the degrees of freedom of one
//! field on a simplicial mesh, a [`CompositeSpace`](composite::CompositeSpace) concatenates several
//! such fields, and the [`BilinearForm`](assembly::BilinearForm) and
//! [`LinearForm`](assembly::LinearForm) assemblers turn weak-form integrands into a block-structured
//! sparse system with Dirichlet elimination and algebraic constraint blocks.
pub mod allocators;
pub mod assembly;
pub mod composite;
pub mod connectivity;
pub mod element;
pub mod error;
pub mod mesh;
pub mod model;
pub mod projection;
pub mod quadrature;
pub mod solver;
pub mod space;
pub mod util;

#[cfg(feature = "proptest")]
pub mod proptest;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;

pub use blockfem_traits::{Real, SmallDim};
