//! Error types.
//!
//! Configuration errors (element descriptions, numbering inconsistencies, space mismatches)
//! are distinct from failures of the linear-solver collaborator, and assembly errors wrap both.
use thiserror::Error;

/// Errors reported by a finite element description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ElementError {
    #[error("local index {index} is out of range for an element with {num_dofs} degrees of freedom")]
    LocalIndexOutOfRange { index: usize, num_dofs: usize },
    #[error("derivative direction {direction} is invalid on a reference cell of dimension {dim}")]
    InvalidDerivative { direction: usize, dim: usize },
}

/// Errors reported by finite element spaces and their elements.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpaceError {
    #[error(transparent)]
    Element(#[from] ElementError),
    #[error("element `{element}` declares {declared} local dofs, but its subdomain layout yields {counted}")]
    InconsistentElement {
        element: String,
        declared: usize,
        counted: usize,
    },
    #[error("cell {cell} has {actual} vertices, expected {expected}")]
    InvalidCellVertexCount { cell: usize, expected: usize, actual: usize },
    #[error("subdomain {vertices:?} of dimension {dim} is not present in the mesh catalogue")]
    MissingSubdomain { dim: usize, vertices: Vec<usize> },
    #[error("elements belong to different finite element spaces")]
    IncompatibleSpaces,
    #[error("component {index} is out of range for a composite space with {count} components")]
    InvalidComponent { index: usize, count: usize },
    #[error("dof {dof} is out of range for a space with {count} dofs")]
    DofOutOfRange { dof: usize, count: usize },
    #[error("coefficient vector has length {actual}, expected {expected}")]
    CoefficientLength { expected: usize, actual: usize },
    #[error("element `{0}` is not Lagrangian and cannot be interpolated nodally")]
    NotLagrangian(String),
    #[error("component spaces of a composite space must share the same mesh")]
    MeshMismatch,
}

/// Failures of the linear-solver collaborator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    #[error("system matrix is singular")]
    Singular,
    #[error("solver did not converge after {iterations} iterations (residual {residual:e})")]
    NotConverged { iterations: usize, residual: f64 },
    #[error("solver diverged after {iterations} iterations (residual {residual:e})")]
    Diverged { iterations: usize, residual: f64 },
    #[error("matrix of size {nrows}x{ncols} is incompatible with a right-hand side of length {rhs}")]
    DimensionMismatch { nrows: usize, ncols: usize, rhs: usize },
}

/// Errors reported by the bilinear and linear form assemblers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssemblyError {
    #[error("entry ({row}, {col}) is out of bounds for a {nrows}x{ncols} matrix")]
    OutOfBounds {
        row: usize,
        col: usize,
        nrows: usize,
        ncols: usize,
    },
    #[error("constraint {index} does not exist ({count} registered)")]
    InvalidConstraint { index: usize, count: usize },
    #[error("integration domain references cell {cell}, but the mesh has {num_cells} cells")]
    InvalidCell { cell: usize, num_cells: usize },
    #[error("quadrature table has {num_point_sets} point sets, but domain cell {cell} needs point set {set_index}")]
    MissingQuadrature {
        cell: usize,
        set_index: usize,
        num_point_sets: usize,
    },
    #[error("cell {cell} is degenerate")]
    DegenerateCell { cell: usize },
    #[error("differential order {0} is not supported")]
    UnsupportedDifferentialOrder(usize),
    #[error("right-hand side was built for a different test space")]
    IncompatibleSpaces,
    #[error(transparent)]
    Space(#[from] SpaceError),
    #[error(transparent)]
    Solve(#[from] SolveError),
}
