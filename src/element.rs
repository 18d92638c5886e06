//! Finite element descriptions on reference simplices.
//!
//! A finite element describes the local degrees of freedom of a cell: how many are attached
//! to each subdomain dimension (vertices, edges, ..., the cell interior), where their
//! reference nodes are, and how to evaluate the associated basis functions.
use crate::allocators::DimAllocator;
use crate::connectivity::{simplex_subdomain_count, simplex_subdomains};
use crate::error::ElementError;
use crate::{Real, SmallDim};
use nalgebra::{DefaultAllocator, OPoint, OVector};
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A finite element on the reference simplex of dimension `D`.
///
/// The local dof layout is ordered by subdomain dimension (vertices first, the cell interior
/// last). Within a dimension, sub-simplices follow the local lexicographic order of
/// [`simplex_subdomains`], and the dofs of one sub-simplex are consecutive.
pub trait FiniteElement<T, D>: Debug + Send + Sync
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn name(&self) -> &str;

    fn num_dofs(&self) -> usize;

    /// Number of dofs attached to each sub-simplex of dimension `dim`.
    fn dofs_per_subdomain(&self, dim: usize) -> usize;

    fn is_continuous(&self) -> bool;

    /// Whether the dofs are point values at the reference nodes.
    fn is_lagrangian(&self) -> bool;

    fn reference_node(&self, local_index: usize) -> Result<OPoint<T, D>, ElementError>;

    /// Evaluates all basis functions at the given reference coordinates.
    ///
    /// # Panics
    ///
    /// Panics if the buffer length is not equal to the number of dofs.
    fn populate_basis(&self, basis_values: &mut [T], reference_coords: &OPoint<T, D>);

    /// Evaluates the reference gradients of all basis functions.
    ///
    /// # Panics
    ///
    /// Panics if the buffer length is not equal to the number of dofs.
    fn populate_basis_gradients(&self, basis_gradients: &mut [OVector<T, D>], reference_coords: &OPoint<T, D>);

    fn basis(&self, local_index: usize, reference_coords: &OPoint<T, D>) -> Result<T, ElementError> {
        self.check_local_index(local_index)?;
        let mut values = vec![T::zero(); self.num_dofs()];
        self.populate_basis(&mut values, reference_coords);
        Ok(values[local_index])
    }

    /// Partial derivative of a basis function in the reference direction `direction`.
    fn basis_derivative(
        &self,
        direction: usize,
        local_index: usize,
        reference_coords: &OPoint<T, D>,
    ) -> Result<T, ElementError> {
        if direction >= D::dim() {
            return Err(ElementError::InvalidDerivative {
                direction,
                dim: D::dim(),
            });
        }
        self.check_local_index(local_index)?;
        let mut gradients = vec![OVector::<T, D>::zeros(); self.num_dofs()];
        self.populate_basis_gradients(&mut gradients, reference_coords);
        Ok(gradients[local_index][direction])
    }

    fn check_local_index(&self, local_index: usize) -> Result<(), ElementError> {
        if local_index < self.num_dofs() {
            Ok(())
        } else {
            Err(ElementError::LocalIndexOutOfRange {
                index: local_index,
                num_dofs: self.num_dofs(),
            })
        }
    }
}

/// Lagrange-type elements on simplices of any dimension.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lagrange {
    /// Piecewise constant, one dof in the cell interior.
    P0,
    /// Piecewise linear, one dof per vertex.
    P1,
    /// Piecewise linear enriched with the cell bubble `∏ λ_k`, scaled to one at the centroid.
    P1Bubble,
    /// Piecewise quadratic, one dof per vertex and one per edge.
    P2,
}

/// Geometric location of a local dof.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum LocalNode {
    Vertex(usize),
    Edge(usize, usize),
    Interior,
}

impl Lagrange {
    fn dofs_per_subdomain_in(&self, cell_dim: usize, dim: usize) -> usize {
        let attached = match self {
            Lagrange::P0 => dim == cell_dim,
            Lagrange::P1 => dim == 0,
            Lagrange::P1Bubble => dim == 0 || dim == cell_dim,
            Lagrange::P2 => dim <= 1,
        };
        usize::from(attached && dim <= cell_dim)
    }

    fn num_dofs_in(&self, cell_dim: usize) -> usize {
        (0..=cell_dim)
            .map(|dim| self.dofs_per_subdomain_in(cell_dim, dim) * simplex_subdomain_count(cell_dim + 1, dim))
            .sum()
    }

    fn layout(&self, cell_dim: usize) -> Vec<LocalNode> {
        let mut nodes = Vec::with_capacity(self.num_dofs_in(cell_dim));
        for dim in 0..=cell_dim {
            let m = self.dofs_per_subdomain_in(cell_dim, dim);
            for local in simplex_subdomains(cell_dim + 1, dim) {
                for _ in 0..m {
                    nodes.push(match (self, dim) {
                        (_, 0) => LocalNode::Vertex(local[0]),
                        (Lagrange::P2, 1) => LocalNode::Edge(local[0], local[1]),
                        _ => LocalNode::Interior,
                    });
                }
            }
        }
        nodes
    }
}

/// Barycentric coordinates `λ_0 = 1 - Σ ξ_i`, `λ_{i+1} = ξ_i`.
fn barycentric<T, D>(xi: &OPoint<T, D>) -> Vec<T>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    let mut lambda = Vec::with_capacity(D::dim() + 1);
    lambda.push(T::one() - xi.coords.sum());
    lambda.extend(xi.coords.iter().copied());
    lambda
}

fn barycentric_gradient<T, D>(index: usize) -> OVector<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    if index == 0 {
        OVector::<T, D>::repeat(-T::one())
    } else {
        let mut e = OVector::<T, D>::zeros();
        e[index - 1] = T::one();
        e
    }
}

/// Scale of the bubble function so that it equals one at the centroid.
fn bubble_scale<T: Real>(cell_dim: usize) -> T {
    let n = T::from_subset(&((cell_dim + 1) as f64));
    (0..=cell_dim).fold(T::one(), |acc, _| acc * n)
}

impl<T, D> FiniteElement<T, D> for Lagrange
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn name(&self) -> &str {
        match self {
            Lagrange::P0 => "P0",
            Lagrange::P1 => "P1",
            Lagrange::P1Bubble => "P1-bubble",
            Lagrange::P2 => "P2",
        }
    }

    fn num_dofs(&self) -> usize {
        self.num_dofs_in(D::dim())
    }

    fn dofs_per_subdomain(&self, dim: usize) -> usize {
        self.dofs_per_subdomain_in(D::dim(), dim)
    }

    fn is_continuous(&self) -> bool {
        !matches!(self, Lagrange::P0)
    }

    fn is_lagrangian(&self) -> bool {
        !matches!(self, Lagrange::P1Bubble)
    }

    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn reference_node(&self, local_index: usize) -> Result<OPoint<T, D>, ElementError> {
        <Self as FiniteElement<T, D>>::check_local_index(self, local_index)?;
        let vertex = |i: usize| {
            let mut p = OPoint::<T, D>::origin();
            if i > 0 {
                p[i - 1] = 1.0;
            }
            p
        };
        let node = match self.layout(D::dim())[local_index] {
            LocalNode::Vertex(i) => vertex(i),
            LocalNode::Edge(i, j) => OPoint::from((vertex(i).coords + vertex(j).coords) * 0.5),
            LocalNode::Interior => {
                let c = T::one() / T::from_subset(&((D::dim() + 1) as f64));
                OPoint::from(OVector::<T, D>::repeat(c))
            }
        };
        Ok(node)
    }

    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn populate_basis(&self, basis_values: &mut [T], reference_coords: &OPoint<T, D>) {
        let layout = self.layout(D::dim());
        assert_eq!(basis_values.len(), layout.len(), "Basis buffer must have one entry per dof.");
        let lambda = barycentric(reference_coords);

        for (value, node) in basis_values.iter_mut().zip(&layout) {
            *value = match (self, *node) {
                (Lagrange::P2, LocalNode::Vertex(i)) => lambda[i] * (2.0 * lambda[i] - 1.0),
                (_, LocalNode::Vertex(i)) => lambda[i],
                (_, LocalNode::Edge(i, j)) => 4.0 * lambda[i] * lambda[j],
                (Lagrange::P1Bubble, LocalNode::Interior) => {
                    bubble_scale::<T>(D::dim()) * lambda.iter().fold(T::one(), |acc, &l| acc * l)
                }
                (_, LocalNode::Interior) => 1.0,
            };
        }
    }

    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn populate_basis_gradients(&self, basis_gradients: &mut [OVector<T, D>], reference_coords: &OPoint<T, D>) {
        let layout = self.layout(D::dim());
        assert_eq!(
            basis_gradients.len(),
            layout.len(),
            "Gradient buffer must have one entry per dof."
        );
        let lambda = barycentric(reference_coords);
        let grad_lambda = |i: usize| barycentric_gradient::<T, D>(i);

        for (gradient, node) in basis_gradients.iter_mut().zip(&layout) {
            *gradient = match (self, *node) {
                (Lagrange::P2, LocalNode::Vertex(i)) => grad_lambda(i) * (4.0 * lambda[i] - 1.0),
                (_, LocalNode::Vertex(i)) => grad_lambda(i),
                (_, LocalNode::Edge(i, j)) => (grad_lambda(i) * lambda[j] + grad_lambda(j) * lambda[i]) * 4.0,
                (Lagrange::P1Bubble, LocalNode::Interior) => {
                    let mut g = OVector::<T, D>::zeros();
                    for k in 0..lambda.len() {
                        let others = lambda
                            .iter()
                            .enumerate()
                            .filter(|&(l, _)| l != k)
                            .fold(T::one(), |acc, (_, &value)| acc * value);
                        g += grad_lambda(k) * others;
                    }
                    g * bubble_scale::<T>(D::dim())
                }
                (_, LocalNode::Interior) => OVector::<T, D>::zeros(),
            };
        }
    }
}
