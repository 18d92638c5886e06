//! Composite (multi-field) finite element spaces and functions.
//!
//! A [`CompositeSpace`] is an ordered, fixed-size collection of single-field spaces over one
//! mesh. Component numberings are not merged: composite dof `offset_n + d` is dof `d` of
//! component `n`, where the offsets are the prefix sums of the component dof counts. The
//! composite space does not store these offsets; consumers compute them with
//! [`CompositeSpace::dof_offsets`] when they need them.
use crate::allocators::DimAllocator;
use crate::connectivity::{CellConnectivity, Connectivity};
use crate::error::SpaceError;
use crate::mesh::Mesh;
use crate::space::{DiscreteFunction, FiniteElementSpace};
use crate::util::prefix_sum;
use crate::{Real, SmallDim};
use nalgebra::{DVector, DefaultAllocator, OPoint};
use std::cell::Ref;
use std::collections::BTreeSet;
use std::ptr;

#[derive(Debug)]
pub struct CompositeSpace<'a, T, D, C>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    components: Vec<&'a FiniteElementSpace<'a, T, D, C>>,
}

impl<'a, T, D, C> Clone for CompositeSpace<'a, T, D, C>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn clone(&self) -> Self {
        Self {
            components: self.components.clone(),
        }
    }
}

impl<'a, T, D, C> CompositeSpace<'a, T, D, C>
where
    T: Real,
    D: SmallDim,
    C: Connectivity,
    DefaultAllocator: DimAllocator<T, D>,
{
    /// Combines the given spaces, which must all be defined on the same mesh.
    pub fn new(components: Vec<&'a FiniteElementSpace<'a, T, D, C>>) -> Result<Self, SpaceError> {
        if let Some((first, rest)) = components.split_first() {
            if rest.iter().any(|space| !ptr::eq(space.mesh(), first.mesh())) {
                return Err(SpaceError::MeshMismatch);
            }
        }
        Ok(Self { components })
    }

    pub fn single(space: &'a FiniteElementSpace<'a, T, D, C>) -> Self {
        Self {
            components: vec![space],
        }
    }

    pub fn num_components(&self) -> usize {
        self.components.len()
    }

    /// # Panics
    ///
    /// Panics if the component index is out of range.
    pub fn component(&self, n: usize) -> &'a FiniteElementSpace<'a, T, D, C> {
        self.components[n]
    }

    pub fn try_component(&self, n: usize) -> Result<&'a FiniteElementSpace<'a, T, D, C>, SpaceError> {
        self.components
            .get(n)
            .copied()
            .ok_or(SpaceError::InvalidComponent {
                index: n,
                count: self.components.len(),
            })
    }

    pub fn components(&self) -> &[&'a FiniteElementSpace<'a, T, D, C>] {
        &self.components
    }

    /// The mesh shared by all components, if there is at least one component.
    pub fn mesh(&self) -> Option<&'a Mesh<T, D, C>> {
        self.components.first().map(|space| space.mesh())
    }

    pub fn total_dof_count(&self) -> usize {
        self.components.iter().map(|space| space.dof_count()).sum()
    }

    pub fn dof_count(&self, n: usize) -> usize {
        self.component(n).dof_count()
    }

    /// The component-local global dof of local dof `i` of cell `k` in component `n`.
    pub fn dof(&self, n: usize, cell_index: usize, local_index: usize) -> usize {
        self.component(n).dof(cell_index, local_index)
    }

    pub fn dirichlet_dofs(&self, n: usize) -> Ref<'a, BTreeSet<usize>> {
        self.component(n).dirichlet_dofs()
    }

    pub fn boundary_value(&self, n: usize, x: &OPoint<T, D>) -> T {
        self.component(n).boundary_value(x)
    }

    pub fn dof_counts(&self) -> Vec<usize> {
        self.components.iter().map(|space| space.dof_count()).collect()
    }

    /// Start of each component's range in the composite numbering.
    pub fn dof_offsets(&self) -> Vec<usize> {
        prefix_sum(self.components.iter().map(|space| space.dof_count()))
    }

    /// Whether both composites consist of the same component spaces in the same order.
    pub fn same_as(&self, other: &CompositeSpace<'_, T, D, C>) -> bool {
        self.components.len() == other.components.len()
            && self
                .components
                .iter()
                .zip(&other.components)
                .all(|(a, b)| ptr::eq(*a, *b))
    }
}

impl<'a, T, D, C> CompositeSpace<'a, T, D, C>
where
    T: Real,
    D: SmallDim,
    C: CellConnectivity<T, D>,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn dof_coordinates(&self, n: usize, dof: usize) -> Result<OPoint<T, D>, SpaceError> {
        self.try_component(n)?.dof_coordinates(dof)
    }
}

/// A function in a composite space, stored as one coefficient vector over the composite
/// numbering.
#[derive(Debug, Clone)]
pub struct CompositeFunction<'a, T, D, C>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    space: CompositeSpace<'a, T, D, C>,
    sizes: Vec<usize>,
    offsets: Vec<usize>,
    coefficients: DVector<T>,
}

impl<'a, T, D, C> CompositeFunction<'a, T, D, C>
where
    T: Real,
    D: SmallDim,
    C: CellConnectivity<T, D>,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn zeros(space: &CompositeSpace<'a, T, D, C>) -> Self {
        let sizes = space.dof_counts();
        let offsets = prefix_sum(sizes.iter().copied());
        let coefficients = DVector::zeros(space.total_dof_count());
        Self {
            space: space.clone(),
            sizes,
            offsets,
            coefficients,
        }
    }

    pub fn from_coefficients(space: &CompositeSpace<'a, T, D, C>, coefficients: DVector<T>) -> Result<Self, SpaceError> {
        let expected = space.total_dof_count();
        if coefficients.len() != expected {
            return Err(SpaceError::CoefficientLength {
                expected,
                actual: coefficients.len(),
            });
        }
        let mut function = Self::zeros(space);
        function.coefficients = coefficients;
        Ok(function)
    }

    /// Embeds one function per component, in component order.
    pub fn from_components(
        space: &CompositeSpace<'a, T, D, C>,
        components: &[DiscreteFunction<'_, T, D, C>],
    ) -> Result<Self, SpaceError> {
        if components.len() != space.num_components() {
            return Err(SpaceError::IncompatibleSpaces);
        }
        let mut function = Self::zeros(space);
        for (n, component) in components.iter().enumerate() {
            function.set_component(n, component)?;
        }
        Ok(function)
    }

    pub fn space(&self) -> &CompositeSpace<'a, T, D, C> {
        &self.space
    }

    pub fn num_components(&self) -> usize {
        self.sizes.len()
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn coefficients(&self) -> &DVector<T> {
        &self.coefficients
    }

    pub fn coefficients_mut(&mut self) -> &mut DVector<T> {
        &mut self.coefficients
    }

    pub fn into_coefficients(self) -> DVector<T> {
        self.coefficients
    }

    /// Copies the coefficients of component `n` into a function over that component's space.
    pub fn component(&self, n: usize) -> Result<DiscreteFunction<'a, T, D, C>, SpaceError> {
        let space = self.space.try_component(n)?;
        let range = self.coefficients.rows(self.offsets[n], self.sizes[n]).into_owned();
        DiscreteFunction::from_coefficients(space, range)
    }

    /// Overwrites the coefficients of component `n`.
    pub fn set_component(&mut self, n: usize, function: &DiscreteFunction<'_, T, D, C>) -> Result<(), SpaceError> {
        let space = self.space.try_component(n)?;
        if !ptr::eq(space, function.space()) {
            return Err(SpaceError::IncompatibleSpaces);
        }
        self.coefficients
            .rows_mut(self.offsets[n], self.sizes[n])
            .copy_from(function.coefficients());
        Ok(())
    }

    pub fn assign_from(&mut self, other: &CompositeFunction<'_, T, D, C>) -> Result<(), SpaceError> {
        if !self.space.same_as(&other.space) {
            return Err(SpaceError::IncompatibleSpaces);
        }
        self.coefficients.copy_from(&other.coefficients);
        Ok(())
    }
}
