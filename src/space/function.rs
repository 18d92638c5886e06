use crate::allocators::DimAllocator;
use crate::connectivity::CellConnectivity;
use crate::error::SpaceError;
use crate::mesh::SubMesh;
use crate::quadrature::QuadratureTable;
use crate::space::FiniteElementSpace;
use crate::{Real, SmallDim};
use nalgebra::{DVector, DefaultAllocator, OPoint};
use std::ptr;

/// A function in a single-field finite element space, given by its dof coefficients.
#[derive(Debug, Clone)]
pub struct DiscreteFunction<'a, T, D, C>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    space: &'a FiniteElementSpace<'a, T, D, C>,
    coefficients: DVector<T>,
}

impl<'a, T, D, C> DiscreteFunction<'a, T, D, C>
where
    T: Real,
    D: SmallDim,
    C: CellConnectivity<T, D>,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn zeros(space: &'a FiniteElementSpace<'a, T, D, C>) -> Self {
        Self {
            space,
            coefficients: DVector::zeros(space.dof_count()),
        }
    }

    pub fn from_coefficients(
        space: &'a FiniteElementSpace<'a, T, D, C>,
        coefficients: DVector<T>,
    ) -> Result<Self, SpaceError> {
        if coefficients.len() != space.dof_count() {
            return Err(SpaceError::CoefficientLength {
                expected: space.dof_count(),
                actual: coefficients.len(),
            });
        }
        Ok(Self { space, coefficients })
    }

    /// Nodal interpolation of `f` into a Lagrangian space.
    pub fn interpolate(
        space: &'a FiniteElementSpace<'a, T, D, C>,
        f: impl Fn(&OPoint<T, D>) -> T,
    ) -> Result<Self, SpaceError> {
        if !space.element().is_lagrangian() {
            return Err(SpaceError::NotLagrangian(space.element().name().to_string()));
        }
        let mut function = Self::zeros(space);
        for dof in 0..space.dof_count() {
            function.coefficients[dof] = f(&space.dof_coordinates(dof)?);
        }
        Ok(function)
    }

    pub fn space(&self) -> &'a FiniteElementSpace<'a, T, D, C> {
        self.space
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

    /// Copies the coefficients of another function over the same space.
    pub fn assign_from(&mut self, other: &DiscreteFunction<'_, T, D, C>) -> Result<(), SpaceError> {
        if !ptr::eq(self.space, other.space) {
            return Err(SpaceError::IncompatibleSpaces);
        }
        self.coefficients.copy_from(&other.coefficients);
        Ok(())
    }

    /// Evaluates the function at reference coordinates of the given cell.
    pub fn evaluate(&self, cell_index: usize, reference_coords: &OPoint<T, D>) -> T {
        let element = self.space.element();
        let mut basis = vec![T::zero(); element.num_dofs()];
        element.populate_basis(&mut basis, reference_coords);
        self.space
            .cell_dofs(cell_index)
            .iter()
            .zip(&basis)
            .fold(T::zero(), |acc, (&dof, &phi)| acc + self.coefficients[dof] * phi)
    }

    /// Integrates the function over the mesh of its space.
    ///
    /// # Panics
    ///
    /// Panics if the quadrature table has no point set for a cell of the mesh.
    pub fn integrate(&self, qtable: &impl QuadratureTable<T, D>) -> T {
        let mesh = self.space.mesh();
        let mut integral = T::zero();
        for cell_index in 0..mesh.num_cells() {
            let (weights, points) = qtable.cell_quadrature(cell_index);
            let cell_integral = weights
                .iter()
                .zip(points)
                .fold(T::zero(), |acc, (&w, xi)| acc + w * self.evaluate(cell_index, xi));
            integral += mesh.cell_volume(cell_index) * cell_integral;
        }
        integral
    }

    /// Restricts the function to a space built on the mesh of the given sub-mesh.
    ///
    /// Cell `k` of `sub_space` must be sub-cell `k` of `submesh`, as produced by
    /// [`SubMesh::to_mesh`], and both spaces must use elements with the same local layout.
    pub fn restrict_to<'b>(
        &self,
        sub_space: &'b FiniteElementSpace<'b, T, D, C>,
        submesh: &SubMesh<C>,
    ) -> Result<DiscreteFunction<'b, T, D, C>, SpaceError> {
        check_submesh_space(self.space, sub_space, submesh)?;
        let mut restricted = DiscreteFunction::zeros(sub_space);
        for (sub_cell, &parent_cell) in submesh.parent_cells().iter().enumerate() {
            for (&sub_dof, &dof) in sub_space
                .cell_dofs(sub_cell)
                .iter()
                .zip(self.space.cell_dofs(parent_cell))
            {
                restricted.coefficients[sub_dof] = self.coefficients[dof];
            }
        }
        Ok(restricted)
    }

    /// Extends a function on a sub-mesh space to the full space, with zero coefficients on
    /// dofs outside the sub-mesh.
    pub fn extend_to<'b>(
        &self,
        full_space: &'b FiniteElementSpace<'b, T, D, C>,
        submesh: &SubMesh<C>,
    ) -> Result<DiscreteFunction<'b, T, D, C>, SpaceError> {
        check_submesh_space(full_space, self.space, submesh)?;
        let mut extended = DiscreteFunction::zeros(full_space);
        for (sub_cell, &parent_cell) in submesh.parent_cells().iter().enumerate() {
            for (&sub_dof, &dof) in self
                .space
                .cell_dofs(sub_cell)
                .iter()
                .zip(full_space.cell_dofs(parent_cell))
            {
                extended.coefficients[dof] = self.coefficients[sub_dof];
            }
        }
        Ok(extended)
    }
}

fn check_submesh_space<T, D, C>(
    full_space: &FiniteElementSpace<'_, T, D, C>,
    sub_space: &FiniteElementSpace<'_, T, D, C>,
    submesh: &SubMesh<C>,
) -> Result<(), SpaceError>
where
    T: Real,
    D: SmallDim,
    C: CellConnectivity<T, D>,
    DefaultAllocator: DimAllocator<T, D>,
{
    let parents_in_range = submesh
        .parent_cells()
        .iter()
        .all(|&cell| cell < full_space.num_cells());
    if sub_space.num_cells() != submesh.num_cells()
        || sub_space.dofs_per_cell() != full_space.dofs_per_cell()
        || !parents_in_range
    {
        return Err(SpaceError::IncompatibleSpaces);
    }
    Ok(())
}
