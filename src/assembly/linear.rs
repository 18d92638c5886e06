use crate::allocators::DimAllocator;
use crate::assembly::buffers::integrate_linear;
use crate::assembly::form::LinearIntegrand;
use crate::composite::CompositeSpace;
use crate::connectivity::CellConnectivity;
use crate::error::{AssemblyError, SpaceError};
use crate::mesh::IntegrationDomain;
use crate::quadrature::QuadratureTable;
use crate::{Real, SmallDim};
use nalgebra::{DVector, DefaultAllocator};

/// Assembler of a linear form `l(v)` over a composite test space.
///
/// Values of algebraic constraint equations are kept separately from the dof vector and
/// appended to the right-hand side when the system is solved.
#[derive(Debug, Clone)]
pub struct LinearForm<'a, T, D, C>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    space: CompositeSpace<'a, T, D, C>,
    offsets: Vec<usize>,
    vector: DVector<T>,
    algebraic_values: Vec<T>,
}

impl<'a, T, D, C> LinearForm<'a, T, D, C>
where
    T: Real,
    D: SmallDim,
    C: CellConnectivity<T, D>,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn new(space: &CompositeSpace<'a, T, D, C>) -> Self {
        Self {
            space: space.clone(),
            offsets: space.dof_offsets(),
            vector: DVector::zeros(space.total_dof_count()),
            algebraic_values: Vec::new(),
        }
    }

    pub fn space(&self) -> &CompositeSpace<'a, T, D, C> {
        &self.space
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn vector(&self) -> &DVector<T> {
        &self.vector
    }

    /// Zeroes the vector and removes all constraint values.
    pub fn clear(&mut self) {
        self.vector.fill(T::zero());
        self.algebraic_values.clear();
    }

    /// Assembles `∫ l(v)` over the cells of `domain` for every test function `v`.
    pub fn add_integral<I, Dom, Q>(&mut self, integrand: &mut I, domain: &Dom, qtable: &Q) -> Result<(), AssemblyError>
    where
        I: ?Sized + LinearIntegrand<T, D>,
        Dom: ?Sized + IntegrationDomain<C>,
        Q: ?Sized + QuadratureTable<T, D>,
    {
        let space = &self.space;
        let offsets = &self.offsets;
        let vector = &mut self.vector;
        integrate_linear(space, integrand, domain, qtable, |m, cell, i, value| {
            vector[offsets[m] + space.dof(m, cell, i)] += value;
            Ok(())
        })
    }

    pub fn accumulate(&mut self, row: usize, value: T) -> Result<(), AssemblyError> {
        let len = self.vector.len();
        let entry = self.vector.get_mut(row).ok_or(AssemblyError::OutOfBounds {
            row,
            col: 0,
            nrows: len,
            ncols: 1,
        })?;
        *entry += value;
        Ok(())
    }

    /// Adds `value` at dof `dof` of component `n`.
    pub fn accumulate_in_component(&mut self, n: usize, dof: usize, value: T) -> Result<(), AssemblyError> {
        let space = self.space.try_component(n)?;
        if dof >= space.dof_count() {
            return Err(SpaceError::DofOutOfRange {
                dof,
                count: space.dof_count(),
            }
            .into());
        }
        self.vector[self.offsets[n] + dof] += value;
        Ok(())
    }

    /// Sets the right-hand side of constraint equation `index`.
    ///
    /// Equations without an explicit value have a zero right-hand side.
    pub fn set_algebraic_equation_value(&mut self, index: usize, value: T) {
        if index >= self.algebraic_values.len() {
            self.algebraic_values.resize(index + 1, T::zero());
        }
        self.algebraic_values[index] = value;
    }

    pub fn algebraic_equation_values(&self) -> &[T] {
        &self.algebraic_values
    }
}
