use crate::allocators::DimAllocator;
use crate::assembly::block_matrix::BlockMatrix;
use crate::assembly::buffers::{
    cell_point_set, check_requirements, integrate_linear, quadrature_point, resolve_cell, BasisBuffer, CellGeometry,
};
use crate::assembly::form::{BilinearIntegrand, LinearIntegrand, ShapeValue};
use crate::assembly::linear::LinearForm;
use crate::composite::{CompositeFunction, CompositeSpace};
use crate::connectivity::CellConnectivity;
use crate::error::{AssemblyError, SolveError, SpaceError};
use crate::mesh::IntegrationDomain;
use crate::quadrature::QuadratureTable;
use crate::solver::{LinearSolver, SolverReport};
use crate::{Real, SmallDim};
use log::debug;
use nalgebra::{DMatrix, DVector, DefaultAllocator};
use nalgebra_sparse::CsrMatrix;

/// Lifecycle of a [`BilinearForm`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FormState {
    Constructed,
    Cleared,
    Accumulating,
    Solved,
}

/// Identifies an algebraic constraint: one extra row and one extra column of the system.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintHandle {
    index: usize,
    row: usize,
    col: usize,
}

impl ConstraintHandle {
    /// Position of the constraint among the registered constraints.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Global row of the constraint equation.
    pub fn row(&self) -> usize {
        self.row
    }

    /// Global column of the constraint multiplier.
    pub fn col(&self) -> usize {
        self.col
    }
}

/// Result of [`BilinearForm::solve`].
#[derive(Debug, Clone)]
pub struct Solution<'a, T, D, C>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    /// The solution over the trial space, without the constraint multipliers.
    pub function: CompositeFunction<'a, T, D, C>,
    /// One multiplier per algebraic constraint.
    pub multipliers: DVector<T>,
    pub report: SolverReport,
}

/// Assembler of a bilinear form `a(u, v)` over composite trial and test spaces.
///
/// Rows are indexed by composite test dofs followed by constraint equations, columns by
/// composite trial dofs followed by constraint multipliers. The Dirichlet dofs of the test
/// space are eliminated: [`clear`](Self::clear) installs a unit diagonal entry for each of
/// them, and any later contribution to such a row is discarded. The Dirichlet sets are
/// looked up at every accumulation, so they may change between calls to `clear`.
#[derive(Debug)]
pub struct BilinearForm<'a, T, D, C>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    test: CompositeSpace<'a, T, D, C>,
    trial: CompositeSpace<'a, T, D, C>,
    test_offsets: Vec<usize>,
    trial_offsets: Vec<usize>,
    test_dof_count: usize,
    trial_dof_count: usize,
    num_constraints: usize,
    matrix: BlockMatrix<T>,
    state: FormState,
}

impl<'a, T, D, C> BilinearForm<'a, T, D, C>
where
    T: Real,
    D: SmallDim,
    C: CellConnectivity<T, D>,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn new(test: &CompositeSpace<'a, T, D, C>, trial: &CompositeSpace<'a, T, D, C>) -> Self {
        Self::with_constraints(test, trial, 0)
    }

    /// Constructs a form with `num_constraints` algebraic constraints already registered.
    pub fn with_constraints(
        test: &CompositeSpace<'a, T, D, C>,
        trial: &CompositeSpace<'a, T, D, C>,
        num_constraints: usize,
    ) -> Self {
        let test_dof_count = test.total_dof_count();
        let trial_dof_count = trial.total_dof_count();
        Self {
            test: test.clone(),
            trial: trial.clone(),
            test_offsets: test.dof_offsets(),
            trial_offsets: trial.dof_offsets(),
            test_dof_count,
            trial_dof_count,
            num_constraints,
            matrix: BlockMatrix::new(test_dof_count + num_constraints, trial_dof_count + num_constraints),
            state: FormState::Constructed,
        }
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    pub fn test_space(&self) -> &CompositeSpace<'a, T, D, C> {
        &self.test
    }

    pub fn trial_space(&self) -> &CompositeSpace<'a, T, D, C> {
        &self.trial
    }

    pub fn test_offsets(&self) -> &[usize] {
        &self.test_offsets
    }

    pub fn trial_offsets(&self) -> &[usize] {
        &self.trial_offsets
    }

    pub fn num_constraints(&self) -> usize {
        self.num_constraints
    }

    pub fn matrix(&self) -> &BlockMatrix<T> {
        &self.matrix
    }

    pub fn to_csr(&self) -> CsrMatrix<T> {
        self.matrix.to_csr()
    }

    pub fn to_dense(&self) -> DMatrix<T> {
        self.matrix.to_dense()
    }

    /// Empties the matrix and installs the Dirichlet identity rows.
    ///
    /// The unit entry of Dirichlet dof `i` of test component `m` is placed in the column of
    /// dof `i` of trial component `m` when both components are the same space. Otherwise it
    /// is placed on the diagonal of the global matrix, which assumes a square system.
    ///
    /// Constraint blocks are removed as well, while the registered constraints remain.
    pub fn clear(&mut self) -> Result<(), AssemblyError> {
        self.matrix.clear();
        for (m, &offset) in self.test_offsets.iter().enumerate() {
            let test_space = self.test.component(m);
            let trial_offset = match self.trial.try_component(m) {
                Ok(trial_space) if std::ptr::eq(test_space, trial_space) => self.trial_offsets[m],
                _ => offset,
            };
            for &dof in test_space.dirichlet_dofs().iter() {
                self.matrix.set(offset + dof, trial_offset + dof, T::one())?;
            }
        }
        debug!(
            "Cleared bilinear form ({}x{}, {} Dirichlet rows)",
            self.matrix.nrows(),
            self.matrix.ncols(),
            self.matrix.nnz()
        );
        self.state = FormState::Cleared;
        Ok(())
    }

    /// Registers a new algebraic constraint, growing the system by one row and one column.
    pub fn add_constraint(&mut self) -> ConstraintHandle {
        let handle = ConstraintHandle {
            index: self.num_constraints,
            row: self.test_dof_count + self.num_constraints,
            col: self.trial_dof_count + self.num_constraints,
        };
        self.num_constraints += 1;
        self.matrix.resize(
            self.test_dof_count + self.num_constraints,
            self.trial_dof_count + self.num_constraints,
        );
        debug!("Registered algebraic constraint {}", handle.index);
        handle
    }

    /// The handle of an already registered constraint.
    pub fn constraint(&self, index: usize) -> Result<ConstraintHandle, AssemblyError> {
        self.check_constraint(index)?;
        Ok(ConstraintHandle {
            index,
            row: self.test_dof_count + index,
            col: self.trial_dof_count + index,
        })
    }

    /// Adds `value` at a global position, unless the row belongs to a Dirichlet test dof.
    pub fn accumulate(&mut self, row: usize, col: usize, value: T) -> Result<(), AssemblyError> {
        if row < self.test_dof_count {
            let m = component_of(&self.test_offsets, row);
            if self.test.component(m).is_dirichlet(row - self.test_offsets[m]) {
                return Ok(());
            }
        }
        self.matrix.accumulate(row, col, value)?;
        self.state = FormState::Accumulating;
        Ok(())
    }

    /// Adds `value` at test dof `i` of component `m` and trial dof `j` of component `n`.
    ///
    /// Contributions to Dirichlet rows are discarded.
    pub fn accumulate_in_block(&mut self, m: usize, n: usize, i: usize, j: usize, value: T) -> Result<(), AssemblyError> {
        let test_space = self.test.try_component(m)?;
        let trial_space = self.trial.try_component(n)?;
        for (dof, space) in [(i, test_space), (j, trial_space)] {
            if dof >= space.dof_count() {
                return Err(SpaceError::DofOutOfRange {
                    dof,
                    count: space.dof_count(),
                }
                .into());
            }
        }
        if test_space.is_dirichlet(i) {
            return Ok(());
        }
        self.matrix
            .accumulate(self.test_offsets[m] + i, self.trial_offsets[n] + j, value)?;
        self.state = FormState::Accumulating;
        Ok(())
    }

    /// Assembles `∫ a(u, v)` over the cells of `domain` for all pairs of test and trial components.
    ///
    /// The quadrature table is indexed by the cells of the domain.
    pub fn add_integral<I, Dom, Q>(&mut self, integrand: &mut I, domain: &Dom, qtable: &Q) -> Result<(), AssemblyError>
    where
        I: ?Sized + BilinearIntegrand<T, D>,
        Dom: ?Sized + IntegrationDomain<C>,
        Q: ?Sized + QuadratureTable<T, D>,
    {
        let requirements = integrand.requirements();
        check_requirements(&requirements)?;
        let mesh = match (self.test.mesh(), self.trial.mesh()) {
            (Some(test_mesh), Some(trial_mesh)) if !std::ptr::eq(test_mesh, trial_mesh) => {
                return Err(AssemblyError::IncompatibleSpaces)
            }
            (Some(mesh), _) | (None, Some(mesh)) => mesh,
            (None, None) => return Ok(()),
        };
        let dirichlet_rows = self.test_dirichlet_rows();

        let mut test_basis = BasisBuffer::for_space(&self.test);
        let mut trial_basis = BasisBuffer::for_space(&self.trial);
        let num_test = test_basis.num_components();
        let num_trial = trial_basis.num_components();
        let mut test_slots = vec![ShapeValue::zero(); num_test];
        let mut trial_slots = vec![ShapeValue::zero(); num_trial];
        let mut local_blocks: Vec<DMatrix<T>> = (0..num_test)
            .flat_map(|m| (0..num_trial).map(move |n| (m, n)))
            .map(|(m, n)| DMatrix::zeros(test_basis.num_dofs(m), trial_basis.num_dofs(n)))
            .collect();

        for local_cell in 0..domain.num_cells() {
            let cell = resolve_cell(domain, local_cell, mesh.num_cells())?;
            let set_index = cell_point_set::<T, D, _>(qtable, local_cell)?;
            let (weights, points) = qtable.point_set(set_index);
            let geometry = CellGeometry::compute(mesh, cell, &requirements)?;
            let j_inv_t = geometry.inverse_jacobian_transpose.as_ref();
            test_basis.prepare_cell(&self.test, set_index, points, j_inv_t);
            trial_basis.prepare_cell(&self.trial, set_index, points, j_inv_t);

            local_blocks.iter_mut().for_each(|block| block.fill(T::zero()));
            for (q, (&weight, xi)) in weights.iter().zip(points).enumerate() {
                let point = quadrature_point(mesh, cell, xi, weight, &requirements);
                integrand.prepare(&point);
                let scale = geometry.volume * weight;
                for m in 0..num_test {
                    for i in 0..test_basis.num_dofs(m) {
                        test_slots[m] = test_basis.shape(m, q, i);
                        for n in 0..num_trial {
                            let block = &mut local_blocks[m * num_trial + n];
                            for j in 0..trial_basis.num_dofs(n) {
                                trial_slots[n] = trial_basis.shape(n, q, j);
                                block[(i, j)] += scale * integrand.evaluate(&point, &test_slots, &trial_slots);
                            }
                            trial_slots[n] = ShapeValue::zero();
                        }
                    }
                    test_slots[m] = ShapeValue::zero();
                }
            }

            for m in 0..num_test {
                let test_space = self.test.component(m);
                for n in 0..num_trial {
                    let trial_space = self.trial.component(n);
                    let block = &local_blocks[m * num_trial + n];
                    for (i, &test_dof) in test_space.cell_dofs(cell).iter().enumerate() {
                        if dirichlet_rows[m][test_dof] {
                            continue;
                        }
                        let row = self.test_offsets[m] + test_dof;
                        for (j, &trial_dof) in trial_space.cell_dofs(cell).iter().enumerate() {
                            let col = self.trial_offsets[n] + trial_dof;
                            self.matrix.accumulate(row, col, block[(i, j)])?;
                        }
                    }
                }
            }
        }

        self.state = FormState::Accumulating;
        Ok(())
    }

    /// Assembles the column of a constraint multiplier: `∫ l(v)` for every test function `v`.
    ///
    /// Rows of Dirichlet test dofs are skipped.
    pub fn algebraic_trial_block<I, Dom, Q>(
        &mut self,
        constraint: ConstraintHandle,
        integrand: &mut I,
        domain: &Dom,
        qtable: &Q,
    ) -> Result<(), AssemblyError>
    where
        I: ?Sized + LinearIntegrand<T, D>,
        Dom: ?Sized + IntegrationDomain<C>,
        Q: ?Sized + QuadratureTable<T, D>,
    {
        self.check_constraint(constraint.index)?;
        let col = self.trial_dof_count + constraint.index;
        let test = &self.test;
        let test_offsets = &self.test_offsets;
        let matrix = &mut self.matrix;
        integrate_linear(test, integrand, domain, qtable, |m, cell, i, value| {
            let space = test.component(m);
            let dof = space.dof(cell, i);
            if space.is_dirichlet(dof) {
                return Ok(());
            }
            matrix.accumulate(test_offsets[m] + dof, col, value)
        })?;
        self.state = FormState::Accumulating;
        Ok(())
    }

    /// Assembles the row of a constraint equation: `∫ l(u)` for every trial function `u`.
    pub fn algebraic_test_block<I, Dom, Q>(
        &mut self,
        constraint: ConstraintHandle,
        integrand: &mut I,
        domain: &Dom,
        qtable: &Q,
    ) -> Result<(), AssemblyError>
    where
        I: ?Sized + LinearIntegrand<T, D>,
        Dom: ?Sized + IntegrationDomain<C>,
        Q: ?Sized + QuadratureTable<T, D>,
    {
        self.check_constraint(constraint.index)?;
        let row = self.test_dof_count + constraint.index;
        let trial = &self.trial;
        let trial_offsets = &self.trial_offsets;
        let matrix = &mut self.matrix;
        integrate_linear(trial, integrand, domain, qtable, |n, cell, j, value| {
            let dof = trial.component(n).dof(cell, j);
            matrix.accumulate(row, trial_offsets[n] + dof, value)
        })?;
        self.state = FormState::Accumulating;
        Ok(())
    }

    /// Sets the entry coupling constraint equation `eq` with constraint multiplier `dof`.
    pub fn set_algebraic_block(&mut self, eq: usize, dof: usize, value: T) -> Result<(), AssemblyError> {
        self.check_constraint(eq)?;
        self.check_constraint(dof)?;
        self.matrix
            .set(self.test_dof_count + eq, self.trial_dof_count + dof, value)?;
        self.state = FormState::Accumulating;
        Ok(())
    }

    /// The entry coupling constraint equation `eq` with constraint multiplier `dof`.
    pub fn algebraic_block(&self, eq: usize, dof: usize) -> Result<T, AssemblyError> {
        self.check_constraint(eq)?;
        self.check_constraint(dof)?;
        Ok(self
            .matrix
            .get(self.test_dof_count + eq, self.trial_dof_count + dof))
    }

    /// Solves the assembled system with the given right-hand side.
    ///
    /// Right-hand side entries of Dirichlet dofs are replaced by the boundary values at the
    /// dof coordinates, and the constraint values of `rhs` are appended after the dof range.
    /// The multipliers are split off the solution vector.
    pub fn solve<S>(&mut self, rhs: &LinearForm<'a, T, D, C>, solver: &S) -> Result<Solution<'a, T, D, C>, AssemblyError>
    where
        S: ?Sized + LinearSolver<T>,
    {
        if !rhs.space().same_as(&self.test) {
            return Err(AssemblyError::IncompatibleSpaces);
        }

        let values = rhs.algebraic_equation_values();
        if values.len() > self.num_constraints {
            return Err(AssemblyError::InvalidConstraint {
                index: values.len() - 1,
                count: self.num_constraints,
            });
        }

        let mut b = DVector::zeros(self.test_dof_count + self.num_constraints);
        b.rows_mut(0, self.test_dof_count).copy_from(rhs.vector());
        for (m, &offset) in self.test_offsets.iter().enumerate() {
            let space = self.test.component(m);
            for &dof in space.dirichlet_dofs().iter() {
                b[offset + dof] = space.boundary_value(&space.dof_coordinates(dof)?);
            }
        }
        for (k, &value) in values.iter().enumerate() {
            b[self.test_dof_count + k] = value;
        }

        let matrix = self.to_csr();
        if matrix.nrows() != matrix.ncols() {
            return Err(SolveError::DimensionMismatch {
                nrows: matrix.nrows(),
                ncols: matrix.ncols(),
                rhs: b.len(),
            }
            .into());
        }

        debug!(
            "Solving {}x{} system with {} nonzeros and {} constraints",
            matrix.nrows(),
            matrix.ncols(),
            matrix.nnz(),
            self.num_constraints
        );
        let (x, report) = solver.solve(&matrix, &b)?;
        debug!(
            "{} finished after {} iterations, residual {:e}",
            report.solver, report.iterations, report.residual_norm
        );

        let function =
            CompositeFunction::from_coefficients(&self.trial, x.rows(0, self.trial_dof_count).into_owned())?;
        let multipliers = x
            .rows(self.trial_dof_count, self.num_constraints)
            .into_owned();
        self.state = FormState::Solved;
        Ok(Solution {
            function,
            multipliers,
            report,
        })
    }

    /// Dirichlet flags of the test dofs, per component.
    ///
    /// No borrow of the Dirichlet sets outlives this call.
    fn test_dirichlet_rows(&self) -> Vec<Vec<bool>> {
        self.test
            .components()
            .iter()
            .map(|space| {
                let mut rows = vec![false; space.dof_count()];
                for &dof in space.dirichlet_dofs().iter() {
                    rows[dof] = true;
                }
                rows
            })
            .collect()
    }

    fn check_constraint(&self, index: usize) -> Result<(), AssemblyError> {
        if index < self.num_constraints {
            Ok(())
        } else {
            Err(AssemblyError::InvalidConstraint {
                index,
                count: self.num_constraints,
            })
        }
    }
}

/// The component whose range in the composite numbering contains `dof`.
fn component_of(offsets: &[usize], dof: usize) -> usize {
    // Empty components share their offset with the next one, so take the last match
    offsets.partition_point(|&offset| offset <= dof).saturating_sub(1)
}
