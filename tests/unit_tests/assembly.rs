use blockfem::assembly::integrands::{Laplace, Mass, Mean, Source};
use blockfem::assembly::{
    bilinear_fn, linear_fn, BilinearForm, BilinearIntegrand, FormRequirements, FormState, LinearForm,
    QuadraturePoint, ShapeValue,
};
use blockfem::composite::CompositeSpace;
use blockfem::connectivity::{Segment2d1Connectivity, VertexConnectivity};
use blockfem::element::Lagrange;
use blockfem::error::{AssemblyError, SolveError, SpaceError};
use blockfem::mesh::procedural::{create_unit_interval_mesh, create_unit_square_uniform_tri_mesh_2d};
use blockfem::mesh::{SegmentMesh1d, SubMesh};
use blockfem::quadrature::{segment, triangle, GeneralQuadratureTable, UniformQuadratureTable};
use blockfem::solver::DenseLu;
use blockfem::space::FiniteElementSpace;
use matrixcompare::assert_scalar_eq;
use nalgebra::{DMatrix, DVector, Point1, U1, U2};
use util::assert_approx_matrix_eq;

/// The P1 stiffness matrix of the unit interval with 4 cells.
fn p1_stiffness_4() -> DMatrix<f64> {
    #[rustfmt::skip]
    let pattern = DMatrix::from_row_slice(5, 5, &[
         1.0, -1.0,  0.0,  0.0,  0.0,
        -1.0,  2.0, -1.0,  0.0,  0.0,
         0.0, -1.0,  2.0, -1.0,  0.0,
         0.0,  0.0, -1.0,  2.0, -1.0,
         0.0,  0.0,  0.0, -1.0,  1.0,
    ]);
    pattern * 4.0
}

fn segment_table(strength: usize) -> UniformQuadratureTable<f64, U1> {
    UniformQuadratureTable::from_quadrature(segment(strength))
}

#[test]
fn laplace_and_mass_on_interval() {
    let mesh = create_unit_interval_mesh::<f64>(4);
    let p1 = FiniteElementSpace::new(&mesh, Lagrange::P1).unwrap();
    let space = CompositeSpace::single(&p1);
    let qtable = segment_table(2);

    let mut a = BilinearForm::new(&space, &space);
    assert_eq!(a.state(), FormState::Constructed);
    a.clear().unwrap();
    assert_eq!(a.state(), FormState::Cleared);
    assert_eq!(a.matrix().nnz(), 0);
    a.add_integral(&mut Laplace::default(), &mesh, &qtable).unwrap();
    assert_eq!(a.state(), FormState::Accumulating);
    assert_approx_matrix_eq!(a.to_dense(), p1_stiffness_4(), abstol = 1e-12);

    let mut m = BilinearForm::new(&space, &space);
    m.clear().unwrap();
    m.add_integral(&mut Mass::default(), &mesh, &qtable).unwrap();
    let mass = m.to_dense();
    assert_scalar_eq!(mass[(0, 0)], 2.0 / 24.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(mass[(2, 2)], 4.0 / 24.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(mass[(2, 3)], 1.0 / 24.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(mass.sum(), 1.0, comp = abs, tol = 1e-13);
}

#[test]
fn clear_installs_dirichlet_identity_rows() {
    let mesh = create_unit_interval_mesh::<f64>(4);
    let p1 = FiniteElementSpace::new(&mesh, Lagrange::P1).unwrap();
    p1.set_dirichlet_boundary(&mesh.boundary_submesh()).unwrap();
    let space = CompositeSpace::single(&p1);
    let qtable = segment_table(2);

    let mut a = BilinearForm::new(&space, &space);
    a.clear().unwrap();
    assert_eq!(a.matrix().triplets(), vec![(0, 0, 1.0), (4, 4, 1.0)]);

    a.add_integral(&mut Laplace::default(), &mesh, &qtable).unwrap();
    let mut expected = p1_stiffness_4();
    for row in [0, 4] {
        expected.row_mut(row).fill(0.0);
        expected[(row, row)] = 1.0;
    }
    assert_approx_matrix_eq!(a.to_dense(), expected, abstol = 1e-12);

    // Clearing again restores exactly the identity rows
    a.clear().unwrap();
    assert_eq!(a.matrix().triplets(), vec![(0, 0, 1.0), (4, 4, 1.0)]);
    a.clear().unwrap();
    assert_eq!(a.matrix().triplets(), vec![(0, 0, 1.0), (4, 4, 1.0)]);
}

#[test]
fn dirichlet_rows_follow_the_current_set() {
    let mesh = create_unit_interval_mesh::<f64>(2);
    let p1 = FiniteElementSpace::new(&mesh, Lagrange::P1).unwrap();
    let space = CompositeSpace::single(&p1);

    let mut a = BilinearForm::new(&space, &space);
    a.clear().unwrap();
    p1.set_dirichlet_boundary(&mesh.boundary_submesh()).unwrap();

    a.accumulate(0, 0, 5.0).unwrap();
    a.accumulate(1, 0, 2.0).unwrap();
    a.accumulate_in_block(0, 0, 2, 1, 3.0).unwrap();
    assert_eq!(a.matrix().triplets(), vec![(1, 0, 2.0)]);
}

#[test]
fn accumulation_is_bounds_checked() {
    let mesh = create_unit_interval_mesh::<f64>(2);
    let p1 = FiniteElementSpace::new(&mesh, Lagrange::P1).unwrap();
    let space = CompositeSpace::new(vec![&p1, &p1]).unwrap();

    let mut a = BilinearForm::new(&space, &space);
    a.clear().unwrap();
    assert_eq!(
        a.accumulate(6, 0, 1.0),
        Err(AssemblyError::OutOfBounds {
            row: 6,
            col: 0,
            nrows: 6,
            ncols: 6
        })
    );

    a.accumulate_in_block(1, 0, 2, 1, 3.0).unwrap();
    assert_eq!(a.matrix().get(5, 1), 3.0);
    assert_eq!(
        a.accumulate_in_block(2, 0, 0, 0, 1.0),
        Err(AssemblyError::Space(SpaceError::InvalidComponent { index: 2, count: 2 }))
    );
    assert_eq!(
        a.accumulate_in_block(0, 1, 0, 3, 1.0),
        Err(AssemblyError::Space(SpaceError::DofOutOfRange { dof: 3, count: 3 }))
    );
}

#[test]
fn components_only_couple_within_their_block() {
    let mesh = create_unit_interval_mesh::<f64>(4);
    let p1 = FiniteElementSpace::new(&mesh, Lagrange::P1).unwrap();
    let space = CompositeSpace::new(vec![&p1, &p1]).unwrap();

    let mut a = BilinearForm::new(&space, &space);
    a.clear().unwrap();
    a.add_integral(&mut Laplace::default(), &mesh, &segment_table(2))
        .unwrap();

    let mut expected = DMatrix::zeros(10, 10);
    expected.view_mut((0, 0), (5, 5)).copy_from(&p1_stiffness_4());
    expected.view_mut((5, 5), (5, 5)).copy_from(&p1_stiffness_4());
    assert_approx_matrix_eq!(a.to_dense(), expected, abstol = 1e-12);
}

#[test]
fn integrand_sees_one_block_at_a_time() {
    let mesh = create_unit_interval_mesh::<f64>(3);
    let p1 = FiniteElementSpace::new(&mesh, Lagrange::P1).unwrap();
    let p2 = FiniteElementSpace::new(&mesh, Lagrange::P2).unwrap();
    let space = CompositeSpace::new(vec![&p1, &p2]).unwrap();

    // Couples the second test component with the first trial component only
    let mut integrand = bilinear_fn(
        |_: &QuadraturePoint<f64, U1>, v: &[ShapeValue<f64, U1>], u: &[ShapeValue<f64, U1>]| {
            assert_eq!(v.len(), 2);
            let nonzero_test = v.iter().filter(|s| s.value != 0.0 || s.gradient[0] != 0.0).count();
            let nonzero_trial = u.iter().filter(|s| s.value != 0.0 || s.gradient[0] != 0.0).count();
            assert!(nonzero_test <= 1 && nonzero_trial <= 1);
            v[1].value * u[0].value
        },
    );

    let mut a = BilinearForm::new(&space, &space);
    a.clear().unwrap();
    a.add_integral(&mut integrand, &mesh, &segment_table(3)).unwrap();
    let dense = a.to_dense();

    assert_eq!(dense.view((0, 0), (4, 11)).abs().max(), 0.0);
    assert_eq!(dense.view((4, 4), (7, 7)).abs().max(), 0.0);
    // P1 functions sum to one, so the rows of the coupling block are the integrals of the P2 basis
    let coupling = dense.view((4, 0), (7, 4));
    let integrals = [1.0 / 18.0, 1.0 / 9.0, 1.0 / 9.0, 1.0 / 18.0, 2.0 / 9.0, 2.0 / 9.0, 2.0 / 9.0];
    for (row, integral) in integrals.iter().enumerate() {
        assert_scalar_eq!(coupling.row(row).sum(), *integral, comp = abs, tol = 1e-13);
    }
}

#[test]
fn rectangular_forms_between_different_spaces() {
    let mesh = create_unit_interval_mesh::<f64>(4);
    let p1 = FiniteElementSpace::new(&mesh, Lagrange::P1).unwrap();
    let p2 = FiniteElementSpace::new(&mesh, Lagrange::P2).unwrap();
    let test = CompositeSpace::single(&p1);
    let trial = CompositeSpace::single(&p2);

    let mut b = BilinearForm::new(&test, &trial);
    b.clear().unwrap();
    b.add_integral(&mut Mass::default(), &mesh, &segment_table(3))
        .unwrap();
    assert_eq!((b.matrix().nrows(), b.matrix().ncols()), (5, 9));

    // P2 functions sum to one, so the row sums are the integrals of the P1 basis
    let dense = b.to_dense();
    let integrals = [0.125, 0.25, 0.25, 0.25, 0.125];
    for (row, integral) in integrals.iter().enumerate() {
        assert_scalar_eq!(dense.row(row).sum(), *integral, comp = abs, tol = 1e-13);
    }

    let rhs = LinearForm::new(&test);
    let result = b.solve(&rhs, &DenseLu);
    assert!(matches!(
        result,
        Err(AssemblyError::Solve(SolveError::DimensionMismatch { nrows: 5, ncols: 9, .. }))
    ));
}

#[test]
fn constraint_blocks() {
    let mesh = create_unit_interval_mesh::<f64>(4);
    let p1 = FiniteElementSpace::new(&mesh, Lagrange::P1).unwrap();
    let space = CompositeSpace::single(&p1);
    let qtable = segment_table(2);

    let mut a = BilinearForm::with_constraints(&space, &space, 1);
    assert_eq!(a.num_constraints(), 1);
    assert_eq!((a.matrix().nrows(), a.matrix().ncols()), (6, 6));
    a.clear().unwrap();
    a.add_integral(&mut Laplace::default(), &mesh, &qtable).unwrap();

    let second = a.add_constraint();
    assert_eq!((second.index(), second.row(), second.col()), (1, 6, 6));
    assert_eq!((a.matrix().nrows(), a.matrix().ncols()), (7, 7));

    // Assembling the domain integral never touches the constraint rows and columns
    let dense = a.to_dense();
    assert_eq!(dense.rows(5, 2).abs().max(), 0.0);
    assert_eq!(dense.columns(5, 2).abs().max(), 0.0);

    let first = a.constraint(0).unwrap();
    assert_eq!((first.row(), first.col()), (5, 5));
    a.algebraic_trial_block(first, &mut Mean { component: 0 }, &mesh, &qtable)
        .unwrap();
    a.algebraic_test_block(first, &mut Mean { component: 0 }, &mesh, &qtable)
        .unwrap();
    a.set_algebraic_block(1, 1, 1.0).unwrap();
    a.set_algebraic_block(0, 1, 0.5).unwrap();

    let dense = a.to_dense();
    let integrals = [0.125, 0.25, 0.25, 0.25, 0.125];
    for (dof, integral) in integrals.iter().enumerate() {
        assert_scalar_eq!(dense[(dof, 5)], *integral, comp = abs, tol = 1e-14);
        assert_scalar_eq!(dense[(5, dof)], *integral, comp = abs, tol = 1e-14);
        assert_eq!(dense[(dof, 6)], 0.0);
    }
    assert_eq!(a.algebraic_block(1, 1), Ok(1.0));
    assert_eq!(a.algebraic_block(0, 1), Ok(0.5));
    assert_eq!(a.algebraic_block(0, 0), Ok(0.0));

    assert_eq!(
        a.constraint(2),
        Err(AssemblyError::InvalidConstraint { index: 2, count: 2 })
    );
    assert_eq!(
        a.set_algebraic_block(0, 2, 1.0),
        Err(AssemblyError::InvalidConstraint { index: 2, count: 2 })
    );

    // Constraint blocks are removed by clear, the constraints themselves remain
    a.clear().unwrap();
    assert_eq!(a.matrix().nnz(), 0);
    assert_eq!(a.num_constraints(), 2);
}

#[test]
fn constraint_blocks_leave_component_blocks_unchanged() {
    let mesh = create_unit_interval_mesh::<f64>(4);
    let p1 = FiniteElementSpace::new(&mesh, Lagrange::P1).unwrap();
    let p2 = FiniteElementSpace::new(&mesh, Lagrange::P2).unwrap();
    p1.set_dirichlet_boundary(&mesh.boundary_submesh()).unwrap();
    let space = CompositeSpace::new(vec![&p1, &p2]).unwrap();
    let qtable = segment_table(4);
    let n = space.total_dof_count();

    let mut plain = BilinearForm::new(&space, &space);
    plain.clear().unwrap();
    plain
        .add_integral(&mut Laplace::default(), &mesh, &qtable)
        .unwrap();

    // Constraint blocks are assembled both before and after the domain integral
    let mut constrained = BilinearForm::new(&space, &space);
    constrained.clear().unwrap();
    let first = constrained.add_constraint();
    constrained
        .algebraic_trial_block(first, &mut Mean { component: 0 }, &mesh, &qtable)
        .unwrap();
    constrained
        .add_integral(&mut Laplace::default(), &mesh, &qtable)
        .unwrap();
    constrained
        .algebraic_test_block(first, &mut Mean { component: 0 }, &mesh, &qtable)
        .unwrap();
    let second = constrained.add_constraint();
    constrained
        .algebraic_trial_block(second, &mut Mean { component: 1 }, &mesh, &qtable)
        .unwrap();
    constrained
        .algebraic_test_block(second, &mut Mean { component: 1 }, &mesh, &qtable)
        .unwrap();
    constrained.set_algebraic_block(0, 1, 2.0).unwrap();
    constrained.set_algebraic_block(1, 1, 0.0).unwrap();

    let expected = plain.to_dense();
    let actual = constrained.to_dense();
    assert_eq!((expected.nrows(), expected.ncols()), (n, n));
    assert_eq!((actual.nrows(), actual.ncols()), (n + 2, n + 2));
    for i in 0..n {
        for j in 0..n {
            assert_eq!(actual[(i, j)], expected[(i, j)], "entry ({}, {}) differs", i, j);
        }
    }
    assert!(actual.column(n).amax() > 0.0);
    assert!(actual.row(n + 1).amax() > 0.0);
    assert_eq!(actual[(n, n + 1)], 2.0);
}

/// A Laplace integrand that marks the boundary of its space as Dirichlet at every point.
struct MarksBoundaryWhilePreparing<'a> {
    space: &'a FiniteElementSpace<'a, f64, U1, Segment2d1Connectivity>,
    boundary: SubMesh<VertexConnectivity>,
}

impl<'a> BilinearIntegrand<f64, U1> for MarksBoundaryWhilePreparing<'a> {
    fn requirements(&self) -> FormRequirements {
        FormRequirements::gradients()
    }

    fn prepare(&mut self, _point: &QuadraturePoint<f64, U1>) {
        self.space.set_dirichlet_boundary(&self.boundary).unwrap();
    }

    fn evaluate(
        &self,
        _point: &QuadraturePoint<f64, U1>,
        test: &[ShapeValue<f64, U1>],
        trial: &[ShapeValue<f64, U1>],
    ) -> f64 {
        test[0].gradient.dot(&trial[0].gradient)
    }
}

#[test]
fn integrands_may_change_the_dirichlet_boundary() {
    let mesh = create_unit_interval_mesh::<f64>(4);
    let p1 = FiniteElementSpace::new(&mesh, Lagrange::P1).unwrap();
    let space = CompositeSpace::single(&p1);
    let mut integrand = MarksBoundaryWhilePreparing {
        space: &p1,
        boundary: mesh.boundary_submesh(),
    };

    let mut a = BilinearForm::new(&space, &space);
    a.clear().unwrap();
    a.add_integral(&mut integrand, &mesh, &segment_table(2))
        .unwrap();

    // The rows of one integral follow the Dirichlet set at its start
    assert_approx_matrix_eq!(a.to_dense(), p1_stiffness_4(), abstol = 1e-12);
    assert_eq!(p1.dirichlet_dofs().len(), 2);

    // Later accumulation sees the new set
    a.accumulate(0, 1, 1.0).unwrap();
    assert_scalar_eq!(a.to_dense()[(0, 1)], -4.0, comp = abs, tol = 1e-12);
}

#[test]
fn quadrature_table_must_cover_the_domain() {
    let mesh = create_unit_interval_mesh::<f64>(4);
    let p1 = FiniteElementSpace::new(&mesh, Lagrange::P1).unwrap();
    let space = CompositeSpace::single(&p1);
    let qtable = GeneralQuadratureTable::from_fn(3, |_| segment(2));
    let missing = AssemblyError::MissingQuadrature {
        cell: 3,
        set_index: 3,
        num_point_sets: 3,
    };

    let mut a = BilinearForm::new(&space, &space);
    a.clear().unwrap();
    assert_eq!(a.add_integral(&mut Laplace::default(), &mesh, &qtable), Err(missing.clone()));

    let mut l = LinearForm::new(&space);
    assert_eq!(l.add_integral(&mut Mean { component: 0 }, &mesh, &qtable), Err(missing));

    // A table covering the domain cells of a sub-mesh is enough
    let submesh = mesh.submesh_from_cells(&[0, 1, 2]);
    a.clear().unwrap();
    a.add_integral(&mut Laplace::default(), &submesh, &qtable)
        .unwrap();
}

#[test]
fn identity_entries_follow_the_trial_numbering() {
    let mesh = create_unit_interval_mesh::<f64>(4);
    let p1 = FiniteElementSpace::new(&mesh, Lagrange::P1).unwrap();
    let p2 = FiniteElementSpace::new(&mesh, Lagrange::P2).unwrap();
    p2.set_dirichlet_boundary(&mesh.boundary_submesh()).unwrap();
    let test = CompositeSpace::new(vec![&p1, &p2]).unwrap();
    let trial = CompositeSpace::new(vec![&p2, &p2]).unwrap();
    assert_eq!(test.dof_offsets(), vec![0, 5]);
    assert_eq!(trial.dof_offsets(), vec![0, 9]);

    let mut b = BilinearForm::new(&test, &trial);
    b.clear().unwrap();
    let expected: Vec<_> = p2
        .dirichlet_dofs()
        .iter()
        .map(|&dof| (5 + dof, 9 + dof, 1.0))
        .collect();
    assert_eq!(expected.len(), 2);
    assert_eq!(b.matrix().triplets(), expected);
}

#[test]
fn constraint_column_skips_dirichlet_rows() {
    let mesh = create_unit_interval_mesh::<f64>(4);
    let p1 = FiniteElementSpace::new(&mesh, Lagrange::P1).unwrap();
    p1.set_dirichlet_boundary(&mesh.boundary_submesh()).unwrap();
    let space = CompositeSpace::single(&p1);
    let qtable = segment_table(2);

    let mut a = BilinearForm::new(&space, &space);
    a.clear().unwrap();
    let handle = a.add_constraint();
    a.algebraic_trial_block(handle, &mut Mean { component: 0 }, &mesh, &qtable)
        .unwrap();
    a.algebraic_test_block(handle, &mut Mean { component: 0 }, &mesh, &qtable)
        .unwrap();

    let dense = a.to_dense();
    assert_eq!(dense[(0, 5)], 0.0);
    assert_eq!(dense[(4, 5)], 0.0);
    assert_scalar_eq!(dense[(2, 5)], 0.25, comp = abs, tol = 1e-14);
    // The constraint row itself is not a Dirichlet row
    assert_scalar_eq!(dense[(5, 0)], 0.125, comp = abs, tol = 1e-14);
}

#[test]
fn linear_form_assembly() {
    let mesh = create_unit_interval_mesh::<f64>(4);
    let p1 = FiniteElementSpace::new(&mesh, Lagrange::P1).unwrap();
    let space = CompositeSpace::new(vec![&p1, &p1]).unwrap();
    let qtable = segment_table(2);

    let mut l = LinearForm::new(&space);
    assert_eq!(l.offsets(), &[0, 5]);
    l.add_integral(&mut Source::component(1, |_: &Point1<f64>| 2.0), &mesh, &qtable)
        .unwrap();
    let expected = DVector::from_column_slice(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.25, 0.5, 0.5, 0.5, 0.25]);
    assert_approx_matrix_eq!(*l.vector(), expected, abstol = 1e-14);

    l.accumulate(0, 1.0).unwrap();
    l.accumulate_in_component(1, 4, 1.0).unwrap();
    assert_eq!(l.vector()[0], 1.0);
    assert_scalar_eq!(l.vector()[9], 1.25, comp = abs, tol = 1e-14);
    assert!(l.accumulate(10, 1.0).is_err());
    assert_eq!(
        l.accumulate_in_component(1, 5, 1.0),
        Err(AssemblyError::Space(SpaceError::DofOutOfRange { dof: 5, count: 5 }))
    );

    l.set_algebraic_equation_value(2, 3.0);
    assert_eq!(l.algebraic_equation_values(), &[0.0, 0.0, 3.0]);

    l.clear();
    assert_eq!(l.vector().amax(), 0.0);
    assert!(l.algebraic_equation_values().is_empty());
}

#[test]
fn linear_form_with_coordinates_and_gradients() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(2);
    let p1 = FiniteElementSpace::new(&mesh, Lagrange::P1).unwrap();
    let space = CompositeSpace::single(&p1);
    let qtable = UniformQuadratureTable::from_quadrature(triangle(2).unwrap());

    // Σ_i ∫ ∇φ_i · (1, 0) vanishes because the basis sums to one
    let mut l = LinearForm::new(&space);
    l.add_integral(&mut linear_fn(|_: &QuadraturePoint<f64, U2>, v: &[ShapeValue<f64, U2>]| v[0].gradient[0]), &mesh, &qtable)
        .unwrap();
    assert_scalar_eq!(l.vector().sum(), 0.0, comp = abs, tol = 1e-13);

    // Σ_i ∫ x φ_i = ∫ x = 1/2
    let mut l = LinearForm::new(&space);
    l.add_integral(&mut linear_fn(|p: &QuadraturePoint<f64, U2>, v: &[ShapeValue<f64, U2>]| p.physical().x * v[0].value), &mesh, &qtable)
        .unwrap();
    assert_scalar_eq!(l.vector().sum(), 0.5, comp = abs, tol = 1e-13);
}

#[test]
fn integration_over_submesh_and_general_tables() {
    let mesh = create_unit_interval_mesh::<f64>(4);
    let p1 = FiniteElementSpace::new(&mesh, Lagrange::P1).unwrap();
    let space = CompositeSpace::single(&p1);

    // Cells 1 and 3, with a rule per sub-cell
    let submesh = mesh.submesh_from_cells(&[1, 3]);
    let qtable = GeneralQuadratureTable::from_fn(submesh.num_cells(), |cell| segment(cell + 2));

    let mut m = BilinearForm::new(&space, &space);
    m.clear().unwrap();
    m.add_integral(&mut Mass::default(), &submesh, &qtable).unwrap();
    let dense = m.to_dense();
    assert_eq!(dense.row(0).abs().max(), 0.0);
    assert_scalar_eq!(dense[(1, 1)], 2.0 / 24.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(dense[(1, 2)], 1.0 / 24.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(dense[(2, 2)], 2.0 / 24.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(dense.sum(), 0.5, comp = abs, tol = 1e-13);
}

#[test]
fn invalid_domains_and_requirements() {
    let mesh = create_unit_interval_mesh::<f64>(4);
    let p1 = FiniteElementSpace::new(&mesh, Lagrange::P1).unwrap();
    let space = CompositeSpace::single(&p1);
    let qtable = segment_table(2);
    let mut a = BilinearForm::new(&space, &space);
    a.clear().unwrap();

    let outside = SubMesh::from_parts(vec![Segment2d1Connectivity([0, 1])], vec![10]);
    assert_eq!(
        a.add_integral(&mut Mass::default(), &outside, &qtable),
        Err(AssemblyError::InvalidCell { cell: 10, num_cells: 4 })
    );

    let hessian = FormRequirements {
        space_coordinates: false,
        differential_order: 2,
    };
    let mut integrand = bilinear_fn(|_: &QuadraturePoint<f64, U1>, _: &[ShapeValue<f64, U1>], _: &[ShapeValue<f64, U1>]| 0.0)
        .with_requirements(hessian);
    assert_eq!(
        a.add_integral(&mut integrand, &mesh, &qtable),
        Err(AssemblyError::UnsupportedDifferentialOrder(2))
    );
}

#[test]
fn degenerate_cells_are_reported() {
    let mesh = SegmentMesh1d::from_vertices_and_connectivity(
        vec![Point1::new(0.0), Point1::new(0.0)],
        vec![Segment2d1Connectivity([0, 1])],
    );
    let p1 = FiniteElementSpace::new(&mesh, Lagrange::P1).unwrap();
    let space = CompositeSpace::single(&p1);
    let mut a = BilinearForm::new(&space, &space);
    a.clear().unwrap();
    assert_eq!(
        a.add_integral(&mut Laplace::default(), &mesh, &segment_table(2)),
        Err(AssemblyError::DegenerateCell { cell: 0 })
    );
}

#[test]
fn forms_over_different_meshes_are_rejected() {
    let mesh_a = create_unit_interval_mesh::<f64>(2);
    let mesh_b = create_unit_interval_mesh::<f64>(2);
    let a_space = FiniteElementSpace::new(&mesh_a, Lagrange::P1).unwrap();
    let b_space = FiniteElementSpace::new(&mesh_b, Lagrange::P1).unwrap();
    let test = CompositeSpace::single(&a_space);
    let trial = CompositeSpace::single(&b_space);

    let mut a = BilinearForm::new(&test, &trial);
    a.clear().unwrap();
    assert_eq!(
        a.add_integral(&mut Mass::default(), &mesh_a, &segment_table(2)),
        Err(AssemblyError::IncompatibleSpaces)
    );

    // The right-hand side must be built over the test space
    let mut square = BilinearForm::new(&test, &test);
    square.clear().unwrap();
    let rhs = LinearForm::new(&trial);
    assert_eq!(
        square.solve(&rhs, &DenseLu).unwrap_err(),
        AssemblyError::IncompatibleSpaces
    );
}

#[test]
fn solve_rejects_excess_constraint_values() {
    let mesh = create_unit_interval_mesh::<f64>(2);
    let p1 = FiniteElementSpace::new(&mesh, Lagrange::P1).unwrap();
    let space = CompositeSpace::single(&p1);
    let mut a = BilinearForm::with_constraints(&space, &space, 1);
    a.clear().unwrap();

    let mut rhs = LinearForm::new(&space);
    rhs.set_algebraic_equation_value(1, 1.0);
    assert_eq!(
        a.solve(&rhs, &DenseLu).unwrap_err(),
        AssemblyError::InvalidConstraint { index: 1, count: 1 }
    );
}

#[test]
#[should_panic]
fn physical_point_requires_space_coordinates() {
    let mesh = create_unit_interval_mesh::<f64>(2);
    let p1 = FiniteElementSpace::new(&mesh, Lagrange::P1).unwrap();
    let space = CompositeSpace::single(&p1);
    let mut l = LinearForm::new(&space);
    let mut integrand = linear_fn(|p: &QuadraturePoint<f64, U1>, v: &[ShapeValue<f64, U1>]| p.physical().x * v[0].value)
        .with_requirements(FormRequirements::values());
    let _ = l.add_integral(&mut integrand, &mesh, &segment_table(2));
}
