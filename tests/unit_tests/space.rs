use blockfem::connectivity::{Segment2d2Connectivity, Tri3d2Connectivity};
use blockfem::element::{FiniteElement, Lagrange};
use blockfem::error::SpaceError;
use blockfem::mesh::procedural::{create_unit_interval_mesh, create_unit_square_uniform_tri_mesh_2d};
use blockfem::mesh::SubMesh;
use blockfem::proptest::{lagrange_element, rectangular_uniform_tri_mesh_strategy, unit_box_tet_mesh_strategy};
use blockfem::quadrature::{triangle, UniformQuadratureTable};
use blockfem::space::{DiscreteFunction, FiniteElementSpace};
use matrixcompare::assert_scalar_eq;
use nalgebra::{Point2, U2};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn set(dofs: &[usize]) -> BTreeSet<usize> {
    dofs.iter().copied().collect()
}

fn bottom_edges() -> SubMesh<Segment2d2Connectivity> {
    SubMesh::from_parts(
        vec![Segment2d2Connectivity([0, 1]), Segment2d2Connectivity([1, 2])],
        vec![0, 2],
    )
}

fn left_edges() -> SubMesh<Segment2d2Connectivity> {
    SubMesh::from_parts(
        vec![Segment2d2Connectivity([3, 0]), Segment2d2Connectivity([6, 3])],
        vec![1, 5],
    )
}

#[test]
fn p1_interval_dofs_are_vertices() {
    let mesh = create_unit_interval_mesh::<f64>(5);
    let space = FiniteElementSpace::new(&mesh, Lagrange::P1).unwrap();
    assert_eq!(space.dof_count(), 6);
    assert_eq!(space.dofs_per_cell(), 2);
    for k in 0..5 {
        assert_eq!(space.cell_dofs(k), &[k, k + 1]);
    }
}

#[test]
fn p2_interval_numbers_vertices_before_edges() {
    let mesh = create_unit_interval_mesh::<f64>(3);
    let space = FiniteElementSpace::new(&mesh, Lagrange::P2).unwrap();
    assert_eq!(space.dof_count(), 7);
    for k in 0..3 {
        assert_eq!(space.cell_dofs(k), &[k, k + 1, 4 + k]);
        assert_eq!(space.dof(k, 2), 4 + k);
    }
    assert_eq!(space.subdomain_catalogue(0).len(), 4);
    assert_eq!(space.subdomain_catalogue(1).len(), 3);
    assert_eq!(space.subdomain_catalogue(1)[2].vertices(), &[2, 3]);
}

#[test]
fn dof_counts_on_unit_square() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(2);
    let counts: Vec<_> = [Lagrange::P0, Lagrange::P1, Lagrange::P1Bubble, Lagrange::P2]
        .into_iter()
        .map(|element| FiniteElementSpace::new(&mesh, element).unwrap().dof_count())
        .collect();
    // 9 vertices, 16 edges and 8 triangles
    assert_eq!(counts, vec![8, 9, 17, 25]);
}

#[test]
fn p2_shared_edge_has_one_dof() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(1);
    let space = FiniteElementSpace::new(&mesh, Lagrange::P2).unwrap();
    // Cells [0, 1, 3] and [0, 3, 2] share the diagonal [0, 3]: local edge (0, 2) in the first
    // cell and local edge (0, 1) in the second
    assert_eq!(space.dof(0, 4), space.dof(1, 3));
    assert_eq!(space.dof_count(), 9);
}

#[test]
fn dof_lookup_resolves_first_cell() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(2);
    let space = FiniteElementSpace::new(&mesh, Lagrange::P1).unwrap();
    // Vertex 4 is the third vertex of cell 0
    assert_eq!(space.dof_cell_and_local_index(4), Ok((0, 2)));
    assert_eq!(space.dof_coordinates(4), Ok(Point2::new(0.5, 0.5)));
    assert_eq!(
        space.dof_coordinates(9),
        Err(SpaceError::DofOutOfRange { dof: 9, count: 9 })
    );
}

#[test]
#[should_panic]
fn dof_rejects_local_index_out_of_range() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(1);
    let space = FiniteElementSpace::new(&mesh, Lagrange::P1).unwrap();
    let _ = space.dof(0, 3);
}

#[test]
fn dirichlet_boundary_of_unit_square() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(2);
    let boundary = mesh.boundary_submesh();

    let p1 = FiniteElementSpace::new(&mesh, Lagrange::P1).unwrap();
    p1.set_dirichlet_boundary(&boundary).unwrap();
    assert_eq!(*p1.dirichlet_dofs(), set(&[0, 1, 2, 3, 5, 6, 7, 8]));
    assert!(!p1.is_dirichlet(4));

    let p2 = FiniteElementSpace::new(&mesh, Lagrange::P2).unwrap();
    p2.set_dirichlet_boundary(&boundary).unwrap();
    // 8 boundary vertices and 8 boundary edges
    assert_eq!(p2.dirichlet_dofs().len(), 16);
    for &dof in p2.dirichlet_dofs().iter() {
        let x = p2.dof_coordinates(dof).unwrap();
        let on_boundary = [x.x, x.y, 1.0 - x.x, 1.0 - x.y]
            .iter()
            .any(|c| c.abs() < 1e-12);
        assert!(on_boundary, "dof {} at {} is not on the boundary", dof, x);
    }

    // Cell-interior dofs are never attached to faces
    let p0 = FiniteElementSpace::new(&mesh, Lagrange::P0).unwrap();
    p0.set_dirichlet_boundary(&boundary).unwrap();
    assert!(p0.dirichlet_dofs().is_empty());
}

#[test]
fn dirichlet_set_replaces_and_add_extends() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(2);
    let space = FiniteElementSpace::new(&mesh, Lagrange::P1).unwrap();

    space.set_dirichlet_boundary(&bottom_edges()).unwrap();
    assert_eq!(*space.dirichlet_dofs(), set(&[0, 1, 2]));

    space.add_dirichlet_boundary(&left_edges()).unwrap();
    assert_eq!(*space.dirichlet_dofs(), set(&[0, 1, 2, 3, 6]));

    space.set_dirichlet_boundary(&left_edges()).unwrap();
    assert_eq!(*space.dirichlet_dofs(), set(&[0, 3, 6]));

    space.clear_dirichlet_boundary();
    assert!(space.dirichlet_dofs().is_empty());
}

#[test]
fn dirichlet_rejects_unknown_entities() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(2);
    let space = FiniteElementSpace::new(&mesh, Lagrange::P2).unwrap();
    space.set_dirichlet_boundary(&bottom_edges()).unwrap();
    let before = space.dirichlet_dofs().clone();

    // The diagonal [0, 8] crosses the square but is not an edge of the mesh
    let invalid = SubMesh::from_parts(vec![Segment2d2Connectivity([8, 0])], vec![0]);
    let result = space.set_dirichlet_boundary(&invalid);
    assert_eq!(
        result,
        Err(SpaceError::MissingSubdomain {
            dim: 1,
            vertices: vec![0, 8]
        })
    );
    assert_eq!(*space.dirichlet_dofs(), before);
}

#[test]
fn boundary_value_defaults_to_zero() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(1);
    let space = FiniteElementSpace::new(&mesh, Lagrange::P1).unwrap();
    assert_eq!(space.boundary_value(&Point2::new(0.3, 0.0)), 0.0);

    space
        .set_dirichlet_boundary_condition(&bottom_edges_of_single_square(), |x| 2.0 * x.x)
        .unwrap();
    assert_eq!(*space.dirichlet_dofs(), set(&[0, 1]));
    assert_eq!(space.boundary_value(&Point2::new(0.25, 0.0)), 0.5);
}

fn bottom_edges_of_single_square() -> SubMesh<Segment2d2Connectivity> {
    SubMesh::from_parts(vec![Segment2d2Connectivity([0, 1])], vec![0])
}

#[test]
fn interpolation_reproduces_polynomials() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(3);
    let qtable = UniformQuadratureTable::from_quadrature(triangle(4).unwrap());

    let p1 = FiniteElementSpace::new(&mesh, Lagrange::P1).unwrap();
    let linear = DiscreteFunction::interpolate(&p1, |x| 1.0 + x.x + 2.0 * x.y).unwrap();
    assert_scalar_eq!(linear.integrate(&qtable), 2.5, comp = abs, tol = 1e-12);

    let p2 = FiniteElementSpace::new(&mesh, Lagrange::P2).unwrap();
    let quadratic = DiscreteFunction::interpolate(&p2, |x| x.x * x.x).unwrap();
    assert_scalar_eq!(quadratic.integrate(&qtable), 1.0 / 3.0, comp = abs, tol = 1e-12);
    for cell in 0..mesh.num_cells() {
        let xi = Point2::new(0.2, 0.3);
        let x = mesh.map_reference_coords(cell, &xi);
        assert_scalar_eq!(quadratic.evaluate(cell, &xi), x.x * x.x, comp = abs, tol = 1e-12);
    }
}

#[test]
fn interpolation_requires_lagrangian_element() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(1);
    let space = FiniteElementSpace::new(&mesh, Lagrange::P1Bubble).unwrap();
    let result = DiscreteFunction::interpolate(&space, |x| x.x);
    assert_eq!(
        result.unwrap_err(),
        SpaceError::NotLagrangian("P1-bubble".to_string())
    );
}

#[test]
fn discrete_function_checks_coefficients_and_spaces() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(1);
    let a = FiniteElementSpace::new(&mesh, Lagrange::P1).unwrap();
    let b = FiniteElementSpace::new(&mesh, Lagrange::P1).unwrap();

    let result = DiscreteFunction::from_coefficients(&a, nalgebra::DVector::zeros(3));
    assert_eq!(
        result.unwrap_err(),
        SpaceError::CoefficientLength { expected: 4, actual: 3 }
    );

    let mut u = DiscreteFunction::zeros(&a);
    let v = DiscreteFunction::interpolate(&a, |x| x.y).unwrap();
    let w = DiscreteFunction::zeros(&b);
    u.assign_from(&v).unwrap();
    assert_eq!(u.coefficients(), v.coefficients());
    assert_eq!(u.assign_from(&w), Err(SpaceError::IncompatibleSpaces));
}

#[test]
fn restriction_and_extension_through_submesh() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(2);
    let space = FiniteElementSpace::new(&mesh, Lagrange::P2).unwrap();
    let f = |x: &Point2<f64>| x.x * x.y + 1.0;
    let u = DiscreteFunction::interpolate(&space, f).unwrap();

    let submesh = mesh.submesh_from_cells(&[2, 3, 6]);
    let sub_mesh = submesh.to_mesh(&mesh);
    let sub_space = FiniteElementSpace::new(&sub_mesh, Lagrange::P2).unwrap();

    let restricted = u.restrict_to(&sub_space, &submesh).unwrap();
    for dof in 0..sub_space.dof_count() {
        let x = sub_space.dof_coordinates(dof).unwrap();
        assert_scalar_eq!(restricted.coefficients()[dof], f(&x), comp = abs, tol = 1e-12);
    }

    let extended = restricted.extend_to(&space, &submesh).unwrap();
    let covered: BTreeSet<usize> = submesh
        .parent_cells()
        .iter()
        .flat_map(|&cell| space.cell_dofs(cell).to_vec())
        .collect();
    for dof in 0..space.dof_count() {
        let expected = if covered.contains(&dof) {
            u.coefficients()[dof]
        } else {
            0.0
        };
        assert_scalar_eq!(extended.coefficients()[dof], expected, comp = abs, tol = 1e-12);
    }

    let p1_sub_space = FiniteElementSpace::new(&sub_mesh, Lagrange::P1).unwrap();
    assert_eq!(
        u.restrict_to(&p1_sub_space, &submesh).unwrap_err(),
        SpaceError::IncompatibleSpaces
    );
}

/// Checks that every global dof is used, and that all cells sharing a dof agree on its
/// physical location.
fn assert_consistent_numbering<D, C>(space: &FiniteElementSpace<'_, f64, D, C>) -> Result<(), TestCaseError>
where
    D: blockfem::SmallDim,
    C: blockfem::connectivity::CellConnectivity<f64, D>,
    nalgebra::DefaultAllocator: blockfem::allocators::DimAllocator<f64, D>,
{
    let mesh = space.mesh();
    let mut used = vec![false; space.dof_count()];
    for cell in 0..mesh.num_cells() {
        for (local, &dof) in space.cell_dofs(cell).iter().enumerate() {
            used[dof] = true;
            let node = space.element().reference_node(local).unwrap();
            let x = mesh.map_reference_coords(cell, &node);
            let expected = space.dof_coordinates(dof).unwrap();
            prop_assert!((x - expected).norm() < 1e-10);
        }
    }
    prop_assert!(used.iter().all(|&u| u));

    let expected_count: usize = (0..=D::dim())
        .map(|dim| space.element().dofs_per_subdomain(dim) * space.subdomain_catalogue(dim).len())
        .sum();
    prop_assert_eq!(space.dof_count(), expected_count);
    Ok(())
}

proptest! {
    #[test]
    fn triangle_mesh_numbering_is_consistent(
        mesh in rectangular_uniform_tri_mesh_strategy(9),
        element in lagrange_element()
    ) {
        let space = FiniteElementSpace::<_, U2, Tri3d2Connectivity>::new(&mesh, element).unwrap();
        assert_consistent_numbering(&space)?;
        prop_assert_eq!(
            space.subdomain_catalogue(0).len() * FiniteElement::<f64, U2>::dofs_per_subdomain(&element, 0),
            if element == Lagrange::P0 { 0 } else { mesh.vertices().len() }
        );
    }

    #[test]
    fn tet_mesh_numbering_is_consistent(mesh in unit_box_tet_mesh_strategy(2), element in lagrange_element()) {
        let space = FiniteElementSpace::new(&mesh, element).unwrap();
        assert_consistent_numbering(&space)?;
    }

    #[test]
    fn boundary_dirichlet_dofs_are_on_the_boundary(mesh in unit_box_tet_mesh_strategy(2)) {
        let space = FiniteElementSpace::new(&mesh, Lagrange::P2).unwrap();
        space.set_dirichlet_boundary(&mesh.boundary_submesh()).unwrap();
        for &dof in space.dirichlet_dofs().iter() {
            let x = space.dof_coordinates(dof).unwrap();
            let distance = x.coords.iter().map(|&c| c.min(1.0 - c)).fold(f64::INFINITY, f64::min);
            prop_assert!(distance.abs() < 1e-12);
        }
        let boundary_vertices = mesh.find_boundary_vertices();
        for v in boundary_vertices {
            prop_assert!(space.is_dirichlet(v));
        }
    }
}
