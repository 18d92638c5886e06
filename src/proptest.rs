use crate::element::Lagrange;
use crate::mesh::procedural::{
    create_interval_mesh, create_rectangular_uniform_tri_mesh_2d, create_unit_box_uniform_tet_mesh_3d,
};
use crate::mesh::{SegmentMesh1d, Tet4Mesh, TriangleMesh2d};
use ::proptest::prelude::*;
use nalgebra::{Point2, Vector2};
use std::cmp::max;

pub fn point2() -> impl Strategy<Value = Point2<f64>> {
    // Keep coordinates small so that meshes built from them stay well conditioned
    let range = -10.0..10.0;
    [range.clone(), range.clone()].prop_map(|[x, y]| Point2::new(x, y))
}

pub fn lagrange_element() -> impl Strategy<Value = Lagrange> {
    prop_oneof![
        Just(Lagrange::P0),
        Just(Lagrange::P1),
        Just(Lagrange::P1Bubble),
        Just(Lagrange::P2)
    ]
}

/// Interval meshes on `[a, a + length]` with at most `max_cells` cells.
pub fn interval_mesh_strategy(max_cells: usize) -> impl Strategy<Value = SegmentMesh1d<f64>> {
    (1..=max(1, max_cells), -5.0..5.0, 0.1..10.0)
        .prop_map(|(num_cells, a, length)| create_interval_mesh(a, a + length, num_cells))
}

// Returns a strategy in which each value is a pair (cells_x, cells_y) of positive cell counts
// such that cells_x * cells_y <= max_cells
fn rectangular_cell_distribution_strategy(max_cells: usize) -> impl Strategy<Value = (usize, usize)> {
    let max_cells = max(1, max_cells);
    (1..=max_cells).prop_flat_map(move |cells_x| (Just(cells_x), 1..=max(1, max_cells / cells_x)))
}

/// Uniform triangle meshes of rectangles with at most `max_cells` grid squares (two triangles
/// per square).
pub fn rectangular_uniform_tri_mesh_strategy(max_cells: usize) -> impl Strategy<Value = TriangleMesh2d<f64>> {
    let extent = 0.5..5.0;
    (
        rectangular_cell_distribution_strategy(max_cells),
        point2(),
        [extent.clone(), extent],
    )
        .prop_map(|((cells_x, cells_y), origin, [width, height])| {
            create_rectangular_uniform_tri_mesh_2d(&origin.coords, &Vector2::new(width, height), cells_x, cells_y)
        })
}

pub fn unit_box_tet_mesh_strategy(max_cells_per_dim: usize) -> impl Strategy<Value = Tet4Mesh<f64>> {
    (1..=max(1, max_cells_per_dim)).prop_map(create_unit_box_uniform_tet_mesh_3d)
}
