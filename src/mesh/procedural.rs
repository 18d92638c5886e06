//! Basic procedural mesh generation routines.
use crate::connectivity::{Segment2d1Connectivity, Tet4Connectivity, Tri3d2Connectivity};
use crate::mesh::{SegmentMesh1d, Tet4Mesh, TriangleMesh2d};
use crate::Real;
use nalgebra::{Point1, Point2, Point3, Vector2, Vector3};

/// Uniform mesh of `[a, b]` with `num_cells` segments, vertices ordered left to right.
pub fn create_interval_mesh<T: Real>(a: T, b: T, num_cells: usize) -> SegmentMesh1d<T> {
    if num_cells == 0 {
        return SegmentMesh1d::from_vertices_and_connectivity(Vec::new(), Vec::new());
    }
    let h = (b - a) / T::from_subset(&(num_cells as f64));
    let vertices = (0..=num_cells)
        .map(|i| Point1::new(a + h * T::from_subset(&(i as f64))))
        .collect();
    let cells = (0..num_cells)
        .map(|i| Segment2d1Connectivity([i, i + 1]))
        .collect();
    SegmentMesh1d::from_vertices_and_connectivity(vertices, cells)
}

pub fn create_unit_interval_mesh<T: Real>(num_cells: usize) -> SegmentMesh1d<T> {
    create_interval_mesh(T::zero(), T::one(), num_cells)
}

/// Uniform triangle mesh of the rectangle `[x0, x0 + width] x [y0, y0 + height]`.
///
/// Every grid square is split into two triangles along the diagonal from its lower left to
/// its upper right corner. All triangles are counter-clockwise.
pub fn create_rectangular_uniform_tri_mesh_2d<T: Real>(
    origin: &Vector2<T>,
    extents: &Vector2<T>,
    cells_x: usize,
    cells_y: usize,
) -> TriangleMesh2d<T> {
    if cells_x == 0 || cells_y == 0 {
        return TriangleMesh2d::from_vertices_and_connectivity(Vec::new(), Vec::new());
    }
    let hx = extents.x / T::from_subset(&(cells_x as f64));
    let hy = extents.y / T::from_subset(&(cells_y as f64));
    let to_global_vertex_index = |i: usize, j: usize| (cells_x + 1) * j + i;

    let mut vertices = Vec::with_capacity((cells_x + 1) * (cells_y + 1));
    for j in 0..=cells_y {
        for i in 0..=cells_x {
            let offset = Vector2::new(hx * T::from_subset(&(i as f64)), hy * T::from_subset(&(j as f64)));
            vertices.push(Point2::from(origin + offset));
        }
    }

    let mut cells = Vec::with_capacity(2 * cells_x * cells_y);
    for j in 0..cells_y {
        for i in 0..cells_x {
            let v00 = to_global_vertex_index(i, j);
            let v10 = to_global_vertex_index(i + 1, j);
            let v01 = to_global_vertex_index(i, j + 1);
            let v11 = to_global_vertex_index(i + 1, j + 1);
            cells.push(Tri3d2Connectivity([v00, v10, v11]));
            cells.push(Tri3d2Connectivity([v00, v11, v01]));
        }
    }

    TriangleMesh2d::from_vertices_and_connectivity(vertices, cells)
}

pub fn create_unit_square_uniform_tri_mesh_2d<T: Real>(cells_per_dim: usize) -> TriangleMesh2d<T> {
    create_rectangular_uniform_tri_mesh_2d(
        &Vector2::zeros(),
        &Vector2::new(T::one(), T::one()),
        cells_per_dim,
        cells_per_dim,
    )
}

/// Uniform tetrahedral mesh of the unit cube with `cells_per_dim^3` cubes.
///
/// Every cube is split into six tetrahedra sharing the main diagonal (Kuhn subdivision),
/// which gives a conforming mesh because all cubes are split the same way.
pub fn create_unit_box_uniform_tet_mesh_3d<T: Real>(cells_per_dim: usize) -> Tet4Mesh<T> {
    let n = cells_per_dim;
    if n == 0 {
        return Tet4Mesh::from_vertices_and_connectivity(Vec::new(), Vec::new());
    }
    let h = T::one() / T::from_subset(&(n as f64));
    let to_global_vertex_index = |i: usize, j: usize, k: usize| (n + 1) * (n + 1) * k + (n + 1) * j + i;

    let mut vertices = Vec::with_capacity((n + 1).pow(3));
    for k in 0..=n {
        for j in 0..=n {
            for i in 0..=n {
                let coords = Vector3::new(
                    T::from_subset(&(i as f64)),
                    T::from_subset(&(j as f64)),
                    T::from_subset(&(k as f64)),
                );
                vertices.push(Point3::from(coords * h));
            }
        }
    }

    // Each permutation of the axes gives a monotone path from corner (0,0,0) to (1,1,1)
    const AXIS_PERMUTATIONS: [[usize; 3]; 6] = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];

    let mut cells = Vec::with_capacity(6 * n * n * n);
    for k in 0..n {
        for j in 0..n {
            for i in 0..n {
                for perm in AXIS_PERMUTATIONS {
                    let mut corner = [i, j, k];
                    let mut tet = [to_global_vertex_index(i, j, k); 4];
                    for (step, &axis) in perm.iter().enumerate() {
                        corner[axis] += 1;
                        tet[step + 1] = to_global_vertex_index(corner[0], corner[1], corner[2]);
                    }
                    // Odd permutations produce negatively oriented tetrahedra
                    if is_odd_permutation(&perm) {
                        tet.swap(2, 3);
                    }
                    cells.push(Tet4Connectivity(tet));
                }
            }
        }
    }

    Tet4Mesh::from_vertices_and_connectivity(vertices, cells)
}

fn is_odd_permutation(perm: &[usize; 3]) -> bool {
    let inversions = (0..3)
        .flat_map(|a| (a + 1..3).map(move |b| (a, b)))
        .filter(|&(a, b)| perm[a] > perm[b])
        .count();
    inversions % 2 == 1
}
