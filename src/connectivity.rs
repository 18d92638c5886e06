//! Cell connectivity and simplex subdomain topology.
use crate::allocators::DimAllocator;
use crate::{Real, SmallDim};
use itertools::Itertools;
use nalgebra::{DefaultAllocator, OMatrix, OPoint, U1, U2, U3};
use serde::{Deserialize, Serialize};

/// The largest number of vertices of a supported cell (a tetrahedron).
pub const MAX_CELL_VERTICES: usize = 4;

/// Canonical identity of a subdomain entity (vertex, edge, face or cell interior).
///
/// The identity is the sorted tuple of global vertex indices of the sub-simplex, so two
/// cells sharing an entity produce equal identities regardless of their local vertex order.
/// The total order is the one used by the subdomain catalogues of a finite element space.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubdomainId {
    vertices: [usize; MAX_CELL_VERTICES],
    len: usize,
}

impl SubdomainId {
    /// Constructs the identity of the sub-simplex spanned by the given global vertices.
    ///
    /// # Panics
    ///
    /// Panics if more than [`MAX_CELL_VERTICES`] vertices are given.
    pub fn from_vertices(global_vertices: &[usize]) -> Self {
        assert!(
            global_vertices.len() <= MAX_CELL_VERTICES,
            "A subdomain can have at most {} vertices.",
            MAX_CELL_VERTICES
        );
        let mut vertices = [usize::MAX; MAX_CELL_VERTICES];
        vertices[..global_vertices.len()].copy_from_slice(global_vertices);
        vertices[..global_vertices.len()].sort_unstable();
        Self {
            vertices,
            len: global_vertices.len(),
        }
    }

    /// Constructs the identity of a sub-simplex given by local vertex indices into a cell.
    pub fn from_local(cell_vertices: &[usize], local_vertices: &[usize]) -> Self {
        let mut global = [usize::MAX; MAX_CELL_VERTICES];
        for (slot, &local) in global.iter_mut().zip(local_vertices) {
            *slot = cell_vertices[local];
        }
        Self::from_vertices(&global[..local_vertices.len()])
    }

    /// The sorted global vertex indices of the entity.
    pub fn vertices(&self) -> &[usize] {
        &self.vertices[..self.len]
    }

    /// The topological dimension of the entity.
    pub fn dim(&self) -> usize {
        self.len.saturating_sub(1)
    }
}

/// Local vertex lists of all sub-simplices of dimension `dim` of a simplex with
/// `num_vertices` vertices, in lexicographic order.
///
/// The order defines the local layout of degrees of freedom: sub-simplex `j` of
/// dimension `dim` owns the `j`-th block of dofs attached to that dimension.
pub fn simplex_subdomains(num_vertices: usize, dim: usize) -> Vec<Vec<usize>> {
    (0..num_vertices).combinations(dim + 1).collect()
}

/// Number of sub-simplices of dimension `dim` of a simplex with `num_vertices` vertices.
pub fn simplex_subdomain_count(num_vertices: usize, dim: usize) -> usize {
    let k = dim + 1;
    if k > num_vertices {
        0
    } else {
        (0..k).fold(1, |acc, i| acc * (num_vertices - i) / (i + 1))
    }
}

pub trait Connectivity: Clone {
    type FaceConnectivity: Connectivity;

    fn num_faces(&self) -> usize;
    fn get_face_connectivity(&self, index: usize) -> Option<Self::FaceConnectivity>;

    fn vertex_indices(&self) -> &[usize];

    fn subdomain_count(&self, dim: usize) -> usize {
        simplex_subdomain_count(self.vertex_indices().len(), dim)
    }

    /// All sub-simplices of dimension `dim`, in local lexicographic order.
    fn subdomains(&self, dim: usize) -> Vec<SubdomainId> {
        let vertices = self.vertex_indices();
        simplex_subdomains(vertices.len(), dim)
            .iter()
            .map(|local| SubdomainId::from_local(vertices, local))
            .collect()
    }
}

impl Connectivity for () {
    type FaceConnectivity = ();

    fn num_faces(&self) -> usize {
        0
    }

    fn get_face_connectivity(&self, _index: usize) -> Option<Self::FaceConnectivity> {
        None
    }

    fn vertex_indices(&self) -> &[usize] {
        &[]
    }
}

pub trait ConnectivityMut: Connectivity {
    fn vertex_indices_mut(&mut self) -> &mut [usize];
}

/// Geometric queries for an affine simplex cell embedded in `D` dimensions.
///
/// The reference cell is the unit simplex with vertices at the origin and the unit
/// vectors, and the map from the reference cell is `x = v_0 + J ξ` with the columns of `J`
/// given by `v_{i+1} - v_0`.
pub trait CellConnectivity<T, D>: Connectivity
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn reference_volume() -> T {
        let factorial: T = (1..=D::dim()).fold(T::one(), |acc, k| acc * T::from_subset(&(k as f64)));
        T::one() / factorial
    }

    fn jacobian(&self, vertices: &[OPoint<T, D>]) -> OMatrix<T, D, D> {
        let v = self.vertex_indices();
        let v0 = &vertices[v[0]];
        OMatrix::<T, D, D>::from_fn(|r, c| vertices[v[c + 1]][r] - v0[r])
    }

    fn map_reference_coords(&self, vertices: &[OPoint<T, D>], reference_coords: &OPoint<T, D>) -> OPoint<T, D> {
        let v0 = &vertices[self.vertex_indices()[0]];
        v0 + self.jacobian(vertices) * &reference_coords.coords
    }

    fn volume(&self, vertices: &[OPoint<T, D>]) -> T {
        self.jacobian(vertices).determinant().abs() * Self::reference_volume()
    }
}

/// A single vertex, the boundary entity of a one-dimensional mesh.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VertexConnectivity(pub [usize; 1]);

impl Connectivity for VertexConnectivity {
    type FaceConnectivity = ();

    fn num_faces(&self) -> usize {
        0
    }

    fn get_face_connectivity(&self, _index: usize) -> Option<Self::FaceConnectivity> {
        None
    }

    fn vertex_indices(&self) -> &[usize] {
        &self.0
    }
}

impl ConnectivityMut for VertexConnectivity {
    fn vertex_indices_mut(&mut self) -> &mut [usize] {
        &mut self.0
    }
}

/// A two-node segment in one dimension.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment2d1Connectivity(pub [usize; 2]);

impl Connectivity for Segment2d1Connectivity {
    type FaceConnectivity = VertexConnectivity;

    fn num_faces(&self) -> usize {
        2
    }

    fn get_face_connectivity(&self, index: usize) -> Option<Self::FaceConnectivity> {
        self.0.get(index).map(|&v| VertexConnectivity([v]))
    }

    fn vertex_indices(&self) -> &[usize] {
        &self.0
    }
}

impl ConnectivityMut for Segment2d1Connectivity {
    fn vertex_indices_mut(&mut self) -> &mut [usize] {
        &mut self.0
    }
}

impl<T: Real> CellConnectivity<T, U1> for Segment2d1Connectivity {}

/// A two-node segment in two dimensions, the face of a triangle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment2d2Connectivity(pub [usize; 2]);

impl Connectivity for Segment2d2Connectivity {
    type FaceConnectivity = VertexConnectivity;

    fn num_faces(&self) -> usize {
        2
    }

    fn get_face_connectivity(&self, index: usize) -> Option<Self::FaceConnectivity> {
        self.0.get(index).map(|&v| VertexConnectivity([v]))
    }

    fn vertex_indices(&self) -> &[usize] {
        &self.0
    }
}

impl ConnectivityMut for Segment2d2Connectivity {
    fn vertex_indices_mut(&mut self) -> &mut [usize] {
        &mut self.0
    }
}

/// A three-node triangle in two dimensions.
///
/// ```text
/// 2
/// | \
/// |   \
/// 0 --- 1
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tri3d2Connectivity(pub [usize; 3]);

impl Connectivity for Tri3d2Connectivity {
    type FaceConnectivity = Segment2d2Connectivity;

    fn num_faces(&self) -> usize {
        3
    }

    fn get_face_connectivity(&self, index: usize) -> Option<Self::FaceConnectivity> {
        let idx = &self.0;
        if index < 3 {
            Some(Segment2d2Connectivity([idx[index], idx[(index + 1) % 3]]))
        } else {
            None
        }
    }

    fn vertex_indices(&self) -> &[usize] {
        &self.0
    }
}

impl ConnectivityMut for Tri3d2Connectivity {
    fn vertex_indices_mut(&mut self) -> &mut [usize] {
        &mut self.0
    }
}

impl<T: Real> CellConnectivity<T, U2> for Tri3d2Connectivity {}

/// A three-node triangle in three dimensions, the face of a tetrahedron.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tri3d3Connectivity(pub [usize; 3]);

impl Connectivity for Tri3d3Connectivity {
    type FaceConnectivity = Segment2d2Connectivity;

    fn num_faces(&self) -> usize {
        3
    }

    fn get_face_connectivity(&self, index: usize) -> Option<Self::FaceConnectivity> {
        let idx = &self.0;
        if index < 3 {
            Some(Segment2d2Connectivity([idx[index], idx[(index + 1) % 3]]))
        } else {
            None
        }
    }

    fn vertex_indices(&self) -> &[usize] {
        &self.0
    }
}

impl ConnectivityMut for Tri3d3Connectivity {
    fn vertex_indices_mut(&mut self) -> &mut [usize] {
        &mut self.0
    }
}

/// A four-node tetrahedron.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tet4Connectivity(pub [usize; 4]);

impl Connectivity for Tet4Connectivity {
    type FaceConnectivity = Tri3d3Connectivity;

    fn num_faces(&self) -> usize {
        4
    }

    fn get_face_connectivity(&self, index: usize) -> Option<Self::FaceConnectivity> {
        let v = &self.0;
        // Outward normals for positively oriented tetrahedra
        match index {
            0 => Some(Tri3d3Connectivity([v[0], v[2], v[1]])),
            1 => Some(Tri3d3Connectivity([v[0], v[1], v[3]])),
            2 => Some(Tri3d3Connectivity([v[1], v[2], v[3]])),
            3 => Some(Tri3d3Connectivity([v[0], v[3], v[2]])),
            _ => None,
        }
    }

    fn vertex_indices(&self) -> &[usize] {
        &self.0
    }
}

impl ConnectivityMut for Tet4Connectivity {
    fn vertex_indices_mut(&mut self) -> &mut [usize] {
        &mut self.0
    }
}

impl<T: Real> CellConnectivity<T, U3> for Tet4Connectivity {}
