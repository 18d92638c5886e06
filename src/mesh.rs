use crate::allocators::DimAllocator;
use crate::connectivity::{
    CellConnectivity, Connectivity, ConnectivityMut, Segment2d1Connectivity, Tet4Connectivity, Tri3d2Connectivity,
};
use crate::{Real, SmallDim};
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, DimName, OMatrix, OPoint, Scalar, U1, U2, U3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod procedural;

/// Index-based data structure for conforming meshes (i.e. no hanging nodes).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>"))]
pub struct Mesh<T: Scalar, D, Connectivity>
where
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    #[serde(bound(
        serialize = "<DefaultAllocator as Allocator<T, D>>::Buffer: Serialize",
        deserialize = "<DefaultAllocator as Allocator<T, D>>::Buffer: Deserialize<'de>"
    ))]
    vertices: Vec<OPoint<T, D>>,
    #[serde(bound(
        serialize = "Connectivity: Serialize",
        deserialize = "Connectivity: Deserialize<'de>"
    ))]
    connectivity: Vec<Connectivity>,
}

pub type Mesh1d<T, Connectivity> = Mesh<T, U1, Connectivity>;
pub type Mesh2d<T, Connectivity> = Mesh<T, U2, Connectivity>;
pub type Mesh3d<T, Connectivity> = Mesh<T, U3, Connectivity>;

pub type SegmentMesh1d<T> = Mesh1d<T, Segment2d1Connectivity>;
pub type TriangleMesh2d<T> = Mesh2d<T, Tri3d2Connectivity>;
pub type Tet4Mesh<T> = Mesh3d<T, Tet4Connectivity>;

impl<T, D, Connectivity> Mesh<T, D, Connectivity>
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    pub fn vertices(&self) -> &[OPoint<T, D>] {
        &self.vertices
    }

    pub fn connectivity(&self) -> &[Connectivity] {
        &self.connectivity
    }

    pub fn num_cells(&self) -> usize {
        self.connectivity.len()
    }

    /// Construct a mesh from vertices and connectivity.
    ///
    /// The connectivity must only reference vertices in bounds. Geometric queries panic
    /// on out-of-bounds indices.
    pub fn from_vertices_and_connectivity(vertices: Vec<OPoint<T, D>>, connectivity: Vec<Connectivity>) -> Self {
        Self { vertices, connectivity }
    }
}

impl<T, D, C> Mesh<T, D, C>
where
    T: Scalar,
    D: DimName,
    C: Connectivity,
    DefaultAllocator: Allocator<T, D>,
{
    /// Finds the faces that belong to exactly one cell.
    ///
    /// Each entry holds the face connectivity, the index of the owning cell and the local
    /// index of the face in that cell. Faces are ordered by their sorted vertex indices.
    pub fn find_boundary_faces(&self) -> Vec<(C::FaceConnectivity, usize, usize)> {
        let mut face_info = Vec::new();
        // Count occurrences of faces with identical (sorted) vertex sets. A BTreeMap keeps the
        // result deterministic.
        let mut face_counts = BTreeMap::new();

        for (cell_idx, cell_conn) in self.connectivity.iter().enumerate() {
            for local_idx in 0..cell_conn.num_faces() {
                if let Some(face_conn) = cell_conn.get_face_connectivity(local_idx) {
                    let mut key = face_conn.vertex_indices().to_vec();
                    key.sort_unstable();
                    let info_idx = face_info.len();
                    face_info.push((face_conn, cell_idx, local_idx));
                    face_counts
                        .entry(key)
                        .and_modify(|(_, count)| *count += 1)
                        .or_insert((info_idx, 1));
                }
            }
        }

        face_counts
            .into_values()
            .filter(|&(_, count)| count == 1)
            .map(|(i, _)| face_info[i].clone())
            .collect()
    }

    /// Returns a sorted list of vertices that are on the boundary.
    pub fn find_boundary_vertices(&self) -> Vec<usize> {
        let mut indices = Vec::new();
        for (connectivity, _, _) in self.find_boundary_faces() {
            indices.extend_from_slice(connectivity.vertex_indices());
        }
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    /// The sub-mesh of boundary faces, each remembering the cell it bounds.
    pub fn boundary_submesh(&self) -> SubMesh<C::FaceConnectivity> {
        let (connectivity, parent_cells): (Vec<_>, Vec<_>) = self
            .find_boundary_faces()
            .into_iter()
            .map(|(face, cell, _)| (face, cell))
            .unzip();
        SubMesh::from_parts(connectivity, parent_cells)
    }

    /// The sub-mesh made of the given cells.
    ///
    /// # Panics
    ///
    /// Panics if a cell index is out of bounds.
    pub fn submesh_from_cells(&self, cells: &[usize]) -> SubMesh<C> {
        let connectivity = cells.iter().map(|&k| self.connectivity[k].clone()).collect();
        SubMesh::from_parts(connectivity, cells.to_vec())
    }
}

impl<T, D, C> Mesh<T, D, C>
where
    T: Real,
    D: SmallDim,
    C: CellConnectivity<T, D>,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn cell_jacobian(&self, cell_index: usize) -> OMatrix<T, D, D> {
        self.connectivity[cell_index].jacobian(&self.vertices)
    }

    /// Returns `J^{-T}`, which maps reference gradients to physical gradients.
    ///
    /// Returns `None` for degenerate cells.
    pub fn cell_inverse_jacobian_transpose(&self, cell_index: usize) -> Option<OMatrix<T, D, D>> {
        self.cell_jacobian(cell_index)
            .try_inverse()
            .map(|j_inv| j_inv.transpose())
    }

    pub fn cell_volume(&self, cell_index: usize) -> T {
        self.connectivity[cell_index].volume(&self.vertices)
    }

    pub fn map_reference_coords(&self, cell_index: usize, reference_coords: &OPoint<T, D>) -> OPoint<T, D> {
        self.connectivity[cell_index].map_reference_coords(&self.vertices, reference_coords)
    }
}

/// A subset of cells of a parent mesh.
///
/// Sub-cells are expressed in the vertex indices of the parent mesh, and each sub-cell
/// remembers the parent cell it belongs to (for boundary faces, the cell they bound).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubMesh<C> {
    connectivity: Vec<C>,
    parent_cells: Vec<usize>,
}

impl<C> SubMesh<C> {
    /// # Panics
    ///
    /// Panics if the number of cells and parent cells differ.
    pub fn from_parts(connectivity: Vec<C>, parent_cells: Vec<usize>) -> Self {
        assert_eq!(
            connectivity.len(),
            parent_cells.len(),
            "Every sub-cell must have exactly one parent cell."
        );
        Self {
            connectivity,
            parent_cells,
        }
    }

    pub fn connectivity(&self) -> &[C] {
        &self.connectivity
    }

    pub fn parent_cells(&self) -> &[usize] {
        &self.parent_cells
    }

    pub fn parent_cell(&self, cell_index: usize) -> usize {
        self.parent_cells[cell_index]
    }

    pub fn num_cells(&self) -> usize {
        self.connectivity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectivity.is_empty()
    }
}

impl<C: ConnectivityMut> SubMesh<C> {
    /// Builds a standalone mesh over the sub-cells.
    ///
    /// Vertices are renumbered compactly in increasing order of their parent index, and
    /// the local vertex order of each cell is preserved, so local dof `i` of sub-cell `k`
    /// corresponds to local dof `i` of its parent cell.
    pub fn to_mesh<T, D, P>(&self, parent: &Mesh<T, D, P>) -> Mesh<T, D, C>
    where
        T: Scalar,
        D: DimName,
        DefaultAllocator: Allocator<T, D>,
    {
        let mut used: Vec<usize> = self
            .connectivity
            .iter()
            .flat_map(|conn| conn.vertex_indices().iter().copied())
            .collect();
        used.sort_unstable();
        used.dedup();

        let vertices = used.iter().map(|&v| parent.vertices()[v].clone()).collect();
        let connectivity = self
            .connectivity
            .iter()
            .map(|conn| {
                let mut new_conn = conn.clone();
                for v in new_conn.vertex_indices_mut() {
                    // Present by construction of `used`
                    *v = used.binary_search(v).unwrap_or(usize::MAX);
                }
                new_conn
            })
            .collect();
        Mesh::from_vertices_and_connectivity(vertices, connectivity)
    }
}

/// A set of cells of a mesh to integrate over.
///
/// Cells are enumerated locally, and each local cell maps to a cell of the mesh the
/// finite element spaces were built on.
pub trait IntegrationDomain<C> {
    fn num_cells(&self) -> usize;
    fn parent_cell(&self, cell_index: usize) -> usize;
}

impl<T, D, C> IntegrationDomain<C> for Mesh<T, D, C>
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    fn num_cells(&self) -> usize {
        self.connectivity.len()
    }

    fn parent_cell(&self, cell_index: usize) -> usize {
        cell_index
    }
}

impl<C> IntegrationDomain<C> for SubMesh<C> {
    fn num_cells(&self) -> usize {
        self.connectivity.len()
    }

    fn parent_cell(&self, cell_index: usize) -> usize {
        self.parent_cells[cell_index]
    }
}
