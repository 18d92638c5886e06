//! Single-field finite element spaces.
//!
//! A [`FiniteElementSpace`] numbers the degrees of freedom of one field on a mesh. Dofs
//! attached to a geometric entity shared by several cells (a vertex, an edge, a face) receive
//! the same global index from every adjacent cell.
use crate::allocators::DimAllocator;
use crate::connectivity::{simplex_subdomain_count, CellConnectivity, Connectivity, SubdomainId};
use crate::element::FiniteElement;
use crate::error::SpaceError;
use crate::mesh::{Mesh, SubMesh};
use crate::{Real, SmallDim};
use log::debug;
use nalgebra::{DefaultAllocator, OPoint};
use std::cell::{Ref, RefCell};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

mod function;

pub use function::DiscreteFunction;

/// Prescribed value on Dirichlet dofs as a function of the physical coordinates.
pub type BoundaryValueFn<T, D> = Box<dyn Fn(&OPoint<T, D>) -> T>;

/// The global dof numbering of one field on a mesh, together with its Dirichlet dofs.
///
/// The numbering is fixed at construction. The Dirichlet set and the boundary value function
/// may be changed at any time through a shared reference, so that forms assembled over the
/// space pick up the current boundary conditions.
pub struct FiniteElementSpace<'a, T, D, C>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    mesh: &'a Mesh<T, D, C>,
    element: Arc<dyn FiniteElement<T, D>>,
    dofs_per_cell: usize,
    /// Global dof of local dof `i` of cell `k` at `k * dofs_per_cell + i`.
    dof_map: Vec<usize>,
    /// First (cell, local index) pair that maps to each global dof.
    dof_to_local: Vec<(usize, usize)>,
    dof_count: usize,
    /// Sorted, deduplicated entities per subdomain dimension (empty for dimensions without dofs).
    catalogues: Vec<Vec<SubdomainId>>,
    /// First global dof attached to each subdomain dimension.
    subdomain_offsets: Vec<usize>,
    dirichlet_dofs: RefCell<BTreeSet<usize>>,
    boundary_value: RefCell<BoundaryValueFn<T, D>>,
}

impl<'a, T, D, C> FiniteElementSpace<'a, T, D, C>
where
    T: Real,
    D: SmallDim,
    C: CellConnectivity<T, D>,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn new<E>(mesh: &'a Mesh<T, D, C>, element: E) -> Result<Self, SpaceError>
    where
        E: FiniteElement<T, D> + 'static,
    {
        Self::from_shared(mesh, Arc::new(element))
    }

    /// Constructs a space from an element shared with other spaces.
    pub fn from_shared(mesh: &'a Mesh<T, D, C>, element: Arc<dyn FiniteElement<T, D>>) -> Result<Self, SpaceError> {
        let cell_dim = D::dim();
        let num_vertices = cell_dim + 1;
        let n = element.num_dofs();

        for (cell_index, cell) in mesh.connectivity().iter().enumerate() {
            let actual = cell.vertex_indices().len();
            if actual != num_vertices {
                return Err(SpaceError::InvalidCellVertexCount {
                    cell: cell_index,
                    expected: num_vertices,
                    actual,
                });
            }
        }

        let counted: usize = (0..=cell_dim)
            .map(|dim| element.dofs_per_subdomain(dim) * simplex_subdomain_count(num_vertices, dim))
            .sum();
        if counted != n {
            return Err(SpaceError::InconsistentElement {
                element: element.name().to_string(),
                declared: n,
                counted,
            });
        }

        let num_cells = mesh.num_cells();
        let mut dof_map = vec![usize::MAX; num_cells * n];
        let mut catalogues = vec![Vec::new(); cell_dim + 1];
        let mut subdomain_offsets = vec![0; cell_dim + 1];
        let mut global_offset = 0;
        let mut local_offset = 0;

        for dim in 0..=cell_dim {
            subdomain_offsets[dim] = global_offset;
            let m = element.dofs_per_subdomain(dim);
            if m == 0 {
                continue;
            }

            let catalogue = build_catalogue(mesh.connectivity(), dim);
            for (cell_index, cell) in mesh.connectivity().iter().enumerate() {
                for (local_subdomain, id) in cell.subdomains(dim).iter().enumerate() {
                    let entry = lookup(&catalogue, id)?;
                    for i in 0..m {
                        dof_map[cell_index * n + local_offset + local_subdomain * m + i] = global_offset + entry * m + i;
                    }
                }
            }

            debug!(
                "Numbered {} dofs on {} subdomains of dimension {}",
                m * catalogue.len(),
                catalogue.len(),
                dim
            );
            global_offset += m * catalogue.len();
            local_offset += m * simplex_subdomain_count(num_vertices, dim);
            catalogues[dim] = catalogue;
        }

        let dof_count = global_offset;
        let mut dof_to_local = vec![(usize::MAX, usize::MAX); dof_count];
        for (index, &dof) in dof_map.iter().enumerate().rev() {
            dof_to_local[dof] = (index / n, index % n);
        }

        debug!(
            "Constructed {} space with {} dofs on {} cells",
            element.name(),
            dof_count,
            num_cells
        );

        Ok(Self {
            mesh,
            element,
            dofs_per_cell: n,
            dof_map,
            dof_to_local,
            dof_count,
            catalogues,
            subdomain_offsets,
            dirichlet_dofs: RefCell::new(BTreeSet::new()),
            boundary_value: RefCell::new(zero_boundary_value()),
        })
    }

    /// Physical coordinates of the reference node of a global dof.
    ///
    /// The node is resolved through the first cell that contains the dof.
    pub fn dof_coordinates(&self, dof: usize) -> Result<OPoint<T, D>, SpaceError> {
        let (cell_index, local_index) = self.dof_cell_and_local_index(dof)?;
        let reference = self.element.reference_node(local_index)?;
        Ok(self.mesh.map_reference_coords(cell_index, &reference))
    }
}

impl<'a, T, D, C> FiniteElementSpace<'a, T, D, C>
where
    T: Real,
    D: SmallDim,
    C: Connectivity,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn mesh(&self) -> &'a Mesh<T, D, C> {
        self.mesh
    }

    pub fn element(&self) -> &dyn FiniteElement<T, D> {
        self.element.as_ref()
    }

    pub fn num_cells(&self) -> usize {
        self.mesh.num_cells()
    }

    pub fn dofs_per_cell(&self) -> usize {
        self.dofs_per_cell
    }

    pub fn dof_count(&self) -> usize {
        self.dof_count
    }

    /// The global dof of local dof `local_index` of cell `cell_index`.
    ///
    /// # Panics
    ///
    /// Panics if the cell or local index is out of range.
    pub fn dof(&self, cell_index: usize, local_index: usize) -> usize {
        assert!(
            local_index < self.dofs_per_cell,
            "Local index {} is out of range for element {} with {} dofs.",
            local_index,
            self.element.name(),
            self.dofs_per_cell
        );
        self.dof_map[cell_index * self.dofs_per_cell + local_index]
    }

    /// The global dofs of a cell, in local order.
    pub fn cell_dofs(&self, cell_index: usize) -> &[usize] {
        let n = self.dofs_per_cell;
        &self.dof_map[cell_index * n..(cell_index + 1) * n]
    }

    /// Returns a cell and local index that map to the given global dof.
    pub fn dof_cell_and_local_index(&self, dof: usize) -> Result<(usize, usize), SpaceError> {
        self.dof_to_local
            .get(dof)
            .copied()
            .ok_or(SpaceError::DofOutOfRange {
                dof,
                count: self.dof_count,
            })
    }

    /// The sorted catalogue of distinct entities of dimension `dim` that carry dofs.
    ///
    /// Empty if the element attaches no dofs to that dimension.
    pub fn subdomain_catalogue(&self, dim: usize) -> &[SubdomainId] {
        self.catalogues.get(dim).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn dirichlet_dofs(&self) -> Ref<'_, BTreeSet<usize>> {
        self.dirichlet_dofs.borrow()
    }

    pub fn is_dirichlet(&self, dof: usize) -> bool {
        self.dirichlet_dofs.borrow().contains(&dof)
    }

    pub fn boundary_value(&self, x: &OPoint<T, D>) -> T {
        let boundary_value = self.boundary_value.borrow();
        boundary_value(x)
    }

    pub fn set_boundary_value(&self, f: impl Fn(&OPoint<T, D>) -> T + 'static) {
        *self.boundary_value.borrow_mut() = Box::new(f);
    }

    /// Replaces the Dirichlet set by the dofs on the entities of the given sub-mesh.
    ///
    /// The set is left untouched if an entity of the sub-mesh is not part of this space's mesh.
    pub fn set_dirichlet_boundary<F: Connectivity>(&self, boundary: &SubMesh<F>) -> Result<(), SpaceError> {
        let dofs = self.collect_subdomain_dofs(boundary)?;
        debug!("Marked {} Dirichlet dofs", dofs.len());
        *self.dirichlet_dofs.borrow_mut() = dofs;
        Ok(())
    }

    /// Adds the dofs on the entities of the given sub-mesh to the Dirichlet set.
    pub fn add_dirichlet_boundary<F: Connectivity>(&self, boundary: &SubMesh<F>) -> Result<(), SpaceError> {
        let dofs = self.collect_subdomain_dofs(boundary)?;
        let mut dirichlet_dofs = self.dirichlet_dofs.borrow_mut();
        dirichlet_dofs.extend(dofs);
        debug!("Dirichlet set now has {} dofs", dirichlet_dofs.len());
        Ok(())
    }

    pub fn set_dirichlet_boundary_condition<F: Connectivity>(
        &self,
        boundary: &SubMesh<F>,
        f: impl Fn(&OPoint<T, D>) -> T + 'static,
    ) -> Result<(), SpaceError> {
        self.set_dirichlet_boundary(boundary)?;
        self.set_boundary_value(f);
        Ok(())
    }

    pub fn clear_dirichlet_boundary(&self) {
        self.dirichlet_dofs.borrow_mut().clear();
    }

    /// Global dofs attached to the entities of a sub-mesh, resolved against the catalogues
    /// of the full mesh.
    fn collect_subdomain_dofs<F: Connectivity>(&self, submesh: &SubMesh<F>) -> Result<BTreeSet<usize>, SpaceError> {
        let mut dofs = BTreeSet::new();
        for dim in 0..=D::dim() {
            let m = self.element.dofs_per_subdomain(dim);
            if m == 0 {
                continue;
            }
            let sub_catalogue = build_catalogue(submesh.connectivity(), dim);
            let offset = self.subdomain_offsets[dim];
            for id in &sub_catalogue {
                let entry = lookup(&self.catalogues[dim], id)?;
                dofs.extend((0..m).map(|i| offset + entry * m + i));
            }
        }
        Ok(dofs)
    }
}

impl<'a, T, D, C> fmt::Debug for FiniteElementSpace<'a, T, D, C>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FiniteElementSpace")
            .field("element", &self.element)
            .field("dof_count", &self.dof_count)
            .field("num_cells", &self.mesh.num_cells())
            .field("dirichlet_dofs", &self.dirichlet_dofs.borrow().len())
            .finish()
    }
}

fn zero_boundary_value<T, D>() -> BoundaryValueFn<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    Box::new(|_: &OPoint<T, D>| T::zero())
}

/// Sorted, deduplicated entities of dimension `dim` of the given cells.
///
/// Cells with fewer than `dim + 1` vertices contribute nothing.
fn build_catalogue<C: Connectivity>(cells: &[C], dim: usize) -> Vec<SubdomainId> {
    let mut catalogue: Vec<SubdomainId> = cells
        .iter()
        .filter(|cell| cell.vertex_indices().len() > dim)
        .flat_map(|cell| cell.subdomains(dim))
        .collect();
    catalogue.sort_unstable();
    catalogue.dedup();
    catalogue
}

fn lookup(catalogue: &[SubdomainId], id: &SubdomainId) -> Result<usize, SpaceError> {
    catalogue
        .binary_search(id)
        .map_err(|_| SpaceError::MissingSubdomain {
            dim: id.dim(),
            vertices: id.vertices().to_vec(),
        })
}
