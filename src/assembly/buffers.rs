use crate::allocators::DimAllocator;
use crate::assembly::form::{FormRequirements, LinearIntegrand, QuadraturePoint, ShapeValue};
use crate::composite::CompositeSpace;
use crate::connectivity::{CellConnectivity, Connectivity};
use crate::error::AssemblyError;
use crate::mesh::{IntegrationDomain, Mesh};
use crate::quadrature::QuadratureTable;
use crate::{Real, SmallDim};
use nalgebra::{DefaultAllocator, OMatrix, OPoint, OVector};

/// Reference basis values and gradients of one component, tabulated at a point set.
#[derive(Debug)]
struct ComponentBasis<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    num_dofs: usize,
    /// Point set the reference tables belong to, and whether gradients were tabulated.
    tabulated: Option<(usize, bool)>,
    values: Vec<T>,
    reference_gradients: Vec<OVector<T, D>>,
    /// Physical gradients for the current cell, empty unless gradients are required.
    gradients: Vec<OVector<T, D>>,
}

/// Basis function tables for all components of a composite space.
///
/// Reference values depend only on the point set, so they are recomputed only when the
/// point set changes between consecutive cells. Physical gradients are recomputed per cell.
#[derive(Debug)]
pub(crate) struct BasisBuffer<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    components: Vec<ComponentBasis<T, D>>,
}

impl<T, D> BasisBuffer<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn for_space<C: Connectivity>(space: &CompositeSpace<'_, T, D, C>) -> Self {
        let components = space
            .components()
            .iter()
            .map(|component| ComponentBasis {
                num_dofs: component.dofs_per_cell(),
                tabulated: None,
                values: Vec::new(),
                reference_gradients: Vec::new(),
                gradients: Vec::new(),
            })
            .collect();
        Self { components }
    }

    pub fn num_components(&self) -> usize {
        self.components.len()
    }

    pub fn num_dofs(&self, component: usize) -> usize {
        self.components[component].num_dofs
    }

    /// Prepares the tables of all components for a cell.
    ///
    /// `inverse_jacobian_transpose` must be given when gradients are required.
    pub fn prepare_cell<C: Connectivity>(
        &mut self,
        space: &CompositeSpace<'_, T, D, C>,
        set_index: usize,
        points: &[OPoint<T, D>],
        inverse_jacobian_transpose: Option<&OMatrix<T, D, D>>,
    ) {
        let with_gradients = inverse_jacobian_transpose.is_some();
        for (basis, component) in self.components.iter_mut().zip(space.components()) {
            let n = basis.num_dofs;
            if basis.tabulated != Some((set_index, with_gradients)) {
                let element = component.element();
                basis.values.resize(points.len() * n, T::zero());
                basis
                    .reference_gradients
                    .resize(points.len() * n, OVector::<T, D>::zeros());
                for (q, xi) in points.iter().enumerate() {
                    element.populate_basis(&mut basis.values[q * n..(q + 1) * n], xi);
                    if with_gradients {
                        element.populate_basis_gradients(&mut basis.reference_gradients[q * n..(q + 1) * n], xi);
                    }
                }
                basis.tabulated = Some((set_index, with_gradients));
            }

            basis.gradients.clear();
            if let Some(j_inv_t) = inverse_jacobian_transpose {
                basis
                    .gradients
                    .extend(basis.reference_gradients.iter().map(|g| j_inv_t * g));
            }
        }
    }

    /// Shape value of local dof `i` of a component at quadrature point `q` of the current cell.
    pub fn shape(&self, component: usize, q: usize, i: usize) -> ShapeValue<T, D> {
        let basis = &self.components[component];
        let index = q * basis.num_dofs + i;
        ShapeValue {
            value: basis.values[index],
            gradient: basis
                .gradients
                .get(index)
                .cloned()
                .unwrap_or_else(OVector::<T, D>::zeros),
        }
    }
}

/// Geometric data of a cell needed by the quadrature loop.
#[derive(Debug, Clone)]
pub(crate) struct CellGeometry<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub volume: T,
    pub inverse_jacobian_transpose: Option<OMatrix<T, D, D>>,
}

impl<T, D> CellGeometry<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn compute<C>(
        mesh: &Mesh<T, D, C>,
        cell_index: usize,
        requirements: &FormRequirements,
    ) -> Result<Self, AssemblyError>
    where
        C: CellConnectivity<T, D>,
    {
        let inverse_jacobian_transpose = if requirements.differential_order > 0 {
            let j_inv_t = mesh
                .cell_inverse_jacobian_transpose(cell_index)
                .ok_or(AssemblyError::DegenerateCell { cell: cell_index })?;
            Some(j_inv_t)
        } else {
            None
        };
        Ok(Self {
            volume: mesh.cell_volume(cell_index),
            inverse_jacobian_transpose,
        })
    }
}

pub(crate) fn check_requirements(requirements: &FormRequirements) -> Result<(), AssemblyError> {
    if requirements.differential_order > 1 {
        Err(AssemblyError::UnsupportedDifferentialOrder(requirements.differential_order))
    } else {
        Ok(())
    }
}

/// Resolves a cell of an integration domain to a cell of the mesh.
pub(crate) fn resolve_cell<C, Dom>(domain: &Dom, local_cell: usize, num_cells: usize) -> Result<usize, AssemblyError>
where
    Dom: ?Sized + IntegrationDomain<C>,
{
    let cell = domain.parent_cell(local_cell);
    if cell < num_cells {
        Ok(cell)
    } else {
        Err(AssemblyError::InvalidCell { cell, num_cells })
    }
}

/// The point set of a cell of the integration domain.
pub(crate) fn cell_point_set<T, D, Q>(qtable: &Q, local_cell: usize) -> Result<usize, AssemblyError>
where
    T: Real,
    D: SmallDim,
    Q: ?Sized + QuadratureTable<T, D>,
    DefaultAllocator: DimAllocator<T, D>,
{
    let set_index = qtable.point_set_index(local_cell);
    let num_point_sets = qtable.num_point_sets();
    if set_index < num_point_sets {
        Ok(set_index)
    } else {
        Err(AssemblyError::MissingQuadrature {
            cell: local_cell,
            set_index,
            num_point_sets,
        })
    }
}

pub(crate) fn quadrature_point<T, D, C>(
    mesh: &Mesh<T, D, C>,
    cell_index: usize,
    reference: &OPoint<T, D>,
    weight: T,
    requirements: &FormRequirements,
) -> QuadraturePoint<T, D>
where
    T: Real,
    D: SmallDim,
    C: CellConnectivity<T, D>,
    DefaultAllocator: DimAllocator<T, D>,
{
    QuadraturePoint {
        cell_index,
        reference: reference.clone(),
        physical: requirements
            .space_coordinates
            .then(|| mesh.map_reference_coords(cell_index, reference)),
        weight,
    }
}

/// Integrates a linear integrand against every shape function of a composite space.
///
/// For each cell and each component `m` with local dof `i`, the integral over the cell is
/// passed to `sink(m, k, i, value)`, where `k` is the mesh cell index.
pub(crate) fn integrate_linear<T, D, C, I, Dom, Q, S>(
    space: &CompositeSpace<'_, T, D, C>,
    integrand: &mut I,
    domain: &Dom,
    qtable: &Q,
    mut sink: S,
) -> Result<(), AssemblyError>
where
    T: Real,
    D: SmallDim,
    C: CellConnectivity<T, D>,
    I: ?Sized + LinearIntegrand<T, D>,
    Dom: ?Sized + IntegrationDomain<C>,
    Q: ?Sized + QuadratureTable<T, D>,
    S: FnMut(usize, usize, usize, T) -> Result<(), AssemblyError>,
    DefaultAllocator: DimAllocator<T, D>,
{
    let requirements = integrand.requirements();
    check_requirements(&requirements)?;
    let mesh = match space.mesh() {
        Some(mesh) => mesh,
        None => return Ok(()),
    };

    let mut basis = BasisBuffer::for_space(space);
    let num_components = basis.num_components();
    let mut slots = vec![ShapeValue::zero(); num_components];
    let mut local_values: Vec<Vec<T>> = (0..num_components)
        .map(|m| vec![T::zero(); basis.num_dofs(m)])
        .collect();

    for local_cell in 0..domain.num_cells() {
        let cell = resolve_cell(domain, local_cell, mesh.num_cells())?;
        let set_index = cell_point_set::<T, D, _>(qtable, local_cell)?;
        let (weights, points) = qtable.point_set(set_index);
        let geometry = CellGeometry::compute(mesh, cell, &requirements)?;
        basis.prepare_cell(space, set_index, points, geometry.inverse_jacobian_transpose.as_ref());

        local_values.iter_mut().for_each(|values| values.fill(T::zero()));
        for (q, (&weight, xi)) in weights.iter().zip(points).enumerate() {
            let point = quadrature_point(mesh, cell, xi, weight, &requirements);
            integrand.prepare(&point);
            let scale = geometry.volume * weight;
            for m in 0..num_components {
                for i in 0..basis.num_dofs(m) {
                    slots[m] = basis.shape(m, q, i);
                    local_values[m][i] += scale * integrand.evaluate(&point, &slots);
                }
                slots[m] = ShapeValue::zero();
            }
        }

        for (m, values) in local_values.iter().enumerate() {
            for (i, &value) in values.iter().enumerate() {
                sink(m, cell, i, value)?;
            }
        }
    }
    Ok(())
}
