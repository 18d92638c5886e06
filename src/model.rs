//! Ready-made problem drivers built on the assemblers.
use crate::assembly::{bilinear_fn, linear_fn, BilinearForm, LinearForm, QuadraturePoint, ShapeValue};
use crate::composite::CompositeSpace;
use crate::connectivity::{Segment2d1Connectivity, VertexConnectivity};
use crate::element::Lagrange;
use crate::mesh::{SegmentMesh1d, SubMesh};
use crate::quadrature::{segment, UniformQuadratureTable};
use crate::solver::LinearSolver;
use crate::space::{DiscreteFunction, FiniteElementSpace};
use crate::Real;
use eyre::{bail, eyre};
use log::debug;
use nalgebra::{DVector, Point1, U1};

type ScalarFn<T> = Box<dyn Fn(&Point1<T>) -> T>;

/// Stabilisation of the advection term.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Stabilisation<T> {
    None,
    /// Isotropic artificial diffusion `h |b| u' v'`.
    ArtificialDiffusion { h: T, b_norm: T },
    /// Streamline upwinding `δ h_K / |b| (b u')(b v')` with the cell length `h_K`, applied
    /// consistently to the source term. Only available for piecewise linear elements.
    Streamline { delta: T, b_norm: T },
}

/// The steady advection-diffusion problem `-ε u'' + b u' = f` on a 1D mesh, with Dirichlet
/// conditions on a boundary sub-mesh.
pub struct SteadyAdvectionDiffusion1d<'a, T: Real> {
    element: Lagrange,
    space: FiniteElementSpace<'a, T, U1, Segment2d1Connectivity>,
    diffusivity: T,
    velocity: ScalarFn<T>,
    source: ScalarFn<T>,
    stabilisation: Stabilisation<T>,
    qtable: UniformQuadratureTable<T, U1>,
    solution: Option<DVector<T>>,
}

impl<'a, T: Real> SteadyAdvectionDiffusion1d<'a, T> {
    /// Sets up the problem with Dirichlet conditions on both ends of the mesh.
    pub fn new(mesh: &'a SegmentMesh1d<T>, element: Lagrange, diffusivity: T) -> eyre::Result<Self> {
        Self::with_boundary(mesh, &mesh.boundary_submesh(), element, diffusivity)
    }

    pub fn with_boundary(
        mesh: &'a SegmentMesh1d<T>,
        boundary: &SubMesh<VertexConnectivity>,
        element: Lagrange,
        diffusivity: T,
    ) -> eyre::Result<Self> {
        let space = FiniteElementSpace::new(mesh, element)?;
        space.set_dirichlet_boundary(boundary)?;
        Ok(Self {
            element,
            space,
            diffusivity,
            velocity: Box::new(|_| T::zero()),
            source: Box::new(|_| T::zero()),
            stabilisation: Stabilisation::None,
            qtable: UniformQuadratureTable::from_quadrature(segment(4)),
            solution: None,
        })
    }

    pub fn with_stabilisation(mut self, stabilisation: Stabilisation<T>) -> Self {
        self.stabilisation = stabilisation;
        self
    }

    pub fn space(&self) -> &FiniteElementSpace<'a, T, U1, Segment2d1Connectivity> {
        &self.space
    }

    pub fn set_boundary_value(&mut self, u_bc: impl Fn(&Point1<T>) -> T + 'static) {
        self.space.set_boundary_value(u_bc);
    }

    pub fn set_advection_velocity(&mut self, b: impl Fn(&Point1<T>) -> T + 'static) {
        self.velocity = Box::new(b);
    }

    pub fn set_source_term(&mut self, f: impl Fn(&Point1<T>) -> T + 'static) {
        self.source = Box::new(f);
    }

    /// Assembles the system for the current data and solves it.
    pub fn solve(&mut self, solver: &dyn LinearSolver<T>) -> eyre::Result<()> {
        if matches!(self.stabilisation, Stabilisation::Streamline { .. }) && self.element != Lagrange::P1 {
            bail!("streamline stabilisation is only available for piecewise linear elements");
        }

        let composite = CompositeSpace::single(&self.space);
        let mesh = self.space.mesh();
        let diffusivity = self.diffusivity;
        let velocity = &self.velocity;
        let source = &self.source;
        let stabilisation = self.stabilisation;

        // Coefficients of the streamline terms in the given cell
        let streamline = |cell_index: usize| match stabilisation {
            Stabilisation::Streamline { delta, b_norm } => delta * mesh.cell_volume(cell_index) / b_norm,
            _ => T::zero(),
        };
        let artificial = match stabilisation {
            Stabilisation::ArtificialDiffusion { h, b_norm } => h * b_norm,
            _ => T::zero(),
        };

        let mut a = BilinearForm::new(&composite, &composite);
        a.clear()?;
        let mut operator = bilinear_fn(
            |p: &QuadraturePoint<T, U1>, v: &[ShapeValue<T, U1>], u: &[ShapeValue<T, U1>]| {
                let b = velocity(p.physical());
                let (du, dv) = (u[0].gradient[0], v[0].gradient[0]);
                (diffusivity + artificial) * du * dv + b * du * v[0].value + streamline(p.cell_index) * (b * du) * (b * dv)
            },
        );
        a.add_integral(&mut operator, mesh, &self.qtable)?;

        let mut f = LinearForm::new(&composite);
        let mut load = linear_fn(|p: &QuadraturePoint<T, U1>, v: &[ShapeValue<T, U1>]| {
            let x = p.physical();
            let value = source(x);
            value * v[0].value + streamline(p.cell_index) * value * velocity(x) * v[0].gradient[0]
        });
        f.add_integral(&mut load, mesh, &self.qtable)?;

        let solution = a.solve(&f, solver)?;
        debug!(
            "Solved steady advection-diffusion problem with {} dofs in {} iterations",
            self.space.dof_count(),
            solution.report.iterations
        );
        self.solution = Some(solution.function.into_coefficients());
        Ok(())
    }

    /// The solution of the last successful call to [`solve`](Self::solve).
    pub fn solution(&self) -> eyre::Result<DiscreteFunction<'_, T, U1, Segment2d1Connectivity>> {
        let coefficients = self
            .solution
            .clone()
            .ok_or_else(|| eyre!("the problem has not been solved yet"))?;
        Ok(DiscreteFunction::from_coefficients(&self.space, coefficients)?)
    }
}
