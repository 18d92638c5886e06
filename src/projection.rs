//! L2 projection onto finite element spaces.
use crate::allocators::DimAllocator;
use crate::assembly::integrands::{Mass, Source};
use crate::assembly::{BilinearForm, LinearForm};
use crate::composite::CompositeSpace;
use crate::connectivity::CellConnectivity;
use crate::error::AssemblyError;
use crate::quadrature::QuadratureTable;
use crate::solver::LinearSolver;
use crate::space::{DiscreteFunction, FiniteElementSpace};
use crate::{Real, SmallDim};
use nalgebra::{DefaultAllocator, OPoint};

/// Computes the L2 projection of `f` onto the space: the `u_h` with `∫ u_h v = ∫ f v` for all `v`.
///
/// Dirichlet dofs of the space keep their boundary values.
pub fn project_l2<'a, T, D, C, Q, S>(
    space: &'a FiniteElementSpace<'a, T, D, C>,
    f: impl Fn(&OPoint<T, D>) -> T,
    qtable: &Q,
    solver: &S,
) -> Result<DiscreteFunction<'a, T, D, C>, AssemblyError>
where
    T: Real,
    D: SmallDim,
    C: CellConnectivity<T, D>,
    Q: ?Sized + QuadratureTable<T, D>,
    S: ?Sized + LinearSolver<T>,
    DefaultAllocator: DimAllocator<T, D>,
{
    let composite = CompositeSpace::single(space);
    let mesh = space.mesh();

    let mut mass = BilinearForm::new(&composite, &composite);
    mass.clear()?;
    mass.add_integral(&mut Mass::default(), mesh, qtable)?;

    let mut load = LinearForm::new(&composite);
    load.add_integral(&mut Source::new(f), mesh, qtable)?;

    let solution = mass.solve(&load, solver)?;
    Ok(solution.function.component(0)?)
}
