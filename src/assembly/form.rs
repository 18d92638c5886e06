use crate::allocators::DimAllocator;
use crate::{Real, SmallDim};
use nalgebra::{DefaultAllocator, OPoint, OVector};
use serde::{Deserialize, Serialize};

/// What an integrand needs from the assembler at each quadrature point.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormRequirements {
    /// Whether physical coordinates of quadrature points must be computed.
    pub space_coordinates: bool,
    /// Highest derivative order of the shape functions (0 or 1).
    pub differential_order: usize,
}

impl FormRequirements {
    pub fn values() -> Self {
        Self {
            space_coordinates: false,
            differential_order: 0,
        }
    }

    pub fn gradients() -> Self {
        Self {
            space_coordinates: false,
            differential_order: 1,
        }
    }

    pub fn with_space_coordinates(self) -> Self {
        Self {
            space_coordinates: true,
            ..self
        }
    }
}

/// A quadrature point of a cell, passed to integrands.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadraturePoint<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    /// Index of the cell in the mesh of the spaces.
    pub cell_index: usize,
    pub reference: OPoint<T, D>,
    /// Physical coordinates, present when the integrand requires space coordinates.
    pub physical: Option<OPoint<T, D>>,
    pub weight: T,
}

impl<T, D> QuadraturePoint<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    /// The physical coordinates of the point.
    ///
    /// # Panics
    ///
    /// Panics if the integrand did not declare that it requires space coordinates.
    pub fn physical(&self) -> &OPoint<T, D> {
        self.physical
            .as_ref()
            .expect("Integrand must require space coordinates to access physical points.")
    }
}

/// Value and physical gradient of a shape function at a quadrature point.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeValue<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub value: T,
    pub gradient: OVector<T, D>,
}

impl<T, D> ShapeValue<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn zero() -> Self {
        Self {
            value: T::zero(),
            gradient: OVector::<T, D>::zeros(),
        }
    }
}

/// The integrand of a bilinear form `a(u, v)`.
///
/// `test` and `trial` hold one shape slot per component of the respective space.
pub trait BilinearIntegrand<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn requirements(&self) -> FormRequirements;

    /// Called once per quadrature point before the integrand is evaluated for all pairs of
    /// local dofs at that point.
    fn prepare(&mut self, _point: &QuadraturePoint<T, D>) {}

    fn evaluate(&self, point: &QuadraturePoint<T, D>, test: &[ShapeValue<T, D>], trial: &[ShapeValue<T, D>]) -> T;
}

/// The integrand of a linear form `l(v)`.
pub trait LinearIntegrand<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn requirements(&self) -> FormRequirements;

    fn prepare(&mut self, _point: &QuadraturePoint<T, D>) {}

    fn evaluate(&self, point: &QuadraturePoint<T, D>, test: &[ShapeValue<T, D>]) -> T;
}

impl<'b, T, D, I> BilinearIntegrand<T, D> for &'b mut I
where
    T: Real,
    D: SmallDim,
    I: ?Sized + BilinearIntegrand<T, D>,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn requirements(&self) -> FormRequirements {
        I::requirements(self)
    }

    fn prepare(&mut self, point: &QuadraturePoint<T, D>) {
        I::prepare(self, point)
    }

    fn evaluate(&self, point: &QuadraturePoint<T, D>, test: &[ShapeValue<T, D>], trial: &[ShapeValue<T, D>]) -> T {
        I::evaluate(self, point, test, trial)
    }
}

impl<'b, T, D, I> LinearIntegrand<T, D> for &'b mut I
where
    T: Real,
    D: SmallDim,
    I: ?Sized + LinearIntegrand<T, D>,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn requirements(&self) -> FormRequirements {
        I::requirements(self)
    }

    fn prepare(&mut self, point: &QuadraturePoint<T, D>) {
        I::prepare(self, point)
    }

    fn evaluate(&self, point: &QuadraturePoint<T, D>, test: &[ShapeValue<T, D>]) -> T {
        I::evaluate(self, point, test)
    }
}

/// A bilinear integrand given by a closure.
#[derive(Debug, Clone)]
pub struct BilinearFn<F> {
    f: F,
    requirements: FormRequirements,
}

/// Wraps a closure as a bilinear integrand that requires gradients and space coordinates.
pub fn bilinear_fn<T, D, F>(f: F) -> BilinearFn<F>
where
    T: Real,
    D: SmallDim,
    F: Fn(&QuadraturePoint<T, D>, &[ShapeValue<T, D>], &[ShapeValue<T, D>]) -> T,
    DefaultAllocator: DimAllocator<T, D>,
{
    BilinearFn {
        f,
        requirements: FormRequirements::gradients().with_space_coordinates(),
    }
}

impl<F> BilinearFn<F> {
    pub fn with_requirements(self, requirements: FormRequirements) -> Self {
        Self { requirements, ..self }
    }
}

impl<T, D, F> BilinearIntegrand<T, D> for BilinearFn<F>
where
    T: Real,
    D: SmallDim,
    F: Fn(&QuadraturePoint<T, D>, &[ShapeValue<T, D>], &[ShapeValue<T, D>]) -> T,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn requirements(&self) -> FormRequirements {
        self.requirements
    }

    fn evaluate(&self, point: &QuadraturePoint<T, D>, test: &[ShapeValue<T, D>], trial: &[ShapeValue<T, D>]) -> T {
        (self.f)(point, test, trial)
    }
}

/// A linear integrand given by a closure.
#[derive(Debug, Clone)]
pub struct LinearFn<F> {
    f: F,
    requirements: FormRequirements,
}

/// Wraps a closure as a linear integrand that requires gradients and space coordinates.
pub fn linear_fn<T, D, F>(f: F) -> LinearFn<F>
where
    T: Real,
    D: SmallDim,
    F: Fn(&QuadraturePoint<T, D>, &[ShapeValue<T, D>]) -> T,
    DefaultAllocator: DimAllocator<T, D>,
{
    LinearFn {
        f,
        requirements: FormRequirements::gradients().with_space_coordinates(),
    }
}

impl<F> LinearFn<F> {
    pub fn with_requirements(self, requirements: FormRequirements) -> Self {
        Self { requirements, ..self }
    }
}

impl<T, D, F> LinearIntegrand<T, D> for LinearFn<F>
where
    T: Real,
    D: SmallDim,
    F: Fn(&QuadraturePoint<T, D>, &[ShapeValue<T, D>]) -> T,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn requirements(&self) -> FormRequirements {
        self.requirements
    }

    fn evaluate(&self, point: &QuadraturePoint<T, D>, test: &[ShapeValue<T, D>]) -> T {
        (self.f)(point, test)
    }
}
