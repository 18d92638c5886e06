//! Common integrands.
//!
//! Sums over components rely on the per-block evaluation of the assemblers: only the slots of
//! the current block are nonzero, so `Σ_c ∇u_c · ∇v_c` couples each component with itself.
use crate::allocators::DimAllocator;
use crate::assembly::form::{BilinearIntegrand, FormRequirements, LinearIntegrand, QuadraturePoint, ShapeValue};
use crate::{Real, SmallDim};
use nalgebra::{DefaultAllocator, OPoint, OVector};

/// The Laplace operator `Σ_c κ ∇u_c · ∇v_c`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Laplace<T> {
    pub diffusivity: T,
}

impl<T: Real> Default for Laplace<T> {
    fn default() -> Self {
        Self { diffusivity: T::one() }
    }
}

impl<T, D> BilinearIntegrand<T, D> for Laplace<T>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn requirements(&self) -> FormRequirements {
        FormRequirements::gradients()
    }

    fn evaluate(&self, _point: &QuadraturePoint<T, D>, test: &[ShapeValue<T, D>], trial: &[ShapeValue<T, D>]) -> T {
        let sum = test
            .iter()
            .zip(trial)
            .fold(T::zero(), |acc, (v, u)| acc + v.gradient.dot(&u.gradient));
        self.diffusivity * sum
    }
}

/// The mass operator `Σ_c ρ u_c v_c`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Mass<T> {
    pub coefficient: T,
}

impl<T: Real> Default for Mass<T> {
    fn default() -> Self {
        Self { coefficient: T::one() }
    }
}

impl<T, D> BilinearIntegrand<T, D> for Mass<T>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn requirements(&self) -> FormRequirements {
        FormRequirements::values()
    }

    fn evaluate(&self, _point: &QuadraturePoint<T, D>, test: &[ShapeValue<T, D>], trial: &[ShapeValue<T, D>]) -> T {
        let sum = test
            .iter()
            .zip(trial)
            .fold(T::zero(), |acc, (v, u)| acc + v.value * u.value);
        self.coefficient * sum
    }
}

/// Advection `(b · ∇u) v` with velocity field `b(x)`, for single-component spaces.
pub struct Advection<F> {
    velocity: F,
}

impl<F> Advection<F> {
    pub fn new(velocity: F) -> Self {
        Self { velocity }
    }
}

impl<T, D, F> BilinearIntegrand<T, D> for Advection<F>
where
    T: Real,
    D: SmallDim,
    F: Fn(&OPoint<T, D>) -> OVector<T, D>,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn requirements(&self) -> FormRequirements {
        FormRequirements::gradients().with_space_coordinates()
    }

    fn evaluate(&self, point: &QuadraturePoint<T, D>, test: &[ShapeValue<T, D>], trial: &[ShapeValue<T, D>]) -> T {
        let b = (self.velocity)(point.physical());
        test.iter()
            .zip(trial)
            .fold(T::zero(), |acc, (v, u)| acc + b.dot(&u.gradient) * v.value)
    }
}

/// The load `Σ_c f(x) v_c`, or `f(x) v_n` when restricted to component `n`.
pub struct Source<F> {
    f: F,
    component: Option<usize>,
}

impl<F> Source<F> {
    pub fn new(f: F) -> Self {
        Self { f, component: None }
    }

    /// A load that only acts on the test functions of one component.
    pub fn component(component: usize, f: F) -> Self {
        Self {
            f,
            component: Some(component),
        }
    }
}

impl<T, D, F> LinearIntegrand<T, D> for Source<F>
where
    T: Real,
    D: SmallDim,
    F: Fn(&OPoint<T, D>) -> T,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn requirements(&self) -> FormRequirements {
        FormRequirements::values().with_space_coordinates()
    }

    fn evaluate(&self, point: &QuadraturePoint<T, D>, test: &[ShapeValue<T, D>]) -> T {
        let f = (self.f)(point.physical());
        match self.component {
            Some(n) => test.get(n).map(|v| f * v.value).unwrap_or_else(T::zero),
            None => test.iter().fold(T::zero(), |acc, v| acc + f * v.value),
        }
    }
}

/// The integral `v_n` of the shape functions of one component.
///
/// As a constraint block it expresses `∫ u_n = c`, e.g. a zero-mean condition.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Mean {
    pub component: usize,
}

impl<T, D> LinearIntegrand<T, D> for Mean
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn requirements(&self) -> FormRequirements {
        FormRequirements::values()
    }

    fn evaluate(&self, _point: &QuadraturePoint<T, D>, test: &[ShapeValue<T, D>]) -> T {
        test.get(self.component)
            .map(|v| v.value)
            .unwrap_or_else(T::zero)
    }
}
