//! Quadrature rules on reference simplices and per-cell quadrature tables.
//!
//! Rules come from `fenris-quadrature` and are mapped to the unit reference simplex. Their
//! weights sum to one, so that integrating over a physical cell amounts to multiplying the
//! weighted sum by the cell volume.
use crate::allocators::DimAllocator;
use crate::{Real, SmallDim};
use fenris_quadrature::{polyquad, univariate};
use nalgebra::allocator::Allocator;
use nalgebra::{convert, DefaultAllocator, DimName, OPoint, Scalar, U1, U2, U3};

/// Errors returned when no rule of the requested strength is available.
pub use fenris_quadrature::Error as QuadratureError;

pub type QuadraturePair<T, D> = (Vec<T>, Vec<OPoint<T, D>>);
pub type QuadraturePair1d<T> = QuadraturePair<T, U1>;
pub type QuadraturePair2d<T> = QuadraturePair<T, U2>;
pub type QuadraturePair3d<T> = QuadraturePair<T, U3>;

/// A quadrature rule consisting of weights and points.
pub trait Quadrature<T, D>
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    fn weights(&self) -> &[T];
    fn points(&self) -> &[OPoint<T, D>];

    /// Approximates the integral of the given function using this quadrature rule.
    fn integrate<F>(&self, f: F) -> T
    where
        T: Real,
        F: Fn(&OPoint<T, D>) -> T,
    {
        self.weights()
            .iter()
            .zip(self.points())
            .fold(T::zero(), |acc, (&w, p)| acc + w * f(p))
    }
}

impl<T, D> Quadrature<T, D> for QuadraturePair<T, D>
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    fn weights(&self) -> &[T] {
        &self.0
    }

    fn points(&self) -> &[OPoint<T, D>] {
        &self.1
    }
}

/// Converts a rule on the bi-unit reference simplex (corner at `[-1, ..., -1]`, legs of length 2)
/// to the unit reference simplex, with weights normalized to sum to one.
fn convert_quadrature_rule_from_biunit_f64<T, D, const N: usize>(
    quadrature: fenris_quadrature::Rule<N>,
) -> QuadraturePair<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    assert_eq!(N, D::dim(), "Rule dimension must match the reference dimension.");
    // The bi-unit simplex has volume 2^N / N!
    let scale = (1..=N).fold(1.0, |acc, k| acc * k as f64 / 2.0);
    let (weights, points) = quadrature;
    let weights = weights.into_iter().map(|w| convert::<f64, T>(scale * w)).collect();
    let points = points
        .into_iter()
        .map(|p| OPoint::from_slice(&p.map(|x_i| convert::<f64, T>(0.5 * (x_i + 1.0)))))
        .collect();
    (weights, points)
}

/// Gauss rule with `num_points` points on `[0, 1]`, exact for polynomials of degree
/// `2 num_points - 1`.
///
/// # Panics
///
/// Panics if zero points are requested.
pub fn gauss<T: Real>(num_points: usize) -> QuadraturePair1d<T> {
    convert_quadrature_rule_from_biunit_f64(univariate::gauss(num_points))
}

/// The Gauss rule with the fewest points that integrates polynomials of degree `strength` exactly.
pub fn segment<T: Real>(strength: usize) -> QuadraturePair1d<T> {
    gauss(strength / 2 + 1)
}

pub fn triangle<T: Real>(strength: usize) -> Result<QuadraturePair2d<T>, QuadratureError> {
    let rule = polyquad::triangle(strength)?;
    Ok(convert_quadrature_rule_from_biunit_f64(rule))
}

pub fn tetrahedron<T: Real>(strength: usize) -> Result<QuadraturePair3d<T>, QuadratureError> {
    let rule = polyquad::tetrahedron(strength)?;
    Ok(convert_quadrature_rule_from_biunit_f64(rule))
}

/// Lookup table mapping cells to quadrature point sets.
///
/// Several cells may share a point set. Assemblers tabulate basis functions once per
/// point set and reuse them while consecutive cells refer to the same set.
pub trait QuadratureTable<T, D>
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    fn num_point_sets(&self) -> usize;

    fn point_set_index(&self, cell_index: usize) -> usize;

    /// Weights and reference points of the given point set.
    ///
    /// # Panics
    ///
    /// Implementations may panic if `set_index` is not smaller than
    /// [`num_point_sets`](Self::num_point_sets).
    fn point_set(&self, set_index: usize) -> (&[T], &[OPoint<T, D>]);

    fn is_uniform(&self) -> bool {
        self.num_point_sets() == 1
    }

    fn cell_quadrature(&self, cell_index: usize) -> (&[T], &[OPoint<T, D>]) {
        self.point_set(self.point_set_index(cell_index))
    }
}

/// A quadrature table that uses the same rule for every cell.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformQuadratureTable<T, D>
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    weights: Vec<T>,
    points: Vec<OPoint<T, D>>,
}

impl<T, D> UniformQuadratureTable<T, D>
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    /// # Panics
    ///
    /// Panics if the number of weights and points differ.
    pub fn from_points_and_weights(points: Vec<OPoint<T, D>>, weights: Vec<T>) -> Self {
        assert_eq!(points.len(), weights.len(), "Number of points and weights must match.");
        Self { weights, points }
    }

    pub fn from_quadrature((weights, points): QuadraturePair<T, D>) -> Self {
        Self::from_points_and_weights(points, weights)
    }
}

impl<T, D> QuadratureTable<T, D> for UniformQuadratureTable<T, D>
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    fn num_point_sets(&self) -> usize {
        1
    }

    fn point_set_index(&self, _cell_index: usize) -> usize {
        0
    }

    fn point_set(&self, _set_index: usize) -> (&[T], &[OPoint<T, D>]) {
        (&self.weights, &self.points)
    }
}

/// A quadrature table that keeps a separate rule per cell.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneralQuadratureTable<T, D>
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    rules: Vec<QuadraturePair<T, D>>,
}

impl<T, D> GeneralQuadratureTable<T, D>
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    /// # Panics
    ///
    /// Panics if a rule has mismatched numbers of weights and points.
    pub fn from_rules(rules: Vec<QuadraturePair<T, D>>) -> Self {
        for (cell_index, (weights, points)) in rules.iter().enumerate() {
            assert_eq!(
                weights.len(),
                points.len(),
                "Cell {} has mismatched number of points and weights.",
                cell_index
            );
        }
        Self { rules }
    }

    /// Builds a table with one rule per cell from the given closure.
    pub fn from_fn(num_cells: usize, rule_fn: impl FnMut(usize) -> QuadraturePair<T, D>) -> Self {
        Self::from_rules((0..num_cells).map(rule_fn).collect())
    }
}

impl<T, D> QuadratureTable<T, D> for GeneralQuadratureTable<T, D>
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    fn num_point_sets(&self) -> usize {
        self.rules.len()
    }

    fn point_set_index(&self, cell_index: usize) -> usize {
        cell_index
    }

    /// # Panics
    ///
    /// Panics if the table has no rule for `set_index`.
    fn point_set(&self, set_index: usize) -> (&[T], &[OPoint<T, D>]) {
        let (weights, points) = &self.rules[set_index];
        (weights, points)
    }
}
