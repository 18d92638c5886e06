use nalgebra::{DimMin, DimName, RealField};

pub use nalgebra;

pub mod allocators;

/// Scalar type used throughout `blockfem`.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}

/// A small, fixed-size dimension.
///
/// Reference cells are simplices whose dimension coincides with the dimension of the
/// ambient space, so a single dimension parameter describes both.
pub trait SmallDim: DimName + DimMin<Self, Output = Self> {}

impl<D> SmallDim for D where D: DimName + DimMin<Self, Output = Self> {}
