//! Assertion helpers shared by the `blockfem` test suites.
use nalgebra::{DVector, RealField};

/// Approximate equality of two matrices (or vectors) in the max norm.
#[macro_export]
macro_rules! assert_approx_matrix_eq {
    ($x:expr, $y:expr, abstol = $tol:expr) => {{
        let x = &$x;
        let y = &$y;
        assert_eq!(x.shape(), y.shape(), "matrix shapes differ");
        let max_absdiff = (x - y).abs().max();
        if !(max_absdiff <= $tol) {
            println!("abstol: {:e}", $tol);
            println!("left: {}", x);
            println!("right: {}", y);
            println!("max abs diff: {:e}", max_absdiff);
        }
        assert!(max_absdiff <= $tol);
    }};
}

/// Asserts that evaluating the expression panics.
#[macro_export]
macro_rules! assert_panics {
    ($e:expr) => {{
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| $e));
        if result.is_ok() {
            panic!("assert_panics!({}) did not panic.", std::stringify!($e));
        }
    }};
}

/// Collects the entries of a dense vector into a `Vec`.
pub fn to_vec<T: RealField + Copy>(v: &DVector<T>) -> Vec<T> {
    v.iter().copied().collect()
}
