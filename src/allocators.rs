//! Helper traits for allocator trait bounds.
pub use blockfem_traits::allocators::*;
