//! Collapsed operator families that eliminate code duplication.
//!
//! These families group similar operators together, implementing shared logic
//! once and parameterizing only the differences (fold functions, width rules).

pub mod binary_elementwise;
pub mod memory_access;
pub mod unary_elementwise;

pub use binary_elementwise::BinaryElementwiseOp;
pub use memory_access::MemoryAccessOp;
pub use unary_elementwise::UnaryElementwiseOp;
