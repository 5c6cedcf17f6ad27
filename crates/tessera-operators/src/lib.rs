//! Operator set for Tessera functions.
//!
//! The pass framework never executes a function. Operators here only provide
//! what passes rely on: output element types and shapes, and compile-time
//! evaluation of shape-computing sub-graphs.
//!
//! # Operator Families
//!
//! - **Binary elementwise**: Add, Subtract, Multiply, Divide
//! - **Unary elementwise**: Ceiling, Floor, Relu
//! - **Memory access**: Load, Store, ScalarLoad, ScalarStore
//!
//! # Individual Operators
//!
//! - Graph boundary (Parameter, Result, Constant)
//! - Shape manipulation (Reshape, ShapeOf, Concat)
//! - Indexing (Gather)
//! - Type conversion (Convert)

pub mod families;
pub mod operators;

mod helpers;
mod registry;

// Re-export operator types
pub use families::{BinaryElementwiseOp, MemoryAccessOp, UnaryElementwiseOp};
pub use families::memory_access::{LOAD, SCALAR_LOAD, SCALAR_STORE, STORE, VECTOR_WIDTH};
pub use helpers::{broadcast_partial_shapes, broadcast_shapes};
pub use registry::core_operator_registry;
