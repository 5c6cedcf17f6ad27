//! Individual operator implementations that don't fit into families.

pub mod gather;
pub mod io;
pub mod shape;
pub mod type_conversion;

// Re-export all operators
pub use gather::GatherOp;
pub use io::{ConstantOp, ParameterOp, ResultOp};
pub use shape::{ConcatOp, ReshapeOp, ShapeOfOp};
pub use type_conversion::ConvertOp;
