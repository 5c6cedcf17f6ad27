//! Core operator registry.

use tessera_core::{CONSTANT, OperatorRegistry, PARAMETER, RESULT};

use crate::families::{BinaryElementwiseOp, MemoryAccessOp, UnaryElementwiseOp};
use crate::operators::{
    ConcatOp, ConstantOp, ConvertOp, GatherOp, ParameterOp, ReshapeOp, ResultOp, ShapeOfOp,
};

/// Returns an operator registry pre-populated with the core operators.
///
/// The registry includes:
/// - graph boundary operators (Parameter, Result, Constant)
/// - 4 binary elementwise operators (Add, Subtract, Multiply, Divide)
/// - 3 unary elementwise operators (Ceiling, Floor, Relu)
/// - shape manipulation and indexing (Reshape, ShapeOf, Concat, Gather)
/// - type conversion (Convert)
/// - memory access (Load, Store, ScalarLoad, ScalarStore)
///
/// Custom operators can be added to the returned registry via
/// `registry.register(name, operator)`.
pub fn core_operator_registry() -> OperatorRegistry {
    let mut registry = OperatorRegistry::new();

    // Graph boundary
    registry
        .register(PARAMETER, ParameterOp)
        .register(RESULT, ResultOp)
        .register(CONSTANT, ConstantOp);

    // Binary elementwise operators
    registry
        .register("Add", BinaryElementwiseOp::add())
        .register("Subtract", BinaryElementwiseOp::subtract())
        .register("Multiply", BinaryElementwiseOp::multiply())
        .register("Divide", BinaryElementwiseOp::divide());

    // Unary elementwise operators
    registry
        .register("Ceiling", UnaryElementwiseOp::ceiling())
        .register("Floor", UnaryElementwiseOp::floor())
        .register("Relu", UnaryElementwiseOp::relu());

    // Shape manipulation and indexing
    registry
        .register("Reshape", ReshapeOp)
        .register("ShapeOf", ShapeOfOp)
        .register("Concat", ConcatOp)
        .register("Gather", GatherOp)
        .register("Convert", ConvertOp);

    // Memory access
    for op in [
        MemoryAccessOp::load(),
        MemoryAccessOp::store(),
        MemoryAccessOp::scalar_load(),
        MemoryAccessOp::scalar_store(),
    ] {
        let name = op.op_name();
        registry.register(name, op);
    }

    registry
}
