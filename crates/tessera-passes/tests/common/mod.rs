//! Shared function builders for pass tests.

#![allow(dead_code)]

use tessera_core::{AttributeValue, DataType, Function, Node, NodeId, PartialShape, TensorValue};
use tessera_operators::{LOAD, SCALAR_LOAD, SCALAR_STORE, STORE, VECTOR_WIDTH};

pub use tessera_core::{PassContext, PassManager};
pub use tessera_operators::core_operator_registry;

/// Install a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .try_init();
}

/// Function with one Reshape of a static input to a constant pattern.
///
/// Graph structure:
/// - Inputs: x:[f32;input]
/// - Operation: Reshape(x, Constant(pattern)) -> y
/// - Output: y
pub fn make_reshape_function(input: &[usize], pattern: &[i64]) -> Function {
    let registry = core_operator_registry();
    let mut function = Function::new("reshape");

    let x = function.add_parameter("x", DataType::F32, PartialShape::from_static(input));
    let target = function.add_constant(TensorValue::from_i64(pattern.to_vec()));
    let reshape = function.add_node(
        Node::new("Reshape")
            .with_name("reshape")
            .with_input(x)
            .with_input(target),
    );
    function
        .infer_shapes(&registry)
        .expect("reshape function should infer");
    function.add_result(reshape).expect("result source exists");
    function
}

/// The relaxed form of [`make_reshape_function`], built by hand.
pub fn make_relaxed_reshape_function(input: &[usize], pattern: &[i64]) -> Function {
    let registry = core_operator_registry();
    let mut function = Function::new("reshape");

    let x = function.add_parameter("x", DataType::F32, PartialShape::from_static(input));
    let target = function.add_constant(TensorValue::from_i64(pattern.to_vec()));

    let build = |function: &mut Function, node: Node| {
        function
            .make_node(node, &registry)
            .expect("relaxation node should infer")
    };

    let shape = build(
        &mut function,
        Node::new("ShapeOf")
            .with_input(x)
            .with_attribute("output_type", string("i64")),
    );
    let first = function.add_constant(TensorValue::from_i64(vec![0]));
    let axis = function.add_constant(TensorValue::from_i64(vec![0]));
    let batch = build(
        &mut function,
        Node::new("Gather").with_inputs([shape.into(), first.into(), axis.into()]),
    );
    let as_float = build(
        &mut function,
        Node::new("Convert")
            .with_input(batch)
            .with_attribute("destination_type", string("f64")),
    );
    let out_batch = function.add_constant(TensorValue::from_f64(vec![pattern[0] as f64]));
    let scaled = build(
        &mut function,
        Node::new("Multiply").with_input(as_float).with_input(out_batch),
    );
    let in_batch = function.add_constant(TensorValue::from_f64(vec![input[0] as f64]));
    let ratio = build(
        &mut function,
        Node::new("Divide").with_input(scaled).with_input(in_batch),
    );
    let rounded = build(&mut function, Node::new("Ceiling").with_input(ratio));
    let modified = build(
        &mut function,
        Node::new("Convert")
            .with_input(rounded)
            .with_attribute("destination_type", string("i64")),
    );
    let indices = function.add_constant(TensorValue::from_i64(
        (1..pattern.len() as i64).collect(),
    ));
    let rest = build(
        &mut function,
        Node::new("Gather").with_inputs([target.into(), indices.into(), axis.into()]),
    );
    let concat = build(
        &mut function,
        Node::new("Concat")
            .with_inputs([modified.into(), rest.into()])
            .with_attribute("axis", AttributeValue::Int(0)),
    );
    let reshape = build(
        &mut function,
        Node::new("Reshape")
            .with_name("reshape")
            .with_input(x)
            .with_input(concat),
    );
    function.add_result(reshape).expect("result source exists");
    function
}

/// Chain of `loads` Loads, each feeding a Store, all at `width`.
///
/// Graph structure:
/// - Inputs: ptr:[f32;width]
/// - Operation: Load_i(ptr) -> Store_i(Load_i) for i in 0..loads
/// - Outputs: every Store
pub fn make_access_function(loads: usize, width: i64) -> Function {
    build_accesses((LOAD, STORE), loads, width, width)
}

/// What [`make_access_function`] should lower to: the same chain built from
/// ScalarLoad/ScalarStore with `vector_width = 1`.
pub fn make_scalar_access_function(loads: usize, width: i64) -> Function {
    build_accesses((SCALAR_LOAD, SCALAR_STORE), loads, width, 1)
}

fn build_accesses(ops: (&str, &str), loads: usize, extent: i64, width: i64) -> Function {
    let mut function = Function::new("accesses");
    let shape = PartialShape::from_static(&[extent.max(1) as usize]);
    let ptr = function.add_parameter("ptr", DataType::F32, shape.clone());

    for i in 0..loads {
        let load = access(&mut function, ops.0, &format!("load_{i}"), ptr, width, &shape);
        let store = access(&mut function, ops.1, &format!("store_{i}"), load, width, &shape);
        function.add_result(store).expect("result source exists");
    }
    function
}

fn access(
    function: &mut Function,
    op: &str,
    name: &str,
    input: NodeId,
    width: i64,
    shape: &PartialShape,
) -> NodeId {
    function.add_node(
        Node::new(op)
            .with_name(name)
            .with_input(input)
            .with_attribute(VECTOR_WIDTH, AttributeValue::Int(width))
            .with_output(DataType::F32, shape.clone()),
    )
}

fn string(value: &str) -> AttributeValue {
    AttributeValue::String(value.to_string())
}
