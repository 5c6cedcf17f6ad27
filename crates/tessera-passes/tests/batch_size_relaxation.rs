//! Batch-size relaxation end to end: pass output, resizing, and the batch
//! arithmetic properties.

mod common;

use common::*;
use proptest::prelude::*;
use tessera_compare::{CompareOptions, compare_functions};
use tessera_core::{
    DataType, Dimension, Error, Function, Node, Output, PartialShape, TensorValue,
};
use tessera_passes::{MimicSetBatchSize, relaxed_batch, set_batch_size};

fn relax(function: &mut Function) -> bool {
    let registry = core_operator_registry();
    let ctx = PassContext::new(&registry).with_batch_update(true);
    let mut manager = PassManager::new();
    manager.register_pass(MimicSetBatchSize::new());
    manager
        .run_passes(function, &ctx)
        .expect("relaxation should succeed")
}

/// Relax a `[in_batch, out_batch] -> [out_batch, in_batch]` Reshape and make
/// its computed target the function's result, so the target can be folded at
/// batches the Reshape itself would reject.
///
/// Returns the function with the modified-batch and target outputs.
fn relaxed_target(in_batch: usize, out_batch: usize) -> (Function, Output, Output) {
    let mut function = make_reshape_function(&[in_batch, out_batch], &[out_batch as i64, in_batch as i64]);
    relax(&mut function);

    let result = function.results()[0];
    let reshape = function.node(result).unwrap().inputs[0].node;
    let target = function.node(reshape).unwrap().inputs[1];
    let modified = function.node(target.node).unwrap().inputs[0];

    function.set_input(result, 0, target).unwrap();
    function.remove_unreachable();
    (function, modified, target)
}

fn fold_at_batch(function: &mut Function, observed: usize, width: usize) {
    let registry = core_operator_registry();
    let x = function.parameters()[0];
    function
        .set_output_type(
            Output::new(x, 0),
            DataType::F32,
            PartialShape::from_static(&[observed, width]),
        )
        .unwrap();
    function.infer_shapes(&registry).unwrap();
}

fn result_shape(function: &Function) -> PartialShape {
    let result = function.results()[0];
    function.node(result).unwrap().outputs[0].shape.clone()
}

// ================================================================================
// Pass output
// ================================================================================

#[test]
fn test_relaxed_graph_matches_expected_structure() {
    init_tracing();
    let mut function = make_reshape_function(&[2, 3, 4], &[2, 12]);
    let expected = make_relaxed_reshape_function(&[2, 3, 4], &[2, 12]);

    assert!(relax(&mut function));

    let (valid, message) = compare_functions(&function, &expected, &CompareOptions::default());
    assert!(valid, "{message}");
}

#[test]
fn test_relaxation_keeps_current_shapes() {
    let mut function = make_reshape_function(&[2, 3, 4], &[2, 12]);
    let before = result_shape(&function);

    relax(&mut function);

    assert_eq!(result_shape(&function), before);
}

#[test]
fn test_every_hard_coded_reshape_is_relaxed() {
    let registry = core_operator_registry();
    let mut function = Function::new("two_reshapes");
    let x = function.add_parameter("x", DataType::F32, PartialShape::from_static(&[2, 3, 4]));
    let flat = function.add_constant(TensorValue::from_i64(vec![2, 12]));
    let first = function.add_node(Node::new("Reshape").with_input(x).with_input(flat));
    let relu = function.add_node(Node::new("Relu").with_input(first));
    let unflat = function.add_constant(TensorValue::from_i64(vec![2, 3, 4]));
    let second = function.add_node(Node::new("Reshape").with_input(relu).with_input(unflat));
    function.infer_shapes(&registry).unwrap();
    function.add_result(second).unwrap();

    assert!(relax(&mut function));
    assert_eq!(function.count_op("Concat"), 2);
    assert_eq!(function.count_op("ShapeOf"), 2);

    set_batch_size(&mut function, 5, &registry).unwrap();
    assert_eq!(result_shape(&function), PartialShape::from_static(&[5, 3, 4]));
}

#[test]
fn test_dynamic_batch_is_skipped() {
    init_tracing();
    let registry = core_operator_registry();
    let mut function = Function::new("dynamic");
    let x = function.add_parameter(
        "x",
        DataType::F32,
        PartialShape::Ranked(vec![
            Dimension::Dynamic,
            Dimension::Static(3),
            Dimension::Static(4),
        ]),
    );
    let target = function.add_constant(TensorValue::from_i64(vec![2, 12]));
    let reshape = function.add_node(Node::new("Reshape").with_input(x).with_input(target));
    function.infer_shapes(&registry).unwrap();
    function.add_result(reshape).unwrap();
    let node_count = function.node_count();

    assert!(!relax(&mut function));
    assert_eq!(function.node_count(), node_count);
}

#[test]
fn test_relaxed_batch_rounds_up_uneven_ratios() {
    for (in_batch, out_batch, observed, expected) in [(2, 1, 3, 2), (3, 1, 4, 2), (3, 2, 5, 4), (4, 3, 7, 6)] {
        let (mut function, modified, target) = relaxed_target(in_batch, out_batch);
        fold_at_batch(&mut function, observed, out_batch);

        assert_eq!(
            function.slot(modified).unwrap().value,
            Some(TensorValue::from_i64(vec![expected])),
            "in={in_batch} out={out_batch} observed={observed}"
        );
        assert_eq!(
            function.slot(target).unwrap().value,
            Some(TensorValue::from_i64(vec![expected, in_batch as i64]))
        );
    }
}

// ================================================================================
// Resizing
// ================================================================================

#[test]
fn test_resize_without_relaxation_fails() {
    let registry = core_operator_registry();
    let mut function = make_reshape_function(&[2, 3, 4], &[2, 12]);
    let x = function.parameters()[0];

    function
        .set_output_type(
            Output::new(x, 0),
            DataType::F32,
            PartialShape::from_static(&[5, 3, 4]),
        )
        .unwrap();

    assert!(matches!(
        function.infer_shapes(&registry),
        Err(Error::ShapeInference(_))
    ));
}

#[test]
fn test_set_batch_size_follows_new_batch() {
    let registry = core_operator_registry();
    let mut function = make_reshape_function(&[2, 3, 4], &[2, 12]);

    assert!(set_batch_size(&mut function, 6, &registry).unwrap());
    assert_eq!(result_shape(&function), PartialShape::from_static(&[6, 12]));
}

#[test]
fn test_set_batch_size_with_batch_ratio() {
    let registry = core_operator_registry();
    // Two input rows per output row.
    let mut function = make_reshape_function(&[4, 6], &[2, 12]);

    set_batch_size(&mut function, 8, &registry).unwrap();
    assert_eq!(result_shape(&function), PartialShape::from_static(&[4, 12]));
}

#[test]
fn test_set_batch_size_rejects_zero_input_batch() {
    let registry = core_operator_registry();
    let mut function = make_reshape_function(&[0, 3, 4], &[1, 0]);

    assert!(matches!(
        set_batch_size(&mut function, 2, &registry),
        Err(Error::PreconditionViolation(_))
    ));
}

// ================================================================================
// Properties
// ================================================================================

proptest! {
    #[test]
    fn relaxed_batch_is_integer_ceiling(
        observed in 1i64..100_000,
        in_batch in 1i64..10_000,
        out_batch in 1i64..10_000,
    ) {
        let expected = (observed * out_batch + in_batch - 1) / in_batch;
        prop_assert_eq!(relaxed_batch(observed, in_batch, out_batch).unwrap(), expected);
    }

    #[test]
    fn relaxed_batch_is_identity_at_original_batch(
        in_batch in 1i64..100_000,
        out_batch in 1i64..100_000,
    ) {
        prop_assert_eq!(relaxed_batch(in_batch, in_batch, out_batch).unwrap(), out_batch);
    }

    #[test]
    fn relaxed_graph_folds_to_ceiling(
        in_batch in 1usize..64,
        out_batch in 1usize..64,
        observed in 1usize..256,
    ) {
        let (mut function, modified, _) = relaxed_target(in_batch, out_batch);
        fold_at_batch(&mut function, observed, out_batch);

        let expected = relaxed_batch(observed as i64, in_batch as i64, out_batch as i64).unwrap();
        prop_assert_eq!(
            function.slot(modified).unwrap().value.clone(),
            Some(TensorValue::from_i64(vec![expected]))
        );
    }

    #[test]
    fn set_batch_size_scales_hard_coded_reshape(
        in_batch in 1usize..6,
        split in prop::sample::select(vec![1usize, 2, 3, 4, 6, 12]),
        batch in 1usize..16,
    ) {
        let registry = core_operator_registry();
        let pattern = [(in_batch * split) as i64, (12 / split) as i64];
        let mut function = make_reshape_function(&[in_batch, 12], &pattern);

        set_batch_size(&mut function, batch, &registry).unwrap();

        prop_assert_eq!(
            result_shape(&function),
            PartialShape::from_static(&[batch * split, 12 / split])
        );
    }
}
