//! Set-batch-size entry point.

use tessera_core::{
    Dimension, Error, Function, OperatorRegistry, Output, PassContext, PassManager, Result,
};

use crate::MimicSetBatchSize;

/// Change the batch dimension of every Parameter of `function` to `batch`.
///
/// Reshapes with hard-coded targets are relaxed first so they follow the new
/// batch, then dimension 0 of every ranked, non-scalar Parameter is
/// overwritten and shapes are re-inferred.
///
/// Returns `Ok(true)` if any Reshape was relaxed.
///
/// # Errors
///
/// `Error::PreconditionViolation` for a zero batch, or any error raised while
/// relaxing or re-inferring (e.g. a Reshape whose element count no longer
/// divides evenly).
#[tracing::instrument(skip_all, fields(function = %function.name, batch = batch))]
pub fn set_batch_size(
    function: &mut Function,
    batch: usize,
    registry: &OperatorRegistry,
) -> Result<bool> {
    if batch == 0 {
        return Err(Error::PreconditionViolation(
            "Batch size must be at least 1".to_string(),
        ));
    }

    let ctx = PassContext::new(registry).with_batch_update(true);
    let mut manager = PassManager::new();
    manager.register_pass(MimicSetBatchSize::new());
    let relaxed = manager.run_passes(function, &ctx)?;

    for param in function.parameters().to_vec() {
        let output = Output::new(param, 0);
        let slot = function.slot(output)?;
        let (dtype, shape) = (slot.dtype, slot.shape.clone());
        if shape.rank().is_some_and(|rank| rank > 0) {
            function.set_output_type(output, dtype, shape.with_dim(0, Dimension::Static(batch)))?;
        }
    }

    function.infer_shapes(registry)?;
    function.validate()?;

    tracing::debug!(relaxed, "batch size updated");
    Ok(relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{DataType, Node, PartialShape, TensorValue};
    use tessera_operators::core_operator_registry;

    #[test]
    fn test_zero_batch_is_rejected() {
        let registry = core_operator_registry();
        let mut function = Function::new("f");
        function.add_parameter("x", DataType::F32, PartialShape::from_static(&[2, 3]));

        assert!(matches!(
            set_batch_size(&mut function, 0, &registry),
            Err(Error::PreconditionViolation(_))
        ));
    }

    #[test]
    fn test_function_without_reshape_only_resizes() {
        let registry = core_operator_registry();
        let mut function = Function::new("f");
        let x = function.add_parameter("x", DataType::F32, PartialShape::from_static(&[2, 3]));
        let relu = function.add_node(Node::new("Relu").with_input(x));
        function.infer_shapes(&registry).unwrap();
        let result = function.add_result(relu).unwrap();

        assert!(!set_batch_size(&mut function, 7, &registry).unwrap());
        assert_eq!(
            function.node(result).unwrap().outputs[0].shape,
            PartialShape::from_static(&[7, 3])
        );
    }

    #[test]
    fn test_scalar_parameter_is_left_alone() {
        let registry = core_operator_registry();
        let mut function = Function::new("f");
        let scale = function.add_parameter("scale", DataType::F32, PartialShape::scalar());
        let x = function.add_parameter("x", DataType::F32, PartialShape::from_static(&[2, 12]));
        let pattern = function.add_constant(TensorValue::from_i64(vec![2, 3, 4]));
        let reshape = function.add_node(Node::new("Reshape").with_input(x).with_input(pattern));
        function.infer_shapes(&registry).unwrap();
        let result = function.add_result(reshape).unwrap();

        assert!(set_batch_size(&mut function, 4, &registry).unwrap());
        assert_eq!(
            function.slot(Output::new(scale, 0)).unwrap().shape,
            PartialShape::scalar()
        );
        assert_eq!(
            function.node(result).unwrap().outputs[0].shape,
            PartialShape::from_static(&[4, 3, 4])
        );
    }
}
