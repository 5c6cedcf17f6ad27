//! Type conversion operators.

use tessera_core::{DataType, InferenceCtx, Operator, OutputType, Result, TensorValue};

/// Convert operator - change the element type of a tensor.
///
/// - **Inputs**: input (T1)
/// - **Outputs**: output (T2)
/// - **Attributes**: destination_type (string, e.g. "f64", "i64")
///
/// Float to integer conversion truncates toward zero.
pub struct ConvertOp;

impl ConvertOp {
    fn destination(ctx: &InferenceCtx) -> Result<DataType> {
        DataType::from_name(ctx.attr_string("destination_type")?)
    }
}

impl Operator for ConvertOp {
    fn name(&self) -> &str {
        "Convert"
    }

    fn infer_output_types(&self, ctx: &InferenceCtx) -> Result<Vec<OutputType>> {
        ctx.expect_inputs(1)?;
        Ok(vec![OutputType::new(
            Self::destination(ctx)?,
            ctx.input_shape(0)?.clone(),
        )])
    }

    fn try_fold(&self, ctx: &InferenceCtx) -> Result<Vec<Option<TensorValue>>> {
        let Some(value) = ctx.input_value(0)? else {
            return Ok(vec![None]);
        };
        Ok(vec![Some(value.cast(Self::destination(ctx)?)?)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{AttributeValue, Function, Node, PartialShape};

    #[test]
    fn test_convert_requires_destination_type() {
        let mut function = Function::new("f");
        let x = function.add_parameter("x", DataType::I64, PartialShape::from_static(&[1]));
        let id = function.add_node(Node::new("Convert").with_input(x));

        let node = function.node(id).unwrap();
        let err = ConvertOp
            .infer_output_types(&InferenceCtx::new(id, node, &function))
            .unwrap_err();
        assert!(err.to_string().contains("destination_type"));
    }

    #[test]
    fn test_convert_folds_value() {
        let mut function = Function::new("f");
        let x = function.add_constant(TensorValue::from_f64(vec![3.0, 7.9]));
        let id = function.add_node(
            Node::new("Convert")
                .with_input(x)
                .with_attribute("destination_type", AttributeValue::String("i64".into())),
        );

        let node = function.node(id).unwrap();
        let folded = ConvertOp.try_fold(&InferenceCtx::new(id, node, &function)).unwrap();
        assert_eq!(folded, vec![Some(TensorValue::from_i64(vec![3, 7]))]);
    }
}
