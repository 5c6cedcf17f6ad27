//! Graph boundary operators: Parameter, Result, Constant.

use tessera_core::{
    CONSTANT, Error, InferenceCtx, Operator, OutputType, PARAMETER, PartialShape, RESULT, Result,
    TensorValue,
};

/// Parameter operator - a designated input of the function.
///
/// Has no inputs. Its output types are declared when the parameter is created
/// and are kept as-is by inference.
pub struct ParameterOp;

impl Operator for ParameterOp {
    fn name(&self) -> &str {
        PARAMETER
    }

    fn infer_output_types(&self, ctx: &InferenceCtx) -> Result<Vec<OutputType>> {
        ctx.expect_inputs(0)?;
        if ctx.node.outputs.is_empty() {
            return Err(Error::ShapeInference(format!(
                "Parameter '{}' has no declared output type",
                ctx.node.name
            )));
        }
        Ok(ctx
            .node
            .outputs
            .iter()
            .map(|slot| OutputType::new(slot.dtype, slot.shape.clone()))
            .collect())
    }
}

/// Result operator - a designated output of the function.
///
/// Forwards the type of its single input.
pub struct ResultOp;

impl Operator for ResultOp {
    fn name(&self) -> &str {
        RESULT
    }

    fn infer_output_types(&self, ctx: &InferenceCtx) -> Result<Vec<OutputType>> {
        ctx.expect_inputs(1)?;
        Ok(vec![OutputType::new(
            ctx.input_dtype(0)?,
            ctx.input_shape(0)?.clone(),
        )])
    }
}

/// Constant operator - produces the tensor embedded in the node.
///
/// - **Inputs:** None
/// - **Outputs:** output (T) - the payload, always known at compile time
pub struct ConstantOp;

impl ConstantOp {
    fn payload<'a>(ctx: &InferenceCtx<'a>) -> Result<&'a TensorValue> {
        ctx.node.constant.as_ref().ok_or_else(|| {
            Error::ShapeInference(format!("Constant '{}' has no payload", ctx.node.name))
        })
    }
}

impl Operator for ConstantOp {
    fn name(&self) -> &str {
        CONSTANT
    }

    fn infer_output_types(&self, ctx: &InferenceCtx) -> Result<Vec<OutputType>> {
        ctx.expect_inputs(0)?;
        let value = Self::payload(ctx)?;
        Ok(vec![OutputType::new(
            value.dtype,
            PartialShape::from_static(&value.shape),
        )])
    }

    fn try_fold(&self, ctx: &InferenceCtx) -> Result<Vec<Option<TensorValue>>> {
        Ok(vec![Some(Self::payload(ctx)?.clone())])
    }
}
