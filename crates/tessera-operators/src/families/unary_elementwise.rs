//! Unary elementwise operator family.
//!
//! Covers: Ceiling, Floor, Relu

use tessera_core::{InferenceCtx, Operator, OutputType, Result, TensorData, TensorValue};

/// Unary elementwise operator family.
///
/// All unary elementwise operations share the same structure:
/// - Identity shape inference (output type = input type)
/// - Element-by-element computation for constant folding
///
/// Only floating-point values are folded.
pub struct UnaryElementwiseOp {
    name: &'static str,
    fold_fn_f64: fn(f64) -> f64,
    fold_fn_f32: fn(f32) -> f32,
}

impl UnaryElementwiseOp {
    /// Create a Ceiling operator.
    pub fn ceiling() -> Self {
        Self {
            name: "Ceiling",
            fold_fn_f64: f64::ceil,
            fold_fn_f32: f32::ceil,
        }
    }

    /// Create a Floor operator.
    pub fn floor() -> Self {
        Self {
            name: "Floor",
            fold_fn_f64: f64::floor,
            fold_fn_f32: f32::floor,
        }
    }

    /// Create a Relu operator.
    pub fn relu() -> Self {
        Self {
            name: "Relu",
            fold_fn_f64: |x| x.max(0.0),
            fold_fn_f32: |x| x.max(0.0),
        }
    }
}

impl Operator for UnaryElementwiseOp {
    fn name(&self) -> &str {
        self.name
    }

    fn infer_output_types(&self, ctx: &InferenceCtx) -> Result<Vec<OutputType>> {
        ctx.expect_inputs(1)?;
        Ok(vec![OutputType::new(
            ctx.input_dtype(0)?,
            ctx.input_shape(0)?.clone(),
        )])
    }

    fn try_fold(&self, ctx: &InferenceCtx) -> Result<Vec<Option<TensorValue>>> {
        let Some(value) = ctx.input_value(0)? else {
            return Ok(vec![None]);
        };

        let data = match &value.data {
            TensorData::F64(v) => TensorData::F64(v.iter().map(|&x| (self.fold_fn_f64)(x)).collect()),
            TensorData::F32(v) => TensorData::F32(v.iter().map(|&x| (self.fold_fn_f32)(x)).collect()),
            _ => return Ok(vec![None]),
        };

        Ok(vec![Some(TensorValue::new(data, value.shape.clone(), value.dtype))])
    }
}
