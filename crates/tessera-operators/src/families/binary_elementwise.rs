//! Binary elementwise operator family.
//!
//! Covers: Add, Subtract, Multiply, Divide

use tessera_core::{
    Error, InferenceCtx, Operator, OutputType, Result, TensorData, TensorValue,
};

use crate::helpers::{broadcast_apply, broadcast_partial_shapes, broadcast_shapes};

/// Binary elementwise operator family.
///
/// All binary elementwise operations share the same structure:
/// - NumPy-style broadcasting for shape inference
/// - Element-by-element computation for constant folding
///
/// The only difference is the fold function per element type. Both inputs
/// must have the same element type; the output has it too.
pub struct BinaryElementwiseOp {
    name: &'static str,
    fold_fn_f64: fn(f64, f64) -> f64,
    fold_fn_f32: fn(f32, f32) -> f32,
    fold_fn_i64: Option<fn(i64, i64) -> i64>,
}

impl BinaryElementwiseOp {
    /// Create an Add operator.
    pub fn add() -> Self {
        Self {
            name: "Add",
            fold_fn_f64: |a, b| a + b,
            fold_fn_f32: |a, b| a + b,
            fold_fn_i64: Some(|a, b| a.wrapping_add(b)),
        }
    }

    /// Create a Subtract operator.
    pub fn subtract() -> Self {
        Self {
            name: "Subtract",
            fold_fn_f64: |a, b| a - b,
            fold_fn_f32: |a, b| a - b,
            fold_fn_i64: Some(|a, b| a.wrapping_sub(b)),
        }
    }

    /// Create a Multiply operator.
    pub fn multiply() -> Self {
        Self {
            name: "Multiply",
            fold_fn_f64: |a, b| a * b,
            fold_fn_f32: |a, b| a * b,
            fold_fn_i64: Some(|a, b| a.wrapping_mul(b)),
        }
    }

    /// Create a Divide operator.
    ///
    /// Integer division by zero is not folded.
    pub fn divide() -> Self {
        Self {
            name: "Divide",
            fold_fn_f64: |a, b| a / b,
            fold_fn_f32: |a, b| a / b,
            fold_fn_i64: None,
        }
    }
}

impl Operator for BinaryElementwiseOp {
    fn name(&self) -> &str {
        self.name
    }

    fn infer_output_types(&self, ctx: &InferenceCtx) -> Result<Vec<OutputType>> {
        ctx.expect_inputs(2)?;

        let lhs = ctx.input_dtype(0)?;
        let rhs = ctx.input_dtype(1)?;
        if lhs != rhs {
            return Err(Error::ShapeInference(format!(
                "{}: element types differ ({lhs} vs {rhs})",
                self.name
            )));
        }

        let shape = broadcast_partial_shapes(ctx.input_shape(0)?, ctx.input_shape(1)?)?;
        Ok(vec![OutputType::new(lhs, shape)])
    }

    fn try_fold(&self, ctx: &InferenceCtx) -> Result<Vec<Option<TensorValue>>> {
        let (Some(a), Some(b)) = (ctx.input_value(0)?, ctx.input_value(1)?) else {
            return Ok(vec![None]);
        };

        let out_shape = broadcast_shapes(&a.shape, &b.shape)?;
        let data = match (&a.data, &b.data) {
            (TensorData::F64(x), TensorData::F64(y)) => TensorData::F64(broadcast_apply(
                x,
                &a.shape,
                y,
                &b.shape,
                &out_shape,
                self.fold_fn_f64,
            )),
            (TensorData::F32(x), TensorData::F32(y)) => TensorData::F32(broadcast_apply(
                x,
                &a.shape,
                y,
                &b.shape,
                &out_shape,
                self.fold_fn_f32,
            )),
            (TensorData::I64(x), TensorData::I64(y)) => {
                let Some(fold_fn) = self.fold_fn_i64 else {
                    return Ok(vec![None]);
                };
                TensorData::I64(broadcast_apply(x, &a.shape, y, &b.shape, &out_shape, fold_fn))
            }
            // Other element types are not folded
            _ => return Ok(vec![None]),
        };

        let dtype = data.dtype();
        Ok(vec![Some(TensorValue::new(data, out_shape, dtype))])
    }
}
