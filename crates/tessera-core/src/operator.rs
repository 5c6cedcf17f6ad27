//! Operator trait for extensible shape inference and constant folding.

use crate::Result;
use crate::shape_inference::InferenceCtx;
use crate::types::{DataType, PartialShape, TensorValue};

/// Element type and shape computed for one output slot.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputType {
    pub dtype: DataType,
    pub shape: PartialShape,
}

impl OutputType {
    pub fn new(dtype: DataType, shape: PartialShape) -> Self {
        Self { dtype, shape }
    }
}

/// Trait for implementing operator semantics the pass framework relies on.
///
/// The framework never executes a function; it only needs to know what each
/// operator produces (element type and shape) and, for shape-computing
/// operators, what value it produces when every input is known at compile
/// time.
///
/// # Example
///
/// ```ignore
/// struct ReluOp;
///
/// impl Operator for ReluOp {
///     fn name(&self) -> &str {
///         "Relu"
///     }
///
///     fn infer_output_types(&self, ctx: &InferenceCtx) -> Result<Vec<OutputType>> {
///         Ok(vec![OutputType::new(ctx.input_dtype(0)?, ctx.input_shape(0)?.clone())])
///     }
/// }
/// ```
pub trait Operator: Send + Sync {
    /// Get the operator type (e.g., "Reshape", "ShapeOf", "Load").
    fn name(&self) -> &str;

    /// Compute the element type and shape of every output slot.
    fn infer_output_types(&self, ctx: &InferenceCtx) -> Result<Vec<OutputType>>;

    /// Evaluate the operator at compile time.
    ///
    /// Returns one entry per output (`None` where the value is not known), or
    /// an empty vector when the operator cannot be folded at all.
    fn try_fold(&self, ctx: &InferenceCtx) -> Result<Vec<Option<TensorValue>>> {
        let _ = ctx;
        Ok(Vec::new())
    }
}
