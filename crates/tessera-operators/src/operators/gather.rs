//! Gather operator - gather elements from input tensor using index tensor.

use tessera_core::{
    Error, InferenceCtx, Operator, OutputType, PartialShape, Result, TensorData, TensorValue,
};

use crate::helpers::normalize_axis;

/// Gather operator - gather slices of the data tensor along an axis.
///
/// - **Inputs**: data (T), indices (integer), optional axis (scalar or 1-element integer)
/// - **Outputs**: output (T)
/// - **Attributes**: axis (int, default 0), used when the axis input is absent
///
/// output.shape = data.shape[:axis] + indices.shape + data.shape[axis+1:].
/// Negative indices count from the end of the axis.
pub struct GatherOp;

impl GatherOp {
    /// Resolve the axis, or `None` when it is only known at execution time.
    fn axis(ctx: &InferenceCtx) -> Result<Option<i64>> {
        if ctx.input_count() < 3 {
            return Ok(Some(ctx.attr_i64_or("axis", 0)?));
        }
        let Some(value) = ctx.input_value(2)? else {
            return Ok(None);
        };
        match value.to_i64_vec().as_deref() {
            Some([axis]) => Ok(Some(*axis)),
            _ => Err(Error::ShapeInference(format!(
                "Gather: axis input must hold a single integer, got shape {:?}",
                value.shape
            ))),
        }
    }
}

impl Operator for GatherOp {
    fn name(&self) -> &str {
        "Gather"
    }

    fn infer_output_types(&self, ctx: &InferenceCtx) -> Result<Vec<OutputType>> {
        if !(2..=3).contains(&ctx.input_count()) {
            return Err(Error::ShapeInference(format!(
                "Gather expects 2 or 3 inputs, got {}",
                ctx.input_count()
            )));
        }

        let dtype = ctx.input_dtype(0)?;
        let (Some(data), Some(indices), Some(axis)) = (
            ctx.input_shape(0)?.dims(),
            ctx.input_shape(1)?.dims(),
            Self::axis(ctx)?,
        ) else {
            return Ok(vec![OutputType::new(dtype, PartialShape::DynamicRank)]);
        };

        let axis = normalize_axis("Gather", axis, data.len())?;
        let mut dims = Vec::with_capacity(data.len() + indices.len() - 1);
        dims.extend_from_slice(&data[..axis]);
        dims.extend_from_slice(indices);
        dims.extend_from_slice(&data[axis + 1..]);

        Ok(vec![OutputType::new(dtype, PartialShape::Ranked(dims))])
    }

    /// Folds 1-D data gathered along axis 0, which covers shape arithmetic.
    fn try_fold(&self, ctx: &InferenceCtx) -> Result<Vec<Option<TensorValue>>> {
        let (Some(data), Some(indices)) = (ctx.input_value(0)?, ctx.input_value(1)?) else {
            return Ok(vec![None]);
        };
        let axis = Self::axis(ctx)?;
        if data.ndim() != 1 || !matches!(axis, Some(0) | Some(-1)) {
            return Ok(vec![None]);
        }
        let Some(index_values) = indices.to_i64_vec() else {
            return Ok(vec![None]);
        };

        let len = data.len() as i64;
        let positions = index_values
            .iter()
            .map(|&i| {
                let position = if i < 0 { len + i } else { i };
                if position < 0 || position >= len {
                    return Err(Error::ConstantFolding(format!(
                        "Gather: index {i} out of bounds for axis of size {len}"
                    )));
                }
                Ok(position as usize)
            })
            .collect::<Result<Vec<usize>>>()?;

        let data = match &data.data {
            TensorData::I64(v) => TensorData::I64(positions.iter().map(|&p| v[p]).collect()),
            TensorData::I32(v) => TensorData::I32(positions.iter().map(|&p| v[p]).collect()),
            TensorData::F32(v) => TensorData::F32(positions.iter().map(|&p| v[p]).collect()),
            TensorData::F64(v) => TensorData::F64(positions.iter().map(|&p| v[p]).collect()),
            _ => return Ok(vec![None]),
        };

        let dtype = data.dtype();
        Ok(vec![Some(TensorValue::new(data, indices.shape.clone(), dtype))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{AttributeValue, DataType, Function, Node};

    #[test]
    fn test_gather_shape_with_axis_input() {
        let mut function = Function::new("f");
        let data = function.add_parameter("data", DataType::F32, PartialShape::from_static(&[4, 5, 6]));
        let indices = function.add_constant(TensorValue::from_i64(vec![0, 2]));
        let axis = function.add_constant(TensorValue::from_i64(vec![1]));
        let id = function.add_node(Node::new("Gather").with_inputs([data.into(), indices.into(), axis.into()]));

        let node = function.node(id).unwrap();
        let types = GatherOp.infer_output_types(&InferenceCtx::new(id, node, &function)).unwrap();
        assert_eq!(types[0].shape, PartialShape::from_static(&[4, 2, 6]));
    }

    #[test]
    fn test_gather_folds_shape_vector() {
        let mut function = Function::new("f");
        let data = function.add_constant(TensorValue::from_i64(vec![8, 3, 224, 224]));
        let indices = function.add_constant(TensorValue::from_i64(vec![1, 2, -1]));
        let id = function.add_node(
            Node::new("Gather")
                .with_inputs([data.into(), indices.into()])
                .with_attribute("axis", AttributeValue::Int(0)),
        );

        let node = function.node(id).unwrap();
        let folded = GatherOp.try_fold(&InferenceCtx::new(id, node, &function)).unwrap();
        assert_eq!(folded, vec![Some(TensorValue::from_i64(vec![3, 224, 224]))]);
    }

    #[test]
    fn test_gather_rejects_out_of_range_index() {
        let mut function = Function::new("f");
        let data = function.add_constant(TensorValue::from_i64(vec![1, 2]));
        let indices = function.add_constant(TensorValue::from_i64(vec![5]));
        let id = function.add_node(Node::new("Gather").with_inputs([data.into(), indices.into()]));

        let node = function.node(id).unwrap();
        assert!(GatherOp.try_fold(&InferenceCtx::new(id, node, &function)).is_err());
    }
}
