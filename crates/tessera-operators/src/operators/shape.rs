//! Shape manipulation operators: Reshape, ShapeOf, Concat.

use tessera_core::{
    DataType, Dimension, Error, InferenceCtx, Operator, OutputType, PartialShape, Result,
    TensorData, TensorValue,
};

use crate::helpers::normalize_axis;

/// Reshape operator - reinterpret data with a new shape.
///
/// - **Inputs**: data (T), pattern (1-D integer tensor)
/// - **Outputs**: reshaped (T)
/// - **Attributes**: special_zero (bool, default false)
///
/// A pattern entry of -1 is inferred from the remaining extents. With
/// `special_zero`, an entry of 0 copies the matching input dimension.
/// The pattern may come from any sub-graph; its folded value drives the
/// output shape.
pub struct ReshapeOp;

impl ReshapeOp {
    fn output_shape(
        input: &PartialShape,
        pattern: &[i64],
        special_zero: bool,
    ) -> Result<PartialShape> {
        let mut dims = Vec::with_capacity(pattern.len());
        let mut inferred = None;

        for (i, &entry) in pattern.iter().enumerate() {
            let dim = match entry {
                -1 => {
                    if inferred.replace(i).is_some() {
                        return Err(Error::ShapeInference(
                            "Reshape: pattern has more than one -1 entry".to_string(),
                        ));
                    }
                    Dimension::Dynamic
                }
                0 if special_zero => input.dim(i).ok_or_else(|| {
                    Error::ShapeInference(format!(
                        "Reshape: pattern entry {i} copies a dimension the input {input} does not have"
                    ))
                })?,
                n if n >= 0 => Dimension::Static(n as usize),
                n => {
                    return Err(Error::ShapeInference(format!(
                        "Reshape: invalid pattern entry {n} at position {i}"
                    )));
                }
            };
            dims.push(dim);
        }

        if let Some(index) = inferred {
            let known: Option<Vec<usize>> = dims
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != index)
                .map(|(_, d)| d.as_static())
                .collect();

            if let (Some(total), Some(known)) = (input.to_static(), known) {
                let total: usize = total.iter().product();
                let known: usize = known.iter().product();
                if known == 0 || total % known != 0 {
                    return Err(Error::ShapeInference(format!(
                        "Reshape: cannot infer -1 entry of {pattern:?} from input {input}"
                    )));
                }
                dims[index] = Dimension::Static(total / known);
            }
        }

        let output = PartialShape::Ranked(dims);
        if let (Some(from), Some(to)) = (input.to_static(), output.to_static()) {
            let from: usize = from.iter().product();
            let to: usize = to.iter().product();
            if from != to {
                return Err(Error::ShapeInference(format!(
                    "Reshape: cannot reshape {input} ({from} elements) to {output} ({to} elements)"
                )));
            }
        }

        Ok(output)
    }
}

impl Operator for ReshapeOp {
    fn name(&self) -> &str {
        "Reshape"
    }

    fn infer_output_types(&self, ctx: &InferenceCtx) -> Result<Vec<OutputType>> {
        ctx.expect_inputs(2)?;
        let dtype = ctx.input_dtype(0)?;
        let input = ctx.input_shape(0)?;
        let special_zero = ctx.attr_bool_or("special_zero", false)?;

        if let Some(pattern) = ctx.input_value(1)?.and_then(TensorValue::to_i64_vec) {
            let shape = Self::output_shape(input, &pattern, special_zero)?;
            return Ok(vec![OutputType::new(dtype, shape)]);
        }

        // Pattern only known at execution time: its length fixes the rank.
        let shape = match ctx.input_shape(1)?.dim(0) {
            Some(Dimension::Static(rank)) => PartialShape::dynamic_of_rank(rank),
            _ => PartialShape::DynamicRank,
        };
        Ok(vec![OutputType::new(dtype, shape)])
    }

    fn try_fold(&self, ctx: &InferenceCtx) -> Result<Vec<Option<TensorValue>>> {
        let (Some(data), Some(pattern)) = (ctx.input_value(0)?, ctx.input_value(1)?) else {
            return Ok(vec![None]);
        };
        let Some(pattern) = pattern.to_i64_vec() else {
            return Ok(vec![None]);
        };

        let special_zero = ctx.attr_bool_or("special_zero", false)?;
        let shape = Self::output_shape(&PartialShape::from_static(&data.shape), &pattern, special_zero)?;
        Ok(vec![shape.to_static().map(|dims| data.reshape(dims))])
    }
}

/// ShapeOf operator - the shape of its input as a 1-D integer tensor.
///
/// - **Inputs**: data (T)
/// - **Outputs**: shape (i64 or i32)
/// - **Attributes**: output_type (string, "i64" by default)
pub struct ShapeOfOp;

impl ShapeOfOp {
    fn output_dtype(ctx: &InferenceCtx) -> Result<DataType> {
        match ctx.attr("output_type") {
            None => Ok(DataType::I64),
            Some(_) => match DataType::from_name(ctx.attr_string("output_type")?)? {
                dtype @ (DataType::I64 | DataType::I32) => Ok(dtype),
                other => Err(Error::Attribute(format!(
                    "ShapeOf: output_type must be i64 or i32, got {other}"
                ))),
            },
        }
    }
}

impl Operator for ShapeOfOp {
    fn name(&self) -> &str {
        "ShapeOf"
    }

    fn infer_output_types(&self, ctx: &InferenceCtx) -> Result<Vec<OutputType>> {
        ctx.expect_inputs(1)?;
        let shape = match ctx.input_shape(0)?.rank() {
            Some(rank) => PartialShape::from_static(&[rank]),
            None => PartialShape::dynamic_of_rank(1),
        };
        Ok(vec![OutputType::new(Self::output_dtype(ctx)?, shape)])
    }

    fn try_fold(&self, ctx: &InferenceCtx) -> Result<Vec<Option<TensorValue>>> {
        let Some(dims) = ctx.input_shape(0)?.to_static() else {
            return Ok(vec![None]);
        };
        let value = TensorValue::from_i64(dims.iter().map(|&d| d as i64).collect());
        Ok(vec![Some(value.cast(Self::output_dtype(ctx)?)?)])
    }
}

/// Concat operator - join tensors along an axis.
///
/// - **Inputs**: one or more tensors of the same element type and rank
/// - **Outputs**: concatenated (T)
/// - **Attributes**: axis (int, default 0)
///
/// Folding is supported for 1-D values, which covers shape arithmetic.
pub struct ConcatOp;

impl Operator for ConcatOp {
    fn name(&self) -> &str {
        "Concat"
    }

    fn infer_output_types(&self, ctx: &InferenceCtx) -> Result<Vec<OutputType>> {
        if ctx.input_count() == 0 {
            return Err(Error::ShapeInference(
                "Concat requires at least one input".to_string(),
            ));
        }

        let dtype = ctx.input_dtype(0)?;
        let axis = ctx.attr_i64_or("axis", 0)?;

        let Some(first) = ctx.input_shape(0)?.dims() else {
            return Ok(vec![OutputType::new(dtype, PartialShape::DynamicRank)]);
        };
        let axis = normalize_axis("Concat", axis, first.len())?;
        let mut dims = first.to_vec();

        for i in 1..ctx.input_count() {
            if ctx.input_dtype(i)? != dtype {
                return Err(Error::ShapeInference(format!(
                    "Concat input {i} has element type {}, expected {dtype}",
                    ctx.input_dtype(i)?
                )));
            }

            let Some(next) = ctx.input_shape(i)?.dims() else {
                return Ok(vec![OutputType::new(dtype, PartialShape::DynamicRank)]);
            };
            if next.len() != dims.len() {
                return Err(Error::ShapeInference(format!(
                    "Concat input {i} has {} dimensions, expected {}",
                    next.len(),
                    dims.len()
                )));
            }

            for (d, (current, next)) in dims.iter_mut().zip(next).enumerate() {
                *current = match (d == axis, *current, *next) {
                    (true, Dimension::Static(a), Dimension::Static(b)) => Dimension::Static(a + b),
                    (true, _, _) => Dimension::Dynamic,
                    (false, Dimension::Static(a), Dimension::Static(b)) if a != b => {
                        return Err(Error::ShapeInference(format!(
                            "Concat input {i} dimension {d} mismatch: {b} vs {a}"
                        )));
                    }
                    (false, Dimension::Dynamic, other) => other,
                    (false, current, _) => current,
                };
            }
        }

        Ok(vec![OutputType::new(dtype, PartialShape::Ranked(dims))])
    }

    fn try_fold(&self, ctx: &InferenceCtx) -> Result<Vec<Option<TensorValue>>> {
        let mut values = Vec::with_capacity(ctx.input_count());
        for i in 0..ctx.input_count() {
            match ctx.input_value(i)? {
                Some(value) if value.ndim() == 1 => values.push(value),
                _ => return Ok(vec![None]),
            }
        }

        let Some(first) = values.first() else {
            return Ok(vec![None]);
        };

        let data = match &first.data {
            TensorData::I64(_) => TensorData::I64(concat_1d(&values, |v| v.as_i64())?),
            TensorData::I32(_) => TensorData::I32(concat_1d(&values, |v| v.as_i32())?),
            TensorData::F32(_) => TensorData::F32(concat_1d(&values, |v| v.as_f32())?),
            TensorData::F64(_) => TensorData::F64(concat_1d(&values, |v| v.as_f64())?),
            // Other types not supported for constant folding
            _ => return Ok(vec![None]),
        };

        let len = data.len();
        let dtype = data.dtype();
        Ok(vec![Some(TensorValue::new(data, vec![len], dtype))])
    }
}

fn concat_1d<T: Copy>(
    values: &[&TensorValue],
    slice: impl Fn(&TensorValue) -> Option<&[T]>,
) -> Result<Vec<T>> {
    let mut result = Vec::new();
    for value in values {
        let data = slice(value).ok_or_else(|| {
            Error::ConstantFolding("Concat: input types mismatch".to_string())
        })?;
        result.extend_from_slice(data);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reshape_pattern_entries() {
        let input = PartialShape::from_static(&[2, 3, 4]);

        assert_eq!(
            ReshapeOp::output_shape(&input, &[6, 4], false).unwrap(),
            PartialShape::from_static(&[6, 4])
        );
        assert_eq!(
            ReshapeOp::output_shape(&input, &[-1, 4], false).unwrap(),
            PartialShape::from_static(&[6, 4])
        );
        assert_eq!(
            ReshapeOp::output_shape(&input, &[0, -1], true).unwrap(),
            PartialShape::from_static(&[2, 12])
        );
        assert!(ReshapeOp::output_shape(&input, &[-1, -1], false).is_err());
        assert!(ReshapeOp::output_shape(&input, &[5, 5], false).is_err());
        assert!(ReshapeOp::output_shape(&input, &[-2, 12], false).is_err());
    }

    #[test]
    fn test_reshape_with_dynamic_input() {
        let input = PartialShape::Ranked(vec![Dimension::Dynamic, Dimension::Static(4)]);

        assert_eq!(
            ReshapeOp::output_shape(&input, &[-1, 2, 2], false).unwrap(),
            PartialShape::Ranked(vec![
                Dimension::Dynamic,
                Dimension::Static(2),
                Dimension::Static(2),
            ])
        );
        assert_eq!(
            ReshapeOp::output_shape(&input, &[0, 4], true).unwrap(),
            input
        );
    }
}
