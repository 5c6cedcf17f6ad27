//! Helper functions for operator implementation.

use tessera_core::{Dimension, Error, PartialShape, Result};

/// Broadcast two partial shapes to a common output shape.
///
/// Implements NumPy-style broadcasting rules:
/// - Shapes are aligned from the rightmost dimension
/// - Dimensions match if they are equal or one of them is 1
/// - Missing dimensions in shorter shapes are treated as 1
///
/// A dynamic dimension broadcast against 1 stays dynamic; against a static
/// extent other than 1 it resolves to that extent. Unknown rank on either side
/// gives unknown rank.
///
/// # Example
///
/// ```text
/// [2, 3, 4] + [3, 4]    -> [2, 3, 4]
/// [?, 3]    + [1]       -> [?, 3]
/// [?, 1]    + [5, 4]    -> [5, 4]
/// ```
pub fn broadcast_partial_shapes(a: &PartialShape, b: &PartialShape) -> Result<PartialShape> {
    let (Some(a_dims), Some(b_dims)) = (a.dims(), b.dims()) else {
        return Ok(PartialShape::DynamicRank);
    };

    let rank = a_dims.len().max(b_dims.len());
    let mut result = Vec::with_capacity(rank);

    for i in 0..rank {
        // Iterate from the leftmost output dimension, reading both shapes
        // right-aligned.
        let pick = |dims: &[Dimension]| {
            let offset = rank - dims.len();
            if i < offset {
                Dimension::Static(1)
            } else {
                dims[i - offset]
            }
        };

        let dim = match (pick(a_dims), pick(b_dims)) {
            (Dimension::Static(1), other) | (other, Dimension::Static(1)) => other,
            (Dimension::Static(x), Dimension::Static(y)) if x == y => Dimension::Static(x),
            (Dimension::Static(x), Dimension::Static(y)) => {
                return Err(Error::ShapeInference(format!(
                    "Cannot broadcast shapes {a} and {b}: dimension mismatch at position {i} ({x} vs {y})"
                )));
            }
            (Dimension::Static(n), Dimension::Dynamic) | (Dimension::Dynamic, Dimension::Static(n)) => {
                Dimension::Static(n)
            }
            (Dimension::Dynamic, Dimension::Dynamic) => Dimension::Dynamic,
        };
        result.push(dim);
    }

    Ok(PartialShape::Ranked(result))
}

/// Broadcast two static shapes.
pub fn broadcast_shapes(a: &[usize], b: &[usize]) -> Result<Vec<usize>> {
    let shape = broadcast_partial_shapes(&PartialShape::from_static(a), &PartialShape::from_static(b))?;
    shape
        .to_static()
        .ok_or_else(|| Error::ShapeInference("Broadcast of static shapes is not static".to_string()))
}

/// Apply a binary function element-wise with broadcasting.
///
/// `out_shape` must be the broadcast of `a_shape` and `b_shape`.
pub fn broadcast_apply<T: Copy>(
    a: &[T],
    a_shape: &[usize],
    b: &[T],
    b_shape: &[usize],
    out_shape: &[usize],
    f: impl Fn(T, T) -> T,
) -> Vec<T> {
    let count: usize = out_shape.iter().product();

    // Fast path: same shape
    if a_shape == b_shape {
        return a.iter().zip(b).map(|(&x, &y)| f(x, y)).collect();
    }

    let a_strides = broadcast_strides(a_shape, out_shape);
    let b_strides = broadcast_strides(b_shape, out_shape);

    let mut out = Vec::with_capacity(count);
    let mut index = vec![0usize; out_shape.len()];
    for _ in 0..count {
        let a_offset: usize = index.iter().zip(&a_strides).map(|(i, s)| i * s).sum();
        let b_offset: usize = index.iter().zip(&b_strides).map(|(i, s)| i * s).sum();
        out.push(f(a[a_offset], b[b_offset]));

        for axis in (0..out_shape.len()).rev() {
            index[axis] += 1;
            if index[axis] < out_shape[axis] {
                break;
            }
            index[axis] = 0;
        }
    }
    out
}

/// Row-major strides of `shape` laid over `out_shape`, with 0 on broadcast axes.
fn broadcast_strides(shape: &[usize], out_shape: &[usize]) -> Vec<usize> {
    let offset = out_shape.len() - shape.len();
    let mut strides = vec![0; out_shape.len()];
    let mut stride = 1;
    for (i, &dim) in shape.iter().enumerate().rev() {
        strides[offset + i] = if dim == 1 { 0 } else { stride };
        stride *= dim;
    }
    strides
}

/// Resolve a possibly negative axis against `rank`.
pub fn normalize_axis(op: &str, axis: i64, rank: usize) -> Result<usize> {
    let rank = rank as i64;
    let normalized = if axis < 0 { rank + axis } else { axis };
    if normalized < 0 || normalized >= rank {
        return Err(Error::ShapeInference(format!(
            "{op}: axis {axis} out of bounds for rank {rank}"
        )));
    }
    Ok(normalized as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_shapes() {
        assert_eq!(broadcast_shapes(&[2, 3, 4], &[2, 3, 4]).unwrap(), vec![2, 3, 4]);
        assert_eq!(broadcast_shapes(&[2, 3, 4], &[3, 4]).unwrap(), vec![2, 3, 4]);
        assert_eq!(broadcast_shapes(&[2, 3, 4], &[2, 1, 4]).unwrap(), vec![2, 3, 4]);
        assert_eq!(broadcast_shapes(&[8, 1, 6, 1], &[7, 1, 5]).unwrap(), vec![8, 7, 6, 5]);
        assert!(broadcast_shapes(&[2, 3], &[4, 3]).is_err());
    }

    #[test]
    fn test_broadcast_partial_shapes() {
        let batch = PartialShape::Ranked(vec![Dimension::Dynamic, Dimension::Static(3)]);
        assert_eq!(
            broadcast_partial_shapes(&batch, &PartialShape::from_static(&[1])).unwrap(),
            batch
        );

        let column = PartialShape::Ranked(vec![Dimension::Dynamic, Dimension::Static(1)]);
        assert_eq!(
            broadcast_partial_shapes(&column, &PartialShape::from_static(&[5, 4])).unwrap(),
            PartialShape::from_static(&[5, 4])
        );

        assert_eq!(
            broadcast_partial_shapes(&PartialShape::DynamicRank, &batch).unwrap(),
            PartialShape::DynamicRank
        );
    }

    #[test]
    fn test_broadcast_apply() {
        // [2, 3] + [3]
        let out = broadcast_apply(&[1, 2, 3, 4, 5, 6], &[2, 3], &[10, 20, 30], &[3], &[2, 3], |x, y| {
            x + y
        });
        assert_eq!(out, vec![11, 22, 33, 14, 25, 36]);

        // [2, 1] * [1, 2]
        let out = broadcast_apply(&[2.0, 3.0], &[2, 1], &[1.0, 10.0], &[1, 2], &[2, 2], |x, y| x * y);
        assert_eq!(out, vec![2.0, 20.0, 3.0, 30.0]);
    }

    #[test]
    fn test_normalize_axis() {
        assert_eq!(normalize_axis("Concat", 0, 2).unwrap(), 0);
        assert_eq!(normalize_axis("Concat", -1, 2).unwrap(), 1);
        assert!(normalize_axis("Concat", 2, 2).is_err());
        assert!(normalize_axis("Concat", -3, 2).is_err());
    }
}
