//! Core types for element types, partial shapes, attributes, and constant payloads.

use crate::{Error, Result};
use std::fmt;

/// Element type of a tensor flowing along an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    F64,
    F32,
    F16,
    I64,
    I32,
    U8,
    Bool,
}

impl DataType {
    /// Size of this data type in bytes.
    pub fn size(&self) -> usize {
        match self {
            DataType::F64 | DataType::I64 => 8,
            DataType::F32 | DataType::I32 => 4,
            DataType::F16 => 2,
            DataType::U8 | DataType::Bool => 1,
        }
    }

    /// Short lowercase name, as used by the `destination_type` attribute of `Convert`.
    pub fn name(&self) -> &'static str {
        match self {
            DataType::F64 => "f64",
            DataType::F32 => "f32",
            DataType::F16 => "f16",
            DataType::I64 => "i64",
            DataType::I32 => "i32",
            DataType::U8 => "u8",
            DataType::Bool => "boolean",
        }
    }

    /// Parse a short lowercase type name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "f64" => Ok(DataType::F64),
            "f32" => Ok(DataType::F32),
            "f16" => Ok(DataType::F16),
            "i64" => Ok(DataType::I64),
            "i32" => Ok(DataType::I32),
            "u8" => Ok(DataType::U8),
            "boolean" => Ok(DataType::Bool),
            other => Err(Error::Attribute(format!("Unknown element type '{other}'"))),
        }
    }

    /// Check if this is a floating-point type.
    pub fn is_float(&self) -> bool {
        matches!(self, DataType::F64 | DataType::F32 | DataType::F16)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single dimension of a partial shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    /// Extent known at compile time.
    Static(usize),

    /// Extent only known at execution time.
    Dynamic,
}

impl Dimension {
    /// Get the static extent if available.
    pub fn as_static(&self) -> Option<usize> {
        match self {
            Dimension::Static(n) => Some(*n),
            Dimension::Dynamic => None,
        }
    }

    pub fn is_static(&self) -> bool {
        matches!(self, Dimension::Static(_))
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Static(n) => write!(f, "{n}"),
            Dimension::Dynamic => f.write_str("?"),
        }
    }
}

/// Shape descriptor attached to every output slot.
///
/// A shape is either of unknown rank, or of known rank where each dimension
/// may individually be static or dynamic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PartialShape {
    /// Rank is not known.
    DynamicRank,

    /// Rank is known; dimensions may still be dynamic.
    Ranked(Vec<Dimension>),
}

impl PartialShape {
    /// Create a fully static shape.
    pub fn from_static(dims: &[usize]) -> Self {
        PartialShape::Ranked(dims.iter().map(|&d| Dimension::Static(d)).collect())
    }

    /// Create a shape of known rank with every dimension dynamic.
    pub fn dynamic_of_rank(rank: usize) -> Self {
        PartialShape::Ranked(vec![Dimension::Dynamic; rank])
    }

    /// Scalar shape (rank 0).
    pub fn scalar() -> Self {
        PartialShape::Ranked(Vec::new())
    }

    /// Number of dimensions, if known.
    pub fn rank(&self) -> Option<usize> {
        match self {
            PartialShape::Ranked(dims) => Some(dims.len()),
            PartialShape::DynamicRank => None,
        }
    }

    /// Get the dimensions if the rank is known.
    pub fn dims(&self) -> Option<&[Dimension]> {
        match self {
            PartialShape::Ranked(dims) => Some(dims),
            PartialShape::DynamicRank => None,
        }
    }

    /// Get a single dimension, if the rank is known and the index is in range.
    pub fn dim(&self, index: usize) -> Option<Dimension> {
        self.dims().and_then(|dims| dims.get(index).copied())
    }

    /// Check if every dimension is known.
    pub fn is_static(&self) -> bool {
        match self {
            PartialShape::Ranked(dims) => dims.iter().all(Dimension::is_static),
            PartialShape::DynamicRank => false,
        }
    }

    /// Get the static extents if the shape is fully static.
    pub fn to_static(&self) -> Option<Vec<usize>> {
        self.dims()?.iter().map(Dimension::as_static).collect()
    }

    /// Return a copy with dimension `index` replaced.
    ///
    /// Shapes of unknown rank and out-of-range indices are returned unchanged.
    pub fn with_dim(&self, index: usize, dim: Dimension) -> Self {
        match self {
            PartialShape::Ranked(dims) if index < dims.len() => {
                let mut dims = dims.clone();
                dims[index] = dim;
                PartialShape::Ranked(dims)
            }
            other => other.clone(),
        }
    }
}

impl fmt::Display for PartialShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartialShape::DynamicRank => f.write_str("[...]"),
            PartialShape::Ranked(dims) => {
                f.write_str("[")?;
                for (i, dim) in dims.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{dim}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Typed value of a node attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Float(f32),
    Int(i64),
    Bool(bool),
    String(String),
    Floats(Vec<f32>),
    Ints(Vec<i64>),
    Strings(Vec<String>),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Float(v) => write!(f, "{v}"),
            AttributeValue::Int(v) => write!(f, "{v}"),
            AttributeValue::Bool(v) => write!(f, "{v}"),
            AttributeValue::String(v) => write!(f, "\"{v}\""),
            AttributeValue::Floats(v) => write!(f, "{v:?}"),
            AttributeValue::Ints(v) => write!(f, "{v:?}"),
            AttributeValue::Strings(v) => write!(f, "{v:?}"),
        }
    }
}

/// Raw tensor data for constant payloads and folded values.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    F64(Vec<f64>),
    F32(Vec<f32>),
    I64(Vec<i64>),
    I32(Vec<i32>),
    U8(Vec<u8>),
    Bool(Vec<bool>),
}

impl TensorData {
    /// Get the number of elements in this tensor data.
    pub fn len(&self) -> usize {
        match self {
            TensorData::F64(v) => v.len(),
            TensorData::F32(v) => v.len(),
            TensorData::I64(v) => v.len(),
            TensorData::I32(v) => v.len(),
            TensorData::U8(v) => v.len(),
            TensorData::Bool(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the inferred data type from this tensor data.
    pub fn dtype(&self) -> DataType {
        match self {
            TensorData::F64(_) => DataType::F64,
            TensorData::F32(_) => DataType::F32,
            TensorData::I64(_) => DataType::I64,
            TensorData::I32(_) => DataType::I32,
            TensorData::U8(_) => DataType::U8,
            TensorData::Bool(_) => DataType::Bool,
        }
    }
}

/// A tensor value known at compile time.
///
/// Used both as the payload of `Constant` nodes and as the folded value
/// cached on output slots, which lets shape inference read a Reshape target
/// computed upstream by ShapeOf/Gather/Concat chains.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorValue {
    /// The raw tensor data.
    pub data: TensorData,

    /// The shape of the tensor (dimensions).
    pub shape: Vec<usize>,

    /// The data type of the tensor.
    pub dtype: DataType,
}

impl TensorValue {
    /// Create a new TensorValue with data, shape, and dtype.
    ///
    /// # Panics
    ///
    /// Panics if the data length doesn't match the shape product, or if the
    /// data variant doesn't match `dtype`.
    pub fn new(data: TensorData, shape: Vec<usize>, dtype: DataType) -> Self {
        let expected_len: usize = shape.iter().product();
        assert_eq!(
            data.len(),
            expected_len,
            "Data length {} doesn't match shape {:?} (product = {})",
            data.len(),
            shape,
            expected_len
        );
        assert_eq!(
            data.dtype(),
            dtype,
            "Data type {:?} doesn't match declared dtype {:?}",
            data.dtype(),
            dtype
        );
        Self { data, shape, dtype }
    }

    /// Create a scalar TensorValue (shape = []).
    pub fn scalar(data: TensorData) -> Self {
        let dtype = data.dtype();
        Self::new(data, vec![], dtype)
    }

    /// Create a 1-D i64 tensor.
    pub fn from_i64(values: Vec<i64>) -> Self {
        let len = values.len();
        Self::new(TensorData::I64(values), vec![len], DataType::I64)
    }

    /// Create a 1-D f32 tensor.
    pub fn from_f32(values: Vec<f32>) -> Self {
        let len = values.len();
        Self::new(TensorData::F32(values), vec![len], DataType::F32)
    }

    /// Create a 1-D f64 tensor.
    pub fn from_f64(values: Vec<f64>) -> Self {
        let len = values.len();
        Self::new(TensorData::F64(values), vec![len], DataType::F64)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn as_i64(&self) -> Option<&[i64]> {
        match &self.data {
            TensorData::I64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<&[i32]> {
        match &self.data {
            TensorData::I32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.data {
            TensorData::F32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<&[f64]> {
        match &self.data {
            TensorData::F64(v) => Some(v),
            _ => None,
        }
    }

    /// Read integer elements, widening i32 to i64.
    ///
    /// Returns `None` for non-integer data.
    pub fn to_i64_vec(&self) -> Option<Vec<i64>> {
        match &self.data {
            TensorData::I64(v) => Some(v.clone()),
            TensorData::I32(v) => Some(v.iter().map(|&x| x as i64).collect()),
            TensorData::U8(v) => Some(v.iter().map(|&x| x as i64).collect()),
            _ => None,
        }
    }

    /// Create a new TensorValue with a different shape (data unchanged).
    ///
    /// # Panics
    ///
    /// Panics if the new shape product doesn't match the data length.
    pub fn reshape(&self, new_shape: Vec<usize>) -> Self {
        Self::new(self.data.clone(), new_shape, self.dtype)
    }

    /// Cast this value to a different type.
    pub fn cast(&self, target_dtype: DataType) -> Result<TensorValue> {
        if self.dtype == target_dtype {
            return Ok(self.clone());
        }

        let as_f64: Vec<f64> = match &self.data {
            TensorData::F64(v) => v.clone(),
            TensorData::F32(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::I64(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::I32(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::U8(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::Bool(v) => v.iter().map(|&x| if x { 1.0 } else { 0.0 }).collect(),
        };

        let new_data = match target_dtype {
            DataType::F64 => TensorData::F64(as_f64),
            DataType::F32 => TensorData::F32(as_f64.iter().map(|&x| x as f32).collect()),
            // Float to integer conversion truncates toward zero.
            DataType::I64 => TensorData::I64(as_f64.iter().map(|&x| x as i64).collect()),
            DataType::I32 => TensorData::I32(as_f64.iter().map(|&x| x as i32).collect()),
            DataType::U8 => TensorData::U8(as_f64.iter().map(|&x| x as u8).collect()),
            DataType::Bool => TensorData::Bool(as_f64.iter().map(|&x| x != 0.0).collect()),
            DataType::F16 => {
                return Err(Error::ConstantFolding(format!(
                    "Cast from {:?} to {:?} not supported in constant folding",
                    self.dtype, target_dtype
                )));
            }
        };

        Ok(TensorValue::new(new_data, self.shape.clone(), target_dtype))
    }

    /// Serialize the payload to little-endian bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        match &self.data {
            TensorData::F64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            TensorData::F32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            TensorData::I64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            TensorData::I32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            TensorData::U8(v) => v.clone(),
            TensorData::Bool(v) => v.iter().map(|&x| x as u8).collect(),
        }
    }
}
