//! Memory access operator family.
//!
//! Covers: Load, Store, ScalarLoad, ScalarStore

use tessera_core::{Error, InferenceCtx, Operator, OutputType, Result};

/// Vector load from memory.
pub const LOAD: &str = "Load";

/// Vector store to memory.
pub const STORE: &str = "Store";

/// Single-element load used by tail loops.
pub const SCALAR_LOAD: &str = "ScalarLoad";

/// Single-element store used by tail loops.
pub const SCALAR_STORE: &str = "ScalarStore";

/// Integer attribute: number of elements moved per access.
pub const VECTOR_WIDTH: &str = "vector_width";

/// Memory access operator family.
///
/// Every access reads its addressing from input 0 and produces a value of
/// the same element type and shape, so lowering a vector access to a scalar
/// one never changes what flows along the edge. The `vector_width` attribute
/// must be an integer of at least 1; scalar accesses accept only 1.
pub struct MemoryAccessOp {
    name: &'static str,
    scalar: bool,
}

impl MemoryAccessOp {
    /// Create a Load operator.
    pub fn load() -> Self {
        Self {
            name: LOAD,
            scalar: false,
        }
    }

    /// Create a Store operator.
    pub fn store() -> Self {
        Self {
            name: STORE,
            scalar: false,
        }
    }

    /// Create a ScalarLoad operator.
    pub fn scalar_load() -> Self {
        Self {
            name: SCALAR_LOAD,
            scalar: true,
        }
    }

    /// Create a ScalarStore operator.
    pub fn scalar_store() -> Self {
        Self {
            name: SCALAR_STORE,
            scalar: true,
        }
    }

    /// Operator type this instance is registered under.
    pub fn op_name(&self) -> &'static str {
        self.name
    }

    pub fn is_scalar(&self) -> bool {
        self.scalar
    }
}

impl Operator for MemoryAccessOp {
    fn name(&self) -> &str {
        self.name
    }

    fn infer_output_types(&self, ctx: &InferenceCtx) -> Result<Vec<OutputType>> {
        ctx.expect_inputs(1)?;

        let width = ctx.attr_i64_or(VECTOR_WIDTH, 1)?;
        if width < 1 {
            return Err(Error::Attribute(format!(
                "{}: {VECTOR_WIDTH} must be at least 1, got {width}",
                self.name
            )));
        }
        if self.scalar && width != 1 {
            return Err(Error::Attribute(format!(
                "{}: scalar access requires {VECTOR_WIDTH} = 1, got {width}",
                self.name
            )));
        }

        Ok(vec![OutputType::new(
            ctx.input_dtype(0)?,
            ctx.input_shape(0)?.clone(),
        )])
    }
}
