//! Graph-rewriting passes for Tessera functions.
//!
//! - [`MimicSetBatchSize`] relaxes Reshapes whose target pattern hard-codes
//!   the batch, so [`set_batch_size`] can resize a function's inputs.
//! - [`ReplaceLoadsWithScalarLoads`] and [`ReplaceStoresWithScalarStores`]
//!   lower vector memory accesses; [`vector_to_scalar`] groups them.

pub mod batch_size_relaxation;
pub mod smart_reshape;
pub mod vector_to_scalar;

pub use batch_size_relaxation::{MimicSetBatchSize, relaxed_batch};
pub use smart_reshape::set_batch_size;
pub use vector_to_scalar::{
    ReplaceLoadsWithScalarLoads, ReplaceStoresWithScalarStores, VectorToScalar,
    check_canonical_form, vector_to_scalar,
};
