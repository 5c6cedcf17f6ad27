//! Core graph representation and rewriting infrastructure for Tessera.
//!
//! This crate provides the foundational abstractions that all other Tessera crates depend on:
//! - Function container (`Function`, `Node`, `Output`) backed by an index arena
//! - Operator trait and registry for shape inference and constant folding
//! - Declarative pattern matching over function graphs (`Pattern`, `Match`)
//! - Matcher and whole-function pass traits (`MatcherPass`, `FunctionPass`)
//! - Pass manager that sequences passes and re-validates after each mutation

pub mod ir;
pub mod operator;
pub mod pass;
pub mod pass_manager;
pub mod pattern;
pub mod registry;
pub mod rewrite;
pub mod shape_inference;
pub mod types;

// Re-export commonly used types
pub use ir::{CONSTANT, Function, Node, NodeId, Output, OutputSlot, PARAMETER, RESULT};
pub use operator::{Operator, OutputType};
pub use pass::{FunctionPass, MatcherPass, PassContext, PassKind, Rewrite};
pub use pass_manager::{PassManager, PassManagerConfig};
pub use pattern::{Match, Pattern, Predicate};
pub use registry::OperatorRegistry;
pub use rewrite::GraphRewrite;
pub use shape_inference::{InferenceCtx, ShapeInferencePass};
pub use types::{AttributeValue, DataType, Dimension, PartialShape, TensorData, TensorValue};

/// Result type using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for tessera-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The graph is cyclic or holds a dangling reference. Fatal for the pipeline.
    #[error("Structural error: {0}")]
    Structural(String),

    /// A pass was invoked outside its documented applicability.
    #[error("Precondition violation: {0}")]
    PreconditionViolation(String),

    #[error("Pass '{pass}' did not reach a fixpoint within {iterations} iterations")]
    FixpointNotReached { pass: String, iterations: usize },

    #[error("Shape inference error: {0}")]
    ShapeInference(String),

    #[error("Constant folding error: {0}")]
    ConstantFolding(String),

    #[error("Attribute error: {0}")]
    Attribute(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}
