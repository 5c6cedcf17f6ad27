//! Operator registry for dynamic dispatch.

use crate::operator::Operator;
use std::collections::HashMap;

/// Registry for operator implementations.
///
/// Maps operator type names (e.g., "Reshape", "Load") to their corresponding
/// `Operator` implementations. Shape inference looks operators up here by
/// `Node::op_type`.
///
/// # Example
///
/// ```ignore
/// let mut registry = OperatorRegistry::new();
/// registry.register("Reshape", ReshapeOp);
/// registry.register("ShapeOf", ShapeOfOp);
///
/// let op = registry.get("Reshape").unwrap();
/// ```
pub struct OperatorRegistry {
    /// Map from op_type string to operator implementation.
    operators: HashMap<String, Box<dyn Operator>>,
}

impl OperatorRegistry {
    /// Create a new empty operator registry.
    pub fn new() -> Self {
        Self {
            operators: HashMap::new(),
        }
    }

    /// Register an operator.
    ///
    /// Returns `self` for method chaining. Registering a name twice replaces
    /// the earlier implementation.
    pub fn register<O>(&mut self, name: &str, operator: O) -> &mut Self
    where
        O: Operator + 'static,
    {
        self.operators.insert(name.to_string(), Box::new(operator));
        self
    }

    /// Look up an operator by name.
    pub fn get(&self, name: &str) -> Option<&dyn Operator> {
        self.operators.get(name).map(|op| op.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Iterate over all registered operator names.
    pub fn operator_names(&self) -> impl Iterator<Item = &str> {
        self.operators.keys().map(|s| s.as_str())
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DataType, InferenceCtx, OutputType, PartialShape, Result};

    struct LoadOp;
    impl Operator for LoadOp {
        fn name(&self) -> &str {
            "Load"
        }
        fn infer_output_types(&self, _ctx: &InferenceCtx) -> Result<Vec<OutputType>> {
            Ok(vec![OutputType::new(DataType::F32, PartialShape::DynamicRank)])
        }
    }

    struct StoreOp;
    impl Operator for StoreOp {
        fn name(&self) -> &str {
            "Store"
        }
        fn infer_output_types(&self, _ctx: &InferenceCtx) -> Result<Vec<OutputType>> {
            Ok(vec![OutputType::new(DataType::F32, PartialShape::DynamicRank)])
        }
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = OperatorRegistry::new();
        registry.register("Load", LoadOp).register("Store", StoreOp);

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("Load"));
        assert!(!registry.contains("ScalarLoad"));
        assert_eq!(registry.get("Store").unwrap().name(), "Store");
        assert!(registry.get("ScalarStore").is_none());

        let mut names: Vec<_> = registry.operator_names().collect();
        names.sort();
        assert_eq!(names, vec!["Load", "Store"]);
    }

    #[test]
    fn test_empty_registry() {
        let registry = OperatorRegistry::default();
        assert!(registry.is_empty());
    }
}
