//! Declarative pattern matching over function graphs.
//!
//! A `Pattern` is a template fragment rooted at one node. Each pattern node is
//! either:
//! - a concrete-kind matcher (`Pattern::op("Reshape")`, `Pattern::ops(&[..])`)
//! - a wildcard (`Pattern::any()`) accepting any node and any structure above it
//! - a predicate matcher (`Pattern::predicate(..)`) testing attributes or shapes
//!
//! Concrete-kind matchers may carry an extra predicate and input sub-patterns.
//! Any pattern node may carry a label; the resulting `Match` maps labels to
//! the bound nodes.
//!
//! # Example
//!
//! ```ignore
//! // Reshape whose target pattern comes from a Constant
//! let pattern = Pattern::op("Reshape").with_inputs(vec![
//!     Pattern::any().named("data"),
//!     Pattern::op("Constant").named("target"),
//! ]);
//! ```
//!
//! Matching is deterministic and greedy: inputs are bound positionally by
//! following input references, and a failing check rejects the candidate
//! without trying any alternative binding.

use crate::ir::{Function, NodeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Boolean test over a candidate node.
pub type Predicate = Arc<dyn Fn(&Function, NodeId) -> bool + Send + Sync>;

#[derive(Clone)]
enum Kind {
    Ops(Vec<String>),
    Any,
    Predicate,
}

/// Template graph fragment.
#[derive(Clone)]
pub struct Pattern {
    kind: Kind,
    predicate: Option<Predicate>,
    label: Option<String>,
    /// `None` leaves the candidate's inputs unconstrained.
    inputs: Option<Vec<Pattern>>,
}

impl Pattern {
    /// Match nodes of one operator type.
    pub fn op(op_type: &str) -> Self {
        Self::ops(&[op_type])
    }

    /// Match nodes of any of the given operator types.
    pub fn ops(op_types: &[&str]) -> Self {
        Self {
            kind: Kind::Ops(op_types.iter().map(|s| s.to_string()).collect()),
            predicate: None,
            label: None,
            inputs: None,
        }
    }

    /// Match any node.
    pub fn any() -> Self {
        Self {
            kind: Kind::Any,
            predicate: None,
            label: None,
            inputs: None,
        }
    }

    /// Match any node satisfying `predicate`.
    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&Function, NodeId) -> bool + Send + Sync + 'static,
    {
        Self {
            kind: Kind::Predicate,
            predicate: Some(Arc::new(predicate)),
            label: None,
            inputs: None,
        }
    }

    /// Attach an additional predicate.
    ///
    /// Ignored on wildcards, which accept unconditionally.
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Function, NodeId) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Bind the matched node to `label`.
    pub fn named(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    /// Constrain the candidate's inputs positionally.
    ///
    /// The candidate must have exactly `inputs.len()` inputs.
    pub fn with_inputs(mut self, inputs: Vec<Pattern>) -> Self {
        self.inputs = Some(inputs);
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Try to bind the pattern with its root at `root`.
    ///
    /// Never mutates the function. Returns `None` when the pattern does not match.
    pub fn matches(&self, function: &Function, root: NodeId) -> Option<Match> {
        let mut bindings = HashMap::new();
        if self.bind(function, root, &mut bindings) {
            Some(Match { root, bindings })
        } else {
            None
        }
    }

    /// Collect every match in topological order, one per root.
    pub fn find_all(&self, function: &Function) -> Vec<Match> {
        function
            .topological_order()
            .into_iter()
            .filter_map(|id| self.matches(function, id))
            .collect()
    }

    fn bind(
        &self,
        function: &Function,
        id: NodeId,
        bindings: &mut HashMap<String, NodeId>,
    ) -> bool {
        let Ok(node) = function.node(id) else {
            return false;
        };

        if let Some(label) = &self.label {
            match bindings.get(label) {
                Some(&bound) if bound != id => {
                    tracing::trace!(label = %label, ?bound, candidate = ?id, "label bound to another node");
                    return false;
                }
                _ => {
                    bindings.insert(label.clone(), id);
                }
            }
        }

        match &self.kind {
            Kind::Any => return true,
            Kind::Ops(op_types) => {
                if !op_types.iter().any(|op| node.is(op)) {
                    return false;
                }
            }
            Kind::Predicate => {}
        }

        if let Some(predicate) = &self.predicate {
            if !predicate(function, id) {
                tracing::trace!(op_type = %node.op_type, candidate = ?id, "predicate rejected candidate");
                return false;
            }
        }

        let Some(input_patterns) = &self.inputs else {
            return true;
        };

        if input_patterns.len() != node.inputs.len() {
            return false;
        }

        input_patterns
            .iter()
            .zip(&node.inputs)
            .all(|(pattern, input)| pattern.bind(function, input.node, bindings))
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            Kind::Ops(ops) => ops.join("|"),
            Kind::Any => "*".to_string(),
            Kind::Predicate => "?".to_string(),
        };
        f.debug_struct("Pattern")
            .field("kind", &kind)
            .field("label", &self.label)
            .field("has_predicate", &self.predicate.is_some())
            .field("inputs", &self.inputs)
            .finish()
    }
}

/// Binding of pattern labels to concrete nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    root: NodeId,
    bindings: HashMap<String, NodeId>,
}

impl Match {
    /// Node the pattern root was bound to.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Node bound to `label`, if the label took part in the match.
    pub fn get(&self, label: &str) -> Option<NodeId> {
        self.bindings.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
