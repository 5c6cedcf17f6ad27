//! Shape and value inference.
//!
//! Forward walk in topological order that calls `Operator::infer_output_types()`
//! and `Operator::try_fold()` for every stale node. Folded values are cached
//! on output slots, which enables data-dependent inference such as a Reshape
//! reading its target from an upstream ShapeOf→Gather→Concat chain.

use crate::ir::{Function, Node, NodeId, Output, OutputSlot};
use crate::pass::{FunctionPass, PassContext};
use crate::registry::OperatorRegistry;
use crate::types::{AttributeValue, DataType, PartialShape, TensorValue};
use crate::{Error, Result};

/// Context passed to `Operator` during shape and value inference.
///
/// Gives read-only access to the node, its inputs' slots, and its attributes.
pub struct InferenceCtx<'a> {
    /// The node being analysed.
    pub node_id: NodeId,

    pub node: &'a Node,

    /// The owning function (for reading input slots).
    pub function: &'a Function,
}

impl<'a> InferenceCtx<'a> {
    pub fn new(node_id: NodeId, node: &'a Node, function: &'a Function) -> Self {
        Self {
            node_id,
            node,
            function,
        }
    }

    /// Get the number of inputs to this node.
    pub fn input_count(&self) -> usize {
        self.node.inputs.len()
    }

    /// Fail unless the node has exactly `expected` inputs.
    pub fn expect_inputs(&self, expected: usize) -> Result<()> {
        if self.node.inputs.len() != expected {
            return Err(Error::ShapeInference(format!(
                "{} expects {expected} inputs, got {}",
                self.node.op_type,
                self.node.inputs.len()
            )));
        }
        Ok(())
    }

    /// Get the input reference at `index`.
    pub fn input(&self, index: usize) -> Result<Output> {
        self.node.inputs.get(index).copied().ok_or_else(|| {
            Error::ShapeInference(format!(
                "Input index {index} out of range (node has {} inputs)",
                self.node.inputs.len()
            ))
        })
    }

    /// Get the producer slot of an input.
    pub fn input_slot(&self, index: usize) -> Result<&'a OutputSlot> {
        self.function.slot(self.input(index)?)
    }

    pub fn input_shape(&self, index: usize) -> Result<&'a PartialShape> {
        Ok(&self.input_slot(index)?.shape)
    }

    pub fn input_dtype(&self, index: usize) -> Result<DataType> {
        Ok(self.input_slot(index)?.dtype)
    }

    /// Get the compile-time value of an input, if known.
    pub fn input_value(&self, index: usize) -> Result<Option<&'a TensorValue>> {
        Ok(self.input_slot(index)?.value.as_ref())
    }

    /// Get a node attribute by name.
    pub fn attr(&self, name: &str) -> Option<&'a AttributeValue> {
        self.node.attributes.get(name)
    }

    /// Get a required i64 attribute.
    pub fn attr_i64(&self, name: &str) -> Result<i64> {
        match self.attr(name) {
            Some(AttributeValue::Int(v)) => Ok(*v),
            _ => Err(Error::Attribute(format!(
                "{}: missing required i64 attribute '{name}'",
                self.node.op_type
            ))),
        }
    }

    /// Get an optional i64 attribute with a default.
    pub fn attr_i64_or(&self, name: &str, default: i64) -> Result<i64> {
        match self.attr(name) {
            None => Ok(default),
            Some(AttributeValue::Int(v)) => Ok(*v),
            Some(other) => Err(Error::Attribute(format!(
                "{}: attribute '{name}' must be an integer, got {other}",
                self.node.op_type
            ))),
        }
    }

    /// Get an optional bool attribute with a default.
    pub fn attr_bool_or(&self, name: &str, default: bool) -> Result<bool> {
        match self.attr(name) {
            None => Ok(default),
            Some(AttributeValue::Bool(v)) => Ok(*v),
            Some(other) => Err(Error::Attribute(format!(
                "{}: attribute '{name}' must be a bool, got {other}",
                self.node.op_type
            ))),
        }
    }

    /// Get a required string attribute.
    pub fn attr_string(&self, name: &str) -> Result<&'a str> {
        match self.attr(name) {
            Some(AttributeValue::String(v)) => Ok(v.as_str()),
            _ => Err(Error::Attribute(format!(
                "{}: missing required string attribute '{name}'",
                self.node.op_type
            ))),
        }
    }
}

impl Function {
    /// Add a node and compute its output slots immediately.
    ///
    /// Passes use this to build replacement sub-graphs whose slots must be
    /// known before they are wired into consumers.
    pub fn make_node(&mut self, node: Node, registry: &OperatorRegistry) -> Result<NodeId> {
        let id = self.add_node(node);
        self.infer_node(id, registry)?;
        Ok(id)
    }

    /// Recompute the output slots of a single node.
    ///
    /// Returns `true` if any slot changed.
    pub fn infer_node(&mut self, id: NodeId, registry: &OperatorRegistry) -> Result<bool> {
        let (outputs, changed) = {
            let node = self.node(id)?;
            let operator = registry.get(&node.op_type).ok_or_else(|| {
                Error::ShapeInference(format!("No operator registered for type: {}", node.op_type))
            })?;

            let ctx = InferenceCtx::new(id, node, self);

            let types = operator.infer_output_types(&ctx).map_err(|e| {
                Error::ShapeInference(format!(
                    "Failed to infer types for node '{}' (op_type: {}): {}",
                    node.name, node.op_type, e
                ))
            })?;

            let folded = operator.try_fold(&ctx).map_err(|e| {
                Error::ConstantFolding(format!(
                    "Failed to fold node '{}' (op_type: {}): {}",
                    node.name, node.op_type, e
                ))
            })?;

            if !folded.is_empty() && folded.len() != types.len() {
                return Err(Error::ConstantFolding(format!(
                    "Operator {} returned {} folded outputs but {} output types",
                    node.op_type,
                    folded.len(),
                    types.len()
                )));
            }

            let outputs: Vec<OutputSlot> = types
                .into_iter()
                .enumerate()
                .map(|(i, ty)| OutputSlot {
                    dtype: ty.dtype,
                    shape: ty.shape,
                    value: folded.get(i).cloned().flatten(),
                })
                .collect();

            let changed = outputs != node.outputs;
            (outputs, changed)
        };

        self.write_outputs(id, outputs)?;
        self.clear_stale(id);
        Ok(changed)
    }

    /// Recompute every stale node in topological order.
    ///
    /// Returns the number of nodes whose output slots changed.
    pub fn infer_shapes(&mut self, registry: &OperatorRegistry) -> Result<usize> {
        if !self.has_stale_nodes() {
            return Ok(0);
        }

        let mut changed = 0;
        for id in self.topological_order() {
            if !self.is_stale(id) {
                continue;
            }

            if self.infer_node(id, registry)? {
                changed += 1;
                let consumers: Vec<NodeId> = (0..self.node(id)?.outputs.len())
                    .flat_map(|index| self.consumers(Output::new(id, index)))
                    .map(|(consumer, _)| consumer)
                    .collect();
                for consumer in consumers {
                    self.mark_stale(consumer);
                }
            }
        }

        Ok(changed)
    }
}

/// Pass that recomputes output slots for every node in the function.
///
/// The pass manager already re-infers stale nodes after each mutating pass;
/// this pass forces a full recomputation, e.g. after declared parameter
/// shapes were edited directly.
pub struct ShapeInferencePass;

impl ShapeInferencePass {
    pub fn new() -> Self {
        Self
    }
}

impl FunctionPass for ShapeInferencePass {
    fn name(&self) -> &str {
        "shape_inference"
    }

    fn run_on_function(&self, function: &mut Function, ctx: &PassContext) -> Result<bool> {
        let ids: Vec<NodeId> = function.nodes().map(|(id, _)| id).collect();
        for id in ids {
            function.mark_stale(id);
        }
        Ok(function.infer_shapes(ctx.registry)? > 0)
    }
}

impl Default for ShapeInferencePass {
    fn default() -> Self {
        Self::new()
    }
}
