//! Function graph: the owning container of operator nodes.
//!
//! The function is a directed acyclic graph where:
//! - **Nodes** (`Node`) are operators (e.g., Reshape, ShapeOf, Load)
//! - **Edges** are input references (`Output`) naming an output slot of a producer
//!
//! Nodes live in a `petgraph::StableGraph` arena owned by the function. Every
//! reference is a `NodeId` scoped to that arena, so replacing or removing a
//! node never leaves a dangling pointer; dangling *indices* are caught by
//! [`Function::validate`].

use crate::types::{AttributeValue, DataType, PartialShape, TensorValue};
use crate::{Error, Result};
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet, VecDeque};

/// Operator type of graph inputs.
pub const PARAMETER: &str = "Parameter";

/// Operator type of graph outputs.
pub const RESULT: &str = "Result";

/// Operator type of nodes carrying an embedded tensor payload.
pub const CONSTANT: &str = "Constant";

/// Type alias for node identifiers (backed by petgraph NodeIndex).
pub type NodeId = NodeIndex;

/// Reference to one output slot of a node. This is the edge of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Output {
    /// Producing node.
    pub node: NodeId,

    /// Output slot index on the producer.
    pub index: usize,
}

impl Output {
    pub fn new(node: NodeId, index: usize) -> Self {
        Self { node, index }
    }
}

impl From<NodeId> for Output {
    /// The first output slot of `node`.
    fn from(node: NodeId) -> Self {
        Self::new(node, 0)
    }
}

/// Type descriptor and cached compile-time value of one output slot.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSlot {
    /// Element type.
    pub dtype: DataType,

    /// Partial shape (static, partially dynamic, or of unknown rank).
    pub shape: PartialShape,

    /// Value computed by constant folding, if the slot is known at compile time.
    pub value: Option<TensorValue>,
}

impl OutputSlot {
    pub fn new(dtype: DataType, shape: PartialShape) -> Self {
        Self {
            dtype,
            shape,
            value: None,
        }
    }
}

// ──────────────────────────────── Node ───────────────────────────────────

/// A single operation in the function graph.
#[derive(Debug, Clone)]
pub struct Node {
    /// Friendly name (may be empty).
    pub name: String,

    /// Operator type (e.g., "Reshape", "Load").
    pub op_type: String,

    /// Operator attributes, ordered by name.
    pub attributes: BTreeMap<String, AttributeValue>,

    /// Input references, in port order.
    pub inputs: Vec<Output>,

    /// Output slots. Filled in by shape inference for nodes created by passes.
    pub outputs: Vec<OutputSlot>,

    /// Embedded payload of `Constant` nodes.
    pub constant: Option<TensorValue>,

    /// Insertion sequence number, assigned by the owning function.
    seq: u64,
}

impl Node {
    /// Create a new operator node with no inputs, outputs, or attributes.
    pub fn new(op_type: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            op_type: op_type.into(),
            attributes: BTreeMap::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            constant: None,
            seq: 0,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_input(mut self, input: impl Into<Output>) -> Self {
        self.inputs.push(input.into());
        self
    }

    pub fn with_inputs(mut self, inputs: impl IntoIterator<Item = Output>) -> Self {
        self.inputs.extend(inputs);
        self
    }

    /// Declare an output slot.
    pub fn with_output(mut self, dtype: DataType, shape: PartialShape) -> Self {
        self.outputs.push(OutputSlot::new(dtype, shape));
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_constant(mut self, value: TensorValue) -> Self {
        self.constant = Some(value);
        self
    }

    /// Get the operator type.
    pub fn op_type(&self) -> &str {
        &self.op_type
    }

    pub fn is(&self, op_type: &str) -> bool {
        self.op_type == op_type
    }

    /// Get an attribute.
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Get an integer attribute, if present with that type.
    pub fn attr_i64(&self, key: &str) -> Option<i64> {
        match self.attributes.get(key) {
            Some(AttributeValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// Set an attribute.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.attributes.insert(key.into(), value);
    }

    /// Get an output slot.
    pub fn output(&self, index: usize) -> Option<&OutputSlot> {
        self.outputs.get(index)
    }

    /// Insertion sequence number within the owning function.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

// ──────────────────────────────── Function ───────────────────────────────

/// A function graph with designated parameters and results.
///
/// petgraph edges mirror `Node::inputs` (weight = consumer input port) and
/// exist for consumer lookups and ordering; `Node::inputs` is authoritative.
#[derive(Debug, Clone)]
pub struct Function {
    /// Function name.
    pub name: String,

    /// Node arena.
    graph: StableGraph<Node, usize>,

    /// Next insertion sequence number.
    next_seq: u64,

    /// Designated inputs (Parameter nodes), in order.
    parameters: Vec<NodeId>,

    /// Designated outputs (Result nodes), in order.
    results: Vec<NodeId>,

    /// Nodes whose output slots must be recomputed before they are relied on.
    stale: HashSet<NodeId>,
}

impl Function {
    /// Create a new empty function.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            graph: StableGraph::new(),
            next_seq: 0,
            parameters: Vec::new(),
            results: Vec::new(),
            stale: HashSet::new(),
        }
    }

    // ── Node access ──

    /// Get an immutable reference to a node.
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.graph
            .node_weight(id)
            .ok_or_else(|| Error::Structural(format!("Node {:?} not found", id)))
    }

    /// Get a mutable reference to a node.
    ///
    /// Marks the node and everything downstream of it stale.
    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        if !self.graph.contains_node(id) {
            return Err(Error::Structural(format!("Node {:?} not found", id)));
        }
        self.mark_stale(id);
        self.graph
            .node_weight_mut(id)
            .ok_or_else(|| Error::Structural(format!("Node {:?} not found", id)))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.graph.contains_node(id)
    }

    /// Get the output slot an input reference points at.
    pub fn slot(&self, output: Output) -> Result<&OutputSlot> {
        let node = self.node(output.node)?;
        node.outputs.get(output.index).ok_or_else(|| {
            Error::Structural(format!(
                "Node '{}' ({}) has no output slot {}",
                node.name, node.op_type, output.index
            ))
        })
    }

    /// Iterate over all nodes in the function (arena order).
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.graph
            .node_indices()
            .filter_map(|id| self.graph.node_weight(id).map(|node| (id, node)))
    }

    /// Get the number of nodes in the function.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Count the nodes of a given operator type.
    pub fn count_op(&self, op_type: &str) -> usize {
        self.nodes().filter(|(_, node)| node.is(op_type)).count()
    }

    /// Designated inputs, in order.
    pub fn parameters(&self) -> &[NodeId] {
        &self.parameters
    }

    /// Designated outputs, in order.
    pub fn results(&self) -> &[NodeId] {
        &self.results
    }

    /// Get the consumers of an output slot as `(consumer, input port)` pairs.
    ///
    /// Sorted by consumer insertion order, then port.
    pub fn consumers(&self, output: Output) -> Vec<(NodeId, usize)> {
        if !self.graph.contains_node(output.node) {
            return Vec::new();
        }

        let mut consumers: Vec<(u64, NodeId, usize)> = self
            .graph
            .edges_directed(output.node, Direction::Outgoing)
            .filter_map(|edge| {
                let consumer = self.graph.node_weight(edge.target())?;
                let port = *edge.weight();
                (consumer.inputs.get(port) == Some(&output))
                    .then_some((consumer.seq, edge.target(), port))
            })
            .collect();
        consumers.sort();
        consumers.dedup();
        consumers
            .into_iter()
            .map(|(_, id, port)| (id, port))
            .collect()
    }

    // ── Graph mutation ──

    /// Add a new node to the function and return its ID.
    ///
    /// Inputs that reference missing nodes are kept as-is and reported by
    /// [`Function::validate`].
    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        node.seq = self.next_seq;
        self.next_seq += 1;

        let inputs = node.inputs.clone();
        let id = self.graph.add_node(node);

        for (port, input) in inputs.into_iter().enumerate() {
            if self.graph.contains_node(input.node) {
                self.graph.add_edge(input.node, id, port);
            }
        }

        self.stale.insert(id);
        id
    }

    /// Add a Parameter node with a declared type and register it as an input.
    pub fn add_parameter(
        &mut self,
        name: impl Into<String>,
        dtype: DataType,
        shape: PartialShape,
    ) -> NodeId {
        let node = Node::new(PARAMETER)
            .with_name(name)
            .with_output(dtype, shape);
        let id = self.add_node(node);
        self.parameters.push(id);
        id
    }

    /// Add a Constant node holding `value`.
    pub fn add_constant(&mut self, value: TensorValue) -> NodeId {
        let shape = PartialShape::from_static(&value.shape);
        let mut node = Node::new(CONSTANT).with_output(value.dtype, shape);
        node.outputs[0].value = Some(value.clone());
        self.add_node(node.with_constant(value))
    }

    /// Add a Result node consuming `source` and register it as an output.
    pub fn add_result(&mut self, source: impl Into<Output>) -> Result<NodeId> {
        let source = source.into();
        let slot = self.slot(source)?.clone();
        let node = Node::new(RESULT)
            .with_input(source)
            .with_output(slot.dtype, slot.shape);
        let id = self.add_node(node);
        self.results.push(id);
        Ok(id)
    }

    /// Redirect input `port` of `node` to read from `source`.
    pub fn set_input(&mut self, node: NodeId, port: usize, source: Output) -> Result<()> {
        let input_count = self.node(node)?.inputs.len();
        if port >= input_count {
            return Err(Error::Structural(format!(
                "Input port {port} out of range (node {:?} has {input_count} inputs)",
                node
            )));
        }

        let stale_edges: Vec<_> = self
            .graph
            .edges_directed(node, Direction::Incoming)
            .filter(|edge| *edge.weight() == port)
            .map(|edge| edge.id())
            .collect();
        for edge in stale_edges {
            self.graph.remove_edge(edge);
        }

        if self.graph.contains_node(source.node) {
            self.graph.add_edge(source.node, node, port);
        }

        self.node_mut(node)?.inputs[port] = source;
        Ok(())
    }

    /// Replace `old` with `new`.
    ///
    /// Every consumer of `old`'s slot *i* is redirected to `new`'s slot *i*,
    /// except `new` itself when it consumes `old`. A Result designation of
    /// `old` is transferred to `new`. `old` stays in the arena until the next
    /// [`Function::remove_unreachable`]. If `new` has no friendly name it
    /// inherits `old`'s.
    pub fn replace_node(&mut self, old: NodeId, new: NodeId) -> Result<()> {
        let old_name = self.node(old)?.name.clone();
        let new_output_count = self.node(new)?.outputs.len();

        let mut redirects = Vec::new();
        for index in 0..self.node(old)?.outputs.len() {
            for (consumer, port) in self.consumers(Output::new(old, index)) {
                if consumer == new {
                    continue;
                }
                if index >= new_output_count {
                    return Err(Error::Structural(format!(
                        "Cannot replace node {:?}: slot {index} is consumed but replacement {:?} has {new_output_count} outputs",
                        old, new
                    )));
                }
                redirects.push((consumer, port, Output::new(new, index)));
            }
        }

        for (consumer, port, source) in redirects {
            self.set_input(consumer, port, source)?;
        }

        for result in &mut self.results {
            if *result == old {
                *result = new;
            }
        }

        let new_node = self.node_mut(new)?;
        if new_node.name.is_empty() {
            new_node.name = old_name;
        }

        Ok(())
    }

    /// Overwrite the declared type of an output slot (e.g., a Parameter's shape).
    pub fn set_output_type(
        &mut self,
        output: Output,
        dtype: DataType,
        shape: PartialShape,
    ) -> Result<()> {
        let node = self.node_mut(output.node)?;
        let slot = node.outputs.get_mut(output.index).ok_or_else(|| {
            Error::Structural(format!(
                "Node {:?} has no output slot {}",
                output.node, output.index
            ))
        })?;
        slot.dtype = dtype;
        slot.shape = shape;
        slot.value = None;
        Ok(())
    }

    /// Remove a node from the function.
    ///
    /// Consumers keep their (now dangling) references.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node> {
        let downstream: Vec<_> = self
            .graph
            .neighbors_directed(id, Direction::Outgoing)
            .collect();
        for consumer in downstream {
            self.mark_stale(consumer);
        }

        self.stale.remove(&id);
        self.parameters.retain(|&p| p != id);
        self.results.retain(|&r| r != id);

        self.graph
            .remove_node(id)
            .ok_or_else(|| Error::Structural(format!("Node {:?} not found", id)))
    }

    /// Drop every node that no Result depends on. Parameters are kept.
    ///
    /// Returns the number of nodes removed.
    pub fn remove_unreachable(&mut self) -> usize {
        let mut live: HashSet<NodeId> = self.parameters.iter().copied().collect();
        let mut queue: VecDeque<NodeId> = self.results.iter().copied().collect();

        while let Some(id) = queue.pop_front() {
            if !live.insert(id) {
                continue;
            }
            for producer in self.graph.neighbors_directed(id, Direction::Incoming) {
                if !live.contains(&producer) {
                    queue.push_back(producer);
                }
            }
        }

        let dead: Vec<NodeId> = self
            .graph
            .node_indices()
            .filter(|id| !live.contains(id))
            .collect();

        for &id in &dead {
            self.stale.remove(&id);
            self.graph.remove_node(id);
        }

        if !dead.is_empty() {
            tracing::trace!(removed = dead.len(), "removed unreachable nodes");
        }

        dead.len()
    }

    // ── Validation and ordering ──

    /// Check the structural invariants of the function.
    ///
    /// # Errors
    ///
    /// Returns `Error::Structural` if an input reference names a missing node
    /// or output slot, a designated input/output is missing, or the graph
    /// contains a cycle.
    pub fn validate(&self) -> Result<()> {
        for (id, node) in self.nodes() {
            for (port, input) in node.inputs.iter().enumerate() {
                let producer = self.graph.node_weight(input.node).ok_or_else(|| {
                    Error::Structural(format!(
                        "Node '{}' ({}, {:?}) input {port} references missing node {:?}",
                        node.name, node.op_type, id, input.node
                    ))
                })?;

                if input.index >= producer.outputs.len() {
                    return Err(Error::Structural(format!(
                        "Node '{}' ({}, {:?}) input {port} references slot {} of {} which has {} outputs",
                        node.name,
                        node.op_type,
                        id,
                        input.index,
                        producer.op_type,
                        producer.outputs.len()
                    )));
                }
            }
        }

        for &id in self.parameters.iter().chain(&self.results) {
            if !self.graph.contains_node(id) {
                return Err(Error::Structural(format!(
                    "Designated input/output {:?} is not part of the function",
                    id
                )));
            }
        }

        if petgraph::algo::is_cyclic_directed(&self.graph) {
            return Err(Error::Structural(format!(
                "Function '{}' contains a cycle",
                self.name
            )));
        }

        Ok(())
    }

    /// Get the topological order of nodes in the function.
    ///
    /// Producers come before their consumers. Among nodes that are ready at
    /// the same time, the one inserted first comes first, so the order is
    /// reproducible across runs and across structurally identical clones.
    /// Nodes on a cycle are omitted; [`Function::validate`] reports them.
    pub fn topological_order(&self) -> Vec<NodeId> {
        let mut in_degree: HashMap<NodeId, usize> = HashMap::new();
        let mut ready = BinaryHeap::new();

        for (id, node) in self.nodes() {
            let degree = self
                .graph
                .edges_directed(id, Direction::Incoming)
                .count();
            if degree == 0 {
                ready.push(Reverse((node.seq, id)));
            }
            in_degree.insert(id, degree);
        }

        let mut order = Vec::with_capacity(in_degree.len());
        while let Some(Reverse((_, id))) = ready.pop() {
            order.push(id);
            for edge in self.graph.edges_directed(id, Direction::Outgoing) {
                let target = edge.target();
                if let Some(degree) = in_degree.get_mut(&target) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse((self.graph[target].seq, target)));
                    }
                }
            }
        }

        order
    }

    // ── Shape cache invalidation ──

    /// Mark `id` and every node reachable from it stale.
    pub fn mark_stale(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !self.graph.contains_node(current) || !self.stale.insert(current) {
                continue;
            }
            stack.extend(self.graph.neighbors_directed(current, Direction::Outgoing));
        }
    }

    /// Check whether a node's output slots need recomputation.
    pub fn is_stale(&self, id: NodeId) -> bool {
        self.stale.contains(&id)
    }

    /// Check whether any node needs recomputation.
    pub fn has_stale_nodes(&self) -> bool {
        !self.stale.is_empty()
    }

    pub(crate) fn clear_stale(&mut self, id: NodeId) {
        self.stale.remove(&id);
    }

    /// Update output slots without touching the stale set.
    pub(crate) fn write_outputs(&mut self, id: NodeId, outputs: Vec<OutputSlot>) -> Result<()> {
        let node = self
            .graph
            .node_weight_mut(id)
            .ok_or_else(|| Error::Structural(format!("Node {:?} not found", id)))?;
        node.outputs = outputs;
        Ok(())
    }
}
