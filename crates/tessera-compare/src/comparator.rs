//! Structural function comparator.

use std::collections::{HashMap, VecDeque};

use tessera_core::{AttributeValue, Function, Node, NodeId, Output};

/// Aspect of two functions that [`FunctionsComparator`] checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpValues {
    /// Op types, input/output arity, and output shapes. Always compared.
    Nodes,
    /// Constant payloads, byte for byte.
    ConstValues,
    /// Friendly names.
    Names,
    /// Element types of every output slot.
    Precisions,
    /// Attribute maps.
    Attributes,
    /// Number of consumers of every output slot.
    ConsumersCount,
}

impl CmpValues {
    fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// Outcome of a comparison. `message` describes the first discrepancy found
/// and is empty when the functions are equivalent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonResult {
    pub valid: bool,
    pub message: String,
}

impl ComparisonResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            message: String::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: message.into(),
        }
    }
}

/// Compares two functions for structural equivalence.
///
/// Nodes are put in correspondence by a breadth-first walk that starts from
/// the paired Results and Parameters (in declaration order) and follows input
/// references port by port. The correspondence must be a bijection. Nodes no
/// Result depends on are not visited. Disabled aspects are ignored entirely:
/// without [`CmpValues::Attributes`], two nodes differing only in an
/// attribute compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionsComparator {
    flags: u8,
}

impl FunctionsComparator {
    /// Structure only.
    pub fn no_default() -> Self {
        Self {
            flags: CmpValues::Nodes.bit(),
        }
    }

    /// Structure and element types.
    pub fn with_default() -> Self {
        Self::no_default().enable(CmpValues::Precisions)
    }

    pub fn enable(mut self, value: CmpValues) -> Self {
        self.flags |= value.bit();
        self
    }

    /// Stop comparing `value`. Structure ([`CmpValues::Nodes`]) stays on.
    pub fn disable(mut self, value: CmpValues) -> Self {
        if value != CmpValues::Nodes {
            self.flags &= !value.bit();
        }
        self
    }

    pub fn should_compare(&self, value: CmpValues) -> bool {
        self.flags & value.bit() != 0
    }

    /// Compare `lhs` against `rhs`; the first discrepancy wins.
    pub fn compare(&self, lhs: &Function, rhs: &Function) -> ComparisonResult {
        match Walk::new(self, lhs, rhs).run() {
            Ok(()) => ComparisonResult::ok(),
            Err(message) => {
                tracing::debug!(lhs = %lhs.name, rhs = %rhs.name, %message, "functions differ");
                ComparisonResult::error(message)
            }
        }
    }
}

impl Default for FunctionsComparator {
    fn default() -> Self {
        Self::with_default()
    }
}

type Mismatch = std::result::Result<(), String>;

/// Breadth-first correspondence between the nodes of two functions.
struct Walk<'a> {
    comparator: &'a FunctionsComparator,
    lhs: &'a Function,
    rhs: &'a Function,
    forward: HashMap<NodeId, NodeId>,
    backward: HashMap<NodeId, NodeId>,
    queue: VecDeque<(NodeId, NodeId)>,
}

impl<'a> Walk<'a> {
    fn new(comparator: &'a FunctionsComparator, lhs: &'a Function, rhs: &'a Function) -> Self {
        Self {
            comparator,
            lhs,
            rhs,
            forward: HashMap::new(),
            backward: HashMap::new(),
            queue: VecDeque::new(),
        }
    }

    fn run(mut self) -> Mismatch {
        let (lhs, rhs) = (self.lhs, self.rhs);

        if lhs.results().len() != rhs.results().len() {
            return Err(format!(
                "Different number of results: {} vs {}",
                lhs.results().len(),
                rhs.results().len()
            ));
        }
        if lhs.parameters().len() != rhs.parameters().len() {
            return Err(format!(
                "Different number of parameters: {} vs {}",
                lhs.parameters().len(),
                rhs.parameters().len()
            ));
        }

        for (&l, &r) in lhs.results().iter().zip(rhs.results()) {
            self.pair(l, r)?;
        }
        for (&l, &r) in lhs.parameters().iter().zip(rhs.parameters()) {
            self.pair(l, r)?;
        }

        while let Some((l, r)) = self.queue.pop_front() {
            let (Ok(left), Ok(right)) = (lhs.node(l), rhs.node(r)) else {
                return Err(format!("Dangling node reference: {l:?} vs {r:?}"));
            };
            self.compare_nodes(l, left, r, right)?;

            for (port, (a, b)) in left.inputs.iter().zip(&right.inputs).enumerate() {
                if a.index != b.index {
                    return Err(format!(
                        "{} input {port} reads slot {} vs {}",
                        describe(left, right),
                        a.index,
                        b.index
                    ));
                }
                self.pair(a.node, b.node)?;
            }
        }

        Ok(())
    }

    /// Record that `l` corresponds to `r`, queueing the pair on first sight.
    fn pair(&mut self, l: NodeId, r: NodeId) -> Mismatch {
        match (self.forward.get(&l), self.backward.get(&r)) {
            (None, None) => {
                self.forward.insert(l, r);
                self.backward.insert(r, l);
                self.queue.push_back((l, r));
                Ok(())
            }
            (Some(&seen), _) if seen == r => Ok(()),
            _ => Err(format!(
                "Graph structure differs: {l:?} and {r:?} are reached along different paths"
            )),
        }
    }

    fn compare_nodes(&self, l: NodeId, left: &Node, r: NodeId, right: &Node) -> Mismatch {
        let cmp = self.comparator;

        if left.op_type() != right.op_type() {
            return Err(format!(
                "Different op types: {} vs {}",
                describe_one(left),
                describe_one(right)
            ));
        }
        if left.inputs.len() != right.inputs.len() {
            return Err(format!(
                "{} has {} inputs vs {}",
                describe(left, right),
                left.inputs.len(),
                right.inputs.len()
            ));
        }
        if left.outputs.len() != right.outputs.len() {
            return Err(format!(
                "{} has {} outputs vs {}",
                describe(left, right),
                left.outputs.len(),
                right.outputs.len()
            ));
        }

        if cmp.should_compare(CmpValues::Names) && left.name != right.name {
            return Err(format!(
                "Different friendly names: '{}' vs '{}'",
                left.name, right.name
            ));
        }

        for (index, (a, b)) in left.outputs.iter().zip(&right.outputs).enumerate() {
            if a.shape != b.shape {
                return Err(format!(
                    "{} output {index} has shape {} vs {}",
                    describe(left, right),
                    a.shape,
                    b.shape
                ));
            }
            if cmp.should_compare(CmpValues::Precisions) && a.dtype != b.dtype {
                return Err(format!(
                    "{} output {index} has element type {} vs {}",
                    describe(left, right),
                    a.dtype,
                    b.dtype
                ));
            }
            if cmp.should_compare(CmpValues::ConsumersCount) {
                let lc = self.lhs.consumers(Output::new(l, index)).len();
                let rc = self.rhs.consumers(Output::new(r, index)).len();
                if lc != rc {
                    return Err(format!(
                        "{} output {index} has {lc} consumers vs {rc}",
                        describe(left, right)
                    ));
                }
            }
        }

        if cmp.should_compare(CmpValues::Attributes) {
            let key = left
                .attributes
                .keys()
                .chain(right.attributes.keys())
                .find(|key| {
                    match (left.attributes.get(*key), right.attributes.get(*key)) {
                        (Some(a), Some(b)) => !attribute_eq(a, b),
                        _ => true,
                    }
                });
            if let Some(key) = key {
                return Err(format!(
                    "{} attribute '{key}' differs: {} vs {}",
                    describe(left, right),
                    attribute_text(left, key),
                    attribute_text(right, key)
                ));
            }
        }

        if cmp.should_compare(CmpValues::ConstValues) {
            match (&left.constant, &right.constant) {
                (Some(a), Some(b)) => {
                    if a.dtype != b.dtype || a.shape != b.shape || a.to_bytes() != b.to_bytes() {
                        return Err(format!("{} holds different values", describe(left, right)));
                    }
                }
                (None, None) => {}
                _ => {
                    return Err(format!(
                        "{} has a payload on only one side",
                        describe(left, right)
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Attribute equality on the stored bits, so NaN matches NaN and 0.0 differs
/// from -0.0.
fn attribute_eq(a: &AttributeValue, b: &AttributeValue) -> bool {
    match (a, b) {
        (AttributeValue::Float(x), AttributeValue::Float(y)) => x.to_bits() == y.to_bits(),
        (AttributeValue::Floats(xs), AttributeValue::Floats(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| x.to_bits() == y.to_bits())
        }
        _ => a == b,
    }
}

fn describe_one(node: &Node) -> String {
    if node.name.is_empty() {
        node.op_type().to_string()
    } else {
        format!("{} '{}'", node.op_type(), node.name)
    }
}

fn describe(left: &Node, right: &Node) -> String {
    if left.name == right.name {
        describe_one(left)
    } else {
        format!("{} / '{}'", describe_one(left), right.name)
    }
}

fn attribute_text(node: &Node, key: &str) -> String {
    node.attribute(key)
        .map_or_else(|| "<missing>".to_string(), ToString::to_string)
}
