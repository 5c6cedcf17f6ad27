//! Vector-to-scalar lowering of memory accesses.
//!
//! Targets without vector loads and stores need every `Load`/`Store` with a
//! `vector_width` above 1 rewritten to its scalar form. Lowering runs on
//! functions in canonical form: every access carries an integer
//! `vector_width` of at least 1, and all accesses agree on it.

use tessera_core::{
    AttributeValue, Error, Function, FunctionPass, GraphRewrite, Match, MatcherPass, Node, NodeId,
    PassContext, PassManagerConfig, Pattern, Result, Rewrite,
};
use tessera_operators::{LOAD, SCALAR_LOAD, SCALAR_STORE, STORE, VECTOR_WIDTH};

fn is_vector_access(function: &Function, id: NodeId) -> bool {
    function
        .node(id)
        .ok()
        .and_then(|node| node.attr_i64(VECTOR_WIDTH))
        .is_some_and(|width| width > 1)
}

/// Swap `vector` for a `scalar_op` node with the same inputs and attributes.
fn lower_access(
    function: &mut Function,
    vector: NodeId,
    scalar_op: &str,
    ctx: &PassContext,
) -> Result<Rewrite> {
    let original = function.node(vector)?;
    let mut scalar = Node::new(scalar_op)
        .with_name(original.name.clone())
        .with_inputs(original.inputs.iter().copied());
    for (key, value) in &original.attributes {
        scalar.set_attribute(key.clone(), value.clone());
    }
    scalar.set_attribute(VECTOR_WIDTH, AttributeValue::Int(1));

    let scalar = function.make_node(scalar, ctx.registry)?;
    function.replace_node(vector, scalar)?;
    function.remove_node(vector)?;

    tracing::trace!(node = ?vector, replacement = ?scalar, op = scalar_op, "lowered vector access");
    Ok(Rewrite::Continue)
}

/// Rewrite `Load` nodes with `vector_width > 1` into `ScalarLoad`.
pub struct ReplaceLoadsWithScalarLoads {
    pattern: Pattern,
}

impl ReplaceLoadsWithScalarLoads {
    pub fn new() -> Self {
        Self {
            pattern: Pattern::op(LOAD).with_predicate(is_vector_access),
        }
    }
}

impl Default for ReplaceLoadsWithScalarLoads {
    fn default() -> Self {
        Self::new()
    }
}

impl MatcherPass for ReplaceLoadsWithScalarLoads {
    fn name(&self) -> &str {
        "replace_loads_with_scalar_loads"
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn apply(&self, m: &Match, function: &mut Function, ctx: &PassContext) -> Result<Rewrite> {
        lower_access(function, m.root(), SCALAR_LOAD, ctx)
    }
}

/// Rewrite `Store` nodes with `vector_width > 1` into `ScalarStore`.
pub struct ReplaceStoresWithScalarStores {
    pattern: Pattern,
}

impl ReplaceStoresWithScalarStores {
    pub fn new() -> Self {
        Self {
            pattern: Pattern::op(STORE).with_predicate(is_vector_access),
        }
    }
}

impl Default for ReplaceStoresWithScalarStores {
    fn default() -> Self {
        Self::new()
    }
}

impl MatcherPass for ReplaceStoresWithScalarStores {
    fn name(&self) -> &str {
        "replace_stores_with_scalar_stores"
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn apply(&self, m: &Match, function: &mut Function, ctx: &PassContext) -> Result<Rewrite> {
        lower_access(function, m.root(), SCALAR_STORE, ctx)
    }
}

/// Both lowering matchers as one group, loads first.
pub fn vector_to_scalar() -> GraphRewrite {
    GraphRewrite::new("vector_to_scalar")
        .with_matcher(ReplaceLoadsWithScalarLoads::new())
        .with_matcher(ReplaceStoresWithScalarStores::new())
}

/// Check that every `Load`/`Store` carries the same integer `vector_width` ≥ 1.
///
/// Returns the common width, or `None` when the function has no accesses.
///
/// # Errors
///
/// `Error::PreconditionViolation` naming the first offending node.
pub fn check_canonical_form(function: &Function) -> Result<Option<i64>> {
    let mut common: Option<(i64, &str)> = None;

    for id in function.topological_order() {
        let node = function.node(id)?;
        if !(node.is(LOAD) || node.is(STORE)) {
            continue;
        }

        let width = match node.attribute(VECTOR_WIDTH) {
            Some(AttributeValue::Int(width)) if *width >= 1 => *width,
            Some(other) => {
                return Err(Error::PreconditionViolation(format!(
                    "{} '{}' has invalid {VECTOR_WIDTH} {other:?}",
                    node.op_type(),
                    node.name
                )));
            }
            None => {
                return Err(Error::PreconditionViolation(format!(
                    "{} '{}' has no {VECTOR_WIDTH} attribute",
                    node.op_type(),
                    node.name
                )));
            }
        };

        match common {
            None => common = Some((width, node.name.as_str())),
            Some((expected, first)) if expected != width => {
                return Err(Error::PreconditionViolation(format!(
                    "{} '{}' has {VECTOR_WIDTH} {width}, but '{first}' has {expected}",
                    node.op_type(),
                    node.name
                )));
            }
            Some(_) => {}
        }
    }

    Ok(common.map(|(width, _)| width))
}

/// Full lowering as a single function pass: canonical-form check, then the
/// [`vector_to_scalar`] group.
///
/// The group is capped at the pass manager's default traversal limit unless
/// [`VectorToScalar::with_max_iterations`] sets another.
pub struct VectorToScalar {
    rewrite: GraphRewrite,
}

impl VectorToScalar {
    pub fn new() -> Self {
        Self::with_max_iterations(PassManagerConfig::default().max_iterations)
    }

    pub fn with_max_iterations(max_iterations: usize) -> Self {
        Self {
            rewrite: vector_to_scalar().with_max_iterations(max_iterations),
        }
    }
}

impl Default for VectorToScalar {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionPass for VectorToScalar {
    fn name(&self) -> &str {
        "vector_to_scalar"
    }

    fn run_on_function(&self, function: &mut Function, ctx: &PassContext) -> Result<bool> {
        match check_canonical_form(function)? {
            None | Some(1) => Ok(false),
            Some(width) => {
                tracing::debug!(function = %function.name, width, "lowering vector accesses");
                // The group carries its own cap, so the fallback limit is unused.
                self.rewrite.run(function, ctx, 0)
            }
        }
    }
}
