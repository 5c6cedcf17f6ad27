//! Pass traits and the context they run in.

use crate::Result;
use crate::ir::Function;
use crate::pattern::{Match, Pattern};
use crate::registry::OperatorRegistry;

/// Tag recorded for every registered pass.
///
/// Passes are dispatched on this tag, never by inspecting their concrete type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// A single matcher-driven rewrite, invoked per candidate node.
    Matcher,

    /// A group of matcher passes sharing one traversal.
    GraphRewrite,

    /// A pass that scans and mutates the whole function at once.
    Function,
}

/// External context supplied to every pass by the pass manager.
///
/// Carries facts a pass cannot infer from the graph alone.
#[derive(Clone, Copy)]
pub struct PassContext<'a> {
    /// Operators used to compute output slots of nodes created by passes.
    pub registry: &'a OperatorRegistry,

    /// Set while an explicit set-batch-size operation is running.
    pub batch_update: bool,
}

impl<'a> PassContext<'a> {
    pub fn new(registry: &'a OperatorRegistry) -> Self {
        Self {
            registry,
            batch_update: false,
        }
    }

    pub fn with_batch_update(mut self, batch_update: bool) -> Self {
        self.batch_update = batch_update;
        self
    }
}

/// Outcome of applying a matcher pass to one match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rewrite {
    /// The callback declined; the graph is untouched.
    Unchanged,

    /// The graph changed; keep walking the current traversal order.
    ///
    /// Nodes removed by the rewrite are skipped; nodes it created are not
    /// visited until the next traversal.
    Continue,

    /// The graph changed; recompute the traversal order and start over.
    Restart,
}

impl Rewrite {
    pub fn changed(&self) -> bool {
        !matches!(self, Rewrite::Unchanged)
    }
}

/// A local rewrite driven by a pattern.
///
/// The rewrite engine calls `pattern().matches()` on every node in
/// topological order and hands each successful match to `apply()`.
pub trait MatcherPass: Send + Sync {
    /// Get the pass name (used for logging and error messages).
    fn name(&self) -> &str;

    /// Pattern whose root is tried against every node.
    fn pattern(&self) -> &Pattern;

    /// Apply the rewrite for one match.
    fn apply(&self, m: &Match, function: &mut Function, ctx: &PassContext) -> Result<Rewrite>;
}

/// A pass over the whole function.
///
/// Used when applicability depends on global state rather than a local
/// pattern.
///
/// # Return Value
///
/// `run_on_function()` returns `Ok(true)` if the pass changed the function.
pub trait FunctionPass: Send + Sync {
    /// Get the pass name (used for logging and error messages).
    fn name(&self) -> &str;

    fn run_on_function(&self, function: &mut Function, ctx: &PassContext) -> Result<bool>;
}
