//! Grouped matcher passes sharing one traversal.

use crate::ir::{Function, NodeId};
use crate::pass::{MatcherPass, PassContext, Rewrite};
use crate::{Error, Result};

/// A group of matcher passes applied together.
///
/// Each traversal walks the function in topological order and offers every
/// node to the matchers in registration order; the first matcher that changes
/// the graph wins that node. With `until_fixpoint()` traversals repeat until
/// one of them changes nothing.
///
/// Traversals are capped at `max_iterations` (or the pass manager's limit when
/// unset). Hitting the cap fails with `Error::FixpointNotReached`.
pub struct GraphRewrite {
    name: String,
    passes: Vec<Box<dyn MatcherPass>>,
    fixpoint: bool,
    max_iterations: Option<usize>,
}

impl GraphRewrite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passes: Vec::new(),
            fixpoint: false,
            max_iterations: None,
        }
    }

    /// Add a matcher pass to the group.
    pub fn add_matcher(&mut self, pass: impl MatcherPass + 'static) -> &mut Self {
        self.passes.push(Box::new(pass));
        self
    }

    pub fn with_matcher(mut self, pass: impl MatcherPass + 'static) -> Self {
        self.add_matcher(pass);
        self
    }

    /// Repeat traversals until the graph stops changing.
    pub fn until_fixpoint(mut self) -> Self {
        self.fixpoint = true;
        self
    }

    /// Override the traversal cap for this group.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of the grouped matcher passes, in application order.
    pub fn matcher_names(&self) -> impl Iterator<Item = &str> {
        self.passes.iter().map(|pass| pass.name())
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Apply the group to `function`.
    ///
    /// `default_limit` caps traversals when the group has no limit of its own.
    /// Returns `Ok(true)` if any matcher changed the function.
    pub fn run(
        &self,
        function: &mut Function,
        ctx: &PassContext,
        default_limit: usize,
    ) -> Result<bool> {
        let limit = self.max_iterations.unwrap_or(default_limit);
        let mut changed = false;
        let mut iterations = 0;

        loop {
            if iterations >= limit {
                return Err(Error::FixpointNotReached {
                    pass: self.name.clone(),
                    iterations,
                });
            }
            iterations += 1;

            let traversal = self.traverse(function, ctx)?;
            changed |= traversal.changed;

            if traversal.restart {
                tracing::trace!(group = %self.name, iterations, "restarting traversal");
                continue;
            }
            if !(self.fixpoint && traversal.changed) {
                break;
            }
        }

        tracing::trace!(group = %self.name, iterations, changed, "graph rewrite finished");
        Ok(changed)
    }

    fn traverse(&self, function: &mut Function, ctx: &PassContext) -> Result<Traversal> {
        let mut traversal = Traversal::default();

        // Pair each id with its insertion seq: a node created by a rewrite may
        // reuse the arena slot of one that was removed.
        let order: Vec<(NodeId, u64)> = function
            .topological_order()
            .into_iter()
            .filter_map(|id| function.node(id).ok().map(|node| (id, node.seq())))
            .collect();

        for (id, seq) in order {
            match function.node(id) {
                Ok(node) if node.seq() == seq => {}
                _ => continue,
            }

            for pass in &self.passes {
                let Some(m) = pass.pattern().matches(function, id) else {
                    continue;
                };

                let outcome = pass.apply(&m, function, ctx)?;
                if !outcome.changed() {
                    continue;
                }

                tracing::debug!(pass = pass.name(), node = ?id, ?outcome, "rewrite applied");
                traversal.changed = true;
                if outcome == Rewrite::Restart {
                    traversal.restart = true;
                    return Ok(traversal);
                }
                break;
            }
        }

        Ok(traversal)
    }
}

#[derive(Default)]
struct Traversal {
    changed: bool,
    restart: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Node;
    use crate::pattern::{Match, Pattern};
    use crate::registry::OperatorRegistry;
    use crate::types::{DataType, PartialShape};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Retypes every `from` node to `to`, in place.
    struct Retype {
        pattern: Pattern,
        to: &'static str,
        outcome: Rewrite,
    }

    impl Retype {
        fn new(from: &str, to: &'static str) -> Self {
            Self {
                pattern: Pattern::op(from),
                to,
                outcome: Rewrite::Continue,
            }
        }

        fn restarting(mut self) -> Self {
            self.outcome = Rewrite::Restart;
            self
        }
    }

    impl MatcherPass for Retype {
        fn name(&self) -> &str {
            "retype"
        }

        fn pattern(&self) -> &Pattern {
            &self.pattern
        }

        fn apply(&self, m: &Match, function: &mut Function, _ctx: &PassContext) -> Result<Rewrite> {
            function.node_mut(m.root())?.op_type = self.to.to_string();
            Ok(self.outcome)
        }
    }

    /// Replaces each `A` with a fresh `A` and counts the visits.
    struct ReplaceA {
        pattern: Pattern,
        seen: Arc<AtomicUsize>,
    }

    impl MatcherPass for ReplaceA {
        fn name(&self) -> &str {
            "replace_a"
        }

        fn pattern(&self) -> &Pattern {
            &self.pattern
        }

        fn apply(&self, m: &Match, function: &mut Function, _ctx: &PassContext) -> Result<Rewrite> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            let old = function.node(m.root())?.clone();
            let new = function.add_node(
                Node::new("A")
                    .with_inputs(old.inputs.clone())
                    .with_output(DataType::F32, PartialShape::from_static(&[2])),
            );
            function.replace_node(m.root(), new)?;
            function.remove_node(m.root())?;
            Ok(Rewrite::Continue)
        }
    }

    fn chain(ops: &[&str]) -> Function {
        let mut function = Function::new("chain");
        let mut prev = function.add_parameter("x", DataType::F32, PartialShape::from_static(&[2]));
        for op in ops {
            prev = function.add_node(
                Node::new(*op)
                    .with_input(prev)
                    .with_output(DataType::F32, PartialShape::from_static(&[2])),
            );
        }
        function.add_result(prev).unwrap();
        function
    }

    #[test]
    fn test_single_traversal_rewrites_every_match() {
        let registry = OperatorRegistry::new();
        let ctx = PassContext::new(&registry);
        let mut function = chain(&["A", "C", "A"]);

        let group = GraphRewrite::new("a_to_b").with_matcher(Retype::new("A", "B"));
        assert!(group.run(&mut function, &ctx, 8).unwrap());

        assert_eq!(function.count_op("A"), 0);
        assert_eq!(function.count_op("B"), 2);
        assert!(!group.run(&mut function, &ctx, 8).unwrap());
    }

    #[test]
    fn test_first_changing_matcher_wins() {
        let registry = OperatorRegistry::new();
        let ctx = PassContext::new(&registry);
        let mut function = chain(&["A"]);

        let group = GraphRewrite::new("group")
            .with_matcher(Retype::new("A", "B"))
            .with_matcher(Retype::new("A", "C"));
        group.run(&mut function, &ctx, 8).unwrap();

        assert_eq!(function.count_op("B"), 1);
        assert_eq!(function.count_op("C"), 0);
    }

    #[test]
    fn test_fixpoint_follows_rewrite_chains() {
        let registry = OperatorRegistry::new();
        let ctx = PassContext::new(&registry);
        let mut function = chain(&["A"]);

        // C→D is registered first, so a single traversal stops at C.
        let single = GraphRewrite::new("once")
            .with_matcher(Retype::new("C", "D"))
            .with_matcher(Retype::new("B", "C"))
            .with_matcher(Retype::new("A", "B"));
        single.run(&mut function, &ctx, 8).unwrap();
        assert_eq!(function.count_op("B"), 1);

        let fixpoint = GraphRewrite::new("fixpoint")
            .with_matcher(Retype::new("C", "D"))
            .with_matcher(Retype::new("B", "C"))
            .until_fixpoint();
        fixpoint.run(&mut function, &ctx, 8).unwrap();
        assert_eq!(function.count_op("D"), 1);
    }

    #[test]
    fn test_oscillating_group_hits_iteration_cap() {
        let registry = OperatorRegistry::new();
        let ctx = PassContext::new(&registry);
        let mut function = chain(&["A"]);

        let group = GraphRewrite::new("flip_flop")
            .with_matcher(Retype::new("A", "B"))
            .with_matcher(Retype::new("B", "A"))
            .until_fixpoint()
            .with_max_iterations(5);

        match group.run(&mut function, &ctx, 100) {
            Err(Error::FixpointNotReached { pass, iterations }) => {
                assert_eq!(pass, "flip_flop");
                assert_eq!(iterations, 5);
            }
            other => panic!("expected FixpointNotReached, got {other:?}"),
        }
    }

    #[test]
    fn test_restart_recomputes_order() {
        let registry = OperatorRegistry::new();
        let ctx = PassContext::new(&registry);
        let mut function = chain(&["A", "A", "A"]);

        let group = GraphRewrite::new("restart").with_matcher(Retype::new("A", "B").restarting());
        assert!(group.run(&mut function, &ctx, 8).unwrap());
        assert_eq!(function.count_op("B"), 3);

        // Three restarting traversals plus the clean one exceed a cap of 3.
        let mut function = chain(&["A", "A", "A"]);
        let capped = GraphRewrite::new("restart")
            .with_matcher(Retype::new("A", "B").restarting())
            .with_max_iterations(3);
        assert!(matches!(
            capped.run(&mut function, &ctx, 8),
            Err(Error::FixpointNotReached { .. })
        ));
    }

    #[test]
    fn test_created_nodes_wait_for_next_traversal() {
        let registry = OperatorRegistry::new();
        let ctx = PassContext::new(&registry);
        let mut function = chain(&["A", "A"]);

        let seen = Arc::new(AtomicUsize::new(0));
        let pass = ReplaceA {
            pattern: Pattern::op("A"),
            seen: Arc::clone(&seen),
        };
        let group = GraphRewrite::new("replace").with_matcher(pass);
        assert!(group.run(&mut function, &ctx, 8).unwrap());

        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(function.count_op("A"), 2);
        assert!(function.validate().is_ok());

        let result = function.results()[0];
        let last = function.node(result).unwrap().inputs[0];
        assert_eq!(function.node(last.node).unwrap().op_type(), "A");
    }
}
