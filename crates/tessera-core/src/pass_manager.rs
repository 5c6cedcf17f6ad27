//! Pass manager: sequences passes over a function and keeps it consistent.

use crate::ir::Function;
use crate::pass::{FunctionPass, MatcherPass, PassContext, PassKind};
use crate::rewrite::GraphRewrite;
use crate::Result;
use rayon::prelude::*;

/// Settings applied to every run of a `PassManager`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassManagerConfig {
    /// Traversal cap for graph rewrites that do not set their own.
    pub max_iterations: usize,

    /// Run `Function::validate()` after each pass that changed the function.
    pub validate_after_each_pass: bool,

    /// Drop unreachable nodes after each pass that changed the function.
    pub collect_unreachable: bool,
}

impl PassManagerConfig {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate_after_each_pass = validate;
        self
    }

    pub fn with_collection(mut self, collect: bool) -> Self {
        self.collect_unreachable = collect;
        self
    }
}

impl Default for PassManagerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 64,
            validate_after_each_pass: true,
            collect_unreachable: true,
        }
    }
}

enum PassBody {
    Function(Box<dyn FunctionPass>),
    Rewrite(GraphRewrite),
}

struct PassEntry {
    kind: PassKind,
    body: PassBody,
}

impl PassEntry {
    fn name(&self) -> &str {
        match &self.body {
            PassBody::Function(pass) => pass.name(),
            PassBody::Rewrite(group) => group.name(),
        }
    }
}

/// Runs registered passes in registration order.
///
/// After every pass that reports a change, the manager drops unreachable
/// nodes, validates the function, and recomputes stale output slots before
/// the next pass runs. The first failure aborts the run; the function is
/// then in an indeterminate state and should be discarded.
///
/// # Example
///
/// ```ignore
/// let mut manager = PassManager::new();
/// manager
///     .register_pass(MimicSetBatchSize::new())
///     .register_graph_rewrite(vector_to_scalar());
///
/// let ctx = PassContext::new(&registry).with_batch_update(true);
/// let changed = manager.run_passes(&mut function, &ctx)?;
/// ```
pub struct PassManager {
    passes: Vec<PassEntry>,
    config: PassManagerConfig,
}

impl PassManager {
    pub fn new() -> Self {
        Self::with_config(PassManagerConfig::default())
    }

    pub fn with_config(config: PassManagerConfig) -> Self {
        Self {
            passes: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &PassManagerConfig {
        &self.config
    }

    /// Register a whole-function pass.
    pub fn register_pass(&mut self, pass: impl FunctionPass + 'static) -> &mut Self {
        self.passes.push(PassEntry {
            kind: PassKind::Function,
            body: PassBody::Function(Box::new(pass)),
        });
        self
    }

    /// Register a single matcher pass, applied in one traversal.
    pub fn register_matcher_pass(&mut self, pass: impl MatcherPass + 'static) -> &mut Self {
        let group = GraphRewrite::new(pass.name().to_string()).with_matcher(pass);
        self.passes.push(PassEntry {
            kind: PassKind::Matcher,
            body: PassBody::Rewrite(group),
        });
        self
    }

    /// Register a group of matcher passes sharing one traversal.
    pub fn register_graph_rewrite(&mut self, group: GraphRewrite) -> &mut Self {
        self.passes.push(PassEntry {
            kind: PassKind::GraphRewrite,
            body: PassBody::Rewrite(group),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Registered passes as `(name, kind)`, in run order.
    pub fn pass_names(&self) -> Vec<(&str, PassKind)> {
        self.passes
            .iter()
            .map(|entry| (entry.name(), entry.kind))
            .collect()
    }

    /// Run every registered pass over `function`.
    ///
    /// Returns `Ok(true)` if any pass changed the function.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a pass, by validation, or by shape
    /// inference.
    #[tracing::instrument(skip_all, fields(function = %function.name, num_nodes = function.node_count()))]
    pub fn run_passes(&self, function: &mut Function, ctx: &PassContext) -> Result<bool> {
        // Passes may read output slots, so the function must be up to date
        // before the first one runs.
        function.infer_shapes(ctx.registry)?;

        let mut changed_any = false;
        for entry in &self.passes {
            let _span =
                tracing::debug_span!("pass", name = entry.name(), kind = ?entry.kind).entered();

            let changed = match &entry.body {
                PassBody::Function(pass) => pass.run_on_function(function, ctx)?,
                PassBody::Rewrite(group) => group.run(function, ctx, self.config.max_iterations)?,
            };

            if !changed {
                continue;
            }
            changed_any = true;

            if self.config.collect_unreachable {
                function.remove_unreachable();
            }
            if self.config.validate_after_each_pass {
                function.validate()?;
            }
            let recomputed = function.infer_shapes(ctx.registry)?;
            tracing::debug!(recomputed, num_nodes = function.node_count(), "pass changed function");
        }

        Ok(changed_any)
    }

    /// Run the registered passes over independent functions in parallel.
    ///
    /// Each function is processed sequentially by one worker; results are
    /// returned in input order.
    #[tracing::instrument(skip_all, fields(num_functions = functions.len()))]
    pub fn run_on_functions(
        &self,
        functions: &mut [Function],
        ctx: &PassContext,
    ) -> Vec<Result<bool>> {
        functions
            .par_iter_mut()
            .map(|function| self.run_passes(function, ctx))
            .collect()
    }
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}
