//! Batch-size relaxation for Reshapes with hard-coded targets.
//!
//! A Reshape whose target pattern is known at compile time pins the batch
//! dimension: once the function's input batch changes, the element counts no
//! longer agree. `MimicSetBatchSize` replaces the literal batch entry of the
//! pattern with a sub-graph that scales the runtime batch by the ratio the
//! original pattern encoded.

use tessera_core::{
    AttributeValue, DataType, Error, Function, FunctionPass, Node, NodeId, Output, PassContext,
    Pattern, Result, TensorValue,
};

/// Batch of a relaxed Reshape for a given input batch.
///
/// Returns `ceil(observed * out_batch / in_batch)`, the same arithmetic the
/// inserted sub-graph performs at execution time. Computed in f64 as
/// multiply-then-divide so the ceiling is exact for batches below 2^53.
///
/// # Errors
///
/// `Error::PreconditionViolation` if `in_batch` is not positive.
pub fn relaxed_batch(observed: i64, in_batch: i64, out_batch: i64) -> Result<i64> {
    if in_batch <= 0 {
        return Err(Error::PreconditionViolation(format!(
            "Input batch must be positive to relax a Reshape, got {in_batch}"
        )));
    }
    Ok(((observed as f64 * out_batch as f64) / in_batch as f64).ceil() as i64)
}

/// Reshape selected for relaxation.
#[derive(Debug)]
struct Candidate {
    reshape: NodeId,
    data: Output,
    target: Output,
    target_dtype: DataType,
    rank: usize,
    in_batch: usize,
    out_batch: i64,
}

/// Rewrites every Reshape with a hard-coded batch entry, in topological order.
///
/// A Reshape qualifies when:
/// - its data input has static rank > 1 and a static dimension 0 (`in_batch`)
/// - its output has static rank > 1
/// - its target pattern is known at compile time (a Constant, or a sub-graph
///   that folds to one) and entry 0 (`out_batch`) is positive
///
/// Input 1 is then rewired to
///
/// ```text
/// ShapeOf(data) -> Gather([0]) -> Convert(f64) -> Multiply(out_batch)
///     -> Divide(in_batch) -> Ceiling -> Convert(pattern type)
/// Concat(axis 0)(that, Gather(pattern, [1..rank)))
/// ```
///
/// Only valid while a set-batch-size operation runs; the pass refuses to run
/// unless `PassContext::batch_update` is set.
pub struct MimicSetBatchSize {
    pattern: Pattern,
}

impl MimicSetBatchSize {
    pub fn new() -> Self {
        Self {
            pattern: Pattern::op("Reshape").with_inputs(vec![
                Pattern::any().named("data"),
                Pattern::any().named("target"),
            ]),
        }
    }

    /// Check one matched Reshape. Skipped Reshapes return `Ok(None)`.
    fn analyse(&self, function: &Function, reshape: NodeId) -> Result<Option<Candidate>> {
        let node = function.node(reshape)?;
        let data = node.inputs[0];
        let target = node.inputs[1];

        let data_shape = &function.slot(data)?.shape;
        let Some(rank) = data_shape.rank() else {
            tracing::warn!(reshape = %node.name, "skipping Reshape: input rank is dynamic");
            return Ok(None);
        };
        if rank <= 1 {
            return Ok(None);
        }
        let Some(in_batch) = data_shape.dim(0).and_then(|d| d.as_static()) else {
            tracing::warn!(reshape = %node.name, shape = %data_shape, "skipping Reshape: input batch is dynamic");
            return Ok(None);
        };

        let out_rank = node.output(0).and_then(|slot| slot.shape.rank());
        match out_rank {
            Some(r) if r > 1 => {}
            Some(_) => return Ok(None),
            None => {
                tracing::warn!(reshape = %node.name, "skipping Reshape: output rank is dynamic");
                return Ok(None);
            }
        }

        let target_slot = function.slot(target)?;
        let Some(pattern) = target_slot.value.as_ref().and_then(TensorValue::to_i64_vec) else {
            tracing::trace!(reshape = %node.name, "Reshape target is computed at execution time");
            return Ok(None);
        };
        let Some(&out_batch) = pattern.first() else {
            return Ok(None);
        };
        if out_batch <= 0 {
            // 0 copies the input batch and -1 infers it; both already follow it.
            return Ok(None);
        }

        if in_batch == 0 {
            return Err(Error::PreconditionViolation(format!(
                "Reshape '{}' has a zero input batch; cannot compute the batch ratio",
                node.name
            )));
        }

        Ok(Some(Candidate {
            reshape,
            data,
            target,
            target_dtype: target_slot.dtype,
            rank: pattern.len(),
            in_batch,
            out_batch,
        }))
    }

    fn relax(&self, function: &mut Function, candidate: &Candidate, ctx: &PassContext) -> Result<()> {
        let registry = ctx.registry;
        let prefix = function.node(candidate.reshape)?.name.clone();
        let named = |suffix: &str| format!("{prefix}/{suffix}");

        let shape = function.make_node(
            Node::new("ShapeOf")
                .with_name(named("shape"))
                .with_input(candidate.data)
                .with_attribute("output_type", string_attr(DataType::I64.name())),
            registry,
        )?;
        let first = function.add_constant(TensorValue::from_i64(vec![0]));
        let axis = function.add_constant(TensorValue::from_i64(vec![0]));
        let batch = function.make_node(
            Node::new("Gather")
                .with_name(named("batch"))
                .with_inputs([shape.into(), first.into(), axis.into()]),
            registry,
        )?;

        let as_float = function.make_node(
            Node::new("Convert")
                .with_input(batch)
                .with_attribute("destination_type", string_attr(DataType::F64.name())),
            registry,
        )?;
        let out_batch = function.add_constant(TensorValue::from_f64(vec![candidate.out_batch as f64]));
        let scaled = function.make_node(
            Node::new("Multiply").with_input(as_float).with_input(out_batch),
            registry,
        )?;
        let in_batch = function.add_constant(TensorValue::from_f64(vec![candidate.in_batch as f64]));
        let ratio = function.make_node(
            Node::new("Divide").with_input(scaled).with_input(in_batch),
            registry,
        )?;
        let rounded = function.make_node(Node::new("Ceiling").with_input(ratio), registry)?;
        let modified_batch = function.make_node(
            Node::new("Convert")
                .with_name(named("modified_batch"))
                .with_input(rounded)
                .with_attribute(
                    "destination_type",
                    string_attr(candidate.target_dtype.name()),
                ),
            registry,
        )?;

        let rest_indices = function.add_constant(TensorValue::from_i64(
            (1..candidate.rank as i64).collect(),
        ));
        let rest = function.make_node(
            Node::new("Gather")
                .with_name(named("non_batch_dims"))
                .with_inputs([candidate.target, rest_indices.into(), axis.into()]),
            registry,
        )?;
        let target = function.make_node(
            Node::new("Concat")
                .with_name(named("target"))
                .with_inputs([modified_batch.into(), rest.into()])
                .with_attribute("axis", AttributeValue::Int(0)),
            registry,
        )?;

        function.set_input(candidate.reshape, 1, target.into())?;

        tracing::debug!(
            reshape = %prefix,
            in_batch = candidate.in_batch,
            out_batch = candidate.out_batch,
            "relaxed hard-coded Reshape batch"
        );
        Ok(())
    }
}

impl FunctionPass for MimicSetBatchSize {
    fn name(&self) -> &str {
        "mimic_set_batch_size"
    }

    fn run_on_function(&self, function: &mut Function, ctx: &PassContext) -> Result<bool> {
        if !ctx.batch_update {
            return Err(Error::PreconditionViolation(
                "mimic_set_batch_size only runs inside a set-batch-size operation".to_string(),
            ));
        }

        // Targets must be folded before they can be recognised as literals.
        function.infer_shapes(ctx.registry)?;

        let mut candidates = Vec::new();
        for m in self.pattern.find_all(function) {
            if let Some(candidate) = self.analyse(function, m.root())? {
                candidates.push(candidate);
            }
        }

        for candidate in &candidates {
            self.relax(function, candidate, ctx)?;
        }

        Ok(!candidates.is_empty())
    }
}

impl Default for MimicSetBatchSize {
    fn default() -> Self {
        Self::new()
    }
}

fn string_attr(value: &str) -> AttributeValue {
    AttributeValue::String(value.to_string())
}
