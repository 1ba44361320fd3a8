/// Action-tree interpreter
///
/// Walks a compiled action tree against a per-run execution context:
/// sequential stepping through steps, exclusive condition branches,
/// spawned parallel branches with a deterministic declaration-order merge,
/// and rule-gated skipping. The first step failure is terminal for its
/// chain; retries happen only at job granularity in the queue layer.

use crate::engine::{resolver, rules};
use crate::error::{NodeError, StepError};
use crate::events::JobEmitter;
use crate::nodes::NodeRegistry;
use crate::workflow::types::{ActionNode, ExecutionContext, RuleGroup};
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Final state of one chain run
#[derive(Debug)]
pub struct RunOutcome {
    pub context: ExecutionContext,
    /// Parallel branches that failed, as "<parallel_id>[<index>]" labels.
    /// Non-empty means the run completed with partial results.
    pub failed_branches: Vec<String>,
}

impl RunOutcome {
    pub fn is_partial(&self) -> bool {
        !self.failed_branches.is_empty()
    }
}

/// Interprets action trees against the node registry
pub struct ChainExecutor {
    registry: Arc<NodeRegistry>,
}

type ChainFuture = Pin<Box<dyn Future<Output = Result<RunOutcome, StepError>> + Send>>;

impl ChainExecutor {
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self { registry }
    }

    /// Execute a chain of actions, consuming and returning the context
    ///
    /// Boxed so condition branches can recurse within the same task while
    /// parallel branches recurse on spawned tasks.
    pub fn execute(
        self: Arc<Self>,
        actions: Vec<ActionNode>,
        mut context: ExecutionContext,
        emitter: JobEmitter,
    ) -> ChainFuture {
        Box::pin(async move {
            let mut failed_branches = Vec::new();

            for action in actions {
                if let Some(gate) = action.gate() {
                    if !gate_open(gate, &context) {
                        tracing::debug!(node = action.id(), "gate closed, skipping node");
                        continue;
                    }
                }

                match action {
                    ActionNode::Step { id, action, inputs, .. } => {
                        self.run_step(&id, &action, inputs, &mut context, &emitter).await?;
                    }
                    ActionNode::Condition { id, rules, true_branch, false_branch, .. } => {
                        let verdict = rules::evaluate(&rules, &context);
                        tracing::debug!(node = %id, verdict, "condition evaluated");
                        // Exactly one branch runs; the other is never touched.
                        let branch = if verdict { true_branch } else { false_branch };
                        let outcome = Arc::clone(&self)
                            .execute(branch, context, emitter.clone())
                            .await?;
                        context = outcome.context;
                        failed_branches.extend(outcome.failed_branches);
                    }
                    ActionNode::Parallel { id, branches, .. } => {
                        let outcome = self
                            .run_parallel(&id, branches, context, &emitter)
                            .await;
                        context = outcome.context;
                        failed_branches.extend(outcome.failed_branches);
                    }
                }
            }

            Ok(RunOutcome { context, failed_branches })
        })
    }

    /// One sequential step: resolve inputs, dispatch, merge the result
    async fn run_step(
        &self,
        id: &str,
        action: &str,
        inputs: Map<String, Value>,
        context: &mut ExecutionContext,
        emitter: &JobEmitter,
    ) -> Result<(), StepError> {
        tracing::info!(node = %id, %action, "executing step");
        emitter.node_started(id);

        let resolved: Map<String, Value> = inputs
            .iter()
            .map(|(k, v)| (k.clone(), resolver::resolve(v, context)))
            .collect();

        let handler = self.registry.get(action).ok_or_else(|| StepError {
            node_id: id.to_string(),
            action: action.to_string(),
            source: NodeError::UnknownType(action.to_string()),
        })?;

        match handler.run(resolved, context).await {
            Ok(result) => {
                emitter.node_finished(id, &result);
                context.absorb_step(id, result);
                Ok(())
            }
            Err(source) => {
                tracing::error!(node = %id, %action, error = %source, "step failed");
                Err(StepError {
                    node_id: id.to_string(),
                    action: action.to_string(),
                    source,
                })
            }
        }
    }

    /// Fan-out: clone the context per branch, run branches as concurrent
    /// tasks, await all of them, then fold successful branch contexts back
    /// in declaration order (last successful branch wins on key collision).
    /// A failed branch is logged and its partial context discarded; the
    /// region itself never aborts.
    async fn run_parallel(
        self: &Arc<Self>,
        id: &str,
        branches: Vec<Vec<ActionNode>>,
        context: ExecutionContext,
        emitter: &JobEmitter,
    ) -> RunOutcome {
        tracing::info!(node = %id, branches = branches.len(), "forking parallel region");

        let handles: Vec<_> = branches
            .into_iter()
            .map(|branch| {
                let executor = Arc::clone(self);
                let branch_context = context.clone();
                let branch_emitter = emitter.clone();
                tokio::spawn(executor.execute(branch, branch_context, branch_emitter))
            })
            .collect();

        let mut merged = context;
        let mut failed_branches = Vec::new();

        // Await in declaration order regardless of completion order, so
        // the merged state is deterministic for disjoint key sets.
        for (index, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(Ok(outcome)) => {
                    merged.merge_from(outcome.context);
                    failed_branches.extend(outcome.failed_branches);
                }
                Ok(Err(step_error)) => {
                    tracing::warn!(
                        node = %id,
                        branch = index,
                        error = %step_error,
                        "parallel branch failed, discarding its context"
                    );
                    failed_branches.push(format!("{}[{}]", id, index));
                }
                Err(join_error) => {
                    tracing::error!(
                        node = %id,
                        branch = index,
                        error = %join_error,
                        "parallel branch task aborted"
                    );
                    failed_branches.push(format!("{}[{}]", id, index));
                }
            }
        }

        tracing::info!(node = %id, failed = failed_branches.len(), "parallel region merged");
        RunOutcome { context: merged, failed_branches }
    }
}

fn gate_open(gate: &RuleGroup, context: &ExecutionContext) -> bool {
    rules::evaluate(gate, context)
}
