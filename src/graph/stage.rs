// Stage Node
// Per-entity evaluation steps and their adapter onto the graph runtime

use async_trait::async_trait;

use super::fallback::Guarded;
use super::node::{GraphError, Node, NodeContext, NodeOutput};
use super::state::{PipelineState, StagePatch, Startup};

/// Patch computed by a stage plus the failures its fallbacks absorbed.
#[derive(Debug, Default)]
pub struct StageOutcome {
    pub patch: StagePatch,
    pub failures: Vec<String>,
}

impl StageOutcome {
    /// Unwraps a guarded value, remembering its failure for the diagnostics.
    pub fn take<T>(&mut self, guarded: Guarded<T>) -> T {
        if let Some(failure) = guarded.failure {
            self.failures.push(failure);
        }
        guarded.value
    }

    pub fn with_patch(mut self, patch: StagePatch) -> Self {
        self.patch = patch;
        self
    }
}

/// One evaluation step over the current entity.
///
/// Implementations never fail: every capability call goes through `with_fallback`.
#[async_trait]
pub trait Stage: Send + Sync {
    fn id(&self) -> &'static str;

    fn name(&self) -> &'static str {
        self.id()
    }

    async fn evaluate(&self, startup: &Startup, ctx: &NodeContext<'_>) -> StageOutcome;
}

/// Runs a `Stage` against `state.current()` and merges its patch.
pub struct StageNode<T> {
    stage: T,
}

impl<T: Stage> StageNode<T> {
    pub fn new(stage: T) -> Self {
        Self { stage }
    }
}

#[async_trait]
impl<T: Stage + 'static> Node<PipelineState> for StageNode<T> {
    fn id(&self) -> &'static str {
        self.stage.id()
    }

    fn name(&self) -> &'static str {
        self.stage.name()
    }

    async fn execute(
        &self,
        state: &mut PipelineState,
        ctx: &NodeContext<'_>,
    ) -> Result<NodeOutput, GraphError> {
        let id = self.stage.id();
        state.stage = Some(id.to_string());

        let Some(current) = state.current() else {
            tracing::warn!("{}: no current entity, skipping", id);
            return Ok(NodeOutput::Continue(None));
        };

        tracing::info!("[{}] {} started", current.name, self.stage.name());
        let outcome = self.stage.evaluate(current, ctx).await;

        state.apply_patch(id, outcome.patch)?;
        for failure in outcome.failures {
            state.record_degraded(id, failure);
        }

        if let Some(current) = state.current() {
            tracing::info!("[{}] {} finished", current.name, self.stage.name());
        }
        Ok(NodeOutput::Continue(None))
    }
}
