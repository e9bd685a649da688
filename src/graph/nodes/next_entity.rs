// Next Entity Node
// Retires the current entity and promotes the next one from the worklist

use async_trait::async_trait;

use crate::graph::node::{GraphError, Node, NodeContext, NodeOutput};
use crate::graph::state::PipelineState;

pub struct NextEntityNode;

impl NextEntityNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NextEntityNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node<PipelineState> for NextEntityNode {
    fn id(&self) -> &'static str {
        "next_entity"
    }

    fn name(&self) -> &'static str {
        "Next Startup"
    }

    async fn execute(
        &self,
        state: &mut PipelineState,
        _ctx: &NodeContext<'_>,
    ) -> Result<NodeOutput, GraphError> {
        state.stage = Some(self.id().to_string());

        if state.worklist.advance() {
            state.done = false;
            if let Some(current) = state.current() {
                tracing::info!(
                    "[{}] processing ({} queued)",
                    current.name,
                    state.worklist.remaining()
                );
            }
        } else {
            state.done = true;
            tracing::info!(
                "All {} startups processed",
                state.worklist.processed().len()
            );
        }

        Ok(NodeOutput::Continue(None))
    }
}
