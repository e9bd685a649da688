// Node trait and types
// Base abstraction for graph nodes

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::errors::ApiError;
use crate::state::Services;

/// Context passed to nodes during execution
pub struct NodeContext<'a> {
    /// Injected capabilities (model, search, retrieval, renderer)
    pub services: &'a Services,
    /// Checked by the runtime between node executions
    pub cancel: &'a CancellationToken,
}

impl<'a> NodeContext<'a> {
    pub fn new(services: &'a Services, cancel: &'a CancellationToken) -> Self {
        Self { services, cancel }
    }
}

/// Output from a node execution
#[derive(Debug, Clone)]
pub enum NodeOutput {
    /// Continue to the specified next node (None = router or default edge)
    Continue(Option<String>),
    /// Branch to one of the specified nodes based on condition
    Branch(String),
    /// Graph execution complete
    Final,
    /// Error occurred
    Error(String),
}

/// Graph execution error
///
/// Includes an `execution_trace` recording the sequence of node IDs visited
/// before the error occurred.
#[derive(Debug, Clone)]
pub struct GraphError {
    pub node_id: String,
    pub message: String,
    /// Ordered list of node IDs executed before this error, most-recent last.
    pub execution_trace: Vec<String>,
}

impl GraphError {
    pub fn new(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            message: message.into(),
            execution_trace: Vec::new(),
        }
    }

    /// Attaches the runtime's trace unless a nested graph already set one.
    pub fn with_trace(mut self, trace: &[&str]) -> Self {
        if self.execution_trace.is_empty() {
            self.execution_trace = trace.iter().map(|id| id.to_string()).collect();
        }
        self
    }
}

impl From<GraphError> for ApiError {
    fn from(err: GraphError) -> Self {
        ApiError::internal(err)
    }
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.execution_trace.is_empty() {
            write!(f, "GraphError in {}: {}", self.node_id, self.message)
        } else {
            write!(
                f,
                "GraphError in {} (trace: {}): {}",
                self.node_id,
                self.execution_trace.join(" -> "),
                self.message
            )
        }
    }
}

impl std::error::Error for GraphError {}

/// Node trait - all graph nodes implement this
#[async_trait]
pub trait Node<S: Send>: Send + Sync {
    /// Unique identifier for this node
    fn id(&self) -> &'static str;

    /// Human-readable name for display
    fn name(&self) -> &'static str {
        self.id()
    }

    /// Execute the node logic
    async fn execute(
        &self,
        state: &mut S,
        ctx: &NodeContext<'_>,
    ) -> Result<NodeOutput, GraphError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_trace() {
        let err = GraphError::new("report", "boom").with_trace(&["search", "next_entity", "report"]);
        assert_eq!(
            err.to_string(),
            "GraphError in report (trace: search -> next_entity -> report): boom"
        );

        let kept = err.clone().with_trace(&["outer"]);
        assert_eq!(kept.execution_trace.len(), 3);
    }

    #[test]
    fn converts_to_internal_api_error() {
        let api: ApiError = GraphError::new("runtime", "Maximum steps (3) exceeded").into();
        assert!(matches!(api, ApiError::Internal(msg) if msg.contains("Maximum steps")));
    }
}
