// Graph Runtime - petgraph based
// Type-safe StateGraph execution engine

use async_trait::async_trait;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;

use super::node::{GraphError, Node, NodeContext, NodeOutput};

/// Id of the terminal sentinel every runtime carries.
pub const END: &str = "__end__";

/// Pure function of the state choosing the label of the next edge.
pub type Router<S> = fn(&S) -> &'static str;

/// Edge condition for graph routing
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EdgeCondition {
    /// Always follow this edge (default edge)
    Always,
    /// Follow this edge when the node (or its router) yields this label
    OnCondition(String),
}

impl EdgeCondition {
    pub fn always() -> Self {
        Self::Always
    }

    pub fn on(condition: impl Into<String>) -> Self {
        Self::OnCondition(condition.into())
    }

    pub fn matches(&self, condition: Option<&str>) -> bool {
        match (self, condition) {
            (EdgeCondition::Always, None) => true,
            (EdgeCondition::OnCondition(expected), Some(actual)) => expected == actual,
            _ => false,
        }
    }
}

struct EndNode;

#[async_trait]
impl<S: Send + 'static> Node<S> for EndNode {
    fn id(&self) -> &'static str {
        END
    }

    async fn execute(
        &self,
        _state: &mut S,
        _ctx: &NodeContext<'_>,
    ) -> Result<NodeOutput, GraphError> {
        Ok(NodeOutput::Final)
    }
}

/// petgraph-based StateGraph runtime
pub struct GraphRuntime<S: Send> {
    /// The underlying directed graph
    graph: DiGraph<Box<dyn Node<S>>, EdgeCondition>,
    /// Map from node ID to NodeIndex for lookup
    node_indices: HashMap<String, NodeIndex>,
    /// Routers consulted when a node continues without naming a target
    routers: HashMap<NodeIndex, Router<S>>,
    /// Entry point node ID
    entry_node_id: String,
    end_idx: NodeIndex,
    /// Maximum execution steps (recursion limit)
    max_steps: usize,
}

impl<S: Send + 'static> GraphRuntime<S> {
    /// Create a new graph runtime
    pub fn new() -> Self {
        let mut graph: DiGraph<Box<dyn Node<S>>, EdgeCondition> = DiGraph::new();
        let end_idx = graph.add_node(Box::new(EndNode));
        let mut node_indices = HashMap::new();
        node_indices.insert(END.to_string(), end_idx);

        Self {
            graph,
            node_indices,
            routers: HashMap::new(),
            entry_node_id: String::new(),
            end_idx,
            max_steps: 50,
        }
    }

    /// Set maximum execution steps
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Set entry point node
    pub fn with_entry(mut self, node_id: impl Into<String>) -> Self {
        self.entry_node_id = node_id.into();
        self
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub(crate) fn set_max_steps(&mut self, max_steps: usize) {
        self.max_steps = max_steps;
    }

    pub(crate) fn set_entry(&mut self, node_id: String) {
        self.entry_node_id = node_id;
    }

    /// Add a node to the graph
    pub fn add_node(&mut self, node: Box<dyn Node<S>>) -> NodeIndex {
        let id = node.id().to_string();
        let index = self.graph.add_node(node);
        self.node_indices.insert(id, index);
        index
    }

    /// Add an edge between two nodes (always follow)
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        self.add_conditional_edge(from, to, EdgeCondition::Always)
    }

    /// Add a conditional edge between two nodes
    pub fn add_conditional_edge(
        &mut self,
        from: &str,
        to: &str,
        condition: EdgeCondition,
    ) -> Result<(), GraphError> {
        let from_idx = self.index_of(from, "Source")?;
        let to_idx = self.index_of(to, "Target")?;

        self.graph.add_edge(from_idx, to_idx, condition);
        Ok(())
    }

    /// Attach a router to `node_id`; its label selects among the conditional edges
    pub fn set_router(&mut self, node_id: &str, router: Router<S>) -> Result<(), GraphError> {
        let idx = self.index_of(node_id, "Routed")?;
        self.routers.insert(idx, router);
        Ok(())
    }

    fn index_of(&self, node_id: &str, role: &str) -> Result<NodeIndex, GraphError> {
        self.node_indices
            .get(node_id)
            .copied()
            .ok_or_else(|| GraphError::new(node_id, format!("{} node not found: {}", role, node_id)))
    }

    /// Get node by ID
    pub fn get_node(&self, node_id: &str) -> Option<&dyn Node<S>> {
        self.node_indices
            .get(node_id)
            .and_then(|idx| self.graph.node_weight(*idx))
            .map(|boxed| boxed.as_ref())
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> Vec<&str> {
        self.node_indices.keys().map(|s| s.as_str()).collect()
    }

    /// Check for cycles in the graph (for debugging)
    pub fn has_cycle(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.graph)
    }

    /// Execute the graph with the configured step limit.
    ///
    /// Returns the number of node executions.
    pub async fn run(&self, state: &mut S, ctx: &NodeContext<'_>) -> Result<usize, GraphError> {
        self.run_with_budget(state, ctx, self.max_steps).await
    }

    /// Execute the graph, failing once more than `max_steps` nodes would run.
    pub async fn run_with_budget(
        &self,
        state: &mut S,
        ctx: &NodeContext<'_>,
        max_steps: usize,
    ) -> Result<usize, GraphError> {
        if self.entry_node_id.is_empty() {
            return Err(GraphError::new("runtime", "No entry node set"));
        }

        let mut current_idx = *self.node_indices.get(&self.entry_node_id).ok_or_else(|| {
            GraphError::new(
                "runtime",
                format!("Entry node not found: {}", self.entry_node_id),
            )
        })?;

        let mut step = 0;
        let mut trace: Vec<&'static str> = Vec::new();

        loop {
            if current_idx == self.end_idx {
                tracing::debug!("Graph reached END after {} steps", step);
                return Ok(step);
            }

            if ctx.cancel.is_cancelled() {
                return Err(GraphError::new("runtime", "Run cancelled").with_trace(&trace));
            }

            if step >= max_steps {
                return Err(GraphError::new(
                    "runtime",
                    format!("Maximum steps ({}) exceeded", max_steps),
                )
                .with_trace(&trace));
            }

            let node = self
                .graph
                .node_weight(current_idx)
                .ok_or_else(|| GraphError::new("runtime", "Node not found in graph"))?;

            let node_id = node.id();
            trace.push(node_id);
            tracing::debug!("Executing node: {} (step {})", node_id, step);

            let output = node
                .execute(state, ctx)
                .await
                .map_err(|err| err.with_trace(&trace))?;
            step += 1;

            let output = match (output, self.routers.get(&current_idx)) {
                (NodeOutput::Continue(None), Some(router)) => {
                    NodeOutput::Branch(router(state).to_string())
                }
                (output, _) => output,
            };

            let next = match output {
                NodeOutput::Final => {
                    tracing::debug!("Graph execution complete at node: {}", node_id);
                    return Ok(step);
                }
                NodeOutput::Error(msg) => Err(GraphError::new(node_id, msg)),
                NodeOutput::Continue(explicit_next) => {
                    self.resolve_next_node(current_idx, None, explicit_next.as_deref())
                }
                NodeOutput::Branch(condition) => {
                    self.resolve_next_node(current_idx, Some(&condition), None)
                }
            };
            current_idx = next.map_err(|err| err.with_trace(&trace))?;
        }
    }

    /// Resolve the next node based on edges
    fn resolve_next_node(
        &self,
        current_idx: NodeIndex,
        condition: Option<&str>,
        explicit: Option<&str>,
    ) -> Result<NodeIndex, GraphError> {
        let current_id = self
            .graph
            .node_weight(current_idx)
            .map(|n| n.id())
            .unwrap_or("unknown");

        // If explicit next node is provided, use it
        if let Some(next_id) = explicit {
            return self.node_indices.get(next_id).copied().ok_or_else(|| {
                GraphError::new(current_id, format!("Explicit target node not found: {}", next_id))
            });
        }

        let edges_with_targets: Vec<(NodeIndex, &EdgeCondition)> = self
            .graph
            .edges_directed(current_idx, Direction::Outgoing)
            .map(|edge_ref| (edge_ref.target(), edge_ref.weight()))
            .collect();

        if edges_with_targets.is_empty() {
            return Err(GraphError::new(
                current_id,
                format!("No outgoing edges from node: {}", current_id),
            ));
        }

        if let Some((target_idx, _)) = edges_with_targets
            .iter()
            .find(|(_, weight)| weight.matches(condition))
        {
            return Ok(*target_idx);
        }

        // Fall back to default (Always) edge
        if let Some((target_idx, _)) = edges_with_targets
            .iter()
            .find(|(_, weight)| **weight == EdgeCondition::Always)
        {
            tracing::warn!(
                "Condition '{}' not matched for node '{}', using default edge",
                condition.unwrap_or(""),
                current_id
            );
            return Ok(*target_idx);
        }

        Err(GraphError::new(
            current_id,
            format!(
                "Undefined routing label '{}' for node {}",
                condition.unwrap_or("(none)"),
                current_id
            ),
        ))
    }
}

impl<S: Send + 'static> Default for GraphRuntime<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Fluent builder for `GraphRuntime`; edges and routers resolve at `build()`
pub struct GraphBuilder<S: Send> {
    runtime: GraphRuntime<S>,
    pending_edges: Vec<(String, String, EdgeCondition)>,
    pending_routers: Vec<(String, Router<S>)>,
}

impl<S: Send + 'static> GraphBuilder<S> {
    pub fn new() -> Self {
        Self {
            runtime: GraphRuntime::new(),
            pending_edges: Vec::new(),
            pending_routers: Vec::new(),
        }
    }

    pub fn entry(mut self, node_id: impl Into<String>) -> Self {
        self.runtime.set_entry(node_id.into());
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.runtime.set_max_steps(max_steps);
        self
    }

    pub fn node(mut self, node: Box<dyn Node<S>>) -> Self {
        self.runtime.add_node(node);
        self
    }

    pub fn edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.pending_edges
            .push((from.into(), to.into(), EdgeCondition::Always));
        self
    }

    pub fn conditional_edge(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        condition: impl Into<String>,
    ) -> Self {
        self.pending_edges
            .push((from.into(), to.into(), EdgeCondition::on(condition)));
        self
    }

    pub fn router(mut self, node_id: impl Into<String>, router: Router<S>) -> Self {
        self.pending_routers.push((node_id.into(), router));
        self
    }

    pub fn build(mut self) -> Result<GraphRuntime<S>, GraphError> {
        for (from, to, condition) in self.pending_edges {
            self.runtime.add_conditional_edge(&from, &to, condition)?;
        }
        for (node_id, router) in self.pending_routers {
            self.runtime.set_router(&node_id, router)?;
        }
        Ok(self.runtime)
    }
}

impl<S: Send + 'static> Default for GraphBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}
