// Market Eval Stage
// Runs the market analysis sub-graph for the current startup

mod nodes;
mod state;

use async_trait::async_trait;

pub use nodes::{parse_score, route_web_search};
pub use state::{risk_lines, MarketAnalysisState};

use nodes::{
    AnalysisNode, CalculateScoreNode, ClassifyQueryNode, RetrieveInternalNode, WebSearchNode,
};
use crate::core::errors::StageError;
use crate::graph::fallback::with_fallback;
use crate::graph::node::{GraphError, NodeContext};
use crate::graph::runtime::{GraphBuilder, GraphRuntime, END};
use crate::graph::stage::{Stage, StageOutcome};
use crate::graph::state::{MarketEval, MarketEvalDetail, StagePatch, Startup};

/// classify -> retrieve -> (web search) -> four analyses -> score -> report
pub fn build_market_graph() -> Result<GraphRuntime<MarketAnalysisState>, GraphError> {
    GraphBuilder::new()
        .entry("classify_query")
        .max_steps(20)
        .node(Box::new(ClassifyQueryNode))
        .node(Box::new(RetrieveInternalNode))
        .node(Box::new(WebSearchNode))
        .node(Box::new(AnalysisNode::market_size()))
        .node(Box::new(AnalysisNode::growth()))
        .node(Box::new(AnalysisNode::competition()))
        .node(Box::new(AnalysisNode::risks()))
        .node(Box::new(CalculateScoreNode))
        .node(Box::new(AnalysisNode::report()))
        .edge("classify_query", "retrieve_internal")
        .conditional_edge("retrieve_internal", "web_search", "web_search")
        .conditional_edge("retrieve_internal", "analyze_market_size", "skip_web_search")
        .router("retrieve_internal", route_web_search)
        .edge("web_search", "analyze_market_size")
        .edge("analyze_market_size", "analyze_growth")
        .edge("analyze_growth", "analyze_competition")
        .edge("analyze_competition", "analyze_risks")
        .edge("analyze_risks", "calculate_score")
        .edge("calculate_score", "generate_report")
        .edge("generate_report", END)
        .build()
}

pub struct MarketEvalStage {
    graph: GraphRuntime<MarketAnalysisState>,
}

impl MarketEvalStage {
    pub fn new() -> Result<Self, GraphError> {
        Ok(Self {
            graph: build_market_graph()?,
        })
    }

    /// Market query: the startup's `market` attribute, else its name.
    pub fn market_query(startup: &Startup) -> String {
        startup
            .attribute("market")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(&startup.name)
            .to_string()
    }

    async fn analyze(
        &self,
        startup: &Startup,
        ctx: &NodeContext<'_>,
    ) -> Result<(MarketEval, MarketEvalDetail), StageError> {
        let mut state = MarketAnalysisState::new(Self::market_query(startup));
        let steps = self
            .graph
            .run(&mut state, ctx)
            .await
            .map_err(|e| StageError::Aborted(e.to_string()))?;
        tracing::debug!("[{}] market sub-graph finished in {} steps", startup.name, steps);
        Ok(state.into_results())
    }
}

#[async_trait]
impl Stage for MarketEvalStage {
    fn id(&self) -> &'static str {
        "market_eval"
    }

    fn name(&self) -> &'static str {
        "Market Analysis"
    }

    async fn evaluate(&self, startup: &Startup, ctx: &NodeContext<'_>) -> StageOutcome {
        let mut outcome = StageOutcome::default();
        let (eval, detail) = outcome.take(
            with_fallback(self.id(), &startup.name, self.analyze(startup, ctx), |err| {
                (
                    MarketEval {
                        summary: format!("Market analysis failed: {}", err),
                        size_estimate: "N/A".to_string(),
                        growth: "N/A".to_string(),
                        competition: "N/A".to_string(),
                        risks: Vec::new(),
                        score: 0.0,
                    },
                    MarketEvalDetail::default(),
                )
            })
            .await,
        );

        outcome.with_patch(StagePatch {
            market_eval: Some(eval),
            market_eval_detail: Some(detail),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn market_graph_builds() {
        let graph = build_market_graph().unwrap();
        assert_eq!(graph.node_ids().len(), 10);
        assert!(!graph.has_cycle());
    }

    #[test]
    fn market_query_prefers_market_attribute() {
        let mut startup = Startup::named("Acme");
        assert_eq!(MarketEvalStage::market_query(&startup), "Acme");
        startup.attributes.insert("market".into(), json!("Korean K-12"));
        assert_eq!(MarketEvalStage::market_query(&startup), "Korean K-12");
    }
}
