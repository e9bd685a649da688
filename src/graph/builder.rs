// Graph Builder
// Constructs the evaluation pipeline graph using petgraph

use super::node::GraphError;
use super::nodes::{
    CompetitorAnalysisStage, DiscoveryNode, InvestmentDecisionStage, MarketEvalStage,
    NextEntityNode, ReportNode, TechSummaryStage,
};
use super::routing::{check_done, route_decision};
use super::runtime::{GraphBuilder, GraphRuntime, END};
use super::stage::StageNode;
use super::state::PipelineState;

/// Build the per-run evaluation graph.
///
/// `max_steps` is the default budget; `Pipeline` narrows it per run.
pub fn build_pipeline_graph(max_steps: usize) -> Result<GraphRuntime<PipelineState>, GraphError> {
    GraphBuilder::new()
        .entry("search")
        .max_steps(max_steps)
        // Discovery and iteration
        .node(Box::new(DiscoveryNode::new()))
        .node(Box::new(NextEntityNode::new()))
        // Per-entity stages
        .node(Box::new(StageNode::new(TechSummaryStage::new())))
        .node(Box::new(StageNode::new(MarketEvalStage::new()?)))
        .node(Box::new(StageNode::new(CompetitorAnalysisStage::new())))
        .node(Box::new(StageNode::new(InvestmentDecisionStage::new())))
        .node(Box::new(ReportNode::new()))
        .edge("search", "next_entity")
        // next_entity -> stages or END
        .conditional_edge("next_entity", "tech_summary", "continue")
        .conditional_edge("next_entity", END, "done")
        .router("next_entity", |state: &PipelineState| check_done(state).as_str())
        .edge("tech_summary", "market_eval")
        .edge("market_eval", "competitor_analysis")
        .edge("competitor_analysis", "investment_decision")
        // Decision branch
        .conditional_edge("investment_decision", "report", "invested")
        .conditional_edge("investment_decision", "next_entity", "continue")
        .router("investment_decision", |state: &PipelineState| {
            route_decision(state).as_str()
        })
        // Report -> next entity or END
        .conditional_edge("report", "next_entity", "continue")
        .conditional_edge("report", END, "done")
        .router("report", |state: &PipelineState| check_done(state).as_str())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_graph_has_every_stage() {
        let graph = build_pipeline_graph(100).unwrap();
        let mut ids = graph.node_ids();
        ids.sort();

        assert_eq!(
            ids,
            vec![
                "__end__",
                "competitor_analysis",
                "investment_decision",
                "market_eval",
                "next_entity",
                "report",
                "search",
                "tech_summary",
            ]
        );
        assert!(graph.has_cycle());
        assert_eq!(graph.max_steps(), 100);
    }
}
