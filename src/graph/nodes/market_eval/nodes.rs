// Market Analysis Nodes
// Steps of the market analysis sub-graph

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::state::{MarketAnalysisState, ANALYSIS_DEPTHS, QUERY_TYPES};
use crate::core::errors::CapabilityError;
use crate::graph::node::{GraphError, Node, NodeContext, NodeOutput};
use crate::graph::state::MarketScore;
use crate::llm::response::{extract_object, number, text};
use crate::prompts;
use crate::tools::search::truncate_chars;

const TEMPERATURE: f64 = 0.3;
const CREATIVE_TEMPERATURE: f64 = 0.7;

const RAG_DOC_CHARS: usize = 600;
const RAG_TOTAL_CHARS: usize = 3000;
const WEB_QUERY_CHARS: usize = 800;
const WEB_TOTAL_CHARS: usize = 2500;
const SECTION_SEPARATOR: &str = "\n\n---\n\n";

fn capability_error(node: &str, err: CapabilityError) -> GraphError {
    GraphError::new(node, err.to_string())
}

async fn invoke(
    node: &str,
    ctx: &NodeContext<'_>,
    prompt: &str,
    temperature: f64,
) -> Result<String, GraphError> {
    ctx.services
        .llm
        .invoke(prompt, temperature)
        .await
        .map_err(|e| capability_error(node, e))
}

/// Every placeholder the market prompts use; each template picks what it needs.
fn prompt_vars(state: &MarketAnalysisState) -> Vec<(&'static str, String)> {
    vec![
        ("query", state.query.clone()),
        ("rag_data", state.rag_or_na().to_string()),
        ("web_data", state.web_or_na().to_string()),
        ("market_size", state.market_size.clone()),
        ("growth_trend", state.growth_trend.clone()),
        ("competition", state.competition.clone()),
        ("risk_factors", state.risk_factors.clone()),
        ("final_score", state.score.total_score.to_string()),
        ("analysis_depth", state.analysis_depth.clone()),
    ]
}

fn fill_from_state(template: &str, state: &MarketAnalysisState) -> String {
    let vars = prompt_vars(state);
    let borrowed: Vec<(&str, &str)> = vars.iter().map(|(k, v)| (*k, v.as_str())).collect();
    prompts::fill(template, &borrowed)
}

pub struct ClassifyQueryNode;

#[async_trait]
impl Node<MarketAnalysisState> for ClassifyQueryNode {
    fn id(&self) -> &'static str {
        "classify_query"
    }

    async fn execute(
        &self,
        state: &mut MarketAnalysisState,
        ctx: &NodeContext<'_>,
    ) -> Result<NodeOutput, GraphError> {
        let prompt = prompts::fill(prompts::MARKET_CLASSIFY, &[("query", state.query.as_str())]);
        let response = invoke(self.id(), ctx, &prompt, TEMPERATURE).await?;
        let map = extract_object(&response).map_err(|e| GraphError::new(self.id(), e.to_string()))?;

        state.query_type = pick(&map, "query_type", &QUERY_TYPES, "general");
        state.analysis_depth = pick(&map, "analysis_depth", &ANALYSIS_DEPTHS, "intermediate");
        state.needs_web_search = match map.get("needs_web_search") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        };

        tracing::debug!(
            "Market query classified: {} (depth {}, web {})",
            state.query_type,
            state.analysis_depth,
            state.needs_web_search
        );
        Ok(NodeOutput::Continue(None))
    }
}

fn pick(map: &Map<String, Value>, key: &str, allowed: &[&str], default: &str) -> String {
    text(map.get(key))
        .map(|v| v.trim().to_lowercase())
        .filter(|v| allowed.contains(&v.as_str()))
        .unwrap_or_else(|| default.to_string())
}

pub struct RetrieveInternalNode;

#[async_trait]
impl Node<MarketAnalysisState> for RetrieveInternalNode {
    fn id(&self) -> &'static str {
        "retrieve_internal"
    }

    async fn execute(
        &self,
        state: &mut MarketAnalysisState,
        ctx: &NodeContext<'_>,
    ) -> Result<NodeOutput, GraphError> {
        let query = format!("{} {} market analysis", state.query, state.query_type);
        let docs = match ctx
            .services
            .retriever
            .retrieve(&query, ctx.services.rag_top_k)
            .await
        {
            Ok(docs) => docs,
            Err(err) => {
                tracing::warn!("Internal retrieval failed, continuing without it: {}", err);
                Vec::new()
            }
        };

        state.rag_data = if docs.is_empty() {
            "No internal data".to_string()
        } else {
            let joined = docs
                .iter()
                .enumerate()
                .map(|(i, doc)| format!("[Document {}]\n{}", i + 1, truncate_chars(doc, RAG_DOC_CHARS)))
                .collect::<Vec<_>>()
                .join(SECTION_SEPARATOR);
            truncate_chars(&joined, RAG_TOTAL_CHARS)
        };

        tracing::debug!("Internal retrieval returned {} documents", docs.len());
        Ok(NodeOutput::Continue(None))
    }
}

/// Router after `retrieve_internal`.
pub fn route_web_search(state: &MarketAnalysisState) -> &'static str {
    if state.needs_web_search {
        "web_search"
    } else {
        "skip_web_search"
    }
}

pub struct WebSearchNode;

#[async_trait]
impl Node<MarketAnalysisState> for WebSearchNode {
    fn id(&self) -> &'static str {
        "web_search"
    }

    async fn execute(
        &self,
        state: &mut MarketAnalysisState,
        ctx: &NodeContext<'_>,
    ) -> Result<NodeOutput, GraphError> {
        let queries = [
            format!("{} market size outlook 2024 2025", state.query),
            format!("{} industry trend report", state.query),
        ];

        let mut sections = Vec::new();
        for query in &queries {
            match ctx
                .services
                .search
                .search_text_limited(query, WEB_QUERY_CHARS)
                .await
            {
                Ok(result) => sections.push(format!("[Search: {}]\n{}", query, result)),
                Err(err) => tracing::warn!("Market web search '{}' failed: {}", query, err),
            }
        }

        state.web_search_used = !sections.is_empty();
        state.web_data = if sections.is_empty() {
            "No web search results".to_string()
        } else {
            truncate_chars(&sections.join(SECTION_SEPARATOR), WEB_TOTAL_CHARS)
        };
        Ok(NodeOutput::Continue(None))
    }
}

/// One free-text analysis step: fill a template, store the model's answer.
pub struct AnalysisNode {
    id: &'static str,
    template: &'static str,
    temperature: f64,
    store: fn(&mut MarketAnalysisState, String),
}

impl AnalysisNode {
    pub fn market_size() -> Self {
        Self {
            id: "analyze_market_size",
            template: prompts::MARKET_SIZE,
            temperature: TEMPERATURE,
            store: |state, text| state.market_size = text,
        }
    }

    pub fn growth() -> Self {
        Self {
            id: "analyze_growth",
            template: prompts::MARKET_GROWTH,
            temperature: TEMPERATURE,
            store: |state, text| state.growth_trend = text,
        }
    }

    pub fn competition() -> Self {
        Self {
            id: "analyze_competition",
            template: prompts::MARKET_COMPETITION,
            temperature: TEMPERATURE,
            store: |state, text| state.competition = text,
        }
    }

    pub fn risks() -> Self {
        Self {
            id: "analyze_risks",
            template: prompts::MARKET_RISKS,
            temperature: TEMPERATURE,
            store: |state, text| state.risk_factors = text,
        }
    }

    pub fn report() -> Self {
        Self {
            id: "generate_report",
            template: prompts::MARKET_REPORT,
            temperature: CREATIVE_TEMPERATURE,
            store: |state, text| state.final_report = text,
        }
    }
}

#[async_trait]
impl Node<MarketAnalysisState> for AnalysisNode {
    fn id(&self) -> &'static str {
        self.id
    }

    async fn execute(
        &self,
        state: &mut MarketAnalysisState,
        ctx: &NodeContext<'_>,
    ) -> Result<NodeOutput, GraphError> {
        let prompt = fill_from_state(self.template, state);
        let response = invoke(self.id, ctx, &prompt, self.temperature).await?;
        (self.store)(state, response);
        Ok(NodeOutput::Continue(None))
    }
}

pub struct CalculateScoreNode;

#[async_trait]
impl Node<MarketAnalysisState> for CalculateScoreNode {
    fn id(&self) -> &'static str {
        "calculate_score"
    }

    async fn execute(
        &self,
        state: &mut MarketAnalysisState,
        ctx: &NodeContext<'_>,
    ) -> Result<NodeOutput, GraphError> {
        let prompt = fill_from_state(prompts::MARKET_SCORE, state);
        let response = invoke(self.id(), ctx, &prompt, TEMPERATURE).await?;
        let map = extract_object(&response).map_err(|e| GraphError::new(self.id(), e.to_string()))?;

        state.score = parse_score(&map);
        tracing::debug!("Market score: {}/100", state.score.total_score);
        Ok(NodeOutput::Continue(None))
    }
}

/// Clamps every component to its range; the total is always their sum.
pub fn parse_score(map: &Map<String, Value>) -> MarketScore {
    let component = |key: &str, max: u32| -> u32 {
        number(map.get(key))
            .map(|n| n.round().clamp(0.0, f64::from(max)) as u32)
            .unwrap_or(0)
    };

    let market_size_score = component("market_size_score", 25);
    let growth_score = component("growth_score", 30);
    let competition_score = component("competition_score", 25);
    let risk_score = component("risk_score", 20);
    let total_score = market_size_score + growth_score + competition_score + risk_score;

    if let Some(reported) = number(map.get("total_score")) {
        if reported.round() as i64 != i64::from(total_score) {
            tracing::warn!(
                "Reported market total {} differs from component sum {}",
                reported,
                total_score
            );
        }
    }

    MarketScore {
        market_size_score,
        growth_score,
        competition_score,
        risk_score,
        total_score,
        justification: text(map.get("justification")).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn score_components_are_clamped_and_summed() {
        let map = json!({
            "market_size_score": 40,
            "growth_score": "22",
            "competition_score": -3,
            "risk_score": 12.6,
            "total_score": 99,
            "justification": "growing niche"
        });
        let score = parse_score(map.as_object().unwrap());

        assert_eq!(score.market_size_score, 25);
        assert_eq!(score.growth_score, 22);
        assert_eq!(score.competition_score, 0);
        assert_eq!(score.risk_score, 13);
        assert_eq!(score.total_score, 60);
        assert_eq!(score.justification, "growing niche");
    }

    #[test]
    fn classification_falls_back_to_known_values() {
        let map = json!({"query_type": "Trend", "analysis_depth": "exhaustive"});
        let map = map.as_object().unwrap();
        assert_eq!(pick(map, "query_type", &QUERY_TYPES, "general"), "trend");
        assert_eq!(
            pick(map, "analysis_depth", &ANALYSIS_DEPTHS, "intermediate"),
            "intermediate"
        );
    }

    #[test]
    fn router_follows_classification() {
        let mut state = MarketAnalysisState::new("edtech");
        assert_eq!(route_web_search(&state), "skip_web_search");
        state.needs_web_search = true;
        assert_eq!(route_web_search(&state), "web_search");
    }
}
