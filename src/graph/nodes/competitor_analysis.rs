// Competitor Analysis Stage
// Competitor discovery, landscape analysis and positioning, each with its own fallback

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::core::errors::StageError;
use crate::graph::fallback::with_fallback;
use crate::graph::node::NodeContext;
use crate::graph::stage::{Stage, StageOutcome};
use crate::graph::state::{StagePatch, Startup};
use crate::llm::response::extract_object;
use crate::prompts;

const TEMPERATURE: f64 = 0.3;
const SEARCH_CHARS: usize = 2000;

pub struct CompetitorAnalysisStage;

impl CompetitorAnalysisStage {
    pub fn new() -> Self {
        Self
    }

    async fn discover(startup: &Startup, ctx: &NodeContext<'_>) -> Result<Vec<Value>, StageError> {
        let query = format!(
            "{} edtech competitors OR similar edtech companies",
            startup.name
        );
        let results = ctx
            .services
            .search
            .search_text_limited(&query, SEARCH_CHARS)
            .await?;

        let record = startup.record_json();
        let prompt = prompts::fill(
            prompts::COMPETITOR_DISCOVERY,
            &[("startup_info", record.as_str()), ("search_results", results.as_str())],
        );
        let response = ctx.services.llm.invoke(&prompt, TEMPERATURE).await?;
        let map = extract_object(&response)?;

        Ok(match map.get("competitors") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        })
    }

    async fn analyze(
        startup: &Startup,
        competitors: &[Value],
        ctx: &NodeContext<'_>,
    ) -> Result<Map<String, Value>, StageError> {
        let record = startup.record_json();
        let competitors = pretty(competitors);
        let prompt = prompts::fill(
            prompts::COMPETITOR_ANALYSIS,
            &[("startup_info", record.as_str()), ("competitors", competitors.as_str())],
        );
        let response = ctx.services.llm.invoke(&prompt, TEMPERATURE).await?;
        Ok(extract_object(&response)?)
    }

    async fn position(
        startup: &Startup,
        competitors: &[Value],
        analysis: &Map<String, Value>,
        ctx: &NodeContext<'_>,
    ) -> Result<Map<String, Value>, StageError> {
        let competitors = pretty(competitors);
        let analysis = pretty(analysis);
        let prompt = prompts::fill(
            prompts::COMPETITOR_POSITIONING,
            &[
                ("startup_name", startup.name.as_str()),
                ("competitors", competitors.as_str()),
                ("analysis", analysis.as_str()),
            ],
        );
        let response = ctx.services.llm.invoke(&prompt, TEMPERATURE).await?;
        Ok(extract_object(&response)?)
    }
}

impl Default for CompetitorAnalysisStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for CompetitorAnalysisStage {
    fn id(&self) -> &'static str {
        "competitor_analysis"
    }

    fn name(&self) -> &'static str {
        "Competitor Analysis"
    }

    async fn evaluate(&self, startup: &Startup, ctx: &NodeContext<'_>) -> StageOutcome {
        let name = startup.name.as_str();
        let mut outcome = StageOutcome::default();

        let competitors = outcome.take(
            with_fallback(
                "competitor_discovery",
                name,
                Self::discover(startup, ctx),
                |_| Vec::new(),
            )
            .await,
        );
        let analysis = outcome.take(
            with_fallback(
                "competitor_landscape",
                name,
                Self::analyze(startup, &competitors, ctx),
                |_| Map::new(),
            )
            .await,
        );
        let positioning = outcome.take(
            with_fallback(
                "competitor_positioning",
                name,
                Self::position(startup, &competitors, &analysis, ctx),
                |_| Map::new(),
            )
            .await,
        );

        tracing::info!("[{}] {} competitors identified", name, competitors.len());
        outcome.with_patch(StagePatch {
            competitor_list: Some(competitors),
            competitor_analysis: Some(analysis),
            competitive_positioning: Some(positioning),
            ..Default::default()
        })
    }
}

fn pretty<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}
