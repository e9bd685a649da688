// Tech Summary Stage
// Technology summary, strengths and gaps of the current startup

use async_trait::async_trait;

use crate::core::errors::StageError;
use crate::graph::fallback::with_fallback;
use crate::graph::node::NodeContext;
use crate::graph::stage::{Stage, StageOutcome};
use crate::graph::state::{StagePatch, Startup, TechSummary};
use crate::llm::response::{extract_object, string_list, text};
use crate::prompts;

const TEMPERATURE: f64 = 0.2;

pub struct TechSummaryStage;

impl TechSummaryStage {
    pub fn new() -> Self {
        Self
    }

    async fn summarize(startup: &Startup, ctx: &NodeContext<'_>) -> Result<TechSummary, StageError> {
        let record = startup.record_json();
        let prompt = prompts::fill(prompts::TECH_SUMMARY, &[("startup_info", record.as_str())]);
        let response = ctx.services.llm.invoke(&prompt, TEMPERATURE).await?;
        let map = extract_object(&response)?;

        Ok(TechSummary {
            summary: text(map.get("summary")).unwrap_or_default(),
            highlights: string_list(map.get("highlights")),
            gaps: string_list(map.get("gaps")),
        })
    }
}

impl Default for TechSummaryStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for TechSummaryStage {
    fn id(&self) -> &'static str {
        "tech_summary"
    }

    fn name(&self) -> &'static str {
        "Tech Summary"
    }

    async fn evaluate(&self, startup: &Startup, ctx: &NodeContext<'_>) -> StageOutcome {
        let mut outcome = StageOutcome::default();
        let summary = outcome.take(
            with_fallback(
                self.id(),
                &startup.name,
                Self::summarize(startup, ctx),
                |err| TechSummary {
                    summary: format!("Tech summary failed: {}", err),
                    highlights: Vec::new(),
                    gaps: Vec::new(),
                },
            )
            .await,
        );

        outcome.with_patch(StagePatch {
            tech_summary: Some(summary),
            ..Default::default()
        })
    }
}
