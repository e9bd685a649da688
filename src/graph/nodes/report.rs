// Report Node
// Summarizes the invested startup, renders its PDF and records the outcome

use async_trait::async_trait;

use crate::core::errors::StageError;
use crate::graph::fallback::with_fallback;
use crate::graph::node::{GraphError, Node, NodeContext, NodeOutput};
use crate::graph::state::{PipelineState, ReportOutcome, Startup};
use crate::llm::response::extract_object;
use crate::prompts;
use crate::report::{save_pdf, ReportPayload, ReportSummary};

const SUMMARY_TEMPERATURE: f64 = 0.2;

pub struct ReportNode;

impl ReportNode {
    pub fn new() -> Self {
        Self
    }

    async fn summarize(startup: &Startup, ctx: &NodeContext<'_>) -> Result<ReportSummary, StageError> {
        let vars = crate::report::payload::summary_prompt_vars(startup);
        let borrowed: Vec<(&str, &str)> = vars.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let prompt = prompts::fill(prompts::REPORT_SUMMARY, &borrowed);
        let response = ctx.services.llm.invoke(&prompt, SUMMARY_TEMPERATURE).await?;
        Ok(ReportSummary::from_model(&extract_object(&response)?)?)
    }

    async fn render(position: usize, payload: &ReportPayload, ctx: &NodeContext<'_>) -> ReportOutcome {
        let name = payload.company_name.clone();
        let saved = match ctx.services.renderer.render(payload).await {
            Ok(bytes) => save_pdf(&ctx.services.output_dir, &name, &bytes).await,
            Err(err) => Err(err),
        };

        match saved {
            Ok(file_name) => ReportOutcome::saved(position, name, file_name),
            Err(err) => {
                tracing::warn!("[{}] report rendering failed: {}", name, err);
                ReportOutcome::failed(position, name, err.to_string())
            }
        }
    }
}

impl Default for ReportNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node<PipelineState> for ReportNode {
    fn id(&self) -> &'static str {
        "report"
    }

    fn name(&self) -> &'static str {
        "Report"
    }

    async fn execute(
        &self,
        state: &mut PipelineState,
        ctx: &NodeContext<'_>,
    ) -> Result<NodeOutput, GraphError> {
        state.stage = Some(self.id().to_string());

        if let (Some(current), Some(position)) = (state.current(), state.worklist.position()) {
            let summary = with_fallback(
                "report_summary",
                &current.name,
                Self::summarize(current, ctx),
                |_| ReportSummary::fallback(current),
            )
            .await;
            let payload = ReportPayload::build(current, summary.value);
            let outcome = Self::render(position, &payload, ctx).await;

            if let Some(failure) = summary.failure {
                state.record_degraded(self.id(), failure);
            }
            if let Some(error) = &outcome.error {
                state.record_degraded(self.id(), format!("render: {}", error));
            }
            state.reports.push(outcome);
        } else {
            tracing::warn!("report: no current entity, skipping");
        }

        state.done = state.worklist.remaining() == 0;
        Ok(NodeOutput::Continue(None))
    }
}
