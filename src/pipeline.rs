//! Pipeline facade: one call per evaluation run.
//!
//! Builds the initial `PipelineState`, drives the graph under a step budget
//! derived from the requested count, and turns the final state into a
//! `RunReport`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::config::{DiscoveryCount, PipelineSettings};
use crate::core::errors::ApiError;
use crate::graph::node::{GraphError, NodeContext};
use crate::graph::routing::is_affirmative_decision;
use crate::graph::state::{Diagnostic, PipelineState, ReportOutcome, Startup};
use crate::graph::{build_pipeline_graph, GraphRuntime};
use crate::state::Services;

/// An invested entity runs six nodes (next_entity, four stages, report).
/// The seventh step per entity is slack.
const STEPS_PER_ENTITY: usize = 7;
/// Discovery plus the final next_entity that finds the queue empty.
const FIXED_STEPS: usize = 2;
const SLACK_STEPS: usize = 4;

/// Step budget for a run over at most `count.upper_bound()` entities.
///
/// Always large enough for every entity of the worklist to reach its report.
pub fn step_budget(count: &DiscoveryCount) -> usize {
    FIXED_STEPS + count.upper_bound() * STEPS_PER_ENTITY + SLACK_STEPS
}

/// A requested count the pipeline refuses to run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CountError {
    #[error("count must be at least 1")]
    Zero,
    #[error("count {requested} exceeds pipeline.max_count ({max})")]
    AboveMax { requested: usize, max: usize },
}

impl From<CountError> for ApiError {
    fn from(err: CountError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityOutcome {
    pub name: String,
    pub decision: Option<String>,
    pub invested: bool,
    /// File name of the saved PDF
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub degraded: Vec<String>,
    pub record: Startup,
}

impl EntityOutcome {
    /// `position` is the 1-based place of `startup` in the worklist.
    fn new(position: usize, startup: Startup, reports: &[ReportOutcome]) -> Self {
        let decision = startup
            .investment_decision
            .as_ref()
            .map(|d| d.decision.clone());
        let invested = decision.as_deref().map(is_affirmative_decision).unwrap_or(false);
        let report = reports.iter().find(|r| r.position == position);

        Self {
            name: startup.name.clone(),
            decision,
            invested,
            report: report.and_then(|r| r.pdf.clone()),
            error: report.and_then(|r| r.error.clone()),
            degraded: startup.degraded.clone(),
            record: startup,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub query: String,
    pub count: DiscoveryCount,
    pub steps: usize,
    pub outcomes: Vec<EntityOutcome>,
    pub reports: Vec<ReportOutcome>,
    pub diagnostics: Vec<Diagnostic>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    fn from_state(state: PipelineState, steps: usize) -> Self {
        let PipelineState {
            run_id,
            query,
            count,
            worklist,
            reports,
            diagnostics,
            started_at,
            ..
        } = state;

        let outcomes = worklist
            .into_processed()
            .into_iter()
            .enumerate()
            .map(|(index, startup)| EntityOutcome::new(index + 1, startup, &reports))
            .collect();

        Self {
            run_id,
            query,
            count,
            steps,
            outcomes,
            reports,
            diagnostics,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

pub struct Pipeline {
    graph: GraphRuntime<PipelineState>,
    services: Arc<Services>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(services: Arc<Services>, settings: PipelineSettings) -> Result<Self, GraphError> {
        let ceiling = step_budget(&DiscoveryCount::Fixed(settings.max_count));
        let max_steps = if ceiling > settings.recursion_limit {
            tracing::warn!(
                "recursion_limit {} is too small for max_count {}; raised to {}",
                settings.recursion_limit,
                settings.max_count,
                ceiling
            );
            ceiling
        } else {
            settings.recursion_limit
        };
        let graph = build_pipeline_graph(max_steps)?;
        Ok(Self {
            graph,
            services,
            settings,
        })
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Checks a caller-supplied count against `max_count`.
    ///
    /// `None` resolves to the configured discovery mode.
    pub fn resolve_count(&self, count: Option<DiscoveryCount>) -> Result<DiscoveryCount, CountError> {
        let Some(count) = count else {
            return Ok(self.settings.discovery);
        };
        let requested = count.upper_bound();
        if requested == 0 {
            return Err(CountError::Zero);
        }
        if requested > self.settings.max_count {
            return Err(CountError::AboveMax {
                requested,
                max: self.settings.max_count,
            });
        }
        Ok(count)
    }

    /// Evaluates startups matching `query`.
    ///
    /// `count` overrides the configured discovery mode and is clamped to
    /// `max_count`; entry points reject it first through `resolve_count`.
    /// Only structural failures (budget, routing, ownership, discovery,
    /// cancellation) are errors.
    pub async fn run(
        &self,
        query: &str,
        count: Option<DiscoveryCount>,
        cancel: &CancellationToken,
    ) -> Result<RunReport, GraphError> {
        let count = match self.resolve_count(count) {
            Ok(count) => count,
            Err(err) => {
                let clamped = count
                    .unwrap_or(self.settings.discovery)
                    .clamped(self.settings.max_count);
                tracing::warn!("{}; running with {:?}", err, clamped);
                clamped
            }
        };
        let mut state = PipelineState::new(query, count);
        let budget = step_budget(&count);
        let ctx = NodeContext::new(&self.services, cancel);

        tracing::info!(
            run_id = %state.run_id,
            query,
            budget,
            "Evaluation run started"
        );

        let steps = self.graph.run_with_budget(&mut state, &ctx, budget).await?;
        state.worklist.retire_current();

        let report = RunReport::from_state(state, steps);
        tracing::info!(
            run_id = %report.run_id,
            steps,
            evaluated = report.outcomes.len(),
            reports = report.reports.len(),
            diagnostics = report.diagnostics.len(),
            "Evaluation run finished"
        );
        Ok(report)
    }
}
