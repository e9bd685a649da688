// Investment Decision Stage
// Scoring, risk assessment and the final committee decision

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::core::errors::StageError;
use crate::graph::fallback::with_fallback;
use crate::graph::node::NodeContext;
use crate::graph::stage::{Stage, StageOutcome};
use crate::graph::state::{
    InvestmentDecision, InvestmentScores, RiskAssessment, StagePatch, Startup,
};
use crate::llm::response::{extract_object, number, text};
use crate::prompts;

const TEMPERATURE: f64 = 0.1;
const FALLBACK_SCORE: f64 = 60.0;
const FALLBACK_RISK: f64 = 5.5;
const FALLBACK_DECISION: &str = "Hold";

/// Rule-based starting point handed to the decision prompt.
pub fn initial_recommendation(total_score: f64, overall_risk: f64) -> &'static str {
    let band = if total_score >= 80.0 {
        "Strong Buy"
    } else if total_score >= 65.0 {
        "Buy"
    } else if total_score >= 50.0 {
        "Hold/Consider"
    } else if total_score >= 35.0 {
        "Watch"
    } else {
        "Pass"
    };

    if band == "Buy" && overall_risk >= 7.0 && total_score < 75.0 {
        "Hold/Consider"
    } else {
        band
    }
}

pub struct InvestmentDecisionStage;

impl InvestmentDecisionStage {
    pub fn new() -> Self {
        Self
    }

    async fn score(startup: &Startup, ctx: &NodeContext<'_>) -> Result<InvestmentScores, StageError> {
        let record = startup.record_json();
        let tech = pretty(&startup.tech_summary);
        let market = pretty(&startup.market_eval);
        let competitors = pretty(&startup.competitor_analysis);
        let positioning = pretty(&startup.competitive_positioning);
        let prompt = prompts::fill(
            prompts::INVESTMENT_SCORING,
            &[
                ("startup_info", record.as_str()),
                ("tech_summary", tech.as_str()),
                ("market_analysis", market.as_str()),
                ("competitor_analysis", competitors.as_str()),
                ("competitive_positioning", positioning.as_str()),
            ],
        );
        let response = ctx.services.llm.invoke(&prompt, TEMPERATURE).await?;
        let mut extra = extract_object(&response)?;
        let total_score = number(extra.remove("total_score").as_ref()).unwrap_or(0.0);

        Ok(InvestmentScores { total_score, extra })
    }

    async fn assess_risk(
        startup: &Startup,
        scores: &InvestmentScores,
        ctx: &NodeContext<'_>,
    ) -> Result<RiskAssessment, StageError> {
        let record = startup.record_json();
        let scores = pretty(scores);
        let competitors = pretty(&startup.competitor_analysis);
        let prompt = prompts::fill(
            prompts::INVESTMENT_RISK,
            &[
                ("startup_info", record.as_str()),
                ("scores", scores.as_str()),
                ("competitor_analysis", competitors.as_str()),
            ],
        );
        let response = ctx.services.llm.invoke(&prompt, TEMPERATURE).await?;
        let mut extra = extract_object(&response)?;
        let overall_risk_score = number(extra.remove("overall_risk_score").as_ref())
            .unwrap_or(FALLBACK_RISK);

        Ok(RiskAssessment {
            overall_risk_score,
            extra,
        })
    }

    async fn decide(
        startup: &Startup,
        scores: &InvestmentScores,
        risk: &RiskAssessment,
        ctx: &NodeContext<'_>,
    ) -> Result<InvestmentDecision, StageError> {
        let initial = initial_recommendation(scores.total_score, risk.overall_risk_score);
        let total = scores.total_score.to_string();
        let risk_json = pretty(risk);
        let prompt = prompts::fill(
            prompts::INVESTMENT_DECISION,
            &[
                ("startup_name", startup.name.as_str()),
                ("total_score", total.as_str()),
                ("risk_assessment", risk_json.as_str()),
                ("initial_recommendation", initial),
            ],
        );
        let response = ctx.services.llm.invoke(&prompt, TEMPERATURE).await?;
        let mut extra = extract_object(&response)?;
        let decision = text(extra.remove("decision").as_ref())
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_DECISION.to_string());
        extra
            .entry("initial_recommendation")
            .or_insert_with(|| json!(initial));

        Ok(InvestmentDecision { decision, extra })
    }
}

impl Default for InvestmentDecisionStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for InvestmentDecisionStage {
    fn id(&self) -> &'static str {
        "investment_decision"
    }

    fn name(&self) -> &'static str {
        "Investment Decision"
    }

    async fn evaluate(&self, startup: &Startup, ctx: &NodeContext<'_>) -> StageOutcome {
        let name = startup.name.as_str();
        let mut outcome = StageOutcome::default();

        let scores = outcome.take(
            with_fallback("investment_scoring", name, Self::score(startup, ctx), |_| {
                InvestmentScores {
                    total_score: FALLBACK_SCORE,
                    extra: Map::new(),
                }
            })
            .await,
        );
        let risk = outcome.take(
            with_fallback(
                "investment_risk",
                name,
                Self::assess_risk(startup, &scores, ctx),
                |_| RiskAssessment {
                    overall_risk_score: FALLBACK_RISK,
                    extra: Map::new(),
                },
            )
            .await,
        );
        let decision = outcome.take(
            with_fallback(
                "investment_committee",
                name,
                Self::decide(startup, &scores, &risk, ctx),
                |_| InvestmentDecision {
                    decision: FALLBACK_DECISION.to_string(),
                    extra: Map::new(),
                },
            )
            .await,
        );

        tracing::info!(
            "[{}] decision: {} (score {}, risk {})",
            name,
            decision.decision,
            scores.total_score,
            risk.overall_risk_score
        );
        outcome.with_patch(StagePatch {
            investment_scores: Some(scores),
            risk_assessment: Some(risk),
            investment_decision: Some(decision),
            ..Default::default()
        })
    }
}

fn pretty<T: serde::Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(Value::Null) | Err(_) => "{}".to_string(),
        Ok(v) => serde_json::to_string_pretty(&v).unwrap_or_default(),
    }
}
