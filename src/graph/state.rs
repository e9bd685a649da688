// Graph State
// Pipeline state, entity records and the patches stages merge into them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::core::config::DiscoveryCount;

use super::node::GraphError;
use super::worklist::Worklist;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechSummary {
    pub summary: String,
    pub highlights: Vec<String>,
    pub gaps: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketEval {
    pub summary: String,
    pub size_estimate: String,
    pub growth: String,
    pub competition: String,
    pub risks: Vec<String>,
    pub score: f64,
}

/// Component scores of the market sub-graph; components sum to `total_score`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketScore {
    /// 0-25
    pub market_size_score: u32,
    /// 0-30
    pub growth_score: u32,
    /// 0-25, weaker competition scores higher
    pub competition_score: u32,
    /// 0-20, lower risk scores higher
    pub risk_score: u32,
    pub total_score: u32,
    pub justification: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketEvalDetail {
    pub query_type: String,
    pub analysis_depth: String,
    pub web_search_used: bool,
    pub score_breakdown: MarketScore,
    pub analysis: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvestmentScores {
    #[serde(default)]
    pub total_score: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    #[serde(default)]
    pub overall_risk_score: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvestmentDecision {
    #[serde(default)]
    pub decision: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InvestmentDecision {
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}

/// One candidate company and everything the stages have learned about it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Startup {
    pub name: String,
    /// Free-form discovery fields (domain, description, market, ...)
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tech_summary: Option<TechSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_eval: Option<MarketEval>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_eval_detail: Option<MarketEvalDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competitor_list: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competitor_analysis: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competitive_positioning: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investment_scores: Option<InvestmentScores>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_assessment: Option<RiskAssessment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investment_decision: Option<InvestmentDecision>,
    /// Stages that substituted a fallback for this entity
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<String>,
}

impl Startup {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    /// Input fields only, as pretty JSON for prompt embedding.
    pub fn profile_json(&self) -> String {
        let mut profile = self.attributes.clone();
        profile.insert("name".to_string(), Value::String(self.name.clone()));
        serde_json::to_string_pretty(&profile).unwrap_or_else(|_| self.name.clone())
    }

    /// Whole record (inputs plus stage results) as pretty JSON.
    pub fn record_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| self.profile_json())
    }

    /// Applies every present field of `patch`; last write wins, attributes merge per key.
    pub fn merge(&mut self, patch: StagePatch) {
        for (key, value) in patch.attributes {
            self.attributes.insert(key, value);
        }
        if patch.tech_summary.is_some() {
            self.tech_summary = patch.tech_summary;
        }
        if patch.market_eval.is_some() {
            self.market_eval = patch.market_eval;
        }
        if patch.market_eval_detail.is_some() {
            self.market_eval_detail = patch.market_eval_detail;
        }
        if patch.competitor_list.is_some() {
            self.competitor_list = patch.competitor_list;
        }
        if patch.competitor_analysis.is_some() {
            self.competitor_analysis = patch.competitor_analysis;
        }
        if patch.competitive_positioning.is_some() {
            self.competitive_positioning = patch.competitive_positioning;
        }
        if patch.investment_scores.is_some() {
            self.investment_scores = patch.investment_scores;
        }
        if patch.risk_assessment.is_some() {
            self.risk_assessment = patch.risk_assessment;
        }
        if patch.investment_decision.is_some() {
            self.investment_decision = patch.investment_decision;
        }
    }

    pub fn mark_degraded(&mut self, stage: &str) {
        if !self.degraded.iter().any(|s| s == stage) {
            self.degraded.push(stage.to_string());
        }
    }
}

/// Result fields of an entity record, each written by exactly one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityField {
    Attributes,
    TechSummary,
    MarketEval,
    MarketEvalDetail,
    CompetitorList,
    CompetitorAnalysis,
    CompetitivePositioning,
    InvestmentScores,
    RiskAssessment,
    InvestmentDecision,
}

impl EntityField {
    /// Id of the stage allowed to write this field.
    pub fn owner(&self) -> &'static str {
        match self {
            EntityField::Attributes => "search",
            EntityField::TechSummary => "tech_summary",
            EntityField::MarketEval | EntityField::MarketEvalDetail => "market_eval",
            EntityField::CompetitorList
            | EntityField::CompetitorAnalysis
            | EntityField::CompetitivePositioning => "competitor_analysis",
            EntityField::InvestmentScores
            | EntityField::RiskAssessment
            | EntityField::InvestmentDecision => "investment_decision",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityField::Attributes => "attributes",
            EntityField::TechSummary => "tech_summary",
            EntityField::MarketEval => "market_eval",
            EntityField::MarketEvalDetail => "market_eval_detail",
            EntityField::CompetitorList => "competitor_list",
            EntityField::CompetitorAnalysis => "competitor_analysis",
            EntityField::CompetitivePositioning => "competitive_positioning",
            EntityField::InvestmentScores => "investment_scores",
            EntityField::RiskAssessment => "risk_assessment",
            EntityField::InvestmentDecision => "investment_decision",
        }
    }
}

/// Partial update produced by a stage. Fallback patches have the same shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StagePatch {
    pub attributes: Map<String, Value>,
    pub tech_summary: Option<TechSummary>,
    pub market_eval: Option<MarketEval>,
    pub market_eval_detail: Option<MarketEvalDetail>,
    pub competitor_list: Option<Vec<Value>>,
    pub competitor_analysis: Option<Map<String, Value>>,
    pub competitive_positioning: Option<Map<String, Value>>,
    pub investment_scores: Option<InvestmentScores>,
    pub risk_assessment: Option<RiskAssessment>,
    pub investment_decision: Option<InvestmentDecision>,
}

impl StagePatch {
    pub fn attribute(key: impl Into<String>, value: Value) -> Self {
        let mut attributes = Map::new();
        attributes.insert(key.into(), value);
        Self {
            attributes,
            ..Default::default()
        }
    }

    /// Fields this patch would write.
    pub fn fields(&self) -> Vec<EntityField> {
        let mut fields = Vec::new();
        if !self.attributes.is_empty() {
            fields.push(EntityField::Attributes);
        }
        let present = [
            (self.tech_summary.is_some(), EntityField::TechSummary),
            (self.market_eval.is_some(), EntityField::MarketEval),
            (self.market_eval_detail.is_some(), EntityField::MarketEvalDetail),
            (self.competitor_list.is_some(), EntityField::CompetitorList),
            (self.competitor_analysis.is_some(), EntityField::CompetitorAnalysis),
            (self.competitive_positioning.is_some(), EntityField::CompetitivePositioning),
            (self.investment_scores.is_some(), EntityField::InvestmentScores),
            (self.risk_assessment.is_some(), EntityField::RiskAssessment),
            (self.investment_decision.is_some(), EntityField::InvestmentDecision),
        ];
        fields.extend(present.into_iter().filter(|(set, _)| *set).map(|(_, f)| f));
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// Composes two patches; fields present in `later` win.
    pub fn then(mut self, later: StagePatch) -> StagePatch {
        for (key, value) in later.attributes {
            self.attributes.insert(key, value);
        }
        self.tech_summary = later.tech_summary.or(self.tech_summary);
        self.market_eval = later.market_eval.or(self.market_eval);
        self.market_eval_detail = later.market_eval_detail.or(self.market_eval_detail);
        self.competitor_list = later.competitor_list.or(self.competitor_list);
        self.competitor_analysis = later.competitor_analysis.or(self.competitor_analysis);
        self.competitive_positioning =
            later.competitive_positioning.or(self.competitive_positioning);
        self.investment_scores = later.investment_scores.or(self.investment_scores);
        self.risk_assessment = later.risk_assessment.or(self.risk_assessment);
        self.investment_decision = later.investment_decision.or(self.investment_decision);
        self
    }
}

/// Non-fatal problem recorded during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Result of one report render attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportOutcome {
    /// 1-based worklist position of the reported entity
    pub position: usize,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReportOutcome {
    pub fn saved(position: usize, name: impl Into<String>, pdf: impl Into<String>) -> Self {
        Self {
            position,
            name: name.into(),
            pdf: Some(pdf.into()),
            error: None,
        }
    }

    pub fn failed(position: usize, name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            position,
            name: name.into(),
            pdf: None,
            error: Some(error.into()),
        }
    }
}

/// Shared state of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub run_id: Uuid,
    pub query: String,
    pub count: DiscoveryCount,
    pub worklist: Worklist,
    pub reports: Vec<ReportOutcome>,
    pub done: bool,
    /// Id of the last executed stage
    pub stage: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
    pub started_at: DateTime<Utc>,
}

impl PipelineState {
    pub fn new(query: impl Into<String>, count: DiscoveryCount) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            query: query.into(),
            count,
            worklist: Worklist::default(),
            reports: Vec::new(),
            done: false,
            stage: None,
            diagnostics: Vec::new(),
            started_at: Utc::now(),
        }
    }

    pub fn current(&self) -> Option<&Startup> {
        self.worklist.current()
    }

    /// Merges `patch` into the current entity after checking that `stage` owns every field it writes.
    pub fn apply_patch(&mut self, stage: &str, patch: StagePatch) -> Result<(), GraphError> {
        if let Some(field) = patch.fields().into_iter().find(|f| f.owner() != stage) {
            return Err(GraphError::new(
                stage,
                format!(
                    "stage '{}' may not write '{}' (owned by '{}')",
                    stage,
                    field.as_str(),
                    field.owner()
                ),
            ));
        }

        let current = self.worklist.current_mut().ok_or_else(|| {
            GraphError::new(stage, "no current entity to merge into")
        })?;
        current.merge(patch);
        Ok(())
    }

    /// Records a fallback substitution for the current entity.
    pub fn record_degraded(&mut self, stage: &str, message: impl Into<String>) {
        let entity = match self.worklist.current_mut() {
            Some(current) => {
                current.mark_degraded(stage);
                Some(current.name.clone())
            }
            None => None,
        };
        self.push_diagnostic(stage, entity, message);
    }

    pub fn push_diagnostic(
        &mut self,
        stage: &str,
        entity: Option<String>,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(Diagnostic {
            stage: stage.to_string(),
            entity,
            message: message.into(),
            at: Utc::now(),
        });
    }
}
