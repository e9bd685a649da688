// Report Payload
// JSON document posted to the PDF template server

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::core::errors::ParseError;
use crate::graph::state::Startup;
use crate::llm::response::{string_list, text};

const NOT_AVAILABLE: &str = "N/A";
const PENDING: &str = "Pending";
/// Placeholder until a readiness model exists upstream.
const READINESS_SCORE: u32 = 72;
const SHORTEN_LIMIT: usize = 900;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummarySection {
    pub paragraph: String,
    pub bullets: Vec<String>,
}

impl SummarySection {
    fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Object(section)) => Self {
                paragraph: text(section.get("paragraph")).unwrap_or_default(),
                bullets: string_list(section.get("bullets")),
            },
            Some(other) => Self {
                paragraph: text(Some(other)).unwrap_or_default(),
                bullets: Vec::new(),
            },
            None => Self::default(),
        }
    }
}

/// One-page summary written by the model (or assembled from stage data).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub executive_summary: String,
    pub technology: SummarySection,
    pub market_competition: SummarySection,
    pub risk: SummarySection,
    pub investment: SummarySection,
    pub headline_points: Vec<String>,
}

impl ReportSummary {
    /// Normalizes the model's summary object; bullet fields become lists.
    pub fn from_model(map: &Map<String, Value>) -> Result<Self, ParseError> {
        let executive_summary = text(map.get("executive_summary"))
            .ok_or_else(|| ParseError::Shape("summary lacks executive_summary".to_string()))?;

        Ok(Self {
            executive_summary,
            technology: SummarySection::from_value(map.get("technology")),
            market_competition: SummarySection::from_value(map.get("market_competition")),
            risk: SummarySection::from_value(map.get("risk")),
            investment: SummarySection::from_value(map.get("investment")),
            headline_points: string_list(map.get("headline_points")),
        })
    }

    /// Minimal summary built only from what the stages recorded.
    pub fn fallback(startup: &Startup) -> Self {
        let tech = startup.tech_summary.clone().unwrap_or_default();
        let market_summary = startup
            .market_eval
            .as_ref()
            .map(|m| m.summary.clone())
            .unwrap_or_default();
        let thesis = decision_reason(startup);

        let executive = if !thesis.is_empty() {
            thesis.clone()
        } else if !market_summary.is_empty() {
            market_summary.clone()
        } else {
            "Summary unavailable.".to_string()
        };

        let overall_risk = startup
            .risk_assessment
            .as_ref()
            .map(|r| r.overall_risk_score.to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());

        let actions = startup
            .investment_decision
            .as_ref()
            .map(|d| string_list(d.extra.get("recommended_actions")))
            .unwrap_or_default();

        Self {
            executive_summary: shorten(&executive, 320),
            technology: SummarySection {
                paragraph: shorten(&tech.summary, 280),
                bullets: tech.highlights.iter().take(3).cloned().collect(),
            },
            market_competition: SummarySection {
                paragraph: shorten(&market_summary, 280),
                bullets: competitors(startup)
                    .iter()
                    .take(3)
                    .map(|c| field_or(c, "name", ""))
                    .collect(),
            },
            risk: SummarySection {
                paragraph: shorten(&format!("Overall risk score: {}", overall_risk), 200),
                bullets: Vec::new(),
            },
            investment: SummarySection {
                paragraph: shorten(&thesis, 260),
                bullets: actions.into_iter().take(3).collect(),
            },
            headline_points: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechEval {
    pub innovation: String,
    pub scalability: String,
    pub stability: String,
    pub summary: String,
    pub highlights: Vec<String>,
    pub gaps: Vec<String>,
    pub readiness_score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketOverview {
    pub size: String,
    pub growth: String,
    pub competition: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadlineMetrics {
    pub decision: String,
    pub score: Value,
    pub confidence: Value,
    pub overall_risk: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportPayload {
    pub company_name: String,
    pub domain: String,
    pub tech_eval: TechEval,
    pub market_eval: MarketOverview,
    pub market_eval_detail: Value,
    pub competitor_list: Vec<Value>,
    pub competitor_analysis: Map<String, Value>,
    pub competitive_positioning: Map<String, Value>,
    pub investment_scores: Value,
    pub risk_assessment: Value,
    pub investment_decision: Value,
    pub decision: String,
    pub decision_reason: String,
    pub llm_summary: ReportSummary,
    pub headline_metrics: HeadlineMetrics,
}

impl ReportPayload {
    pub fn build(startup: &Startup, summary: ReportSummary) -> Self {
        let tech = startup.tech_summary.clone().unwrap_or_default();
        let market = startup.market_eval.clone().unwrap_or_default();

        let innovation = if tech.highlights.is_empty() {
            PENDING.to_string()
        } else {
            tech.highlights.iter().take(2).cloned().collect::<Vec<_>>().join(", ")
        };

        let decision = startup
            .investment_decision
            .as_ref()
            .map(|d| d.decision.clone())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| "Under review".to_string());
        let reason = decision_reason(startup);

        let confidence = startup
            .investment_decision
            .as_ref()
            .and_then(|d| d.extra.get("confidence").cloned())
            .unwrap_or_else(|| json!(NOT_AVAILABLE));

        Self {
            company_name: non_empty(&startup.name, "Unknown"),
            domain: startup.attribute("domain").unwrap_or("edtech").to_string(),
            tech_eval: TechEval {
                innovation,
                scalability: PENDING.to_string(),
                stability: PENDING.to_string(),
                summary: non_empty(&tech.summary, "No technology summary"),
                highlights: tech.highlights,
                gaps: tech.gaps,
                readiness_score: READINESS_SCORE,
            },
            market_eval: MarketOverview {
                size: non_empty(&market.size_estimate, "No market size data"),
                growth: non_empty(&market.growth, "No growth data"),
                competition: non_empty(&market.competition, "No competition data"),
                summary: non_empty(&market.summary, "No market summary"),
            },
            market_eval_detail: to_value_or_empty(&startup.market_eval_detail),
            competitor_list: competitors(startup).to_vec(),
            competitor_analysis: startup.competitor_analysis.clone().unwrap_or_default(),
            competitive_positioning: startup.competitive_positioning.clone().unwrap_or_default(),
            investment_scores: to_value_or_empty(&startup.investment_scores),
            risk_assessment: to_value_or_empty(&startup.risk_assessment),
            investment_decision: to_value_or_empty(&startup.investment_decision),
            decision: decision.clone(),
            decision_reason: if reason.is_empty() {
                "Further review needed".to_string()
            } else {
                reason
            },
            llm_summary: summary,
            headline_metrics: HeadlineMetrics {
                decision,
                score: startup
                    .investment_scores
                    .as_ref()
                    .map(|s| json!(s.total_score))
                    .unwrap_or_else(|| json!(NOT_AVAILABLE)),
                confidence,
                overall_risk: startup
                    .risk_assessment
                    .as_ref()
                    .map(|r| json!(r.overall_risk_score))
                    .unwrap_or_else(|| json!(NOT_AVAILABLE)),
            },
        }
    }
}

/// Values substituted into the summary prompt.
pub fn summary_prompt_vars(startup: &Startup) -> Vec<(&'static str, String)> {
    let tech = startup.tech_summary.clone().unwrap_or_default();
    let market_summary = startup
        .market_eval
        .as_ref()
        .map(|m| m.summary.clone())
        .unwrap_or_default();
    let market_analysis = startup
        .market_eval_detail
        .as_ref()
        .map(|d| d.analysis.clone())
        .unwrap_or_default();
    let decision = startup.investment_decision.as_ref();

    vec![
        ("company_name", non_empty(&startup.name, "Unknown Startup")),
        ("tech_summary", shorten(&tech.summary, SHORTEN_LIMIT)),
        ("tech_highlights", shorten(&json!(tech.highlights).to_string(), SHORTEN_LIMIT)),
        ("tech_gaps", shorten(&json!(tech.gaps).to_string(), SHORTEN_LIMIT)),
        ("market_summary", shorten(&market_summary, SHORTEN_LIMIT)),
        ("market_analysis", shorten(&market_analysis, SHORTEN_LIMIT)),
        ("competitor_info", competitor_snippet(competitors(startup))),
        (
            "decision",
            decision.map(|d| d.decision.clone()).unwrap_or_default(),
        ),
        ("decision_reason", shorten(&decision_reason(startup), SHORTEN_LIMIT)),
        ("scores", to_value_or_empty(&startup.investment_scores).to_string()),
        ("risks", to_value_or_empty(&startup.risk_assessment).to_string()),
        (
            "score",
            startup
                .investment_scores
                .as_ref()
                .map(|s| s.total_score.to_string())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        ),
        (
            "confidence",
            decision
                .and_then(|d| d.extra_str("confidence"))
                .unwrap_or(NOT_AVAILABLE)
                .to_string(),
        ),
        (
            "overall_risk",
            startup
                .risk_assessment
                .as_ref()
                .map(|r| r.overall_risk_score.to_string())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        ),
    ]
}

/// First four competitors as `name (cat: c, overlap: o, stage: s)`.
pub fn competitor_snippet(competitors: &[Value]) -> String {
    if competitors.is_empty() {
        return NOT_AVAILABLE.to_string();
    }
    competitors
        .iter()
        .take(4)
        .map(|c| {
            format!(
                "{} (cat: {}, overlap: {}, stage: {})",
                field_or(c, "name", "Unknown"),
                field_or(c, "category", "-"),
                field_or(c, "competitive_overlap", "-"),
                field_or(c, "funding_stage", "-"),
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Cuts to `limit` characters, ending in `...` when shortened.
pub fn shorten(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let kept: String = text.chars().take(limit.saturating_sub(3)).collect();
    format!("{}...", kept)
}

fn decision_reason(startup: &Startup) -> String {
    startup
        .investment_decision
        .as_ref()
        .and_then(|d| {
            d.extra_str("investment_thesis")
                .filter(|s| !s.is_empty())
                .or_else(|| d.extra_str("reason"))
        })
        .unwrap_or_default()
        .to_string()
}

fn competitors(startup: &Startup) -> &[Value] {
    startup.competitor_list.as_deref().unwrap_or(&[])
}

fn field_or(value: &Value, key: &str, default: &str) -> String {
    text(value.get(key)).unwrap_or_else(|| default.to_string())
}

fn non_empty(value: &str, default: &str) -> String {
    if value.trim().is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

fn to_value_or_empty<T: Serialize>(value: &Option<T>) -> Value {
    value
        .as_ref()
        .and_then(|v| serde_json::to_value(v).ok())
        .unwrap_or_else(|| Value::Object(Map::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::state::{InvestmentDecision, InvestmentScores, RiskAssessment, TechSummary};

    fn evaluated() -> Startup {
        let mut startup = Startup::named("Acme Learning");
        startup
            .attributes
            .insert("domain".into(), json!("K-12"));
        startup.tech_summary = Some(TechSummary {
            summary: "Adaptive tutoring engine".into(),
            highlights: vec!["adaptive".into(), "offline".into(), "multilingual".into(), "cheap".into()],
            gaps: vec!["no SOC2".into()],
        });
        startup.competitor_list = Some(vec![
            json!({"name": "Rival", "category": "B2C", "competitive_overlap": "high", "funding_stage": "Series A"}),
            json!({"name": "Other"}),
        ]);
        startup.investment_scores = Some(InvestmentScores {
            total_score: 82.0,
            ..Default::default()
        });
        startup.risk_assessment = Some(RiskAssessment {
            overall_risk_score: 4.0,
            ..Default::default()
        });
        let mut decision = InvestmentDecision {
            decision: "Invest".into(),
            ..Default::default()
        };
        decision
            .extra
            .insert("investment_thesis".into(), json!("Strong retention."));
        decision
            .extra
            .insert("recommended_actions".into(), json!(["a", "b", "c", "d"]));
        decision.extra.insert("confidence".into(), json!("high"));
        startup.investment_decision = Some(decision);
        startup
    }

    #[test]
    fn shorten_marks_truncation() {
        assert_eq!(shorten("abcdef", 10), "abcdef");
        assert_eq!(shorten("abcdefghij", 6), "abc...");
        assert_eq!(shorten("에듀테크스타트업", 5), "에듀...");
    }

    #[test]
    fn competitor_snippet_formats_first_four() {
        let list: Vec<Value> = (0..6).map(|i| json!({ "name": format!("c{}", i) })).collect();
        let snippet = competitor_snippet(&list);
        assert_eq!(snippet.matches("; ").count(), 3);
        assert!(snippet.starts_with("c0 (cat: -, overlap: -, stage: -)"));
        assert_eq!(competitor_snippet(&[]), "N/A");
    }

    #[test]
    fn payload_carries_headline_metrics() {
        let startup = evaluated();
        let payload = ReportPayload::build(&startup, ReportSummary::fallback(&startup));

        assert_eq!(payload.company_name, "Acme Learning");
        assert_eq!(payload.domain, "K-12");
        assert_eq!(payload.tech_eval.innovation, "adaptive, offline");
        assert_eq!(payload.tech_eval.readiness_score, 72);
        assert_eq!(payload.decision, "Invest");
        assert_eq!(payload.decision_reason, "Strong retention.");
        assert_eq!(payload.headline_metrics.score, json!(82.0));
        assert_eq!(payload.headline_metrics.confidence, json!("high"));
        assert_eq!(payload.headline_metrics.overall_risk, json!(4.0));
        assert_eq!(payload.market_eval.size, "No market size data");
    }

    #[test]
    fn payload_defaults_for_bare_entity() {
        let startup = Startup::named("Bare");
        let payload = ReportPayload::build(&startup, ReportSummary::fallback(&startup));

        assert_eq!(payload.domain, "edtech");
        assert_eq!(payload.tech_eval.innovation, "Pending");
        assert_eq!(payload.decision, "Under review");
        assert_eq!(payload.headline_metrics.score, json!("N/A"));
        assert_eq!(payload.investment_scores, json!({}));

        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("llm_summary").is_some());
    }

    #[test]
    fn fallback_summary_uses_stage_data() {
        let summary = ReportSummary::fallback(&evaluated());

        assert_eq!(summary.executive_summary, "Strong retention.");
        assert_eq!(summary.technology.bullets.len(), 3);
        assert_eq!(summary.market_competition.bullets, vec!["Rival", "Other"]);
        assert_eq!(summary.risk.paragraph, "Overall risk score: 4");
        assert_eq!(summary.investment.bullets, vec!["a", "b", "c"]);
        assert!(summary.headline_points.is_empty());
    }

    #[test]
    fn model_summary_normalizes_bullets() {
        let map = json!({
            "executive_summary": "Good.",
            "technology": {"paragraph": "T", "bullets": "single"},
            "risk": {"paragraph": "R"},
            "headline_points": "one point"
        });
        let summary = ReportSummary::from_model(map.as_object().unwrap()).unwrap();

        assert_eq!(summary.technology.bullets, vec!["single"]);
        assert!(summary.risk.bullets.is_empty());
        assert_eq!(summary.headline_points, vec!["one point"]);
        assert_eq!(summary.investment, SummarySection::default());

        let missing = json!({"technology": {}});
        assert!(ReportSummary::from_model(missing.as_object().unwrap()).is_err());
    }
}
