// Market Analysis State
// Working state of the market analysis sub-graph

use crate::graph::state::{MarketEval, MarketEvalDetail, MarketScore};

pub const QUERY_TYPES: [&str; 5] = ["market_size", "trend", "competition", "forecast", "general"];
pub const ANALYSIS_DEPTHS: [&str; 3] = ["basic", "intermediate", "advanced"];

#[derive(Debug, Clone)]
pub struct MarketAnalysisState {
    pub query: String,
    pub query_type: String,
    pub needs_web_search: bool,
    pub analysis_depth: String,
    pub rag_data: String,
    pub web_data: String,
    pub web_search_used: bool,
    pub market_size: String,
    pub growth_trend: String,
    pub competition: String,
    pub risk_factors: String,
    pub score: MarketScore,
    pub final_report: String,
}

impl MarketAnalysisState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            query_type: "general".to_string(),
            needs_web_search: false,
            analysis_depth: "intermediate".to_string(),
            rag_data: String::new(),
            web_data: String::new(),
            web_search_used: false,
            market_size: String::new(),
            growth_trend: String::new(),
            competition: String::new(),
            risk_factors: String::new(),
            score: MarketScore::default(),
            final_report: String::new(),
        }
    }

    /// `rag_data`/`web_data` for prompts; `N/A` when a step produced nothing.
    pub fn rag_or_na(&self) -> &str {
        or_na(&self.rag_data)
    }

    pub fn web_or_na(&self) -> &str {
        or_na(&self.web_data)
    }

    pub fn into_results(self) -> (MarketEval, MarketEvalDetail) {
        let eval = MarketEval {
            summary: self.final_report.clone(),
            size_estimate: self.market_size,
            growth: self.growth_trend,
            competition: self.competition,
            risks: risk_lines(&self.risk_factors),
            score: f64::from(self.score.total_score),
        };
        let detail = MarketEvalDetail {
            query_type: self.query_type,
            analysis_depth: self.analysis_depth,
            web_search_used: self.web_search_used,
            score_breakdown: self.score,
            analysis: self.final_report,
        };
        (eval, detail)
    }
}

fn or_na(text: &str) -> &str {
    if text.trim().is_empty() {
        "N/A"
    } else {
        text
    }
}

/// Splits free-form risk analysis into one item per non-empty line, without list markers.
pub fn risk_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| {
                    c.is_ascii_digit() || matches!(c, '-' | '*' | '•' | '.' | ')' | '#')
                })
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_lines_strip_markers() {
        let text = "1. Market risk: medium\n\n- Technology risk: low\n* **Regulatory**: high\n";
        assert_eq!(
            risk_lines(text),
            vec!["Market risk: medium", "Technology risk: low", "**Regulatory**: high"]
        );
        assert!(risk_lines("   \n").is_empty());
    }

    #[test]
    fn results_map_into_stage_fields() {
        let mut state = MarketAnalysisState::new("Korean K-12 tutoring");
        state.market_size = "KRW 2T".into();
        state.growth_trend = "8% CAGR".into();
        state.competition = "fragmented".into();
        state.risk_factors = "- demand: low".into();
        state.score = MarketScore {
            market_size_score: 20,
            growth_score: 25,
            competition_score: 15,
            risk_score: 10,
            total_score: 70,
            justification: "solid".into(),
        };
        state.final_report = "Attractive market.".into();
        state.web_search_used = true;

        let (eval, detail) = state.into_results();

        assert_eq!(eval.summary, "Attractive market.");
        assert_eq!(eval.size_estimate, "KRW 2T");
        assert_eq!(eval.risks, vec!["demand: low"]);
        assert_eq!(eval.score, 70.0);
        assert_eq!(detail.score_breakdown.total_score, 70);
        assert!(detail.web_search_used);
        assert_eq!(detail.query_type, "general");
    }
}
