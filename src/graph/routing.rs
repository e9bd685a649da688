// Conditional Routing
// Pure predicates over PipelineState that pick the next edge

use std::sync::OnceLock;

use regex::Regex;

use super::state::PipelineState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteLabel {
    Continue,
    Invested,
    Done,
}

impl RouteLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteLabel::Continue => "continue",
            RouteLabel::Invested => "invested",
            RouteLabel::Done => "done",
        }
    }
}

struct DecisionPatterns {
    affirmative: Regex,
    english_negation: Regex,
    korean_negation: Regex,
}

fn patterns() -> Option<&'static DecisionPatterns> {
    static PATTERNS: OnceLock<Option<DecisionPatterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(DecisionPatterns {
                affirmative: Regex::new(r"(?i)\b(?:strong\s+buy|buy|invested|invest)\b|유치|확정")
                    .ok()?,
                english_negation: Regex::new(r"(?i)\b(?:not|no|don't|do not|pass)\b").ok()?,
                korean_negation: Regex::new(r"보류|불가|거절").ok()?,
            })
        })
        .as_ref()
}

/// Whether a free-text decision commits to investing.
///
/// English negations veto only when they come before the affirmative word;
/// Korean ones follow the verb, so they veto wherever they appear.
pub fn is_affirmative_decision(decision: &str) -> bool {
    let Some(patterns) = patterns() else {
        return false;
    };
    let Some(hit) = patterns.affirmative.find(decision) else {
        return false;
    };
    if patterns.korean_negation.is_match(decision) {
        return false;
    }
    !patterns.english_negation.is_match(&decision[..hit.start()])
}

/// After `investment_decision`: `invested` sends the entity to the report stage.
pub fn route_decision(state: &PipelineState) -> RouteLabel {
    let Some(current) = state.current() else {
        return RouteLabel::Continue;
    };
    let Some(decision) = current.investment_decision.as_ref() else {
        return RouteLabel::Continue;
    };

    if is_affirmative_decision(&decision.decision) {
        tracing::info!("[{}] investment confirmed: {}", current.name, decision.decision);
        RouteLabel::Invested
    } else {
        tracing::info!("[{}] not invested: {}", current.name, decision.decision);
        RouteLabel::Continue
    }
}

/// After `next_entity` and `report`: `done` once the worklist reported exhaustion.
pub fn check_done(state: &PipelineState) -> RouteLabel {
    if state.done {
        RouteLabel::Done
    } else {
        RouteLabel::Continue
    }
}
