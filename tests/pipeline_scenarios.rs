//! End-to-end runs of the evaluation graph against scripted capabilities.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use edvest::core::config::{DiscoveryCount, PipelineSettings, Settings};
use edvest::core::errors::CapabilityError;
use edvest::llm::{ChatRequest, LlmProvider, LlmService};
use edvest::pipeline::{step_budget, CountError, Pipeline};
use edvest::rag::Retriever;
use edvest::report::{ReportPayload, ReportRenderer};
use edvest::state::Services;
use edvest::tools::search::{SearchProvider, SearchResult, SearchService};

const DISCOVERY: &str = "edtech venture scout";
const TECH: &str = "You are a technology analyst";
const DECISION: &str = "chair the investment committee";

/// Answers each prompt with the first rule whose marker it contains.
/// `decisions` overrides the committee answer per startup name.
struct ScriptedModel {
    rules: Vec<(&'static str, Result<String, String>)>,
    decisions: Vec<(String, String)>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn new(decision: &str) -> Self {
        Self {
            rules: vec![
                (
                    DISCOVERY,
                    Ok(r#"```json
[{"name": "Acme Learning", "market": "Korean K-12", "description": "AI tutor"}]
```"#
                        .to_string()),
                ),
                (
                    TECH,
                    Ok(r#"{"summary": "Adaptive tutoring engine", "highlights": ["LLM grading"], "gaps": ["No offline mode"]}"#.to_string()),
                ),
                (
                    "You classify market analysis requests",
                    Ok(r#"{"query_type": "market_size", "needs_web_search": true, "analysis_depth": "basic"}"#.to_string()),
                ),
                (
                    "market attractiveness assessor",
                    Ok(r#"{"market_size_score": 20, "growth_score": 25, "competition_score": 15, "risk_score": 10, "total_score": 70, "justification": "solid"}"#.to_string()),
                ),
                (
                    "edtech market analyst",
                    Ok(r#"{"competitors": [{"name": "Riiid", "description": "test prep"}]}"#.to_string()),
                ),
                ("edtech VC analyst", Ok(r#"{"market_share": "small"}"#.to_string())),
                ("competitive strategy expert", Ok(r#"{"moat": "data"}"#.to_string())),
                ("edtech VC investment analyst", Ok(r#"{"total_score": 82}"#.to_string())),
                ("You are a risk analyst", Ok(r#"{"overall_risk_score": 4}"#.to_string())),
                (
                    DECISION,
                    Ok(format!(r#"{{"decision": "{}", "investment_thesis": "Strong retention"}}"#, decision)),
                ),
                (
                    "investment memo editor",
                    Ok(r#"{"executive_summary": "Acme is a promising AI tutor.", "headline_points": ["82/100"]}"#.to_string()),
                ),
            ],
            decisions: Vec::new(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn with_decision_for(mut self, name: &str, decision: &str) -> Self {
        self.decisions.push((name.to_string(), decision.to_string()));
        self
    }

    fn with_discovery(self, response: &str) -> Self {
        self.replace(DISCOVERY, Ok(response.to_string()))
    }

    fn failing(self, marker: &'static str) -> Self {
        self.replace(marker, Err("provider unavailable".to_string()))
    }

    fn replace(mut self, marker: &'static str, response: Result<String, String>) -> Self {
        for rule in self.rules.iter_mut() {
            if rule.0 == marker {
                rule.1 = response.clone();
            }
        }
        self
    }

    fn prompts_containing(&self, needles: &[&str]) -> usize {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| needles.iter().all(|n| p.contains(n)))
            .count()
    }
}

#[async_trait]
impl LlmProvider for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, request: ChatRequest, _model_id: &str) -> Result<String, CapabilityError> {
        let prompt = request.messages[0].content.clone();
        self.prompts.lock().unwrap().push(prompt.clone());

        if prompt.contains(DECISION) {
            let per_name = self
                .decisions
                .iter()
                .find(|(name, _)| prompt.contains(&format!("Startup name: {}\n", name)));
            if let Some((_, decision)) = per_name {
                return Ok(format!(r#"{{"decision": "{}", "investment_thesis": "scripted"}}"#, decision));
            }
        }

        let rule = self.rules.iter().find(|(marker, _)| prompt.contains(marker));
        match rule {
            Some((_, Ok(text))) => Ok(text.clone()),
            Some((_, Err(message))) => Err(CapabilityError::Provider(message.clone())),
            None => Ok("Plain analysis text.".to_string()),
        }
    }

    async fn embed(&self, inputs: &[String], _model_id: &str) -> Result<Vec<Vec<f32>>, CapabilityError> {
        Ok(inputs.iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

struct FixedSearch;

#[async_trait]
impl SearchProvider for FixedSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, CapabilityError> {
        Ok(vec![SearchResult {
            title: format!("Results for {}", query),
            url: "https://news.example.com/edtech".to_string(),
            snippet: "Edtech funding rebounds".to_string(),
        }])
    }
}

struct FixedRetriever;

#[async_trait]
impl Retriever for FixedRetriever {
    async fn retrieve(&self, _query: &str, k: usize) -> Result<Vec<String>, CapabilityError> {
        Ok(vec!["Internal memo: K-12 tutoring spend grows 12% a year".to_string(); k.min(2)])
    }
}

#[derive(Default)]
struct CountingRenderer {
    calls: AtomicUsize,
}

#[async_trait]
impl ReportRenderer for CountingRenderer {
    async fn render(&self, payload: &ReportPayload) -> Result<Vec<u8>, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("%PDF-1.4 {}", payload.company_name).into_bytes())
    }
}

struct Harness {
    model: Arc<ScriptedModel>,
    renderer: Arc<CountingRenderer>,
    pipeline: Pipeline,
}

fn harness(model: ScriptedModel, output_dir: &Path) -> Harness {
    let settings = Settings::default();
    let model = Arc::new(model);
    let renderer = Arc::new(CountingRenderer::default());

    let services = Services::new(
        LlmService::new(model.clone(), &settings.llm),
        SearchService::new(Arc::new(FixedSearch), &settings.search),
        Arc::new(FixedRetriever),
        renderer.clone(),
        output_dir.to_path_buf(),
    );
    let pipeline_settings = PipelineSettings {
        default_count: 1,
        max_count: 20,
        discovery: DiscoveryCount::Fixed(1),
        recursion_limit: 100,
    };
    let pipeline = Pipeline::new(Arc::new(services), pipeline_settings).unwrap();

    Harness {
        model,
        renderer,
        pipeline,
    }
}

#[tokio::test]
async fn hold_decision_skips_report() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(ScriptedModel::new("Hold"), dir.path());

    let report = h
        .pipeline
        .run("AI tutoring", None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 1);
    let outcome = &report.outcomes[0];
    assert_eq!(outcome.name, "Acme Learning");
    assert_eq!(outcome.decision.as_deref(), Some("Hold"));
    assert!(!outcome.invested);
    assert!(outcome.report.is_none());
    assert!(outcome.degraded.is_empty());
    assert!(report.reports.is_empty());
    assert_eq!(h.renderer.calls.load(Ordering::SeqCst), 0);

    let record = &outcome.record;
    assert!(record.tech_summary.is_some());
    assert_eq!(record.market_eval.as_ref().unwrap().score, 70.0);
    assert_eq!(record.competitor_list.as_ref().unwrap().len(), 1);
    assert_eq!(record.investment_scores.as_ref().unwrap().total_score, 82.0);
    // search, next_entity, four stages, next_entity
    assert_eq!(report.steps, 7);
}

#[tokio::test]
async fn invest_decision_renders_and_saves_report() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(ScriptedModel::new("Invest"), dir.path());

    let report = h
        .pipeline
        .run("AI tutoring", None, &CancellationToken::new())
        .await
        .unwrap();

    let outcome = &report.outcomes[0];
    assert!(outcome.invested);
    let pdf = outcome.report.as_deref().expect("saved report");
    assert!(dir.path().join(pdf).exists());

    assert_eq!(report.reports.len(), 1);
    assert!(report.reports[0].error.is_none());
    assert_eq!(h.renderer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.model.prompts_containing(&["investment memo editor"]), 1);
}

#[tokio::test]
async fn tech_summary_failure_degrades_but_continues() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(ScriptedModel::new("Hold").failing(TECH), dir.path());

    let report = h
        .pipeline
        .run("AI tutoring", None, &CancellationToken::new())
        .await
        .unwrap();

    let outcome = &report.outcomes[0];
    let tech = outcome.record.tech_summary.as_ref().unwrap();
    assert!(tech.summary.starts_with("Tech summary failed:"));
    assert_eq!(outcome.degraded, vec!["tech_summary".to_string()]);

    // later stages still ran
    assert!(outcome.record.market_eval.is_some());
    assert_eq!(outcome.decision.as_deref(), Some("Hold"));
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.stage == "tech_summary" && d.entity.as_deref() == Some("Acme Learning")));
}

#[tokio::test]
async fn empty_discovery_terminates_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(ScriptedModel::new("Hold").with_discovery("[]"), dir.path());

    let report = h
        .pipeline
        .run("nothing matches", None, &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.outcomes.is_empty());
    assert!(report.reports.is_empty());
    assert_eq!(report.steps, 2);
    assert_eq!(h.model.prompts_containing(&[TECH]), 0);
}

#[tokio::test]
async fn each_startup_is_evaluated_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let discovery = r#"[{"name": "Alpha"}, {"name": "Beta"}, {"name": "Gamma"}]"#;
    let h = harness(ScriptedModel::new("Invest").with_discovery(discovery), dir.path());
    let count = DiscoveryCount::Fixed(3);

    let report = h
        .pipeline
        .run("AI tutoring", Some(count), &CancellationToken::new())
        .await
        .unwrap();

    let names: Vec<&str> = report.outcomes.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "Beta", "Gamma"]);
    for name in ["Alpha", "Beta", "Gamma"] {
        let quoted = format!("\"{}\"", name);
        assert_eq!(h.model.prompts_containing(&[TECH, &quoted]), 1, "{name}");
        assert_eq!(h.model.prompts_containing(&[DECISION, name]), 1, "{name}");
    }

    assert_eq!(report.reports.len(), 3);
    assert_eq!(h.renderer.calls.load(Ordering::SeqCst), 3);
    assert!(report.steps <= step_budget(&count));
}

fn discovery_of(names: &[&str]) -> String {
    let entries: Vec<String> = names
        .iter()
        .map(|name| format!(r#"{{"name": "{}"}}"#, name))
        .collect();
    format!("[{}]", entries.join(", "))
}

#[tokio::test]
async fn twenty_invested_startups_fit_the_step_budget() {
    let dir = tempfile::tempdir().unwrap();
    let names: Vec<String> = (1..=20).map(|i| format!("Startup {:02}", i)).collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let h = harness(
        ScriptedModel::new("Invest").with_discovery(&discovery_of(&name_refs)),
        dir.path(),
    );
    let count = DiscoveryCount::Fixed(20);

    let report = h
        .pipeline
        .run("AI tutoring", Some(count), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 20);
    assert!(report.outcomes.iter().all(|o| o.invested && o.report.is_some()));
    assert_eq!(report.reports.len(), 20);
    // search, then six nodes per invested entity
    assert_eq!(report.steps, 1 + 20 * 6);
    assert!(report.steps <= step_budget(&count));
}

#[tokio::test]
async fn counts_above_max_count_are_refused_or_clamped() {
    let dir = tempfile::tempdir().unwrap();
    let names: Vec<String> = (1..=25).map(|i| format!("Startup {:02}", i)).collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let h = harness(
        ScriptedModel::new("Hold").with_discovery(&discovery_of(&name_refs)),
        dir.path(),
    );

    assert_eq!(
        h.pipeline.resolve_count(Some(DiscoveryCount::Fixed(25))),
        Err(CountError::AboveMax { requested: 25, max: 20 })
    );

    // Library callers that skip resolve_count get the clamped count.
    let report = h
        .pipeline
        .run("AI tutoring", Some(DiscoveryCount::Fixed(25)), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.count, DiscoveryCount::Fixed(20));
    assert_eq!(report.outcomes.len(), 20);
}

#[tokio::test]
async fn korean_names_get_distinct_report_files() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(
        ScriptedModel::new("Invest").with_discovery(&discovery_of(&["엘리스", "뤼이드"])),
        dir.path(),
    );

    let report = h
        .pipeline
        .run("국내 에듀테크 스타트업", Some(DiscoveryCount::Fixed(2)), &CancellationToken::new())
        .await
        .unwrap();

    let files: Vec<&str> = report
        .outcomes
        .iter()
        .map(|o| o.report.as_deref().expect("saved report"))
        .collect();
    assert_ne!(files[0], files[1]);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    assert_eq!(
        std::fs::read(dir.path().join(files[1])).unwrap(),
        "%PDF-1.4 뤼이드".as_bytes()
    );
}

#[tokio::test]
async fn duplicate_names_keep_their_own_reports() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(
        ScriptedModel::new("Invest").with_discovery(&discovery_of(&["Acme", "Acme"])),
        dir.path(),
    );

    let report = h
        .pipeline
        .run("AI tutoring", Some(DiscoveryCount::Fixed(2)), &CancellationToken::new())
        .await
        .unwrap();

    let positions: Vec<usize> = report.reports.iter().map(|r| r.position).collect();
    assert_eq!(positions, vec![1, 2]);
    assert_eq!(report.outcomes[0].report, report.reports[0].pdf);
    assert_eq!(report.outcomes[1].report, report.reports[1].pdf);
    assert_ne!(report.outcomes[0].report, report.outcomes[1].report);
}

#[tokio::test]
async fn mixed_decisions_line_up_with_their_reports() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(
        ScriptedModel::new("Invest")
            .with_discovery(&discovery_of(&["Alpha", "Beta", "Gamma"]))
            .with_decision_for("Beta", "Hold"),
        dir.path(),
    );

    let report = h
        .pipeline
        .run("AI tutoring", Some(DiscoveryCount::Fixed(3)), &CancellationToken::new())
        .await
        .unwrap();

    let decisions: Vec<(&str, bool)> = report
        .outcomes
        .iter()
        .map(|o| (o.name.as_str(), o.invested))
        .collect();
    assert_eq!(decisions, vec![("Alpha", true), ("Beta", false), ("Gamma", true)]);

    let reported: Vec<(usize, &str)> = report
        .reports
        .iter()
        .map(|r| (r.position, r.name.as_str()))
        .collect();
    assert_eq!(reported, vec![(1, "Alpha"), (3, "Gamma")]);
    assert_eq!(report.outcomes[0].report.as_deref(), Some("Alpha_report.pdf"));
    assert!(report.outcomes[1].report.is_none());
    assert_eq!(report.outcomes[2].report.as_deref(), Some("Gamma_report.pdf"));
    assert_eq!(h.renderer.calls.load(Ordering::SeqCst), 2);

    // Alpha: report -> next_entity; Beta: decision -> next_entity; Gamma ends at report.
    assert_eq!(report.steps, 1 + 6 + 5 + 6);
}

#[tokio::test]
async fn discovery_is_truncated_to_requested_count() {
    let dir = tempfile::tempdir().unwrap();
    let discovery = r#"[{"name": "Alpha"}, {"name": "Beta"}, {"name": "Gamma"}]"#;
    let h = harness(ScriptedModel::new("Hold").with_discovery(discovery), dir.path());

    let report = h
        .pipeline
        .run("AI tutoring", Some(DiscoveryCount::Fixed(2)), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(h.model.prompts_containing(&[TECH, "Gamma"]), 0);
}

#[tokio::test]
async fn discovery_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(ScriptedModel::new("Hold").failing(DISCOVERY), dir.path());

    let err = h
        .pipeline
        .run("AI tutoring", None, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.node_id, "search");
    assert!(err.message.contains("discovery failed"), "{}", err);
}

#[tokio::test]
async fn cancelled_run_stops_before_first_node() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(ScriptedModel::new("Hold"), dir.path());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = h.pipeline.run("AI tutoring", None, &cancel).await.unwrap_err();

    assert!(err.message.contains("cancelled"));
    assert_eq!(h.model.prompts_containing(&[DISCOVERY]), 0);
}
