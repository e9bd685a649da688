// Search Node
// Candidate discovery: web search, model listing, normalization into the worklist

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::core::config::DiscoveryCount;
use crate::graph::node::{GraphError, Node, NodeContext, NodeOutput};
use crate::graph::state::{PipelineState, Startup};
use crate::graph::worklist::Worklist;
use crate::llm::response::{extract_array, extract_object, strip_fences};
use crate::prompts;

const TEMPERATURE: f64 = 0.2;

pub struct DiscoveryNode;

impl DiscoveryNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DiscoveryNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node<PipelineState> for DiscoveryNode {
    fn id(&self) -> &'static str {
        "search"
    }

    fn name(&self) -> &'static str {
        "Startup Discovery"
    }

    async fn execute(
        &self,
        state: &mut PipelineState,
        ctx: &NodeContext<'_>,
    ) -> Result<NodeOutput, GraphError> {
        state.stage = Some(self.id().to_string());
        tracing::info!("Discovering startups for '{}' ({:?})", state.query, state.count);

        let results = match ctx.services.search.search_text(&state.query).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!("Discovery search failed, continuing without context: {}", err);
                state.push_diagnostic(self.id(), None, format!("search: {}", err));
                String::new()
            }
        };

        let count = count_instruction(&state.count);
        let prompt = prompts::fill(
            prompts::DISCOVERY,
            &[
                ("count_instruction", count.as_str()),
                ("query", state.query.as_str()),
                ("results", results.as_str()),
            ],
        );

        // Without candidates there is nothing to evaluate: this one is fatal.
        let text = ctx
            .services
            .llm
            .invoke(&prompt, TEMPERATURE)
            .await
            .map_err(|e| GraphError::new(self.id(), format!("discovery failed: {}", e)))?;

        let mut startups = normalize_discovery(&text);
        let limit = state.count.upper_bound();
        if startups.len() > limit {
            tracing::warn!(
                "Model returned {} candidates, keeping the first {}",
                startups.len(),
                limit
            );
            startups.truncate(limit);
        }

        tracing::info!("Discovery found {} startups", startups.len());
        state.worklist = Worklist::new(startups);
        state.done = false;
        Ok(NodeOutput::Continue(None))
    }
}

fn count_instruction(count: &DiscoveryCount) -> String {
    match count {
        DiscoveryCount::Fixed(n) => format!("exactly {}", n),
        DiscoveryCount::Dynamic { max } => {
            format!("as many as are relevant (at most {})", max)
        }
    }
}

/// Turns raw discovery output into entity records, in order.
///
/// Unparsable output becomes one `startup-1` record carrying `raw_output`;
/// non-object items become `startup-<i>` (1-based).
pub fn normalize_discovery(text: &str) -> Vec<Startup> {
    let body = strip_fences(text);
    // A lone object may itself contain arrays; look at whichever opens first.
    let object_first = match (body.find('{'), body.find('[')) {
        (Some(object), Some(array)) => object < array,
        (Some(_), None) => true,
        _ => false,
    };
    let parsed = if object_first {
        extract_object(body)
            .map(|map| vec![Value::Object(map)])
            .or_else(|_| extract_array(body))
    } else {
        extract_array(body).or_else(|_| extract_object(body).map(|map| vec![Value::Object(map)]))
    };

    let items = match parsed {
        Ok(items) => items,
        Err(err) => {
            tracing::warn!("Discovery output is not JSON ({}), keeping raw text", err);
            vec![json!({ "name": "startup-1", "raw_output": text })]
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| match item {
            Value::Object(map) => from_object(map, idx + 1),
            other => {
                let mut attributes = Map::new();
                attributes.insert("raw_output".to_string(), other);
                Startup {
                    name: format!("startup-{}", idx + 1),
                    attributes,
                    ..Default::default()
                }
            }
        })
        .collect()
}

fn from_object(mut map: Map<String, Value>, position: usize) -> Startup {
    let name = match map.remove("name") {
        Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
        Some(Value::Null) | None => format!("startup-{}", position),
        Some(Value::String(_)) => format!("startup-{}", position),
        Some(other) => other.to_string(),
    };
    Startup {
        name,
        attributes: map,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_array() {
        let text = "Here you go:\n```json\n[{\"name\": \"Acme\", \"domain\": \"K-12\"}, {\"name\": \"Beta\"}]\n```";
        let startups = normalize_discovery(text);

        assert_eq!(startups.len(), 2);
        assert_eq!(startups[0].name, "Acme");
        assert_eq!(startups[0].attribute("domain"), Some("K-12"));
        assert_eq!(startups[1].name, "Beta");
    }

    #[test]
    fn unparsable_output_becomes_one_raw_record() {
        let startups = normalize_discovery("I could not find anything useful.");

        assert_eq!(startups.len(), 1);
        assert_eq!(startups[0].name, "startup-1");
        assert_eq!(
            startups[0].attribute("raw_output"),
            Some("I could not find anything useful.")
        );
    }

    #[test]
    fn single_object_is_wrapped() {
        let startups = normalize_discovery("{\"name\": \"Solo\", \"market\": \"Korea\"}");
        assert_eq!(startups.len(), 1);
        assert_eq!(startups[0].name, "Solo");
        assert_eq!(startups[0].attribute("market"), Some("Korea"));
    }

    #[test]
    fn non_object_items_get_positional_names() {
        let startups = normalize_discovery("[\"Acme\", {\"name\": \"Beta\"}, 42, {\"domain\": \"HE\"}]");

        let names: Vec<_> = startups.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["startup-1", "Beta", "startup-3", "startup-4"]);
        assert_eq!(startups[0].attribute("raw_output"), Some("Acme"));
        assert_eq!(startups[2].attributes.get("raw_output"), Some(&json!(42)));
    }

    #[test]
    fn object_with_nested_array_is_one_startup() {
        let startups = normalize_discovery("{\"name\": \"Solo\", \"tags\": [\"ai\", \"k12\"]}");
        assert_eq!(startups.len(), 1);
        assert_eq!(startups[0].name, "Solo");
    }

    #[test]
    fn empty_array_yields_no_startups() {
        assert!(normalize_discovery("[]").is_empty());
    }

    #[test]
    fn count_instruction_reflects_mode() {
        assert_eq!(count_instruction(&DiscoveryCount::Fixed(3)), "exactly 3");
        assert!(count_instruction(&DiscoveryCount::Dynamic { max: 5 }).contains("at most 5"));
    }
}
