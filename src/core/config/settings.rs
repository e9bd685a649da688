use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_REPORT_ENDPOINT: &str = "http://localhost:8000/generate-report";
const DEFAULT_PORT: u16 = 3001;

/// How many candidates the discovery stage asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DiscoveryCount {
    Fixed(usize),
    /// The model picks how many, up to `max`.
    Dynamic { max: usize },
}

impl DiscoveryCount {
    pub fn upper_bound(&self) -> usize {
        match self {
            DiscoveryCount::Fixed(n) => *n,
            DiscoveryCount::Dynamic { max } => *max,
        }
    }

    /// Same mode with the bound lowered to at most `limit`.
    pub fn clamped(self, limit: usize) -> Self {
        match self {
            DiscoveryCount::Fixed(n) => DiscoveryCount::Fixed(n.min(limit)),
            DiscoveryCount::Dynamic { max } => DiscoveryCount::Dynamic { max: max.min(limit) },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl LlmSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchSettings {
    pub max_chars: usize,
    pub timeout_secs: u64,
    #[serde(skip_serializing)]
    pub google_api_key: Option<String>,
    #[serde(skip_serializing)]
    pub google_engine_id: Option<String>,
}

impl SearchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RagSettings {
    pub enabled: bool,
    pub corpus_dir: PathBuf,
    pub index_path: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSettings {
    pub endpoint: String,
    pub output_dir: PathBuf,
    pub timeout_secs: u64,
}

impl ReportSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineSettings {
    pub default_count: usize,
    /// Largest count a single run may request; never below `default_count`.
    pub max_count: usize,
    pub discovery: DiscoveryCount,
    pub recursion_limit: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    pub llm: LlmSettings,
    pub search: SearchSettings,
    pub rag: RagSettings,
    pub report: ReportSettings,
    pub pipeline: PipelineSettings,
    pub server: ServerSettings,
}

impl Settings {
    /// Typed view over the merged (and already validated) config tree.
    pub fn from_value(config: &Value) -> Self {
        let llm = section(config, "llm");
        let search = section(config, "search");
        let rag = section(config, "rag");
        let report = section(config, "report");
        let pipeline = section(config, "pipeline");
        let server = section(config, "server");

        let default_count = get_usize(pipeline, "default_count").unwrap_or(3);
        let max_count = get_usize(pipeline, "max_count")
            .unwrap_or(5)
            .max(default_count);
        let discovery = match get_str(pipeline, "discovery").as_deref() {
            Some("dynamic") => DiscoveryCount::Dynamic { max: max_count },
            _ => DiscoveryCount::Fixed(default_count),
        };

        Settings {
            llm: LlmSettings {
                base_url: get_str(llm, "base_url")
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                model: get_str(llm, "model").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                embedding_model: get_str(llm, "embedding_model")
                    .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
                api_key: get_str(llm, "api_key").or_else(|| env_non_empty("OPENAI_API_KEY")),
                timeout_secs: get_u64(llm, "timeout_secs").unwrap_or(60),
            },
            search: SearchSettings {
                max_chars: get_usize(search, "max_chars").unwrap_or(2000),
                timeout_secs: get_u64(search, "timeout_secs").unwrap_or(20),
                google_api_key: get_str(search, "google_search_api_key"),
                google_engine_id: get_str(search, "google_search_engine_id"),
            },
            rag: RagSettings {
                enabled: get_bool(rag, "enabled").unwrap_or(true),
                corpus_dir: PathBuf::from(get_str(rag, "corpus_dir").unwrap_or_else(|| "data".into())),
                index_path: PathBuf::from(
                    get_str(rag, "index_path").unwrap_or_else(|| "db_index.json".into()),
                ),
                chunk_size: get_usize(rag, "chunk_size").unwrap_or(500),
                chunk_overlap: get_usize(rag, "chunk_overlap").unwrap_or(50),
                top_k: get_usize(rag, "top_k").unwrap_or(5),
            },
            report: ReportSettings {
                endpoint: env_non_empty("REPORT_SERVER_URL")
                    .or_else(|| get_str(report, "endpoint"))
                    .unwrap_or_else(|| DEFAULT_REPORT_ENDPOINT.to_string()),
                output_dir: PathBuf::from(
                    get_str(report, "output_dir").unwrap_or_else(|| "outputs".into()),
                ),
                timeout_secs: get_u64(report, "timeout_secs").unwrap_or(120),
            },
            pipeline: PipelineSettings {
                default_count,
                max_count,
                discovery,
                recursion_limit: get_usize(pipeline, "recursion_limit").unwrap_or(100),
            },
            server: ServerSettings {
                host: get_str(server, "host").unwrap_or_else(|| "127.0.0.1".to_string()),
                port: env_non_empty("PORT")
                    .and_then(|p| p.parse().ok())
                    .or_else(|| get_u64(server, "port").and_then(|p| u16::try_from(p).ok()))
                    .unwrap_or(DEFAULT_PORT),
            },
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings::from_value(&Value::Object(Default::default()))
    }
}

fn section<'a>(config: &'a Value, key: &str) -> Option<&'a Value> {
    config.get(key).filter(|v| v.is_object())
}

fn get_str(section: Option<&Value>, key: &str) -> Option<String> {
    section
        .and_then(|s| s.get(key))
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn get_u64(section: Option<&Value>, key: &str) -> Option<u64> {
    section.and_then(|s| s.get(key)).and_then(|v| v.as_u64())
}

fn get_usize(section: Option<&Value>, key: &str) -> Option<usize> {
    get_u64(section, key).and_then(|v| usize::try_from(v).ok())
}

fn get_bool(section: Option<&Value>, key: &str) -> Option<bool> {
    section.and_then(|s| s.get(key)).and_then(|v| v.as_bool())
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_apply_to_empty_config() {
        let settings = Settings::from_value(&json!({}));

        assert_eq!(settings.llm.model, "gpt-4o-mini");
        assert_eq!(settings.search.max_chars, 2000);
        assert_eq!(settings.rag.chunk_size, 500);
        assert_eq!(settings.rag.chunk_overlap, 50);
        assert_eq!(settings.pipeline.default_count, 3);
        assert_eq!(settings.pipeline.max_count, 5);
        assert_eq!(settings.pipeline.discovery, DiscoveryCount::Fixed(3));
        assert_eq!(settings.pipeline.recursion_limit, 100);
    }

    #[test]
    fn dynamic_discovery_reads_max_count() {
        let settings = Settings::from_value(&json!({
            "pipeline": { "discovery": "dynamic", "max_count": 7 }
        }));

        assert_eq!(settings.pipeline.discovery, DiscoveryCount::Dynamic { max: 7 });
        assert_eq!(settings.pipeline.discovery.upper_bound(), 7);
    }

    #[test]
    fn max_count_never_drops_below_default_count() {
        let settings = Settings::from_value(&json!({
            "pipeline": { "default_count": 8, "max_count": 4 }
        }));

        assert_eq!(settings.pipeline.max_count, 8);
        assert_eq!(settings.pipeline.discovery, DiscoveryCount::Fixed(8));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let settings = Settings::from_value(&json!({
            "llm": { "base_url": "http://localhost:1234/" }
        }));

        assert_eq!(settings.llm.base_url, "http://localhost:1234");
    }

    #[test]
    fn serialized_settings_omit_secrets() {
        let settings = Settings::from_value(&json!({
            "llm": { "api_key": "sk-hidden" }
        }));

        let value = serde_json::to_value(&settings).unwrap();
        assert!(value["llm"].get("api_key").is_none());
    }
}
