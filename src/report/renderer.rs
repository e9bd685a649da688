// Report Renderer
// Posts payloads to the PDF template server and stores the returned documents

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use tokio::io::AsyncWriteExt;

use super::payload::ReportPayload;
use crate::core::config::ReportSettings;
use crate::core::errors::{bounded, CapabilityError};

#[async_trait]
pub trait ReportRenderer: Send + Sync {
    /// PDF bytes for `payload`.
    async fn render(&self, payload: &ReportPayload) -> Result<Vec<u8>, CapabilityError>;
}

pub struct HttpReportRenderer {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpReportRenderer {
    pub fn new(settings: &ReportSettings) -> Self {
        Self {
            client: Client::new(),
            endpoint: settings.endpoint.clone(),
            timeout: settings.timeout(),
        }
    }
}

#[async_trait]
impl ReportRenderer for HttpReportRenderer {
    async fn render(&self, payload: &ReportPayload) -> Result<Vec<u8>, CapabilityError> {
        bounded("render", self.timeout, async {
            let response = self
                .client
                .post(&self.endpoint)
                .json(payload)
                .send()
                .await
                .map_err(|e| CapabilityError::Render(e.to_string()))?;

            let status = response.status();
            if status != StatusCode::OK {
                let body = response.text().await.unwrap_or_default();
                tracing::warn!("Report server returned {}: {}", status, body);
                return Err(CapabilityError::Render(if body.is_empty() {
                    status.to_string()
                } else {
                    body
                }));
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| CapabilityError::Render(e.to_string()))?;
            Ok(bytes.to_vec())
        })
        .await
    }
}

fn unsafe_filename_chars() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"[^\p{L}\p{N}_-]").ok())
        .as_ref()
}

/// `<sanitized name>_report.pdf`; anything but letters, digits, `_` and `-` becomes `_`.
pub fn report_file_name(name: &str) -> String {
    let name = if name.trim().is_empty() { "startup" } else { name };
    let safe = match unsafe_filename_chars() {
        Some(pattern) => pattern.replace_all(name, "_").into_owned(),
        None => name
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect(),
    };
    format!("{}_report.pdf", safe)
}

/// `report_file_name` with `-2`, `-3`, ... before the extension for later attempts.
fn numbered_file_name(name: &str, attempt: usize) -> String {
    let base = report_file_name(name);
    if attempt <= 1 {
        return base;
    }
    let stem = base.trim_end_matches(".pdf");
    format!("{}-{}.pdf", stem, attempt)
}

const MAX_NAME_ATTEMPTS: usize = 1000;

/// Writes `bytes` under `output_dir` and returns the file name.
///
/// Never overwrites: a taken name gets a numeric suffix.
pub async fn save_pdf(output_dir: &Path, name: &str, bytes: &[u8]) -> Result<String, CapabilityError> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| CapabilityError::Render(format!("cannot create {}: {}", output_dir.display(), e)))?;

    for attempt in 1..=MAX_NAME_ATTEMPTS {
        let file_name = numbered_file_name(name, attempt);
        let opened = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(output_dir.join(&file_name))
            .await;
        let mut file = match opened {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(CapabilityError::Render(format!("cannot create {}: {}", file_name, e)))
            }
        };
        let write_err = |e: std::io::Error| CapabilityError::Render(format!("cannot write {}: {}", file_name, e));
        file.write_all(bytes).await.map_err(write_err)?;
        file.flush().await.map_err(write_err)?;
        tracing::info!("Saved report {}", file_name);
        return Ok(file_name);
    }

    Err(CapabilityError::Render(format!(
        "no free file name for {} in {}",
        report_file_name(name),
        output_dir.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(report_file_name("Acme Learning"), "Acme_Learning_report.pdf");
        assert_eq!(report_file_name("class-101_kr"), "class-101_kr_report.pdf");
        assert_eq!(report_file_name("뤼이드"), "뤼이드_report.pdf");
        assert_eq!(report_file_name("Acme/../x"), "Acme____x_report.pdf");
        assert_eq!(report_file_name(""), "startup_report.pdf");
    }

    #[tokio::test]
    async fn save_pdf_creates_output_dir() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("outputs");

        let file_name = save_pdf(&output, "Acme", b"%PDF-1.4").await.unwrap();

        assert_eq!(file_name, "Acme_report.pdf");
        let written = std::fs::read(output.join(&file_name)).unwrap();
        assert_eq!(written, b"%PDF-1.4");
    }

    #[tokio::test]
    async fn taken_names_get_a_numeric_suffix() {
        let dir = TempDir::new().unwrap();

        let first = save_pdf(dir.path(), "엘리스", b"first").await.unwrap();
        let second = save_pdf(dir.path(), "엘리스", b"second").await.unwrap();
        let third = save_pdf(dir.path(), "엘리스", b"third").await.unwrap();

        assert_eq!(first, "엘리스_report.pdf");
        assert_eq!(second, "엘리스_report-2.pdf");
        assert_eq!(third, "엘리스_report-3.pdf");
        assert_eq!(std::fs::read(dir.path().join(&first)).unwrap(), b"first");
        assert_eq!(std::fs::read(dir.path().join(&second)).unwrap(), b"second");
    }

    #[tokio::test]
    async fn hangul_names_of_equal_length_do_not_collide() {
        let dir = TempDir::new().unwrap();

        let a = save_pdf(dir.path(), "엘리스", b"a").await.unwrap();
        let b = save_pdf(dir.path(), "뤼이드", b"b").await.unwrap();

        assert_ne!(a, b);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn unreachable_server_is_a_render_error() {
        let renderer = HttpReportRenderer::new(&ReportSettings {
            endpoint: "http://127.0.0.1:9/generate-report".to_string(),
            output_dir: "outputs".into(),
            timeout_secs: 5,
        });
        let startup = crate::graph::state::Startup::named("Acme");
        let payload = ReportPayload::build(&startup, super::super::payload::ReportSummary::fallback(&startup));

        let err = renderer.render(&payload).await.unwrap_err();
        assert!(matches!(
            err,
            CapabilityError::Render(_) | CapabilityError::Timeout { .. }
        ));
    }
}
