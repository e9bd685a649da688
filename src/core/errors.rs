use std::future::Future;
use std::time::Duration;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("service unavailable")]
    ServiceUnavailable,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service unavailable".to_string(),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

/// Failure of an external capability (model, search, retrieval, renderer).
///
/// Always recoverable: stage nodes absorb these through the fallback policy.
#[derive(Debug, Clone, Error)]
pub enum CapabilityError {
    #[error("model provider error: {0}")]
    Provider(String),
    #[error("search error: {0}")]
    Search(String),
    #[error("retrieval error: {0}")]
    Retrieval(String),
    #[error("render error: {0}")]
    Render(String),
    #[error("{capability} call timed out after {secs}s")]
    Timeout { capability: &'static str, secs: u64 },
}

/// Model output could not be turned into the expected structure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("no JSON {0} found in model output")]
    NotFound(&'static str),
    #[error("malformed JSON: {0}")]
    Malformed(String),
    #[error("unexpected response shape: {0}")]
    Shape(String),
}

/// Anything a stage computation may fail with before its fallback kicks in.
#[derive(Debug, Clone, Error)]
pub enum StageError {
    #[error(transparent)]
    Capability(#[from] CapabilityError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// A nested graph (market analysis) stopped before reaching its end.
    #[error("{0}")]
    Aborted(String),
}

/// Runs a capability call under a deadline, mapping expiry to `CapabilityError::Timeout`.
pub async fn bounded<T, F>(
    capability: &'static str,
    limit: Duration,
    call: F,
) -> Result<T, CapabilityError>
where
    F: Future<Output = Result<T, CapabilityError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(CapabilityError::Timeout {
            capability,
            secs: limit.as_secs(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bounded_passes_through_fast_calls() {
        let value = bounded("model", Duration::from_secs(1), async { Ok::<_, CapabilityError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn bounded_maps_expiry_to_timeout() {
        let result: Result<(), CapabilityError> =
            bounded("search", Duration::from_millis(10), async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            })
            .await;

        match result {
            Err(CapabilityError::Timeout { capability, .. }) => assert_eq!(capability, "search"),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn stage_error_wraps_both_kinds() {
        let parse: StageError = ParseError::NotFound("object").into();
        assert_eq!(parse.to_string(), "no JSON object found in model output");

        let cap: StageError = CapabilityError::Provider("429".to_string()).into();
        assert!(cap.to_string().contains("429"));
    }
}
