use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::core::config::DiscoveryCount;
use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EvaluationRequest {
    pub query: String,
    /// Exact number of startups to evaluate; the configured mode when absent
    pub count: Option<usize>,
}

impl EvaluationRequest {
    fn discovery_count(&self) -> Option<DiscoveryCount> {
        self.count.map(DiscoveryCount::Fixed)
    }
}

pub async fn create_evaluation(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EvaluationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let query = payload.query.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".to_string()));
    }

    let count = state.pipeline.resolve_count(payload.discovery_count())?;

    // The run future is dropped when the client disconnects.
    let cancel = CancellationToken::new();
    let report = state.pipeline.run(query, Some(count), &cancel).await?;

    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_maps_to_fixed_discovery() {
        let request: EvaluationRequest =
            serde_json::from_str(r#"{"query": "AI tutoring", "count": 2}"#).unwrap();
        assert_eq!(request.discovery_count(), Some(DiscoveryCount::Fixed(2)));

        let request: EvaluationRequest = serde_json::from_str(r#"{"query": "AI tutoring"}"#).unwrap();
        assert_eq!(request.discovery_count(), None);
    }
}
