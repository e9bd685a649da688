// Fallback Policy
// Substitutes a well-formed default when a stage computation fails

use std::future::Future;

use crate::core::errors::StageError;

/// Value produced by a guarded computation plus the failure it replaced, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Guarded<T> {
    pub value: T,
    pub failure: Option<String>,
}

impl<T> Guarded<T> {
    pub fn is_degraded(&self) -> bool {
        self.failure.is_some()
    }
}

/// Runs `primary`; on any error returns `default(&err)` and logs the substitution.
///
/// Never fails: capability errors, timeouts and parse errors all land here.
pub async fn with_fallback<T, F, D>(step: &str, entity: &str, primary: F, default: D) -> Guarded<T>
where
    F: Future<Output = Result<T, StageError>>,
    D: FnOnce(&StageError) -> T,
{
    match primary.await {
        Ok(value) => Guarded {
            value,
            failure: None,
        },
        Err(err) => {
            tracing::warn!(step, entity, error = %err, "step failed, using fallback");
            Guarded {
                value: default(&err),
                failure: Some(format!("{}: {}", step, err)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::{CapabilityError, ParseError};
    use crate::graph::state::TechSummary;

    #[tokio::test]
    async fn success_passes_through() {
        let guarded = with_fallback("tech_summary", "Acme", async { Ok(3) }, |_| 0).await;
        assert_eq!(guarded.value, 3);
        assert!(!guarded.is_degraded());
    }

    #[tokio::test]
    async fn every_failure_kind_yields_the_default_shape() {
        let failures = vec![
            StageError::from(CapabilityError::Provider("401".into())),
            StageError::from(CapabilityError::Timeout {
                capability: "model",
                secs: 60,
            }),
            StageError::from(ParseError::NotFound("object")),
            StageError::Aborted("sub-graph stopped".into()),
        ];

        for failure in failures {
            let guarded = with_fallback(
                "tech_summary",
                "Acme",
                async move { Err::<TechSummary, _>(failure) },
                |err| TechSummary {
                    summary: format!("Tech summary failed: {}", err),
                    ..Default::default()
                },
            )
            .await;

            assert!(guarded.value.summary.starts_with("Tech summary failed: "));
            assert!(guarded.value.highlights.is_empty());
            assert!(guarded.failure.unwrap().starts_with("tech_summary: "));
        }
    }
}
