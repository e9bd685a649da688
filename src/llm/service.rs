use std::sync::Arc;
use std::time::Duration;

use crate::core::config::LlmSettings;
use crate::core::errors::{bounded, CapabilityError};
use crate::llm::openai::OpenAiProvider;
use crate::llm::provider::LlmProvider;
use crate::llm::types::{ChatMessage, ChatRequest};

#[derive(Clone)]
pub struct LlmService {
    provider: Arc<dyn LlmProvider>,
    model: String,
    embedding_model: String,
    timeout: Duration,
}

impl LlmService {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: &LlmSettings) -> Self {
        Self {
            provider,
            model: settings.model.clone(),
            embedding_model: settings.embedding_model.clone(),
            timeout: settings.timeout(),
        }
    }

    pub fn from_settings(settings: &LlmSettings) -> Self {
        let provider = OpenAiProvider::new(settings.base_url.clone(), settings.api_key.clone());
        Self::new(Arc::new(provider), settings)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Single-turn completion of `prompt` at `temperature`.
    pub async fn invoke(&self, prompt: &str, temperature: f64) -> Result<String, CapabilityError> {
        let request =
            ChatRequest::new(vec![ChatMessage::user(prompt)]).with_temperature(temperature);

        tracing::debug!(
            provider = self.provider.name(),
            model = %self.model,
            prompt_chars = prompt.len(),
            "invoking model"
        );

        let text = bounded("model", self.timeout, self.provider.chat(request, &self.model)).await?;
        Ok(text.trim().to_string())
    }

    pub async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, CapabilityError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        bounded(
            "embedding",
            self.timeout,
            self.provider.embed(inputs, &self.embedding_model),
        )
        .await
    }
}
