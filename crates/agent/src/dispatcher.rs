//! Sends an assembled window to the completion API.

use crate::builder::ConversationWindow;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};
use zulipgpt_core::error::ProviderError;
use zulipgpt_core::provider::{CompletionRequest, Provider};

/// Reply used whenever the completion call fails.
pub const API_ERROR_REPLY: &str = "OpenAI API error. Please try again later.";

/// Default limit for one completion call.
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(120);

/// Turns a conversation window into reply text.
pub struct ResponseDispatcher {
    provider: Arc<dyn Provider>,
    temperature: Option<f32>,
    timeout: Duration,
}

impl ResponseDispatcher {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            temperature: None,
            timeout: DEFAULT_COMPLETION_TIMEOUT,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Call the model and return its trimmed reply.
    pub async fn complete(&self, window: &ConversationWindow) -> Result<String, ProviderError> {
        let mut request = CompletionRequest::new(window.model.name, window.turns.clone());
        request.temperature = self.temperature;

        let response = tokio::time::timeout(self.timeout, self.provider.complete(request))
            .await
            .map_err(|_| {
                ProviderError::Timeout(format!("no reply within {}s", self.timeout.as_secs()))
            })??;

        if let Some(usage) = &response.usage {
            debug!(
                model = %response.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                estimated_prompt_tokens = window.total_tokens,
                "Completion usage"
            );
        }

        Ok(response.content.trim().to_string())
    }

    /// Like [`complete`](Self::complete), but failures become the fixed
    /// apology so the conversation can carry on.
    pub async fn reply(&self, window: &ConversationWindow) -> String {
        match self.complete(window).await {
            Ok(text) => text,
            Err(e) => {
                error!(
                    provider = self.provider.name(),
                    model = window.model.name,
                    transient = e.is_transient(),
                    error = %e,
                    "Completion failed"
                );
                API_ERROR_REPLY.to_string()
            }
        }
    }
}
