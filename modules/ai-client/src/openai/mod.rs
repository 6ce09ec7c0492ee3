mod client;
pub(crate) mod types;

pub use types::Usage;

use std::time::Duration;

use client::OpenAiClient;

use crate::error::{AiError, Result};

/// A chat completion's content plus its token accounting.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub usage: Usage,
}

#[derive(Clone)]
pub struct OpenAi {
    api_key: String,
    model: String,
    base_url: Option<String>,
    timeout: Duration,
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn client(&self) -> OpenAiClient {
        let client = OpenAiClient::new(&self.api_key, self.timeout);
        if let Some(ref url) = self.base_url {
            client.with_base_url(url)
        } else {
            client
        }
    }

    /// Chat completion in JSON mode: the model is forced to return a single
    /// JSON object, which comes back as the raw string for the caller to
    /// deserialize. No retries here; retry schedules belong to the caller.
    pub async fn chat_json(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Result<Completion> {
        let request = types::ChatRequest {
            model: self.model.clone(),
            messages: vec![
                types::WireMessage::system(system),
                types::WireMessage::user(user),
            ],
            temperature: Some(0.7),
            response_format: Some(types::ResponseFormat::json_object()),
        };

        let response = self.client().chat(&request).await?;
        let usage = response.usage.unwrap_or_default();

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.is_empty())
            .ok_or(AiError::Empty)?;

        Ok(Completion { content, usage })
    }

    /// Plain chat completion without forced JSON output.
    pub async fn chat(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Result<Completion> {
        let request = types::ChatRequest {
            model: self.model.clone(),
            messages: vec![
                types::WireMessage::system(system),
                types::WireMessage::user(user),
            ],
            temperature: Some(0.7),
            response_format: None,
        };

        let response = self.client().chat(&request).await?;
        let usage = response.usage.unwrap_or_default();

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.is_empty())
            .ok_or(AiError::Empty)?;

        Ok(Completion { content, usage })
    }
}
