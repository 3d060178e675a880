//! AI completion collaborator.

use std::sync::Arc;

use async_trait::async_trait;
use radar_config::AiProviderConfig;
use radar_host_http::{HttpClient, HttpError, HttpRequest};
use serde_json::{Value, json};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiRequest {
  /// Overrides the provider's default model.
  pub model: Option<String>,
  pub prompt: String,
  /// Ask the provider for a JSON object response.
  pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiResponse {
  pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AiError {
  #[error(transparent)]
  Http(#[from] HttpError),

  #[error("provider returned status {status}: {body}")]
  Status { status: u16, body: String },

  #[error("unexpected provider response: {message}")]
  InvalidResponse { message: String },
}

/// AI completion service consumed by AI nodes.
#[async_trait]
pub trait AiClient: Send + Sync {
  async fn complete(&self, request: AiRequest) -> Result<AiResponse, AiError>;
}

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct OpenAiClient {
  http: Arc<dyn HttpClient>,
  endpoint: String,
  model: String,
  api_key: Option<String>,
}

impl OpenAiClient {
  pub fn new(http: Arc<dyn HttpClient>, endpoint: impl Into<String>, model: impl Into<String>) -> Self {
    Self {
      http,
      endpoint: endpoint.into(),
      model: model.into(),
      api_key: None,
    }
  }

  /// Build from provider config, reading the API key from its env var.
  pub fn from_config(config: &AiProviderConfig, http: Arc<dyn HttpClient>) -> Self {
    let client = Self::new(http, &config.endpoint, &config.model);
    match std::env::var(&config.api_key_env) {
      Ok(key) if !key.trim().is_empty() => client.with_api_key(key),
      _ => client,
    }
  }

  pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
    self.api_key = Some(api_key.into());
    self
  }

  fn body(&self, request: &AiRequest) -> Value {
    let mut body = json!({
      "model": request.model.as_deref().unwrap_or(&self.model),
      "messages": [{ "role": "user", "content": request.prompt }],
    });
    if request.json {
      body["response_format"] = json!({ "type": "json_object" });
    }
    body
  }
}

#[async_trait]
impl AiClient for OpenAiClient {
  async fn complete(&self, request: AiRequest) -> Result<AiResponse, AiError> {
    let mut http_request = HttpRequest::new("POST", &self.endpoint)
      .with_header("Content-Type", "application/json")
      .with_body(self.body(&request).to_string());
    if let Some(key) = &self.api_key {
      http_request = http_request.with_header("Authorization", format!("Bearer {}", key));
    }

    let response = self.http.send(http_request).await?;
    if !response.is_success() {
      return Err(AiError::Status {
        status: response.status,
        body: response.body,
      });
    }

    let parsed: Value =
      serde_json::from_str(&response.body).map_err(|e| AiError::InvalidResponse {
        message: e.to_string(),
      })?;

    let text = parsed["choices"][0]["message"]["content"]
      .as_str()
      .ok_or_else(|| AiError::InvalidResponse {
        message: "missing choices[0].message.content".to_string(),
      })?
      .to_string();

    debug!(chars = text.len(), "ai_completion_received");
    Ok(AiResponse { text })
  }
}
