use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::error::HttpError;
use crate::policy::HttpPolicy;

/// An outbound request, already resolved to concrete strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
  pub method: String,
  pub url: String,
  pub headers: Vec<(String, String)>,
  pub body: Option<String>,
  pub timeout: Option<Duration>,
}

impl HttpRequest {
  pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
    Self {
      method: method.into(),
      url: url.into(),
      headers: Vec::new(),
      body: None,
      timeout: None,
    }
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  pub fn with_body(mut self, body: impl Into<String>) -> Self {
    self.body = Some(body.into());
    self
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }
}

/// A received response. Non-2xx statuses are still responses, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: String,
}

impl HttpResponse {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }
}

/// Outbound HTTP capability.
#[async_trait]
pub trait HttpClient: Send + Sync {
  async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// [`HttpClient`] backed by reqwest, enforcing an [`HttpPolicy`].
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
  client: reqwest::Client,
  policy: HttpPolicy,
}

impl ReqwestHttpClient {
  pub fn new(policy: HttpPolicy) -> Self {
    Self::with_client(reqwest::Client::new(), policy)
  }

  pub fn with_client(client: reqwest::Client, policy: HttpPolicy) -> Self {
    Self { client, policy }
  }

  pub fn policy(&self) -> &HttpPolicy {
    &self.policy
  }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
  #[instrument(
    name = "http_send",
    skip(self, request),
    fields(method = %request.method, url = %request.url)
  )]
  async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
    let url = self.policy.check(&request.url)?;
    let method = reqwest::Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
      .map_err(|_| HttpError::InvalidMethod {
        method: request.method.clone(),
      })?;

    let mut builder = self.client.request(method, url);
    for (name, value) in &request.headers {
      builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(body) = request.body {
      builder = builder.body(body);
    }
    if let Some(timeout) = request.timeout {
      builder = builder.timeout(timeout);
    }

    let response = builder.send().await?;
    let status = response.status().as_u16();
    let headers = response
      .headers()
      .iter()
      .filter_map(|(name, value)| {
        value
          .to_str()
          .ok()
          .map(|v| (name.as_str().to_string(), v.to_string()))
      })
      .collect();
    let body = response.text().await?;

    debug!(status, bytes = body.len(), "http_response");

    Ok(HttpResponse {
      status,
      headers,
      body,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn restricted() -> ReqwestHttpClient {
    ReqwestHttpClient::new(HttpPolicy::new(
      vec!["https".to_string()],
      vec!["api.example.com".to_string()],
    ))
  }

  #[tokio::test]
  async fn test_policy_blocks_before_sending() {
    let err = restricted()
      .send(HttpRequest::new("GET", "https://elsewhere.com/x"))
      .await
      .unwrap_err();
    assert_eq!(
      err,
      HttpError::HostNotAllowed {
        host: "elsewhere.com".to_string()
      }
    );
  }

  #[tokio::test]
  async fn test_invalid_method() {
    let err = restricted()
      .send(HttpRequest::new("NOT A METHOD", "https://api.example.com/x"))
      .await
      .unwrap_err();
    assert!(matches!(err, HttpError::InvalidMethod { .. }));
  }

  #[test]
  fn test_response_helpers() {
    let response = HttpResponse {
      status: 404,
      headers: vec![("Content-Type".to_string(), "application/json".to_string())],
      body: "{}".to_string(),
    };
    assert!(!response.is_success());
    assert_eq!(response.header("content-type"), Some("application/json"));
  }
}
