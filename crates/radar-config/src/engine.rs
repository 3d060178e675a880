//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config:
//!
//! ```json
//! {
//!   "timeouts": { "script_ms": 2000 },
//!   "ai": { "model": "gpt-4o" },
//!   "max_concurrent_executions": 8
//! }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  pub timeouts: TimeoutConfig,
  pub sandbox: SandboxLimits,
  pub ai: AiProviderConfig,
  pub http: HttpPolicyConfig,
  /// Upper bound on executions the runner drives at once.
  pub max_concurrent_executions: usize,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      timeouts: TimeoutConfig::default(),
      sandbox: SandboxLimits::default(),
      ai: AiProviderConfig::default(),
      http: HttpPolicyConfig::default(),
      max_concurrent_executions: 16,
    }
  }
}

/// Per-kind executor timeouts. A node's own `timeoutMs` takes precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
  pub script_ms: u64,
  pub http_ms: u64,
  pub ai_ms: u64,
  /// Applies to every other executor (publish, linkcheck, ...).
  pub default_ms: u64,
}

impl Default for TimeoutConfig {
  fn default() -> Self {
    Self {
      script_ms: 5_000,
      http_ms: 30_000,
      ai_ms: 60_000,
      default_ms: 30_000,
    }
  }
}

impl TimeoutConfig {
  pub fn script(&self) -> Duration {
    Duration::from_millis(self.script_ms)
  }

  pub fn http(&self) -> Duration {
    Duration::from_millis(self.http_ms)
  }

  pub fn ai(&self) -> Duration {
    Duration::from_millis(self.ai_ms)
  }

  pub fn default_timeout(&self) -> Duration {
    Duration::from_millis(self.default_ms)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxLimits {
  pub memory_limit_bytes: usize,
  /// Instructions executed between deadline checks.
  pub hook_interval: u32,
}

impl Default for SandboxLimits {
  fn default() -> Self {
    Self {
      memory_limit_bytes: 32 * 1024 * 1024,
      hook_interval: 1_000,
    }
  }
}

/// OpenAI-compatible chat completion endpoint used by AI nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiProviderConfig {
  pub endpoint: String,
  pub model: String,
  /// Environment variable holding the API key.
  pub api_key_env: String,
  pub retry_backoff_ms: u64,
}

impl Default for AiProviderConfig {
  fn default() -> Self {
    Self {
      endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
      model: "gpt-4o-mini".to_string(),
      api_key_env: "OPENAI_API_KEY".to_string(),
      retry_backoff_ms: 500,
    }
  }
}

impl AiProviderConfig {
  pub fn retry_backoff(&self) -> Duration {
    Duration::from_millis(self.retry_backoff_ms)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpPolicyConfig {
  /// Hosts HTTP nodes may call. Empty allows any host.
  pub allowed_hosts: Vec<String>,
  pub allowed_schemes: Vec<String>,
}

impl Default for HttpPolicyConfig {
  fn default() -> Self {
    Self {
      allowed_hosts: Vec::new(),
      allowed_schemes: vec!["http".to_string(), "https".to_string()],
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_object_uses_defaults() {
    let config: EngineConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config, EngineConfig::default());
    assert_eq!(config.timeouts.script(), Duration::from_secs(5));
  }

  #[test]
  fn test_partial_override() {
    let config: EngineConfig = serde_json::from_str(
      r#"{ "timeouts": { "script_ms": 250 }, "max_concurrent_executions": 2 }"#,
    )
    .unwrap();

    assert_eq!(config.timeouts.script_ms, 250);
    assert_eq!(config.timeouts.http_ms, 30_000);
    assert_eq!(config.max_concurrent_executions, 2);
  }
}
