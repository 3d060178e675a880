//! Collaborators the executors call out to, bundled as [`Services`].

mod activation;
mod ai;
mod publish;

use std::sync::Arc;
use std::time::Duration;

use radar_config::{ActionKind, EngineConfig, NodeDef, NodeKind};
use radar_host_http::{HttpClient, HttpPolicy, ReqwestHttpClient};
use radar_host_kv::{KvLinkRegistry, LinkRegistry, MemoryKvStore};
use radar_sandbox::{SandboxConfig, ScriptSandbox};

pub use activation::{ActivationStore, MemoryActivationStore};
pub use ai::{AiClient, AiError, AiRequest, AiResponse, OpenAiClient};
pub use publish::{LogPublishSink, PublishError, PublishReceipt, PublishSink, Publication};

/// Everything a node executor may touch outside the execution itself.
#[derive(Clone)]
pub struct Services {
  pub config: EngineConfig,
  pub ai: Arc<dyn AiClient>,
  pub http: Arc<dyn HttpClient>,
  pub links: Arc<dyn LinkRegistry>,
  pub publisher: Arc<dyn PublishSink>,
  pub activations: Arc<dyn ActivationStore>,
}

impl Services {
  /// Production wiring: reqwest with the configured policy, an
  /// OpenAI-compatible AI client, and in-memory registry/sink/store.
  pub fn from_config(config: EngineConfig) -> Self {
    let policy = HttpPolicy::new(
      config.http.allowed_schemes.clone(),
      config.http.allowed_hosts.clone(),
    );
    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new(policy));
    let ai = Arc::new(OpenAiClient::from_config(&config.ai, http.clone()));

    Self {
      config,
      ai,
      http,
      links: Arc::new(KvLinkRegistry::new(MemoryKvStore::new())),
      publisher: Arc::new(LogPublishSink::new()),
      activations: Arc::new(MemoryActivationStore::new()),
    }
  }

  pub fn with_ai(mut self, ai: Arc<dyn AiClient>) -> Self {
    self.ai = ai;
    self
  }

  pub fn with_http(mut self, http: Arc<dyn HttpClient>) -> Self {
    self.http = http;
    self
  }

  pub fn with_links(mut self, links: Arc<dyn LinkRegistry>) -> Self {
    self.links = links;
    self
  }

  pub fn with_publisher(mut self, publisher: Arc<dyn PublishSink>) -> Self {
    self.publisher = publisher;
    self
  }

  pub fn with_activations(mut self, activations: Arc<dyn ActivationStore>) -> Self {
    self.activations = activations;
    self
  }

  /// The node's own timeout, else the configured default for its kind.
  pub fn timeout_for(&self, node: &NodeDef) -> Duration {
    if let Some(ms) = node.timeout_ms {
      return Duration::from_millis(ms);
    }

    let timeouts = &self.config.timeouts;
    match &node.kind {
      NodeKind::Action(ActionKind::Script(_)) => timeouts.script(),
      NodeKind::Action(ActionKind::Http(_)) => timeouts.http(),
      NodeKind::Action(ActionKind::Ai(_)) => timeouts.ai(),
      _ => timeouts.default_timeout(),
    }
  }

  /// A sandbox bounded by `timeout` and the configured limits.
  pub fn sandbox(&self, timeout: Duration) -> ScriptSandbox {
    ScriptSandbox::new(SandboxConfig {
      timeout,
      memory_limit: self.config.sandbox.memory_limit_bytes,
      hook_interval: self.config.sandbox.hook_interval,
    })
  }
}

impl Default for Services {
  fn default() -> Self {
    Self::from_config(EngineConfig::default())
  }
}
