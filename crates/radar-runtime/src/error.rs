//! Runtime error types.

use radar_resolver::TemplateError;
use radar_sandbox::SandboxError;
use radar_workflow::WorkflowError;

/// Errors that prevent an execution from starting or being observed.
///
/// Node-level failures never surface here; they are recorded in the
/// execution log instead.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
  /// The flow cannot be executed from the requested trigger.
  #[error("invalid flow: {0}")]
  InvalidFlow(#[from] WorkflowError),

  /// The execution task panicked or was aborted.
  #[error("execution task failed: {message}")]
  Join { message: String },

  /// The runner's event channel is closed.
  #[error("flow runner channel closed")]
  ChannelClosed,
}

/// Why a single node failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeError {
  /// Malformed template, missing or invalid configuration.
  #[error("configuration error: {message}")]
  Config { message: String },

  /// An external collaborator failed.
  #[error("{service} error: {message}")]
  Integration { service: String, message: String },

  #[error("node timed out after {timeout_ms}ms")]
  Timeout { timeout_ms: u64 },

  #[error("{0}")]
  Sandbox(SandboxError),

  #[error("execution cancelled")]
  Cancelled,
}

impl NodeError {
  pub fn config(message: impl Into<String>) -> Self {
    Self::Config {
      message: message.into(),
    }
  }

  pub fn integration(service: impl Into<String>, message: impl Into<String>) -> Self {
    Self::Integration {
      service: service.into(),
      message: message.into(),
    }
  }
}

impl From<TemplateError> for NodeError {
  fn from(e: TemplateError) -> Self {
    Self::config(e.to_string())
  }
}

impl From<SandboxError> for NodeError {
  fn from(e: SandboxError) -> Self {
    match e {
      SandboxError::Timeout { timeout_ms } => Self::Timeout { timeout_ms },
      SandboxError::Cancelled => Self::Cancelled,
      other => Self::Sandbox(other),
    }
  }
}
