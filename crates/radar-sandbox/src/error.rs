use thiserror::Error;

/// Errors raised while running a script.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SandboxError {
  /// The script ran past its wall-clock budget.
  #[error("script timed out after {timeout_ms}ms")]
  Timeout { timeout_ms: u64 },

  /// The owning execution was cancelled mid-run.
  #[error("script cancelled")]
  Cancelled,

  /// Syntax error, runtime error, or a disallowed operation.
  #[error("script error: {message}")]
  Script { message: String },

  /// Bindings or result could not be converted between JSON and Lua.
  #[error("script value conversion failed: {message}")]
  Conversion { message: String },

  /// The interpreter could not be set up.
  #[error("sandbox setup failed: {message}")]
  Setup { message: String },
}

impl SandboxError {
  pub fn script(message: impl Into<String>) -> Self {
    Self::Script {
      message: message.into(),
    }
  }

  pub fn conversion(message: impl Into<String>) -> Self {
    Self::Conversion {
      message: message.into(),
    }
  }

  pub fn setup(message: impl Into<String>) -> Self {
    Self::Setup {
      message: message.into(),
    }
  }
}
