use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KvError {
  /// The backing store could not be reached or rejected the operation.
  #[error("kv backend error: {message}")]
  Backend { message: String },
}

impl KvError {
  pub fn backend(message: impl Into<String>) -> Self {
    Self::Backend {
      message: message.into(),
    }
  }
}
