use thiserror::Error;

/// Errors from the HTTP capability.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HttpError {
  #[error("invalid url '{url}': {message}")]
  InvalidUrl { url: String, message: String },

  #[error("scheme '{scheme}' is not allowed")]
  SchemeNotAllowed { scheme: String },

  #[error("host '{host}' is not allowed")]
  HostNotAllowed { host: String },

  #[error("invalid http method '{method}'")]
  InvalidMethod { method: String },

  #[error("request timed out")]
  Timeout,

  /// Connection, TLS, or body read failure.
  #[error("request failed: {message}")]
  Transport { message: String },
}

impl From<reqwest::Error> for HttpError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_timeout() {
      Self::Timeout
    } else {
      Self::Transport {
        message: e.to_string(),
      }
    }
  }
}
