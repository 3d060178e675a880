use url::Url;

use crate::error::HttpError;

/// Allow-lists applied to every outbound request.
///
/// An empty host list allows any host. Host entries match exactly, or as a
/// suffix when written `*.example.com`.
#[derive(Debug, Clone)]
pub struct HttpPolicy {
  allowed_schemes: Vec<String>,
  allowed_hosts: Vec<String>,
}

impl Default for HttpPolicy {
  fn default() -> Self {
    Self {
      allowed_schemes: vec!["http".to_string(), "https".to_string()],
      allowed_hosts: Vec::new(),
    }
  }
}

impl HttpPolicy {
  pub fn new(allowed_schemes: Vec<String>, allowed_hosts: Vec<String>) -> Self {
    Self {
      allowed_schemes: allowed_schemes
        .into_iter()
        .map(|s| s.to_ascii_lowercase())
        .collect(),
      allowed_hosts: allowed_hosts
        .into_iter()
        .map(|h| h.to_ascii_lowercase())
        .collect(),
    }
  }

  /// Parse `raw` and check it against the policy.
  pub fn check(&self, raw: &str) -> Result<Url, HttpError> {
    let url = Url::parse(raw.trim()).map_err(|e| HttpError::InvalidUrl {
      url: raw.to_string(),
      message: e.to_string(),
    })?;

    if !self.allowed_schemes.iter().any(|s| s == url.scheme()) {
      return Err(HttpError::SchemeNotAllowed {
        scheme: url.scheme().to_string(),
      });
    }

    let host = url
      .host_str()
      .ok_or_else(|| HttpError::InvalidUrl {
        url: raw.to_string(),
        message: "missing host".to_string(),
      })?
      .to_ascii_lowercase();

    if !self.host_allowed(&host) {
      return Err(HttpError::HostNotAllowed { host });
    }

    Ok(url)
  }

  fn host_allowed(&self, host: &str) -> bool {
    if self.allowed_hosts.is_empty() {
      return true;
    }

    self.allowed_hosts.iter().any(|pattern| match pattern.strip_prefix("*.") {
      Some(suffix) => host
        .strip_suffix(suffix)
        .is_some_and(|prefix| prefix.ends_with('.')),
      None => pattern == host,
    })
  }
}
