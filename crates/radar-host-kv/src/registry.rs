//! The "seen" registry behind link-check triggers.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

use crate::error::KvError;
use crate::store::KvStore;

const KEY_PREFIX: &str = "link:";

/// Outcome of a registry lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCheck {
  /// True when the value had not been registered before this call.
  pub is_new: bool,
  /// Hex SHA-256 of the normalized value.
  pub key: String,
}

/// Append-only registry of values already processed.
#[async_trait]
pub trait LinkRegistry: Send + Sync {
  /// Look up `value` and register it if unseen. Concurrent calls for the
  /// same value must report `is_new = true` at most once.
  async fn check_and_register(&self, value: &str) -> Result<LinkCheck, KvError>;
}

/// Canonical form used for hashing.
///
/// URLs get a lowercased scheme and host and lose a trailing slash when
/// they carry no query or fragment. Paths and queries keep their case.
/// Anything else is only trimmed.
pub fn normalize(value: &str) -> String {
  let value = value.trim();
  match Url::parse(value) {
    Ok(url) if url.has_host() => {
      let mut canonical = url.to_string();
      if url.query().is_none() && url.fragment().is_none() {
        let end = canonical.trim_end_matches('/').len();
        canonical.truncate(end);
      }
      canonical
    }
    _ => value.to_string(),
  }
}

/// Registry key for a value.
pub fn link_key(value: &str) -> String {
  hex::encode(Sha256::digest(normalize(value).as_bytes()))
}

/// [`LinkRegistry`] over any [`KvStore`].
#[derive(Debug, Default)]
pub struct KvLinkRegistry<K> {
  store: K,
}

impl<K: KvStore> KvLinkRegistry<K> {
  pub fn new(store: K) -> Self {
    Self { store }
  }

  pub fn store(&self) -> &K {
    &self.store
  }
}

#[async_trait]
impl<K: KvStore> LinkRegistry for KvLinkRegistry<K> {
  async fn check_and_register(&self, value: &str) -> Result<LinkCheck, KvError> {
    let key = link_key(value);
    let is_new = self
      .store
      .set_if_absent(&format!("{}{}", KEY_PREFIX, key), normalize(value))
      .await?;

    debug!(key = %key, is_new, "link_checked");
    Ok(LinkCheck { is_new, key })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::MemoryKvStore;

  #[test]
  fn test_normalize() {
    assert_eq!(
      normalize("  https://News.example.com/Story/ "),
      "https://news.example.com/Story"
    );
    assert_eq!(normalize("HTTPS://A.COM"), "https://a.com");
    assert_eq!(
      normalize("https://a.com/list/?page=2"),
      "https://a.com/list/?page=2"
    );
    assert_eq!(normalize("  Port Strike Announced \n"), "Port Strike Announced");
  }

  #[test]
  fn test_case_sensitive_paths_and_content() {
    assert_ne!(
      link_key("https://news.test/Article/ABC123"),
      link_key("https://news.test/article/abc123")
    );
    assert_ne!(link_key("Port strike"), link_key("port strike"));
  }

  #[test]
  fn test_link_key_is_sha256_hex() {
    assert_eq!(
      link_key("abc"),
      "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
    assert_eq!(link_key("https://a.com/x/"), link_key("HTTPS://A.COM/x"));
  }

  #[tokio::test]
  async fn test_registers_once() {
    let registry = KvLinkRegistry::new(MemoryKvStore::new());

    let first = registry
      .check_and_register("https://example.com/a")
      .await
      .unwrap();
    assert!(first.is_new);

    let second = registry
      .check_and_register("https://example.com/a/")
      .await
      .unwrap();
    assert!(!second.is_new);
    assert_eq!(first.key, second.key);

    let other = registry
      .check_and_register("https://example.com/b")
      .await
      .unwrap();
    assert!(other.is_new);
    assert_eq!(registry.store().len(), 2);
  }

  #[tokio::test]
  async fn test_distinct_case_paths_both_new() {
    let registry = KvLinkRegistry::new(MemoryKvStore::new());

    let first = registry
      .check_and_register("https://news.test/Article/ABC123")
      .await
      .unwrap();
    let second = registry
      .check_and_register("https://news.test/article/abc123")
      .await
      .unwrap();
    assert!(first.is_new);
    assert!(second.is_new);

    let repeat = registry
      .check_and_register("HTTPS://NEWS.TEST/Article/ABC123/")
      .await
      .unwrap();
    assert!(!repeat.is_new);
    assert_eq!(repeat.key, first.key);
  }
}
