use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use crate::error::KvError;

/// Boxed future returned by [`KvStore`] operations.
pub type KvFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, KvError>> + Send + 'a>>;

/// Shared key-value storage.
///
/// Async so that networked backends (Redis, a database) can implement it.
/// Implementations own their locking; callers may share one store across
/// concurrent executions.
pub trait KvStore: Send + Sync {
  /// Get a value by key.
  fn get(&self, key: &str) -> KvFuture<'_, Option<String>>;

  /// Set a value, replacing any existing one.
  fn set(&self, key: &str, value: String) -> KvFuture<'_, ()>;

  /// Set a value only if the key is absent. Returns whether it was written.
  fn set_if_absent(&self, key: &str, value: String) -> KvFuture<'_, bool>;

  /// Delete a value.
  fn delete(&self, key: &str) -> KvFuture<'_, ()>;
}

/// In-memory KV store.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
  data: RwLock<HashMap<String, String>>,
}

impl MemoryKvStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.data.read().map(|d| d.len()).unwrap_or_default()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl KvStore for MemoryKvStore {
  fn get(&self, key: &str) -> KvFuture<'_, Option<String>> {
    let value = self
      .data
      .read()
      .map(|d| d.get(key).cloned())
      .map_err(|_| KvError::backend("store lock poisoned"));
    Box::pin(async move { value })
  }

  fn set(&self, key: &str, value: String) -> KvFuture<'_, ()> {
    let result = self
      .data
      .write()
      .map(|mut d| {
        d.insert(key.to_string(), value);
      })
      .map_err(|_| KvError::backend("store lock poisoned"));
    Box::pin(async move { result })
  }

  fn set_if_absent(&self, key: &str, value: String) -> KvFuture<'_, bool> {
    let result = self
      .data
      .write()
      .map(|mut d| {
        if d.contains_key(key) {
          false
        } else {
          d.insert(key.to_string(), value);
          true
        }
      })
      .map_err(|_| KvError::backend("store lock poisoned"));
    Box::pin(async move { result })
  }

  fn delete(&self, key: &str) -> KvFuture<'_, ()> {
    let result = self
      .data
      .write()
      .map(|mut d| {
        d.remove(key);
      })
      .map_err(|_| KvError::backend("store lock poisoned"));
    Box::pin(async move { result })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_memory_kv_store() {
    let store = MemoryKvStore::new();

    assert_eq!(store.get("key").await.unwrap(), None);

    store.set("key", "value".to_string()).await.unwrap();
    assert_eq!(store.get("key").await.unwrap(), Some("value".to_string()));

    store.set("key", "updated".to_string()).await.unwrap();
    assert_eq!(store.get("key").await.unwrap(), Some("updated".to_string()));

    store.delete("key").await.unwrap();
    assert_eq!(store.get("key").await.unwrap(), None);
    assert!(store.is_empty());
  }

  #[tokio::test]
  async fn test_set_if_absent() {
    let store = MemoryKvStore::new();

    assert!(store.set_if_absent("k", "first".to_string()).await.unwrap());
    assert!(!store.set_if_absent("k", "second".to_string()).await.unwrap());
    assert_eq!(store.get("k").await.unwrap(), Some("first".to_string()));
  }
}
