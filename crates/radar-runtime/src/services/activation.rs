//! Activation metadata collaborator.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use radar_trigger::Activation;

/// Looks up activation briefings by id.
#[async_trait]
pub trait ActivationStore: Send + Sync {
  async fn get(&self, activation_id: &str) -> Option<Activation>;
}

#[derive(Debug, Default)]
pub struct MemoryActivationStore {
  activations: RwLock<HashMap<String, Activation>>,
}

impl MemoryActivationStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&self, activation_id: impl Into<String>, activation: Activation) {
    if let Ok(mut activations) = self.activations.write() {
      activations.insert(activation_id.into(), activation);
    }
  }
}

#[async_trait]
impl ActivationStore for MemoryActivationStore {
  async fn get(&self, activation_id: &str) -> Option<Activation> {
    self
      .activations
      .read()
      .ok()
      .and_then(|a| a.get(activation_id).cloned())
  }
}
