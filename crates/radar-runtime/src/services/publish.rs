//! Publish sink collaborator.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

/// Content handed to a sink by a publish node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
  pub execution_id: String,
  pub flow_id: String,
  pub node_id: String,
  pub channel: String,
  pub content: String,
  /// Outputs of the node's source nodes, keyed by node id.
  pub sources: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
  pub publication_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("publish failed: {message}")]
pub struct PublishError {
  pub message: String,
}

/// Where publish nodes send their content.
#[async_trait]
pub trait PublishSink: Send + Sync {
  async fn publish(&self, publication: Publication) -> Result<PublishReceipt, PublishError>;
}

/// Logs each publication and keeps it in memory.
#[derive(Debug, Default)]
pub struct LogPublishSink {
  published: Mutex<Vec<Publication>>,
}

impl LogPublishSink {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn published(&self) -> Vec<Publication> {
    self
      .published
      .lock()
      .map(|p| p.clone())
      .unwrap_or_default()
  }
}

#[async_trait]
impl PublishSink for LogPublishSink {
  async fn publish(&self, publication: Publication) -> Result<PublishReceipt, PublishError> {
    let publication_id = uuid::Uuid::new_v4().to_string();
    info!(
      publication_id = %publication_id,
      execution_id = %publication.execution_id,
      node_id = %publication.node_id,
      channel = %publication.channel,
      content = %publication.content,
      "publication_sent"
    );

    self
      .published
      .lock()
      .map_err(|_| PublishError {
        message: "publication log unavailable".to_string(),
      })?
      .push(publication);

    Ok(PublishReceipt { publication_id })
  }
}
