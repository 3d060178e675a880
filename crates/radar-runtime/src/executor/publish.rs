use radar_config::PublishConfig;
use serde_json::{Map, Value, json};

use super::{NodeEnv, NodeOutput, Resolution};
use crate::error::NodeError;
use crate::services::Publication;

const DEFAULT_CHANNEL: &str = "default";

/// Aggregate the source outputs, render the content, and hand it to the
/// publish sink.
pub(super) async fn execute(config: &PublishConfig, env: &NodeEnv<'_>) -> Result<NodeOutput, NodeError> {
  let mut resolution = Resolution::default();

  // Without explicit sources, publish whatever fed this node.
  let source_ids = if config.source_nodes.is_empty() {
    env.upstream
  } else {
    config.source_nodes.as_slice()
  };

  let mut sources = Map::new();
  for id in source_ids {
    match env.variables.get(id) {
      Some(output) => {
        sources.insert(id.clone(), output.clone());
      }
      None => resolution.warn(format!("publish source '{}' has no output", id)),
    }
  }
  let sources = Value::Object(sources);

  let content = if config.template.trim().is_empty() {
    serde_json::to_string_pretty(&sources)
      .map_err(|e| NodeError::config(format!("cannot render sources: {}", e)))?
  } else {
    resolution.text(&config.template, env.variables)?
  };

  let channel = config
    .channel
    .as_deref()
    .map(str::trim)
    .filter(|c| !c.is_empty())
    .unwrap_or(DEFAULT_CHANNEL)
    .to_string();

  let receipt = env
    .services
    .publisher
    .publish(Publication {
      execution_id: env.execution_id.to_string(),
      flow_id: env.flow_id.to_string(),
      node_id: env.node.id.clone(),
      channel: channel.clone(),
      content,
      sources,
    })
    .await
    .map_err(|e| NodeError::integration("publish", e.message))?;

  Ok(
    NodeOutput::new(json!({
      "published": true,
      "publicationId": receipt.publication_id,
      "channel": channel,
    }))
    .with_warnings(resolution.into_warnings()),
  )
}
