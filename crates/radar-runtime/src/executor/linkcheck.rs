use radar_config::LinkCheckConfig;
use serde_json::json;
use tracing::debug;

use super::{NodeEnv, NodeOutput, Resolution, Route};
use crate::error::NodeError;

/// Gate on the "seen" registry: unseen values pass and are registered,
/// seen values stop the branch without failing it.
pub(super) async fn execute(
  config: &LinkCheckConfig,
  env: &NodeEnv<'_>,
) -> Result<NodeOutput, NodeError> {
  let mut resolution = Resolution::default();
  let value = resolution.text(&config.value, env.variables)?;
  let value = value.trim();
  if value.is_empty() {
    return Err(NodeError::config("link check value resolved to an empty string"));
  }

  let check = env
    .services
    .links
    .check_and_register(value)
    .await
    .map_err(|e| NodeError::integration("link registry", e.to_string()))?;

  debug!(
    execution_id = %env.execution_id,
    node_id = %env.node.id,
    is_new = check.is_new,
    "link_check"
  );

  let route = if check.is_new { Route::Continue } else { Route::Stop };
  Ok(
    NodeOutput::new(json!({
      "is_new": check.is_new,
      "value": value,
      "key": check.key,
    }))
    .with_route(route)
    .with_warnings(resolution.into_warnings()),
  )
}
