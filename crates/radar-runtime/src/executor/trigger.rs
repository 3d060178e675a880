use radar_trigger::TriggerMatcher;
use serde_json::Value;

use super::{NodeEnv, NodeOutput};
use crate::error::NodeError;

/// The trigger's output is the context extracted from the event.
pub(super) fn execute(env: &NodeEnv<'_>) -> Result<NodeOutput, NodeError> {
  Ok(NodeOutput::new(Value::Object(TriggerMatcher::context(
    env.event,
  ))))
}
