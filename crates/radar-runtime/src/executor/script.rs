use radar_config::ScriptConfig;
use radar_sandbox::ScriptBindings;
use serde_json::{Map, Value, json};

use super::{NodeEnv, NodeOutput};
use crate::error::NodeError;

/// Run the node's Lua code in a fresh sandbox on the blocking pool.
pub(super) async fn execute(config: &ScriptConfig, env: &NodeEnv<'_>) -> Result<NodeOutput, NodeError> {
  if config.code.trim().is_empty() {
    return Err(NodeError::config("script code is empty"));
  }

  let inputs: Map<String, Value> = env
    .variables
    .outputs()
    .iter()
    .map(|(id, output)| (id.clone(), output.clone()))
    .collect();

  let bindings = ScriptBindings {
    inputs: Value::Object(inputs),
    activation: env.variables.activation().cloned().unwrap_or(Value::Null),
  };

  let output = env
    .services
    .sandbox(env.timeout)
    .execute(&config.code, bindings, env.cancel.clone())
    .await?;

  let result = match output.result {
    Value::Object(_) => output.result,
    other => json!({ "result": other }),
  };

  Ok(NodeOutput::new(result).with_logs(output.logs))
}
