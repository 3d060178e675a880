use radar_config::{FieldType, SetConfig};
use radar_resolver::stringify;
use serde_json::{Map, Number, Value};

use super::{NodeEnv, NodeOutput, Resolution};
use crate::error::NodeError;

/// Build an object from the configured fields, optionally on top of an
/// upstream node's output.
pub(super) fn execute(config: &SetConfig, env: &NodeEnv<'_>) -> Result<NodeOutput, NodeError> {
  let mut resolution = Resolution::default();

  let mut output = if config.keep_upstream {
    upstream_base(config, env, &mut resolution)
  } else {
    Map::new()
  };

  for field in &config.fields {
    let key = field.key.trim();
    if key.is_empty() {
      return Err(NodeError::config("set field key is empty"));
    }
    let value = resolution.template(&field.value, env.variables)?;
    let value = coerce(value, field.field_type)
      .map_err(|message| NodeError::config(format!("field '{}': {}", key, message)))?;
    insert_path(&mut output, key, value);
  }

  Ok(NodeOutput::new(Value::Object(output)).with_warnings(resolution.into_warnings()))
}

fn upstream_base(config: &SetConfig, env: &NodeEnv<'_>, resolution: &mut Resolution) -> Map<String, Value> {
  let source = match (&config.upstream_node, env.upstream) {
    (Some(id), _) => Some(id.as_str()),
    (None, [single]) => Some(single.as_str()),
    (None, []) => None,
    (None, _) => {
      resolution.warn("keepUpstream with several predecessors needs upstreamNode");
      None
    }
  };

  match source.map(|id| (id, env.variables.get(id))) {
    Some((_, Some(Value::Object(map)))) => map.clone(),
    Some((id, Some(_))) => {
      resolution.warn(format!("upstream output of '{}' is not an object", id));
      Map::new()
    }
    Some((id, None)) => {
      resolution.warn(format!("no output for upstream node '{}'", id));
      Map::new()
    }
    None => Map::new(),
  }
}

fn coerce(value: Value, field_type: FieldType) -> Result<Value, String> {
  match field_type {
    FieldType::Auto => Ok(value),
    FieldType::String => Ok(Value::String(stringify(&value))),
    FieldType::Number => match value {
      Value::Number(_) => Ok(value),
      other => {
        let text = stringify(&other);
        let text = text.trim();
        if let Ok(n) = text.parse::<i64>() {
          return Ok(Value::Number(n.into()));
        }
        text
          .parse::<f64>()
          .ok()
          .and_then(Number::from_f64)
          .map(Value::Number)
          .ok_or_else(|| format!("'{}' is not a number", text))
      }
    },
    FieldType::Boolean => match value {
      Value::Bool(_) => Ok(value),
      Value::Null => Ok(Value::Bool(false)),
      Value::Number(n) => Ok(Value::Bool(n.as_f64().is_some_and(|n| n != 0.0))),
      other => match stringify(&other).trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(Value::Bool(true)),
        "false" | "no" | "0" | "" => Ok(Value::Bool(false)),
        text => Err(format!("'{}' is not a boolean", text)),
      },
    },
    FieldType::Json => match value {
      Value::String(raw) => {
        serde_json::from_str(&raw).map_err(|e| format!("invalid JSON: {}", e))
      }
      other => Ok(other),
    },
  }
}

/// Insert at a dotted path, creating (or replacing non-object) intermediates.
fn insert_path(target: &mut Map<String, Value>, path: &str, value: Value) {
  let mut segments: Vec<&str> = path.split('.').collect();
  let Some(last) = segments.pop() else {
    return;
  };

  let mut current = target;
  for segment in segments {
    let slot = current
      .entry(segment.to_string())
      .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
      *slot = Value::Object(Map::new());
    }
    let Value::Object(next) = slot else {
      return;
    };
    current = next;
  }
  current.insert(last.to_string(), value);
}
