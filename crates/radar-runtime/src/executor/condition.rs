use radar_config::{ConditionConfig, ConditionOperator};
use radar_resolver::stringify;
use serde_json::{Value, json};

use super::{NodeEnv, NodeOutput, Resolution, Route};
use crate::error::NodeError;

/// Evaluate the condition. A false result is a normal outcome that routes
/// to the `"false"` edge.
pub(super) fn execute(config: &ConditionConfig, env: &NodeEnv<'_>) -> Result<NodeOutput, NodeError> {
  let mut resolution = Resolution::default();

  let source = config.source.trim();
  if source.is_empty() {
    return Err(NodeError::config("condition source is empty"));
  }
  let source_value = resolution.lookup(source, env.variables)?;

  let expected = match &config.value {
    Some(Value::String(template)) => resolution.template(template, env.variables)?,
    Some(other) => resolution.json(other, env.variables)?,
    None => Value::Null,
  };

  let result = evaluate(config.operator, &source_value, &expected);

  Ok(
    NodeOutput::new(json!({
      "result": result,
      "sourceValue": source_value,
    }))
    .with_route(Route::Branch(result))
    .with_warnings(resolution.into_warnings()),
  )
}

/// Apply `operator` to a resolved source and the expected value.
///
/// Numeric when both sides read as numbers; ordering comparisons between
/// non-numbers are false.
pub fn evaluate(operator: ConditionOperator, source: &Value, expected: &Value) -> bool {
  match operator {
    ConditionOperator::Exists => !source.is_null(),
    ConditionOperator::NotEmpty => match source {
      Value::Null => false,
      Value::String(s) => !s.trim().is_empty(),
      Value::Array(items) => !items.is_empty(),
      Value::Object(map) => !map.is_empty(),
      Value::Bool(_) | Value::Number(_) => true,
    },
    ConditionOperator::Equals => equals(source, expected),
    ConditionOperator::NotEquals => !equals(source, expected),
    ConditionOperator::Contains => contains(source, expected),
    ConditionOperator::GreaterThan => compare(source, expected).is_some_and(|o| o.is_gt()),
    ConditionOperator::LessThan => compare(source, expected).is_some_and(|o| o.is_lt()),
  }
}

fn number(value: &Value) -> Option<f64> {
  match value {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
    _ => None,
  }
}

fn compare(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
  number(a)?.partial_cmp(&number(b)?)
}

fn equals(a: &Value, b: &Value) -> bool {
  if let (Some(x), Some(y)) = (number(a), number(b)) {
    return x == y;
  }
  match (a, b) {
    (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => a == b,
    _ => stringify(a) == stringify(b),
  }
}

fn contains(haystack: &Value, needle: &Value) -> bool {
  match haystack {
    Value::String(s) => {
      let needle = stringify(needle).to_lowercase();
      !needle.is_empty() && s.to_lowercase().contains(&needle)
    }
    Value::Array(items) => items.iter().any(|item| equals(item, needle)),
    Value::Object(map) => map.contains_key(&stringify(needle)),
    _ => false,
  }
}
