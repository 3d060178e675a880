use std::collections::HashMap;

use serde_json::Value;

/// Reserved context key holding the activation (briefing, keywords,
/// people of interest, category).
pub const ACTIVATION_KEY: &str = "activation";

/// Outputs accumulated during one execution, keyed by node id.
///
/// Loop passes read through an overlay created with [`VariableContext::overlay`],
/// which leaves the parent untouched.
#[derive(Debug, Clone, Default)]
pub struct VariableContext {
  outputs: HashMap<String, Value>,
  activation: Option<Value>,
}

impl VariableContext {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_activation(mut self, activation: Value) -> Self {
    self.activation = Some(activation);
    self
  }

  /// Record a node's output, replacing any earlier output of the same node.
  pub fn insert(&mut self, node_id: impl Into<String>, output: Value) {
    self.outputs.insert(node_id.into(), output);
  }

  /// Look up a node's output. `activation` resolves to the activation entry.
  pub fn get(&self, node_id: &str) -> Option<&Value> {
    match self.outputs.get(node_id) {
      Some(value) => Some(value),
      None if node_id == ACTIVATION_KEY => self.activation.as_ref(),
      None => None,
    }
  }

  pub fn contains(&self, node_id: &str) -> bool {
    self.get(node_id).is_some()
  }

  pub fn activation(&self) -> Option<&Value> {
    self.activation.as_ref()
  }

  /// All node outputs (excluding the activation entry).
  pub fn outputs(&self) -> &HashMap<String, Value> {
    &self.outputs
  }

  pub fn len(&self) -> usize {
    self.outputs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.outputs.is_empty()
  }

  /// A copy of this context with `alias` bound to `item`.
  pub fn overlay(&self, alias: &str, item: Value) -> Self {
    let mut child = self.clone();
    child.insert(alias, item);
    child
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_activation_is_reserved() {
    let ctx = VariableContext::new().with_activation(json!({ "category": "politics" }));
    assert_eq!(ctx.get("activation").unwrap()["category"], "politics");
    assert!(ctx.is_empty());
  }

  #[test]
  fn test_overlay_leaves_parent_untouched() {
    let mut parent = VariableContext::new();
    parent.insert("n1", json!({ "items": [1, 2] }));

    let child = parent.overlay("currentItem", json!(1));
    assert_eq!(child.get("currentItem"), Some(&json!(1)));
    assert!(child.contains("n1"));
    assert!(!parent.contains("currentItem"));
  }
}
