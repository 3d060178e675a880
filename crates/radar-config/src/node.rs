use serde::{Deserialize, Serialize};

use crate::enums::{ConditionOperator, FieldType, HttpMethod, OutputFormat, TriggerSource};

/// A node as authored in the flow builder.
///
/// The node kind and its configuration are flattened into the node object
/// and discriminated by `type` (and `action` for action nodes):
///
/// ```json
/// { "id": "n2", "label": "Analyze", "type": "action", "action": "ai", "prompt": "..." }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDef {
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub label: Option<String>,
  #[serde(flatten)]
  pub kind: NodeKind,
  #[serde(default)]
  pub disabled: bool,
  /// Overrides the engine default timeout for this node's executor.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
}

impl NodeDef {
  pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
    Self {
      id: id.into(),
      label: None,
      kind,
      disabled: false,
      timeout_ms: None,
    }
  }

  pub fn with_label(mut self, label: impl Into<String>) -> Self {
    self.label = Some(label.into());
    self
  }

  pub fn disabled(mut self) -> Self {
    self.disabled = true;
    self
  }

  pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
    self.timeout_ms = Some(timeout_ms);
    self
  }

  /// Display label, falling back to the node id.
  pub fn display_label(&self) -> &str {
    self.label.as_deref().unwrap_or(&self.id)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
  /// Entry node activated by an inbound event.
  Trigger(TriggerConfig),
  /// Deduplication gate against the "seen" link registry.
  Linkcheck(LinkCheckConfig),
  Action(ActionKind),
  Condition(ConditionConfig),
  Loop(LoopConfig),
}

impl NodeKind {
  /// Type name recorded on execution log entries, e.g. `action/ai`.
  pub fn type_name(&self) -> &'static str {
    match self {
      NodeKind::Trigger(_) => "trigger",
      NodeKind::Linkcheck(_) => "trigger/linkcheck",
      NodeKind::Action(action) => match action {
        ActionKind::Ai(_) => "action/ai",
        ActionKind::Http(_) => "action/http",
        ActionKind::Script(_) => "action/script",
        ActionKind::Set(_) => "action/set",
        ActionKind::Publish(_) => "action/publish",
      },
      NodeKind::Condition(_) => "condition",
      NodeKind::Loop(_) => "loop",
    }
  }

  pub fn is_trigger(&self) -> bool {
    matches!(self, NodeKind::Trigger(_))
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionKind {
  Ai(AiConfig),
  Http(HttpConfig),
  Script(ScriptConfig),
  Set(SetConfig),
  Publish(PublishConfig),
}

/// Trigger node configuration. Unset filters match any event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerConfig {
  #[serde(default)]
  pub source: TriggerSource,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub activation_id: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub keywords: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub source_table: Option<String>,
  /// Informational; scheduling happens outside the engine.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cron: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkCheckConfig {
  /// Template resolving to the URL or content to deduplicate.
  pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiConfig {
  #[serde(default)]
  pub pre_prompt: String,
  pub prompt: String,
  #[serde(default)]
  pub output_format: OutputFormat,
  #[serde(default = "default_true")]
  pub include_activation: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub model: Option<String>,
  #[serde(default)]
  pub max_retries: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpConfig {
  pub url: String,
  #[serde(default)]
  pub method: HttpMethod,
  /// JSON object of header templates, or a template string holding one.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub headers: Option<serde_json::Value>,
  /// JSON body template; a string that does not parse as JSON is sent raw.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub body: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptConfig {
  pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetConfig {
  #[serde(default)]
  pub fields: Vec<SetField>,
  #[serde(default)]
  pub keep_upstream: bool,
  /// Upstream node whose output is kept; defaults to the single predecessor.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub upstream_node: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetField {
  pub key: String,
  pub value: String,
  #[serde(default, rename = "type")]
  pub field_type: FieldType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishConfig {
  #[serde(default)]
  pub source_nodes: Vec<String>,
  #[serde(default)]
  pub template: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub channel: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionConfig {
  /// A `nodeId.field` reference or a template.
  pub source: String,
  pub operator: ConditionOperator,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub value: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopConfig {
  /// A `nodeId.field` reference to the collection to iterate.
  pub loop_variable: String,
  #[serde(default = "default_item_alias")]
  pub item_alias: String,
  #[serde(default)]
  pub loop_once: bool,
  #[serde(default)]
  pub loop_parallel: bool,
}

fn default_true() -> bool {
  true
}

fn default_item_alias() -> String {
  "currentItem".to_string()
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_deserialize_action_node() {
    let node: NodeDef = serde_json::from_value(json!({
      "id": "node-2",
      "label": "Analyze",
      "type": "action",
      "action": "ai",
      "prePrompt": "You are an analyst.",
      "prompt": "Rate {{node-1.content}}",
      "outputFormat": "json"
    }))
    .unwrap();

    assert_eq!(node.id, "node-2");
    assert!(!node.disabled);
    match node.kind {
      NodeKind::Action(ActionKind::Ai(ai)) => {
        assert_eq!(ai.output_format, OutputFormat::Json);
        assert!(ai.include_activation);
        assert_eq!(ai.max_retries, 0);
      }
      other => panic!("unexpected kind: {:?}", other),
    }
  }

  #[test]
  fn test_deserialize_trigger_with_defaults() {
    let node: NodeDef = serde_json::from_value(json!({
      "id": "node-1",
      "type": "trigger",
      "activation_id": "A1"
    }))
    .unwrap();

    let NodeKind::Trigger(config) = node.kind else {
      panic!("expected trigger");
    };
    assert_eq!(config.source, TriggerSource::ManualUpload);
    assert_eq!(config.activation_id.as_deref(), Some("A1"));
    assert!(config.keywords.is_empty());
  }

  #[test]
  fn test_deserialize_loop_defaults_alias() {
    let node: NodeDef = serde_json::from_value(json!({
      "id": "loop",
      "type": "loop",
      "loopVariable": "node-1.items",
      "disabled": true
    }))
    .unwrap();

    assert!(node.disabled);
    let NodeKind::Loop(config) = node.kind else {
      panic!("expected loop");
    };
    assert_eq!(config.item_alias, "currentItem");
    assert!(!config.loop_once);
    assert!(!config.loop_parallel);
  }

  #[test]
  fn test_type_names() {
    let condition = NodeKind::Condition(ConditionConfig {
      source: "a.b".to_string(),
      operator: ConditionOperator::Exists,
      value: None,
    });
    assert_eq!(condition.type_name(), "condition");

    let script = NodeKind::Action(ActionKind::Script(ScriptConfig {
      code: "result = 1".to_string(),
    }));
    assert_eq!(script.type_name(), "action/script");
  }

  #[test]
  fn test_roundtrip_preserves_tags() {
    let node = NodeDef::new(
      "set",
      NodeKind::Action(ActionKind::Set(SetConfig {
        fields: vec![SetField {
          key: "score".to_string(),
          value: "{{a.score}}".to_string(),
          field_type: FieldType::Number,
        }],
        keep_upstream: false,
        upstream_node: None,
      })),
    );

    let value = serde_json::to_value(&node).unwrap();
    assert_eq!(value["type"], "action");
    assert_eq!(value["action"], "set");
    assert_eq!(value["fields"][0]["type"], "number");
  }
}
