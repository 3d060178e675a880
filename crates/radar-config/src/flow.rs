use serde::{Deserialize, Serialize};

use crate::edge::EdgeDef;
use crate::node::NodeDef;

/// A flow as persisted by the flow builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowDef {
  #[serde(alias = "id", alias = "flow_id")]
  pub flow_id: String,
  #[serde(default)]
  pub name: String,
  pub nodes: Vec<NodeDef>,
  #[serde(default)]
  pub edges: Vec<EdgeDef>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::node::NodeKind;
  use serde_json::json;

  #[test]
  fn test_deserialize_flow() {
    let def: FlowDef = serde_json::from_value(json!({
      "flowId": "risk",
      "name": "Risk triage",
      "nodes": [
        { "id": "n1", "type": "trigger" },
        { "id": "n2", "type": "condition", "source": "n1.score", "operator": "exists" }
      ],
      "edges": [{ "source": "n1", "target": "n2", "sourceHandle": "true" }]
    }))
    .unwrap();

    assert_eq!(def.flow_id, "risk");
    assert_eq!(def.name, "Risk triage");
    assert_eq!(def.nodes.len(), 2);
    assert!(matches!(def.nodes[0].kind, NodeKind::Trigger(_)));
    assert_eq!(def.edges[0].handle.as_deref(), Some("true"));
  }

  #[test]
  fn test_flow_id_aliases() {
    for key in ["flowId", "flow_id", "id"] {
      let mut raw = json!({ "nodes": [] });
      raw[key] = json!("f1");
      let def: FlowDef = serde_json::from_value(raw).unwrap();
      assert_eq!(def.flow_id, "f1", "{key}");
      assert!(def.edges.is_empty());
    }
  }

  #[test]
  fn test_missing_flow_id_rejected() {
    let err = serde_json::from_value::<FlowDef>(json!({ "nodes": [] })).unwrap_err();
    assert!(err.to_string().contains("flowId"));
  }

  #[test]
  fn test_serializes_camel_case() {
    let def = FlowDef {
      flow_id: "f1".to_string(),
      name: String::new(),
      nodes: Vec::new(),
      edges: Vec::new(),
    };
    let value = serde_json::to_value(&def).unwrap();
    assert_eq!(value["flowId"], json!("f1"));
  }
}
