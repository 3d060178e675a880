use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An inbound event from ingestion (upload, webhook, monitor, scheduler).
///
/// Only `source` is fixed; everything else is carried as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
  #[serde(default)]
  pub source: String,
  #[serde(flatten)]
  pub fields: Map<String, Value>,
}

impl Event {
  pub fn new(source: impl Into<String>) -> Self {
    Self {
      source: source.into(),
      fields: Map::new(),
    }
  }

  pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
    self.fields.insert(key.into(), value.into());
    self
  }

  pub fn get(&self, key: &str) -> Option<&Value> {
    self.fields.get(key).filter(|v| !v.is_null())
  }

  /// A scalar field as text. Numbers are accepted for id-like fields.
  pub fn text(&self, key: &str) -> Option<String> {
    match self.get(key)? {
      Value::String(s) => Some(s.clone()),
      Value::Number(n) => Some(n.to_string()),
      _ => None,
    }
  }

  /// The activation briefing embedded in the event, if any.
  pub fn activation(&self) -> Option<Activation> {
    self
      .get("activation")
      .and_then(|v| serde_json::from_value(v.clone()).ok())
  }
}

/// A monitoring demand: what to look for and why.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Activation {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  #[serde(default)]
  pub briefing: String,
  #[serde(default)]
  pub keywords: Vec<String>,
  #[serde(default)]
  pub people_of_interest: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
}

impl Activation {
  pub fn to_value(&self) -> Value {
    serde_json::to_value(self).unwrap_or(Value::Null)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_event_flattens_fields() {
    let event: Event = serde_json::from_value(json!({
      "source": "manual_upload",
      "activation_id": "A1",
      "content": "report"
    }))
    .unwrap();

    assert_eq!(event.source, "manual_upload");
    assert_eq!(event.text("activation_id").as_deref(), Some("A1"));
    assert_eq!(event.get("content"), Some(&json!("report")));
    assert_eq!(
      serde_json::to_value(&event).unwrap(),
      json!({ "source": "manual_upload", "activation_id": "A1", "content": "report" })
    );
  }

  #[test]
  fn test_null_fields_are_absent() {
    let event = Event::new("webhook").with_field("title", Value::Null);
    assert!(event.get("title").is_none());
  }

  #[test]
  fn test_activation() {
    let event = Event::new("activation").with_field(
      "activation",
      json!({
        "briefing": "Port strikes in Santos",
        "keywords": ["port", "strike"],
        "people_of_interest": ["J. Silva"],
        "category": "logistics"
      }),
    );

    let activation = event.activation().unwrap();
    assert_eq!(activation.keywords, vec!["port", "strike"]);
    assert_eq!(activation.category.as_deref(), Some("logistics"));
    assert_eq!(activation.to_value()["briefing"], "Port strikes in Santos");
  }
}
