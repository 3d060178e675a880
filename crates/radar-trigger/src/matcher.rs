use radar_config::{NodeDef, NodeKind, TriggerConfig};
use serde_json::{Map, Value};

use crate::event::Event;

/// Event fields copied into a trigger's context, when present and non-null.
pub const CONTEXT_FIELDS: &[&str] = &[
  "activation_id",
  "file_url",
  "file_name",
  "content",
  "url",
  "title",
  "payload",
];

/// A trigger node that accepted an event.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerMatch {
  pub node_id: String,
  pub context: Map<String, Value>,
}

/// Decides which trigger nodes an event starts.
pub struct TriggerMatcher;

impl TriggerMatcher {
  /// Whether `event` satisfies the trigger. Unset filters match anything.
  pub fn matches(config: &TriggerConfig, event: &Event) -> bool {
    if !config.source.accepts(&event.source) {
      return false;
    }

    if let Some(expected) = config.activation_id.as_deref().filter(|s| !s.is_empty())
      && event.text("activation_id").as_deref() != Some(expected)
    {
      return false;
    }

    if let Some(expected) = config.source_table.as_deref().filter(|s| !s.is_empty())
      && event.text("source_table").as_deref() != Some(expected)
    {
      return false;
    }

    keywords_match(&config.keywords, event)
  }

  /// The minimal context a matched event seeds the execution with.
  pub fn context(event: &Event) -> Map<String, Value> {
    CONTEXT_FIELDS
      .iter()
      .filter_map(|key| event.get(key).map(|v| (key.to_string(), v.clone())))
      .collect()
  }

  /// Every trigger node among `nodes` that accepts `event`, in node order.
  pub fn find_matches<'a>(
    nodes: impl IntoIterator<Item = &'a NodeDef>,
    event: &Event,
  ) -> Vec<TriggerMatch> {
    nodes
      .into_iter()
      .filter(|node| !node.disabled)
      .filter_map(|node| match &node.kind {
        NodeKind::Trigger(config) if Self::matches(config, event) => Some(TriggerMatch {
          node_id: node.id.clone(),
          context: Self::context(event),
        }),
        _ => None,
      })
      .collect()
  }
}

fn keywords_match(keywords: &[String], event: &Event) -> bool {
  let wanted: Vec<String> = keywords
    .iter()
    .map(|k| k.trim().to_lowercase())
    .filter(|k| !k.is_empty())
    .collect();

  if wanted.is_empty() {
    return true;
  }

  let haystacks: Vec<String> = ["content", "title"]
    .iter()
    .filter_map(|key| event.text(key))
    .map(|s| s.to_lowercase())
    .collect();

  let tags: Vec<String> = event
    .get("keywords")
    .and_then(Value::as_array)
    .map(|items| {
      items
        .iter()
        .filter_map(Value::as_str)
        .map(|s| s.trim().to_lowercase())
        .collect()
    })
    .unwrap_or_default();

  wanted
    .iter()
    .any(|k| haystacks.iter().any(|h| h.contains(k.as_str())) || tags.contains(k))
}

#[cfg(test)]
mod tests {
  use super::*;
  use radar_config::TriggerSource;
  use serde_json::json;

  fn config() -> TriggerConfig {
    TriggerConfig::default()
  }

  fn upload() -> Event {
    Event::new("manual_upload")
      .with_field("activation_id", "A1")
      .with_field("content", "report")
  }

  #[test]
  fn test_activation_scenario() {
    let config = TriggerConfig {
      activation_id: Some("A1".to_string()),
      ..config()
    };
    let event = upload();

    assert!(TriggerMatcher::matches(&config, &event));

    let context = TriggerMatcher::context(&event);
    assert_eq!(
      Value::Object(context),
      json!({ "activation_id": "A1", "content": "report" })
    );
  }

  #[test]
  fn test_idempotent() {
    let config = TriggerConfig {
      activation_id: Some("A1".to_string()),
      keywords: vec!["REPORT".to_string()],
      ..config()
    };
    let event = upload();

    assert_eq!(
      TriggerMatcher::matches(&config, &event),
      TriggerMatcher::matches(&config, &event)
    );
    assert_eq!(
      TriggerMatcher::context(&event),
      TriggerMatcher::context(&event)
    );
  }

  #[test]
  fn test_source_mismatch() {
    let config = TriggerConfig {
      source: TriggerSource::Webhook,
      ..config()
    };
    assert!(!TriggerMatcher::matches(&config, &upload()));
    assert!(TriggerMatcher::matches(&config, &Event::new("webhook")));
  }

  #[test]
  fn test_source_aliases() {
    assert!(TriggerMatcher::matches(&config(), &Event::new("manual")));
    let social = TriggerConfig {
      source: TriggerSource::SocialMonitor,
      ..config()
    };
    assert!(TriggerMatcher::matches(&social, &Event::new("social")));
  }

  #[test]
  fn test_activation_filter_rejects() {
    let config = TriggerConfig {
      activation_id: Some("A2".to_string()),
      ..config()
    };
    assert!(!TriggerMatcher::matches(&config, &upload()));
    assert!(!TriggerMatcher::matches(&config, &Event::new("manual_upload")));
  }

  #[test]
  fn test_keyword_filter() {
    let config = TriggerConfig {
      keywords: vec!["Strike".to_string(), "flood".to_string()],
      ..config()
    };

    let in_title = Event::new("manual_upload").with_field("title", "Dock STRIKE spreads");
    let in_tags = Event::new("manual_upload").with_field("keywords", json!(["flood"]));
    let neither = Event::new("manual_upload").with_field("content", "calm day");

    assert!(TriggerMatcher::matches(&config, &in_title));
    assert!(TriggerMatcher::matches(&config, &in_tags));
    assert!(!TriggerMatcher::matches(&config, &neither));
  }

  #[test]
  fn test_source_table_filter() {
    let config = TriggerConfig {
      source_table: Some("clippings".to_string()),
      ..config()
    };
    let event = Event::new("manual_upload").with_field("source_table", "clippings");

    assert!(TriggerMatcher::matches(&config, &event));
    assert!(!TriggerMatcher::matches(&config, &upload()));
  }

  #[test]
  fn test_context_skips_null_and_unknown() {
    let event = Event::new("webhook")
      .with_field("url", "https://example.com")
      .with_field("title", Value::Null)
      .with_field("irrelevant", 1);

    assert_eq!(
      Value::Object(TriggerMatcher::context(&event)),
      json!({ "url": "https://example.com" })
    );
  }

  #[test]
  fn test_find_matches() {
    let nodes = vec![
      NodeDef::new(
        "t1",
        NodeKind::Trigger(TriggerConfig {
          activation_id: Some("A1".to_string()),
          ..config()
        }),
      ),
      NodeDef::new(
        "t2",
        NodeKind::Trigger(TriggerConfig {
          source: TriggerSource::Webhook,
          ..config()
        }),
      ),
      NodeDef::new("t3", NodeKind::Trigger(config())).disabled(),
    ];

    let matches = TriggerMatcher::find_matches(&nodes, &upload());
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].node_id, "t1");
    assert_eq!(matches[0].context["content"], "report");
  }
}
