use serde::{Deserialize, Serialize};

/// The kind of inbound event a trigger node reacts to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
  #[default]
  #[serde(alias = "manual")]
  ManualUpload,
  Webhook,
  #[serde(alias = "social")]
  SocialMonitor,
  Activation,
  #[serde(alias = "cron")]
  Schedule,
}

impl TriggerSource {
  /// Whether an event declaring `source` belongs to this trigger kind.
  pub fn accepts(&self, source: &str) -> bool {
    let source = source.trim().to_ascii_lowercase();
    match self {
      TriggerSource::ManualUpload => matches!(source.as_str(), "manual_upload" | "manual"),
      TriggerSource::Webhook => source == "webhook",
      TriggerSource::SocialMonitor => matches!(source.as_str(), "social_monitor" | "social"),
      TriggerSource::Activation => source == "activation",
      TriggerSource::Schedule => matches!(source.as_str(), "schedule" | "cron"),
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      TriggerSource::ManualUpload => "manual_upload",
      TriggerSource::Webhook => "webhook",
      TriggerSource::SocialMonitor => "social_monitor",
      TriggerSource::Activation => "activation",
      TriggerSource::Schedule => "schedule",
    }
  }
}

/// How an AI node interprets the provider's completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
  #[default]
  #[serde(alias = "get")]
  Get,
  #[serde(alias = "post")]
  Post,
  #[serde(alias = "put")]
  Put,
  #[serde(alias = "patch")]
  Patch,
  #[serde(alias = "delete")]
  Delete,
  #[serde(alias = "head")]
  Head,
}

impl HttpMethod {
  pub fn as_str(&self) -> &'static str {
    match self {
      HttpMethod::Get => "GET",
      HttpMethod::Post => "POST",
      HttpMethod::Put => "PUT",
      HttpMethod::Patch => "PATCH",
      HttpMethod::Delete => "DELETE",
      HttpMethod::Head => "HEAD",
    }
  }
}

/// Target type of a `set` node field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
  /// Keep whatever type the resolver produced.
  #[default]
  Auto,
  String,
  Number,
  Boolean,
  Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
  Exists,
  NotEmpty,
  Equals,
  NotEquals,
  Contains,
  GreaterThan,
  LessThan,
}

impl ConditionOperator {
  pub fn as_str(&self) -> &'static str {
    match self {
      ConditionOperator::Exists => "exists",
      ConditionOperator::NotEmpty => "not_empty",
      ConditionOperator::Equals => "equals",
      ConditionOperator::NotEquals => "not_equals",
      ConditionOperator::Contains => "contains",
      ConditionOperator::GreaterThan => "greater_than",
      ConditionOperator::LessThan => "less_than",
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_trigger_source_accepts_aliases() {
    assert!(TriggerSource::ManualUpload.accepts("manual_upload"));
    assert!(TriggerSource::ManualUpload.accepts("Manual"));
    assert!(TriggerSource::SocialMonitor.accepts("social"));
    assert!(TriggerSource::Schedule.accepts("cron"));
    assert!(!TriggerSource::Webhook.accepts("manual_upload"));
  }

  #[test]
  fn test_http_method_accepts_lowercase() {
    let method: HttpMethod = serde_json::from_str("\"post\"").unwrap();
    assert_eq!(method, HttpMethod::Post);
    assert_eq!(serde_json::to_string(&method).unwrap(), "\"POST\"");
  }
}
