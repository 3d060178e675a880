//! Template evaluation.

use std::fmt;

use serde_json::Value;

use crate::context::VariableContext;
use crate::error::TemplateError;
use crate::template::{Reference, ReferenceForm, Segment, Template};

/// Why a reference resolved to nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarningKind {
  UnknownNode,
  MissingField { field: String },
}

/// A reference that degraded to an empty value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveWarning {
  pub reference: String,
  pub kind: WarningKind,
}

impl fmt::Display for ResolveWarning {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.kind {
      WarningKind::UnknownNode => {
        write!(f, "unresolved reference {}: no output for node", self.reference)
      }
      WarningKind::MissingField { field } => write!(
        f,
        "unresolved reference {}: field '{}' not present",
        self.reference, field
      ),
    }
  }
}

/// The value a template produced, with any resolution gaps.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
  pub value: Value,
  pub warnings: Vec<ResolveWarning>,
}

impl Resolved {
  fn new(value: Value) -> Self {
    Self {
      value,
      warnings: Vec::new(),
    }
  }

  /// The value as text, the way it would be interpolated.
  pub fn into_string(self) -> String {
    stringify(&self.value)
  }
}

impl Template {
  /// Evaluate against a context.
  pub fn render(&self, ctx: &VariableContext) -> Resolved {
    if let Some(reference) = self.sole_reference() {
      let mut warnings = Vec::new();
      let value = match find(reference, ctx) {
        Ok(value) => value.clone(),
        Err(warning) => {
          warnings.push(warning);
          Value::String(String::new())
        }
      };
      return Resolved { value, warnings };
    }

    let mut text = String::new();
    let mut warnings = Vec::new();

    for segment in self.segments() {
      match segment {
        Segment::Literal(literal) => text.push_str(literal),
        Segment::Reference(reference) => match find(reference, ctx) {
          Ok(value) => text.push_str(&stringify(value)),
          Err(warning) => warnings.push(warning),
        },
      }
    }

    Resolved {
      value: Value::String(text),
      warnings,
    }
  }
}

/// Tokenize and evaluate a template string.
pub fn resolve(template: &str, ctx: &VariableContext) -> Result<Resolved, TemplateError> {
  Ok(Template::parse(template)?.render(ctx))
}

/// Resolve every string inside a JSON value, recursively. Keys are left as-is.
pub fn resolve_json(value: &Value, ctx: &VariableContext) -> Result<Resolved, TemplateError> {
  let mut warnings = Vec::new();
  let value = resolve_json_inner(value, ctx, &mut warnings)?;
  Ok(Resolved { value, warnings })
}

fn resolve_json_inner(
  value: &Value,
  ctx: &VariableContext,
  warnings: &mut Vec<ResolveWarning>,
) -> Result<Value, TemplateError> {
  match value {
    Value::String(s) => {
      let resolved = resolve(s, ctx)?;
      warnings.extend(resolved.warnings);
      Ok(resolved.value)
    }
    Value::Array(items) => items
      .iter()
      .map(|item| resolve_json_inner(item, ctx, warnings))
      .collect::<Result<Vec<_>, _>>()
      .map(Value::Array),
    Value::Object(map) => {
      let mut resolved = serde_json::Map::with_capacity(map.len());
      for (key, item) in map {
        resolved.insert(key.clone(), resolve_json_inner(item, ctx, warnings)?);
      }
      Ok(Value::Object(resolved))
    }
    other => Ok(other.clone()),
  }
}

/// Resolve a reference written without braces (`node-2.risk_score`), as
/// used by condition sources and loop variables. Input containing braces is
/// treated as a template.
pub fn lookup(reference: &str, ctx: &VariableContext) -> Result<Resolved, TemplateError> {
  if reference.contains('{') {
    return resolve(reference, ctx);
  }

  let reference = Reference::parse(reference, ReferenceForm::Double)?;
  Ok(match find(&reference, ctx) {
    Ok(value) => Resolved::new(value.clone()),
    Err(warning) => Resolved {
      value: Value::Null,
      warnings: vec![warning],
    },
  })
}

fn find<'a>(reference: &Reference, ctx: &'a VariableContext) -> Result<&'a Value, ResolveWarning> {
  let mut current = ctx.get(&reference.node_id).ok_or_else(|| ResolveWarning {
    reference: reference.display(),
    kind: WarningKind::UnknownNode,
  })?;

  for field in &reference.path {
    let next = match current {
      Value::Object(map) => map.get(field),
      Value::Array(items) => field.parse::<usize>().ok().and_then(|i| items.get(i)),
      _ => None,
    };

    current = next.ok_or_else(|| ResolveWarning {
      reference: reference.display(),
      kind: WarningKind::MissingField {
        field: field.clone(),
      },
    })?;
  }

  Ok(current)
}

/// Interpolation text for a value. Null becomes empty; objects and arrays
/// become compact JSON.
pub fn stringify(value: &Value) -> String {
  match value {
    Value::Null => String::new(),
    Value::String(s) => s.clone(),
    Value::Bool(b) => b.to_string(),
    Value::Number(n) => n.to_string(),
    other => other.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn ctx() -> VariableContext {
    let mut ctx = VariableContext::new().with_activation(json!({
      "briefing": "Monitor port strikes",
      "keywords": ["port", "strike"]
    }));
    ctx.insert("node-1", json!({ "field": "x", "items": [{ "title": "first" }] }));
    ctx.insert("node-2", json!({ "risk_score": 85, "urgent": true }));
    ctx
  }

  #[test]
  fn test_field_roundtrip() {
    let resolved = resolve("{{node-1.field}}", &ctx()).unwrap();
    assert_eq!(resolved.value, json!("x"));
    assert!(resolved.warnings.is_empty());
  }

  #[test]
  fn test_unknown_node_degrades_with_warning() {
    let resolved = resolve("{{ghost.field}}", &ctx()).unwrap();
    assert_eq!(resolved.value, json!(""));
    assert_eq!(resolved.warnings.len(), 1);
    assert_eq!(resolved.warnings[0].kind, WarningKind::UnknownNode);
    assert_eq!(resolved.warnings[0].reference, "{{ghost.field}}");
  }

  #[test]
  fn test_missing_field_in_text() {
    let resolved = resolve("Value: [{{node-1.nope}}]", &ctx()).unwrap();
    assert_eq!(resolved.value, json!("Value: []"));
    assert_eq!(
      resolved.warnings[0].kind,
      WarningKind::MissingField {
        field: "nope".to_string()
      }
    );
  }

  #[test]
  fn test_sole_reference_keeps_type() {
    let c = ctx();
    assert_eq!(resolve("{{node-2.risk_score}}", &c).unwrap().value, json!(85));
    assert_eq!(resolve("{{node-2.urgent}}", &c).unwrap().value, json!(true));
    assert_eq!(
      resolve("{node-2}", &c).unwrap().value,
      json!({ "risk_score": 85, "urgent": true })
    );
  }

  #[test]
  fn test_embedded_values_are_stringified() {
    let resolved = resolve("score={{node-2.risk_score}} all={node-2}", &ctx()).unwrap();
    assert_eq!(
      resolved.value,
      json!(r#"score=85 all={"risk_score":85,"urgent":true}"#)
    );
  }

  #[test]
  fn test_array_index_and_activation() {
    let c = ctx();
    assert_eq!(
      resolve("{{node-1.items.0.title}}", &c).unwrap().value,
      json!("first")
    );
    assert_eq!(
      resolve("{{activation.keywords[1]}}", &c).unwrap().value,
      json!("strike")
    );
  }

  #[test]
  fn test_resolve_json_recurses() {
    let body = json!({
      "q": "{{node-1.field}}",
      "score": "{{node-2.risk_score}}",
      "tags": ["{{node-1.items.0.title}}", 3]
    });
    let resolved = resolve_json(&body, &ctx()).unwrap();
    assert_eq!(
      resolved.value,
      json!({ "q": "x", "score": 85, "tags": ["first", 3] })
    );
  }

  #[test]
  fn test_lookup_bare_reference() {
    let c = ctx();
    assert_eq!(lookup("node-2.risk_score", &c).unwrap().value, json!(85));

    let missing = lookup("node-9.x", &c).unwrap();
    assert_eq!(missing.value, Value::Null);
    assert_eq!(missing.warnings.len(), 1);

    assert_eq!(lookup("{{node-1.field}}!", &c).unwrap().value, json!("x!"));
  }

  #[test]
  fn test_stringify() {
    assert_eq!(stringify(&Value::Null), "");
    assert_eq!(stringify(&json!(1.5)), "1.5");
    assert_eq!(stringify(&json!([1, "a"])), r#"[1,"a"]"#);
  }

  #[test]
  fn test_warning_display() {
    let resolved = resolve("{{node-1.nope}}", &ctx()).unwrap();
    assert_eq!(
      resolved.warnings[0].to_string(),
      "unresolved reference {{node-1.nope}}: field 'nope' not present"
    );
  }
}
