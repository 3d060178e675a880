//! Template tokenizer.

use crate::error::TemplateError;

/// How a reference was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceForm {
  /// `{{nodeId.field}}`
  Double,
  /// `{nodeId}`
  Single,
}

/// A reference to a node output, optionally narrowed by a field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
  pub node_id: String,
  pub path: Vec<String>,
  pub form: ReferenceForm,
}

impl Reference {
  /// Parse a bare `nodeId.field[0].sub` reference.
  pub fn parse(raw: &str, form: ReferenceForm) -> Result<Self, TemplateError> {
    let raw = raw.trim();
    let mut parts = Vec::new();

    for part in raw.split('.') {
      let part = part.trim();
      match part.find('[') {
        Some(open) if part.ends_with(']') => {
          if open > 0 {
            parts.push(part[..open].to_string());
          }
          for index in part[open + 1..part.len() - 1].split("][") {
            parts.push(index.to_string());
          }
        }
        _ => parts.push(part.to_string()),
      }
    }

    if parts.iter().any(|p| p.is_empty()) {
      return Err(TemplateError::InvalidReference {
        reference: raw.to_string(),
      });
    }

    let node_id = parts.remove(0);
    Ok(Self {
      node_id,
      path: parts,
      form,
    })
  }

  /// The reference as written in `{{...}}` form, used in warnings.
  pub fn display(&self) -> String {
    if self.path.is_empty() {
      format!("{{{{{}}}}}", self.node_id)
    } else {
      format!("{{{{{}.{}}}}}", self.node_id, self.path.join("."))
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  Literal(String),
  Reference(Reference),
}

/// A tokenized template.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Template {
  segments: Vec<Segment>,
}

impl Template {
  /// Tokenize a template string.
  ///
  /// A `{{` without a matching `}}` is an error. A single `{` only opens a
  /// reference when it encloses an identifier (`{node-1}`), so JSON text
  /// such as `{"a": 1}` is kept literally.
  pub fn parse(input: &str) -> Result<Self, TemplateError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < input.len() {
      let rest = &input[i..];

      if rest.starts_with("{{") {
        let end = rest[2..]
          .find("}}")
          .ok_or(TemplateError::Unterminated { position: i })?;
        let inner = &rest[2..2 + end];
        if inner.trim().is_empty() {
          return Err(TemplateError::EmptyReference { position: i });
        }
        flush(&mut literal, &mut segments);
        segments.push(Segment::Reference(Reference::parse(
          inner,
          ReferenceForm::Double,
        )?));
        i += 2 + end + 2;
        continue;
      }

      if rest.starts_with('{')
        && let Some(end) = rest[1..].find('}')
      {
        let inner = &rest[1..1 + end];
        if is_identifier(inner) {
          flush(&mut literal, &mut segments);
          segments.push(Segment::Reference(Reference::parse(
            inner,
            ReferenceForm::Single,
          )?));
          i += 1 + end + 1;
          continue;
        }
      }

      // Safe: `i` always sits on a char boundary.
      let ch = rest.chars().next().unwrap_or_default();
      literal.push(ch);
      i += ch.len_utf8();
    }

    flush(&mut literal, &mut segments);
    Ok(Self { segments })
  }

  pub fn segments(&self) -> &[Segment] {
    &self.segments
  }

  /// The reference making up the whole template, if any.
  pub fn sole_reference(&self) -> Option<&Reference> {
    match self.segments.as_slice() {
      [Segment::Reference(reference)] => Some(reference),
      _ => None,
    }
  }

  pub fn references(&self) -> impl Iterator<Item = &Reference> {
    self.segments.iter().filter_map(|s| match s {
      Segment::Reference(r) => Some(r),
      Segment::Literal(_) => None,
    })
  }

  pub fn is_literal(&self) -> bool {
    self.references().next().is_none()
  }
}

fn flush(literal: &mut String, segments: &mut Vec<Segment>) {
  if !literal.is_empty() {
    segments.push(Segment::Literal(std::mem::take(literal)));
  }
}

fn is_identifier(s: &str) -> bool {
  let mut chars = s.chars();
  match chars.next() {
    Some(c) if c.is_ascii_alphanumeric() || c == '_' => {}
    _ => return false,
  }
  chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn reference(node_id: &str, path: &[&str], form: ReferenceForm) -> Segment {
    Segment::Reference(Reference {
      node_id: node_id.to_string(),
      path: path.iter().map(|p| p.to_string()).collect(),
      form,
    })
  }

  #[test]
  fn test_parse_mixed() {
    let template = Template::parse("Score: {{node-2.risk_score}} for {node-1}").unwrap();

    assert_eq!(
      template.segments(),
      &[
        Segment::Literal("Score: ".to_string()),
        reference("node-2", &["risk_score"], ReferenceForm::Double),
        Segment::Literal(" for ".to_string()),
        reference("node-1", &[], ReferenceForm::Single),
      ]
    );
    assert!(template.sole_reference().is_none());
  }

  #[test]
  fn test_sole_reference() {
    let template = Template::parse("{{ search.items[0].title }}").unwrap();
    let sole = template.sole_reference().unwrap();
    assert_eq!(sole.node_id, "search");
    assert_eq!(sole.path, vec!["items", "0", "title"]);
  }

  #[test]
  fn test_json_braces_stay_literal() {
    let template = Template::parse(r#"{"query": "{{n1.q}}", "limit": 5}"#).unwrap();
    assert_eq!(template.references().count(), 1);
    assert_eq!(
      template.segments()[0],
      Segment::Literal(r#"{"query": ""#.to_string())
    );
  }

  #[test]
  fn test_empty_braces_and_plain_text() {
    let template = Template::parse("{} and plain text").unwrap();
    assert!(template.is_literal());
  }

  #[test]
  fn test_unterminated_is_error() {
    assert_eq!(
      Template::parse("hello {{n1.field"),
      Err(TemplateError::Unterminated { position: 6 })
    );
    assert_eq!(
      Template::parse("{{  }}"),
      Err(TemplateError::EmptyReference { position: 0 })
    );
    assert!(matches!(
      Template::parse("{{a..b}}"),
      Err(TemplateError::InvalidReference { .. })
    ));
  }

  #[test]
  fn test_unicode_literals() {
    let template = Template::parse("São Paulo: {{n1.city}}").unwrap();
    assert_eq!(
      template.segments()[0],
      Segment::Literal("São Paulo: ".to_string())
    );
  }

  #[test]
  fn test_display() {
    let r = Reference::parse("a.b.c", ReferenceForm::Double).unwrap();
    assert_eq!(r.display(), "{{a.b.c}}");
  }
}
