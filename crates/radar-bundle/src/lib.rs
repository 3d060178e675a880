//! Radar Bundle
//!
//! Groups monitored events into a crisis bundle around a focal event. A
//! candidate joins the bundle when it shares at least one keyword
//! (case-insensitive) or one detected entity id with the focal event.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// An event considered for bundling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleCandidate {
  pub id: String,
  #[serde(default)]
  pub keywords: Vec<String>,
  /// Detected entity identifiers. Compared exactly.
  #[serde(default)]
  pub entities: Vec<String>,
}

impl BundleCandidate {
  pub fn new(id: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      ..Self::default()
    }
  }

  pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.keywords = keywords.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_entities<I, S>(mut self, entities: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.entities = entities.into_iter().map(Into::into).collect();
    self
  }
}

/// A bundle member and what tied it to the focal event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedEvent {
  pub id: String,
  /// Shared keywords, lowercased, in the candidate's order.
  pub shared_keywords: Vec<String>,
  pub shared_entities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrisisBundle {
  pub focal_id: String,
  pub related: Vec<RelatedEvent>,
}

impl CrisisBundle {
  /// Bundle `focal` with every related candidate not already bundled.
  pub fn build(
    focal: &BundleCandidate,
    candidates: &[BundleCandidate],
    already_bundled: &HashSet<String>,
  ) -> Self {
    let focal_keywords: HashSet<String> = focal.keywords.iter().map(|k| fold(k)).collect();
    let focal_entities: HashSet<&str> = focal.entities.iter().map(String::as_str).collect();

    let related = candidates
      .iter()
      .filter(|c| c.id != focal.id && !already_bundled.contains(&c.id))
      .filter_map(|candidate| {
        let shared_keywords = dedup(
          candidate
            .keywords
            .iter()
            .map(|k| fold(k))
            .filter(|k| focal_keywords.contains(k)),
        );
        let shared_entities = dedup(
          candidate
            .entities
            .iter()
            .filter(|e| focal_entities.contains(e.as_str()))
            .cloned(),
        );

        if shared_keywords.is_empty() && shared_entities.is_empty() {
          return None;
        }

        Some(RelatedEvent {
          id: candidate.id.clone(),
          shared_keywords,
          shared_entities,
        })
      })
      .collect();

    Self {
      focal_id: focal.id.clone(),
      related,
    }
  }

  pub fn ids(&self) -> impl Iterator<Item = &str> {
    self.related.iter().map(|r| r.id.as_str())
  }

  pub fn is_empty(&self) -> bool {
    self.related.is_empty()
  }
}

/// Candidates related to `focal`, in input order.
pub fn related<'a>(
  focal: &BundleCandidate,
  candidates: &'a [BundleCandidate],
  already_bundled: &HashSet<String>,
) -> Vec<&'a BundleCandidate> {
  let bundle = CrisisBundle::build(focal, candidates, already_bundled);
  let ids: HashSet<&str> = bundle.ids().collect();
  candidates
    .iter()
    .filter(|c| ids.contains(c.id.as_str()))
    .collect()
}

fn fold(keyword: &str) -> String {
  keyword.trim().to_lowercase()
}

fn dedup(items: impl Iterator<Item = String>) -> Vec<String> {
  let mut seen = HashSet::new();
  items
    .filter(|item| !item.is_empty() && seen.insert(item.clone()))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn focal() -> BundleCandidate {
    BundleCandidate::new("e0")
      .with_keywords(["Port Strike", "Santos"])
      .with_entities(["ent:union-42"])
  }

  fn candidates() -> Vec<BundleCandidate> {
    vec![
      BundleCandidate::new("e1").with_keywords(["weather"]),
      BundleCandidate::new("e2").with_keywords(["SANTOS", "santos"]),
      BundleCandidate::new("e3").with_entities(["ent:union-42"]),
      BundleCandidate::new("e4")
        .with_keywords(["port strike"])
        .with_entities(["ent:other"]),
      BundleCandidate::new("e0").with_keywords(["santos"]),
    ]
  }

  #[test]
  fn test_related_in_input_order() {
    let candidates = candidates();
    let ids: Vec<&str> = related(&focal(), &candidates, &HashSet::new())
      .iter()
      .map(|c| c.id.as_str())
      .collect();
    assert_eq!(ids, vec!["e2", "e3", "e4"]);
  }

  #[test]
  fn test_excludes_already_bundled() {
    let candidates = candidates();
    let bundled = HashSet::from(["e3".to_string()]);
    let ids: Vec<&str> = related(&focal(), &candidates, &bundled)
      .iter()
      .map(|c| c.id.as_str())
      .collect();
    assert_eq!(ids, vec!["e2", "e4"]);
  }

  #[test]
  fn test_bundle_reports_shared_terms() {
    let bundle = CrisisBundle::build(&focal(), &candidates(), &HashSet::new());

    assert_eq!(bundle.focal_id, "e0");
    assert_eq!(bundle.related[0].shared_keywords, vec!["santos"]);
    assert!(bundle.related[0].shared_entities.is_empty());
    assert_eq!(bundle.related[1].shared_entities, vec!["ent:union-42"]);
    assert_eq!(bundle.related[2].shared_keywords, vec!["port strike"]);
  }

  #[test]
  fn test_entities_are_case_sensitive() {
    let candidates = vec![BundleCandidate::new("e1").with_entities(["ENT:UNION-42"])];
    assert!(related(&focal(), &candidates, &HashSet::new()).is_empty());
  }

  #[test]
  fn test_serde_shape() {
    let bundle = CrisisBundle::build(&focal(), &candidates()[..2], &HashSet::new());
    assert_eq!(
      serde_json::to_value(&bundle).unwrap(),
      serde_json::json!({
        "focal_id": "e0",
        "related": [{ "id": "e2", "shared_keywords": ["santos"], "shared_entities": [] }]
      })
    );
  }
}
