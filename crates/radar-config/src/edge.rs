use serde::{Deserialize, Serialize};

/// A directed connection between two nodes.
///
/// `handle` discriminates between the outputs of a node that has more than
/// one, e.g. `"true"` / `"false"` for condition nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDef {
  pub source: String,
  pub target: String,
  #[serde(
    default,
    alias = "sourceHandle",
    skip_serializing_if = "Option::is_none"
  )]
  pub handle: Option<String>,
}

impl EdgeDef {
  pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
    Self {
      source: source.into(),
      target: target.into(),
      handle: None,
    }
  }

  pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
    self.handle = Some(handle.into());
    self
  }
}
