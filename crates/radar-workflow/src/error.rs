use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("node not found: {0}")]
  NodeNotFound(String),

  #[error("duplicate node id: {0}")]
  DuplicateNode(String),

  #[error("edge references unknown node: from={from}, to={to}")]
  InvalidEdge { from: String, to: String },

  #[error("flow has no trigger node")]
  NoTrigger,

  #[error("node '{0}' is not a trigger")]
  NotATrigger(String),

  #[error("cycle detected: {path}")]
  Cycle { path: String },
}
