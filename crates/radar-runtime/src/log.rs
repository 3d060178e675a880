//! Execution state and the per-node log.
//!
//! A [`FlowExecution`] is the live record of one run. The orchestrator
//! appends [`NodeLogEntry`]s as nodes start and finish; a node that runs
//! more than once (inside a loop) or that has both a running and a terminal
//! entry appears several times. Consumers should group by node id and use
//! [`ExecutionLog::authoritative`] rather than rely on index order.

use chrono::{DateTime, Utc};
use radar_config::NodeDef;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
  Pending,
  Running,
  Completed,
  Failed,
}

impl ExecutionStatus {
  pub fn is_terminal(&self) -> bool {
    matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
  Running,
  Completed,
  Failed,
}

impl NodeStatus {
  pub fn is_terminal(&self) -> bool {
    !matches!(self, NodeStatus::Running)
  }
}

/// Marks an entry as produced inside one pass of a loop.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopTag {
  pub loop_node_id: String,
  pub iteration: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeLogEntry {
  pub node_id: String,
  pub node_type: String,
  pub node_label: String,
  pub status: NodeStatus,
  pub started_at: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub completed_at: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  /// Milliseconds between start and completion.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub duration: Option<u64>,
  /// Unresolved references encountered while preparing the node.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub warnings: Vec<String>,
  /// Lines written by a script's `log()`.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub logs: Vec<String>,
  #[serde(rename = "loop", default, skip_serializing_if = "Option::is_none")]
  pub loop_tag: Option<LoopTag>,
}

impl NodeLogEntry {
  /// A `running` entry for a node starting now.
  pub fn running(node: &NodeDef, loop_tag: Option<LoopTag>) -> Self {
    Self {
      node_id: node.id.clone(),
      node_type: node.kind.type_name().to_string(),
      node_label: node.display_label().to_string(),
      status: NodeStatus::Running,
      started_at: Utc::now(),
      completed_at: None,
      output: None,
      error: None,
      duration: None,
      warnings: Vec::new(),
      logs: Vec::new(),
      loop_tag,
    }
  }

  /// The terminal counterpart of a running entry.
  pub fn completed(&self, output: Value) -> Self {
    let mut entry = self.finish(NodeStatus::Completed);
    entry.output = Some(output);
    entry
  }

  pub fn failed(&self, error: impl Into<String>) -> Self {
    let mut entry = self.finish(NodeStatus::Failed);
    entry.error = Some(error.into());
    entry
  }

  pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
    self.warnings = warnings;
    self
  }

  pub fn with_logs(mut self, logs: Vec<String>) -> Self {
    self.logs = logs;
    self
  }

  fn finish(&self, status: NodeStatus) -> Self {
    let completed_at = Utc::now();
    let duration = (completed_at - self.started_at).num_milliseconds().max(0) as u64;
    Self {
      status,
      completed_at: Some(completed_at),
      duration: Some(duration),
      ..self.clone()
    }
  }
}

/// The live record of one flow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowExecution {
  pub id: String,
  pub flow_id: String,
  pub status: ExecutionStatus,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub current_node_id: Option<String>,
  /// Node ids in the order they first reached a terminal state.
  pub nodes_executed: Vec<String>,
  pub execution_log: Vec<NodeLogEntry>,
  pub started_at: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub completed_at: Option<DateTime<Utc>>,
  /// The first fatal node error.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error_message: Option<String>,
}

impl FlowExecution {
  pub fn new(id: impl Into<String>, flow_id: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      flow_id: flow_id.into(),
      status: ExecutionStatus::Pending,
      current_node_id: None,
      nodes_executed: Vec::new(),
      execution_log: Vec::new(),
      started_at: Utc::now(),
      completed_at: None,
      error_message: None,
    }
  }

  /// Every entry for a node, in append order.
  pub fn entries_for<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a NodeLogEntry> {
    self
      .execution_log
      .iter()
      .filter(move |e| e.node_id == node_id)
  }
}

/// Reading rules for an append-only node log.
pub trait ExecutionLog {
  /// The entry that represents a node's state: its latest terminal entry,
  /// or its latest entry when none is terminal yet.
  fn latest(&self, node_id: &str) -> Option<&NodeLogEntry>;

  /// One representative entry per node and loop pass, in order of first
  /// appearance, preferring terminal entries over running ones.
  fn authoritative(&self) -> Vec<&NodeLogEntry>;
}

impl ExecutionLog for [NodeLogEntry] {
  fn latest(&self, node_id: &str) -> Option<&NodeLogEntry> {
    let mut entries = self.iter().rev().filter(|e| e.node_id == node_id);
    let newest = entries.clone().next();
    entries.find(|e| e.status.is_terminal()).or(newest)
  }

  fn authoritative(&self) -> Vec<&NodeLogEntry> {
    let mut picked: Vec<&NodeLogEntry> = Vec::new();

    for entry in self {
      let slot = picked
        .iter_mut()
        .find(|p| p.node_id == entry.node_id && p.loop_tag == entry.loop_tag);

      match slot {
        Some(current) => {
          if entry.status.is_terminal() || !current.status.is_terminal() {
            *current = entry;
          }
        }
        None => picked.push(entry),
      }
    }

    picked
  }
}
