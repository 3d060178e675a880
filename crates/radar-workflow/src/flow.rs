use std::collections::HashMap;

use radar_config::{EdgeDef, FlowDef, NodeDef, NodeKind};
use serde::Serialize;

use crate::error::WorkflowError;
use crate::graph::Graph;

/// A validated, immutable flow ready for execution.
#[derive(Debug, Clone, Serialize)]
pub struct FlowGraph {
  pub flow_id: String,
  pub name: String,
  nodes: Vec<NodeDef>,
  #[serde(skip)]
  index: HashMap<String, usize>,
  #[serde(skip)]
  graph: Graph,
}

impl FlowGraph {
  /// Validate a flow definition.
  pub fn from_def(def: FlowDef) -> Result<Self, WorkflowError> {
    let mut index = HashMap::with_capacity(def.nodes.len());
    for (position, node) in def.nodes.iter().enumerate() {
      if index.insert(node.id.clone(), position).is_some() {
        return Err(WorkflowError::DuplicateNode(node.id.clone()));
      }
    }

    for edge in &def.edges {
      if !index.contains_key(&edge.source) || !index.contains_key(&edge.target) {
        return Err(WorkflowError::InvalidEdge {
          from: edge.source.clone(),
          to: edge.target.clone(),
        });
      }
    }

    if !def.nodes.iter().any(|n| n.kind.is_trigger()) {
      return Err(WorkflowError::NoTrigger);
    }

    let graph = Graph::new(def.nodes.iter().map(|n| n.id.as_str()), &def.edges);

    Ok(Self {
      flow_id: def.flow_id,
      name: def.name,
      nodes: def.nodes,
      index,
      graph,
    })
  }

  /// Nodes in definition order.
  pub fn nodes(&self) -> &[NodeDef] {
    &self.nodes
  }

  pub fn edges(&self) -> &[EdgeDef] {
    self.graph.edges()
  }

  /// Get a node by ID.
  pub fn node(&self, node_id: &str) -> Option<&NodeDef> {
    self.index.get(node_id).map(|i| &self.nodes[*i])
  }

  /// Position of a node in definition order; used to apply concurrent
  /// results deterministically.
  pub fn position(&self, node_id: &str) -> Option<usize> {
    self.index.get(node_id).copied()
  }

  pub fn graph(&self) -> &Graph {
    &self.graph
  }

  /// All trigger nodes, in definition order.
  pub fn triggers(&self) -> impl Iterator<Item = &NodeDef> {
    self.nodes.iter().filter(|n| n.kind.is_trigger())
  }

  /// Check that `trigger_id` can start an execution: it exists, is a
  /// trigger, and no cycle is reachable from it.
  pub fn validate_entry(&self, trigger_id: &str) -> Result<&NodeDef, WorkflowError> {
    let node = self
      .node(trigger_id)
      .ok_or_else(|| WorkflowError::NodeNotFound(trigger_id.to_string()))?;

    if !matches!(node.kind, NodeKind::Trigger(_)) {
      return Err(WorkflowError::NotATrigger(trigger_id.to_string()));
    }

    if let Some(path) = self.graph.find_cycle(trigger_id) {
      return Err(WorkflowError::Cycle {
        path: path.join(" -> "),
      });
    }

    Ok(node)
  }
}

impl TryFrom<FlowDef> for FlowGraph {
  type Error = WorkflowError;

  fn try_from(def: FlowDef) -> Result<Self, Self::Error> {
    Self::from_def(def)
  }
}
