use std::collections::{HashMap, HashSet, VecDeque};

use radar_config::EdgeDef;

/// Graph structure for traversal and analysis.
///
/// Edges are referenced by their index in the flow's edge list so that
/// per-edge state (taken, dead) can be tracked during execution.
#[derive(Debug, Clone)]
pub struct Graph {
  edges: Vec<EdgeDef>,
  /// node_id -> indices of outgoing edges.
  outgoing: HashMap<String, Vec<usize>>,
  /// node_id -> indices of incoming edges.
  incoming: HashMap<String, Vec<usize>>,
}

impl Graph {
  /// Build a graph from node ids and edges.
  pub fn new<'a>(node_ids: impl IntoIterator<Item = &'a str>, edges: &[EdgeDef]) -> Self {
    let mut outgoing: HashMap<String, Vec<usize>> = HashMap::new();
    let mut incoming: HashMap<String, Vec<usize>> = HashMap::new();

    for node_id in node_ids {
      outgoing.entry(node_id.to_string()).or_default();
      incoming.entry(node_id.to_string()).or_default();
    }

    for (index, edge) in edges.iter().enumerate() {
      outgoing.entry(edge.source.clone()).or_default().push(index);
      incoming.entry(edge.target.clone()).or_default().push(index);
    }

    Self {
      edges: edges.to_vec(),
      outgoing,
      incoming,
    }
  }

  pub fn edge(&self, index: usize) -> &EdgeDef {
    &self.edges[index]
  }

  pub fn edges(&self) -> &[EdgeDef] {
    &self.edges
  }

  /// Indices of edges leaving a node.
  pub fn outgoing(&self, node_id: &str) -> &[usize] {
    self
      .outgoing
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Indices of edges entering a node.
  pub fn incoming(&self, node_id: &str) -> &[usize] {
    self
      .incoming
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Get downstream nodes for a given node.
  pub fn downstream(&self, node_id: &str) -> Vec<&str> {
    self
      .outgoing(node_id)
      .iter()
      .map(|i| self.edges[*i].target.as_str())
      .collect()
  }

  /// Get upstream nodes for a given node.
  pub fn upstream(&self, node_id: &str) -> Vec<&str> {
    self
      .incoming(node_id)
      .iter()
      .map(|i| self.edges[*i].source.as_str())
      .collect()
  }

  /// Every node reachable from `start` by following edges, including `start`.
  pub fn reachable_from(&self, start: &str) -> HashSet<String> {
    let mut seen = HashSet::from([start.to_string()]);
    let mut queue = VecDeque::from([start.to_string()]);

    while let Some(node_id) = queue.pop_front() {
      for next in self.downstream(&node_id) {
        if seen.insert(next.to_string()) {
          queue.push_back(next.to_string());
        }
      }
    }

    seen
  }

  /// Nodes reachable from the successors of `node_id`, excluding `node_id`
  /// itself unless a path leads back to it.
  pub fn descendants(&self, node_id: &str) -> HashSet<String> {
    let mut result = HashSet::new();
    for next in self.downstream(node_id) {
      if !result.contains(next) {
        result.extend(self.reachable_from(next));
      }
    }
    result
  }

  /// Find a cycle reachable from `start`, returned as the node path that
  /// closes it.
  pub fn find_cycle(&self, start: &str) -> Option<Vec<String>> {
    let mut done = HashSet::new();
    let mut stack = Vec::new();
    self.visit(start, &mut done, &mut stack)
  }

  fn visit(
    &self,
    node_id: &str,
    done: &mut HashSet<String>,
    stack: &mut Vec<String>,
  ) -> Option<Vec<String>> {
    if let Some(pos) = stack.iter().position(|id| id == node_id) {
      let mut path = stack[pos..].to_vec();
      path.push(node_id.to_string());
      return Some(path);
    }
    if done.contains(node_id) {
      return None;
    }

    stack.push(node_id.to_string());
    for next in self.downstream(node_id) {
      if let Some(path) = self.visit(next, done, stack) {
        return Some(path);
      }
    }
    stack.pop();
    done.insert(node_id.to_string());

    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn graph(edges: &[(&str, &str)]) -> Graph {
    let edges: Vec<EdgeDef> = edges.iter().map(|(s, t)| EdgeDef::new(*s, *t)).collect();
    Graph::new(["a", "b", "c", "d"], &edges)
  }

  #[test]
  fn test_upstream_and_downstream() {
    let g = graph(&[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")]);

    assert_eq!(g.downstream("a"), vec!["b", "c"]);
    assert_eq!(g.upstream("d"), vec!["b", "c"]);
    assert!(g.upstream("a").is_empty());
  }

  #[test]
  fn test_reachable_and_descendants() {
    let g = graph(&[("a", "b"), ("b", "c")]);

    let reachable = g.reachable_from("a");
    assert_eq!(reachable.len(), 3);
    assert!(!reachable.contains("d"));

    let descendants = g.descendants("a");
    assert!(descendants.contains("b") && descendants.contains("c"));
    assert!(!descendants.contains("a"));
  }

  #[test]
  fn test_find_cycle() {
    let acyclic = graph(&[("a", "b"), ("b", "c"), ("a", "c")]);
    assert!(acyclic.find_cycle("a").is_none());

    let cyclic = graph(&[("a", "b"), ("b", "c"), ("c", "b")]);
    let path = cyclic.find_cycle("a").unwrap();
    assert_eq!(path, vec!["b", "c", "b"]);
  }

  #[test]
  fn test_cycle_outside_reach_is_ignored() {
    let g = graph(&[("a", "b"), ("c", "d"), ("d", "c")]);
    assert!(g.find_cycle("a").is_none());
    assert!(g.find_cycle("c").is_some());
  }
}
