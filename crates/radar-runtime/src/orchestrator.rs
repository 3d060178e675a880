//! Flow orchestrator.
//!
//! [`FlowEngine::start`] validates the entry trigger, creates a
//! [`FlowExecution`] and spawns one task that walks the graph. The task
//! schedules nodes in waves: every node whose in-scope inbound edges are
//! resolved (with at least one taken) runs concurrently with the rest of
//! its wave, and results are applied in flow order. Loop nodes run their
//! body as nested scopes, one per item.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::{BoxFuture, join_all};
use radar_config::{LoopConfig, NodeDef, NodeKind};
use radar_resolver::{VariableContext, lookup};
use radar_trigger::Event;
use radar_workflow::FlowGraph;
use serde_json::{Value, json};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{NodeError, RuntimeError};
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::executor::{self, NodeEnv, Route};
use crate::log::{ExecutionStatus, FlowExecution, LoopTag, NodeLogEntry};
use crate::services::Services;

const CANCELLED: &str = "execution cancelled";

/// Starts flow executions.
///
/// Generic over `N: ExecutionNotifier` to allow different notification strategies.
/// Use `FlowEngine::new()` for an engine with no-op notifications,
/// or `FlowEngine::with_notifier()` to observe every state change.
pub struct FlowEngine<N: ExecutionNotifier = NoopNotifier> {
  services: Arc<Services>,
  notifier: Arc<N>,
}

impl<N: ExecutionNotifier> Clone for FlowEngine<N> {
  fn clone(&self) -> Self {
    Self {
      services: self.services.clone(),
      notifier: self.notifier.clone(),
    }
  }
}

impl FlowEngine<NoopNotifier> {
  pub fn new(services: Services) -> Self {
    Self::with_notifier(services, NoopNotifier)
  }
}

impl<N: ExecutionNotifier + 'static> FlowEngine<N> {
  pub fn with_notifier(services: Services, notifier: N) -> Self {
    Self {
      services: Arc::new(services),
      notifier: Arc::new(notifier),
    }
  }

  pub fn services(&self) -> &Services {
    &self.services
  }

  /// Start an execution of `flow` from `trigger_id`.
  ///
  /// Fails without creating an execution when the trigger is unknown, is
  /// not a trigger, or reaches a cycle.
  pub fn start(
    &self,
    flow: Arc<FlowGraph>,
    trigger_id: &str,
    event: Event,
  ) -> Result<ExecutionHandle, RuntimeError> {
    self.start_with_cancel(flow, trigger_id, event, CancellationToken::new())
  }

  /// Like [`start`](Self::start), cancelled when `cancel` is.
  pub fn start_with_cancel(
    &self,
    flow: Arc<FlowGraph>,
    trigger_id: &str,
    event: Event,
    cancel: CancellationToken,
  ) -> Result<ExecutionHandle, RuntimeError> {
    flow.validate_entry(trigger_id)?;

    let execution_id = uuid::Uuid::new_v4().to_string();
    let (sender, receiver) = watch::channel(FlowExecution::new(&execution_id, &flow.flow_id));

    let execution = Execution {
      id: execution_id.clone(),
      flow,
      trigger_id: trigger_id.to_string(),
      event,
      services: self.services.clone(),
      cancel: cancel.clone(),
      recorder: Recorder {
        sender,
        notifier: self.notifier.clone(),
      },
    };

    let task = tokio::spawn(execution.run());

    Ok(ExecutionHandle {
      execution_id,
      receiver,
      cancel,
      task,
    })
  }

  /// Start an execution and wait for it to finish.
  pub async fn execute(
    &self,
    flow: Arc<FlowGraph>,
    trigger_id: &str,
    event: Event,
  ) -> Result<FlowExecution, RuntimeError> {
    self.start(flow, trigger_id, event)?.wait().await
  }
}

/// A running execution.
pub struct ExecutionHandle {
  execution_id: String,
  receiver: watch::Receiver<FlowExecution>,
  cancel: CancellationToken,
  task: JoinHandle<FlowExecution>,
}

impl ExecutionHandle {
  pub fn id(&self) -> &str {
    &self.execution_id
  }

  /// A receiver that sees every update of the execution record.
  pub fn subscribe(&self) -> watch::Receiver<FlowExecution> {
    self.receiver.clone()
  }

  /// The execution record as of now.
  pub fn snapshot(&self) -> FlowExecution {
    self.receiver.borrow().clone()
  }

  /// Request cancellation. Running executors abort at their next check
  /// and no further wave starts.
  pub fn cancel(&self) {
    self.cancel.cancel();
  }

  pub fn cancellation_token(&self) -> &CancellationToken {
    &self.cancel
  }

  /// Wait for the execution to reach a terminal state.
  pub async fn wait(self) -> Result<FlowExecution, RuntimeError> {
    self.task.await.map_err(|e| RuntimeError::Join {
      message: e.to_string(),
    })
  }
}

/// Publishes execution state to watchers and the notifier.
struct Recorder<N> {
  sender: watch::Sender<FlowExecution>,
  notifier: Arc<N>,
}

impl<N: ExecutionNotifier> Recorder<N> {
  fn start(&self, trigger_id: &str) {
    let mut flow_id = String::new();
    let mut execution_id = String::new();
    self.sender.send_modify(|execution| {
      execution.status = ExecutionStatus::Running;
      flow_id = execution.flow_id.clone();
      execution_id = execution.id.clone();
    });
    self.notifier.notify(ExecutionEvent::ExecutionStarted {
      execution_id,
      flow_id,
      trigger_id: trigger_id.to_string(),
    });
  }

  fn append(&self, entry: NodeLogEntry) {
    let mut execution_id = String::new();
    self.sender.send_modify(|execution| {
      if entry.status.is_terminal() {
        if !execution.nodes_executed.contains(&entry.node_id) {
          execution.nodes_executed.push(entry.node_id.clone());
        }
        // Disabled nodes skip straight to a terminal entry.
        let started = execution.execution_log.iter().any(|e| {
          e.node_id == entry.node_id && e.loop_tag == entry.loop_tag && !e.status.is_terminal()
        });
        if !started {
          execution.current_node_id = Some(entry.node_id.clone());
        }
      } else {
        execution.current_node_id = Some(entry.node_id.clone());
      }
      execution.execution_log.push(entry.clone());
      execution_id = execution.id.clone();
    });
    self.notifier.notify(ExecutionEvent::EntryAppended {
      execution_id,
      entry,
    });
  }

  fn finish(&self, error: Option<String>) -> FlowExecution {
    self.sender.send_modify(|execution| {
      execution.status = match error {
        Some(_) => ExecutionStatus::Failed,
        None => ExecutionStatus::Completed,
      };
      execution.error_message = error.clone();
      execution.completed_at = Some(chrono::Utc::now());
    });

    let execution = self.sender.borrow().clone();
    let event = match error {
      Some(error) => ExecutionEvent::ExecutionFailed {
        execution_id: execution.id.clone(),
        error,
      },
      None => ExecutionEvent::ExecutionCompleted {
        execution_id: execution.id.clone(),
      },
    };
    self.notifier.notify(event);
    execution
  }
}

/// The nodes one scope schedules, and the loop pass it belongs to.
#[derive(Clone)]
struct Scope {
  members: HashSet<String>,
  loop_tag: Option<LoopTag>,
}

struct ScopeOutcome {
  context: VariableContext,
  /// First node failure in the scope.
  error: Option<String>,
}

/// What applying a finished node does to its scope.
struct NodeRun {
  result: Result<(Value, Route), String>,
  /// Loop body nodes the loop already ran.
  consumed: HashSet<String>,
  /// Outputs produced in a loop pass that the enclosing scope keeps.
  outputs: Vec<(String, Value)>,
  /// A failure inside a parallel loop pass. The loop itself completes.
  escalated: Option<String>,
}

impl NodeRun {
  fn completed(output: Value, route: Route) -> Self {
    Self {
      result: Ok((output, route)),
      consumed: HashSet::new(),
      outputs: Vec::new(),
      escalated: None,
    }
  }

  fn failed(error: impl Into<String>) -> Self {
    Self {
      result: Err(error.into()),
      consumed: HashSet::new(),
      outputs: Vec::new(),
      escalated: None,
    }
  }
}

struct Execution<N> {
  id: String,
  flow: Arc<FlowGraph>,
  trigger_id: String,
  event: Event,
  services: Arc<Services>,
  cancel: CancellationToken,
  recorder: Recorder<N>,
}

impl<N: ExecutionNotifier> Execution<N> {
  #[instrument(
    name = "flow_execution",
    skip(self),
    fields(
      execution_id = %self.id,
      flow_id = %self.flow.flow_id,
      trigger_id = %self.trigger_id,
    )
  )]
  async fn run(self) -> FlowExecution {
    self.recorder.start(&self.trigger_id);
    info!(execution_id = %self.id, "execution_started");

    let mut context = VariableContext::new();
    if let Some(activation) = self.activation().await {
      context = context.with_activation(activation);
    }

    let scope = Scope {
      members: self.flow.graph().reachable_from(&self.trigger_id),
      loop_tag: None,
    };
    let outcome = self.run_scope(scope, context).await;

    let error = if self.cancel.is_cancelled() {
      Some(CANCELLED.to_string())
    } else {
      outcome.error
    };

    match &error {
      Some(e) => warn!(execution_id = %self.id, error = %e, "execution_failed"),
      None => info!(execution_id = %self.id, "execution_completed"),
    }

    self.recorder.finish(error)
  }

  /// The activation carried by the event, else the one registered under
  /// the event's (or the trigger's) activation id.
  async fn activation(&self) -> Option<Value> {
    if let Some(activation) = self.event.activation() {
      return Some(activation.to_value());
    }

    let configured = match self.flow.node(&self.trigger_id).map(|n| &n.kind) {
      Some(NodeKind::Trigger(config)) => config.activation_id.clone(),
      _ => None,
    };
    let activation_id = self.event.text("activation_id").or(configured)?;

    let found = self.services.activations.get(&activation_id).await;
    if found.is_none() {
      debug!(execution_id = %self.id, activation_id = %activation_id, "activation_not_found");
    }
    found.map(|a| a.to_value())
  }

  /// Run a scope until no node is ready.
  fn run_scope<'a>(&'a self, scope: Scope, context: VariableContext) -> BoxFuture<'a, ScopeOutcome> {
    Box::pin(async move {
      let graph = self.flow.graph();
      let mut context = context;
      // edge index -> taken (true) or dead (false); absent means unresolved.
      let mut edges: HashMap<usize, bool> = HashMap::new();
      let mut done: HashSet<String> = HashSet::new();
      let mut error: Option<String> = None;

      let inbound = |node_id: &str| -> Vec<usize> {
        graph
          .incoming(node_id)
          .iter()
          .copied()
          .filter(|e| scope.members.contains(&graph.edge(*e).source))
          .collect()
      };
      let outbound = |node_id: &str| -> Vec<usize> {
        graph
          .outgoing(node_id)
          .iter()
          .copied()
          .filter(|e| scope.members.contains(&graph.edge(*e).target))
          .collect()
      };

      loop {
        if self.cancel.is_cancelled() {
          error.get_or_insert_with(|| CANCELLED.to_string());
          break;
        }

        // Nodes whose inbound edges all died never run and kill their own
        // outgoing edges.
        loop {
          let dead: Vec<String> = scope
            .members
            .iter()
            .filter(|id| !done.contains(*id))
            .filter(|id| {
              let incoming = inbound(id.as_str());
              !incoming.is_empty() && incoming.iter().all(|e| edges.get(e) == Some(&false))
            })
            .cloned()
            .collect();
          if dead.is_empty() {
            break;
          }
          for id in dead {
            for e in outbound(id.as_str()) {
              edges.insert(e, false);
            }
            done.insert(id);
          }
        }

        let mut ready: Vec<&NodeDef> = scope
          .members
          .iter()
          .filter(|id| !done.contains(*id))
          .filter(|id| {
            let incoming = inbound(id.as_str());
            incoming.iter().all(|e| edges.contains_key(e))
              && (incoming.is_empty() || incoming.iter().any(|e| edges.get(e) == Some(&true)))
          })
          .filter_map(|id| self.flow.node(id))
          .collect();
        if ready.is_empty() {
          break;
        }
        ready.sort_by_key(|node| self.flow.position(&node.id));

        debug!(
          execution_id = %self.id,
          ready_nodes = ?ready.iter().map(|n| n.id.as_str()).collect::<Vec<_>>(),
          "wave_dispatched"
        );

        let runs = ready.iter().map(|&node| {
          let incoming = inbound(node.id.as_str());
          let upstream: Vec<String> = if incoming.is_empty() {
            graph
              .upstream(&node.id)
              .into_iter()
              .filter(|id| context.contains(id))
              .map(str::to_string)
              .collect()
          } else {
            incoming
              .iter()
              .filter(|e| edges.get(e) == Some(&true))
              .map(|e| graph.edge(*e).source.clone())
              .collect()
          };
          self.run_node(node, &scope, &context, upstream)
        });
        let results = join_all(runs).await;

        for (node, run) in ready.into_iter().zip(results) {
          done.insert(node.id.clone());
          for id in &run.consumed {
            done.insert(id.clone());
          }
          for (id, output) in run.outputs {
            context.insert(id, output);
          }

          match run.result {
            Ok((output, route)) => {
              for e in outbound(node.id.as_str()) {
                let taken = match route {
                  Route::Continue => true,
                  Route::Stop => false,
                  Route::Branch(outcome) => handle_matches(graph.edge(e).handle.as_deref(), outcome),
                };
                edges.insert(e, taken);
              }
              context.insert(node.id.clone(), output);
            }
            Err(e) => {
              for edge in outbound(node.id.as_str()) {
                edges.insert(edge, false);
              }
              error.get_or_insert(e);
            }
          }
          if let Some(e) = run.escalated {
            error.get_or_insert(e);
          }
        }
      }

      ScopeOutcome { context, error }
    })
  }

  async fn run_node(
    &self,
    node: &NodeDef,
    scope: &Scope,
    context: &VariableContext,
    upstream: Vec<String>,
  ) -> NodeRun {
    if node.disabled {
      let output = match upstream.as_slice() {
        [single] => context.get(single).cloned().unwrap_or_else(|| json!({})),
        _ => json!({}),
      };
      let entry = NodeLogEntry::running(node, scope.loop_tag.clone()).completed(output.clone());
      self.recorder.append(entry);
      return NodeRun::completed(output, Route::Continue);
    }

    if let NodeKind::Loop(config) = &node.kind {
      return self.run_loop(node, config, scope, context).await;
    }

    let running = NodeLogEntry::running(node, scope.loop_tag.clone());
    self.recorder.append(running.clone());

    let env = NodeEnv {
      execution_id: &self.id,
      flow_id: &self.flow.flow_id,
      node,
      variables: context,
      upstream: &upstream,
      event: &self.event,
      services: &self.services,
      cancel: &self.cancel,
      timeout: self.services.timeout_for(node),
    };

    match executor::execute(&env).await {
      Ok(result) => {
        let entry = running
          .completed(result.output.clone())
          .with_warnings(result.warnings)
          .with_logs(result.logs);
        self.recorder.append(entry);
        NodeRun::completed(result.output, result.route)
      }
      Err(e) => {
        let message = e.to_string();
        self.recorder.append(running.failed(&message));
        NodeRun::failed(message)
      }
    }
  }

  /// Run the loop body once per item. The body is every node reachable
  /// from the loop's successors within the current scope.
  ///
  /// Sequential passes stop at the first failing pass, which fails the loop
  /// node. Parallel passes all run to the end; the loop node completes with
  /// the per-pass summary and the first failing pass (by iteration) is
  /// reported as the execution error.
  async fn run_loop(
    &self,
    node: &NodeDef,
    config: &LoopConfig,
    scope: &Scope,
    context: &VariableContext,
  ) -> NodeRun {
    let running = NodeLogEntry::running(node, scope.loop_tag.clone());
    self.recorder.append(running.clone());

    let body: HashSet<String> = self
      .flow
      .graph()
      .descendants(&node.id)
      .into_iter()
      .filter(|id| scope.members.contains(id))
      .collect();

    let resolved = match lookup(&config.loop_variable, context) {
      Ok(resolved) => resolved,
      Err(e) => {
        let message = NodeError::from(e).to_string();
        self.recorder.append(running.failed(&message));
        let mut run = NodeRun::failed(message);
        run.consumed = body;
        return run;
      }
    };
    let warnings: Vec<String> = resolved.warnings.iter().map(ToString::to_string).collect();

    let mut items = match resolved.value {
      Value::Array(items) => items,
      Value::Null => Vec::new(),
      other => vec![other],
    };
    if config.loop_once {
      items = vec![items.into_iter().next().unwrap_or(Value::Null)];
    }

    let pass = |iteration: usize| Scope {
      members: body.clone(),
      loop_tag: Some(LoopTag {
        loop_node_id: node.id.clone(),
        iteration,
      }),
    };

    debug!(
      execution_id = %self.id,
      node_id = %node.id,
      items = items.len(),
      parallel = config.loop_parallel,
      "loop_started"
    );

    let mut summaries = Vec::with_capacity(items.len());
    let mut outputs = Vec::new();
    let mut failure = None;
    let mut escalated = None;

    if config.loop_parallel {
      let passes = items.iter().enumerate().map(|(iteration, item)| {
        self.run_scope(pass(iteration), context.overlay(&config.item_alias, item.clone()))
      });
      let outcomes = join_all(passes).await;
      for (iteration, (item, outcome)) in items.iter().zip(outcomes).enumerate() {
        summaries.push(pass_summary(iteration, item, outcome.error.as_deref()));
        if let Some(error) = outcome.error
          && escalated.is_none()
        {
          escalated = Some(if self.cancel.is_cancelled() {
            CANCELLED.to_string()
          } else {
            format!("iteration {} failed: {}", iteration, error)
          });
        }
      }
    } else {
      for (iteration, item) in items.iter().enumerate() {
        let outcome = self
          .run_scope(pass(iteration), context.overlay(&config.item_alias, item.clone()))
          .await;
        summaries.push(pass_summary(iteration, item, outcome.error.as_deref()));

        if let Some(error) = outcome.error {
          failure = Some(if self.cancel.is_cancelled() {
            CANCELLED.to_string()
          } else {
            format!("iteration {} failed: {}", iteration, error)
          });
          break;
        }
        outputs = body
          .iter()
          .filter_map(|id| outcome.context.outputs().get(id).map(|v| (id.clone(), v.clone())))
          .collect();
      }
    }

    let mut run = match failure {
      Some(message) => {
        self
          .recorder
          .append(running.failed(&message).with_warnings(warnings));
        NodeRun::failed(message)
      }
      None => {
        let failed_count = summaries.iter().filter(|s| s["status"] == "failed").count();
        let output = json!({
          "iterations": summaries.len(),
          "failed_count": failed_count,
          "items": summaries,
        });
        self
          .recorder
          .append(running.completed(output.clone()).with_warnings(warnings));
        NodeRun::completed(output, Route::Continue)
      }
    };
    run.consumed = body;
    run.outputs = outputs;
    run.escalated = escalated;
    run
  }
}

/// Whether an edge leaving a condition is taken for `outcome`. Edges
/// without a `"true"`/`"false"` handle follow the true branch.
fn handle_matches(handle: Option<&str>, outcome: bool) -> bool {
  match handle.map(|h| h.trim().to_lowercase()).as_deref() {
    Some("false") => !outcome,
    _ => outcome,
  }
}

fn pass_summary(iteration: usize, item: &Value, error: Option<&str>) -> Value {
  let mut summary = json!({
    "iteration": iteration,
    "item": item,
    "status": if error.is_some() { "failed" } else { "completed" },
  });
  if let Some(error) = error {
    summary["error"] = json!(error);
  }
  summary
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_handle_matches() {
    assert!(handle_matches(Some("true"), true));
    assert!(!handle_matches(Some("true"), false));
    assert!(handle_matches(Some(" False "), false));
    assert!(!handle_matches(Some("false"), true));
    assert!(handle_matches(None, true));
    assert!(!handle_matches(None, false));
    assert!(!handle_matches(Some("other"), false));
  }

  #[test]
  fn test_pass_summary() {
    assert_eq!(
      pass_summary(0, &json!("a"), None),
      json!({ "iteration": 0, "item": "a", "status": "completed" })
    );
    assert_eq!(
      pass_summary(2, &json!(3), Some("boom"))["error"],
      json!("boom")
    );
  }
}
