//! Node executors.
//!
//! One executor per [`NodeKind`] variant, selected by exhaustive match.
//! Every call runs under the node's timeout and the execution's
//! cancellation token. Loop nodes are scheduled by the orchestrator and
//! never reach [`execute`].

mod ai;
mod condition;
mod http;
mod linkcheck;
mod publish;
mod script;
mod set;
mod trigger;

use std::time::Duration;

use radar_config::{ActionKind, NodeDef, NodeKind};
use radar_resolver::{VariableContext, lookup, resolve, resolve_json, stringify};
use radar_trigger::Event;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::NodeError;
use crate::services::Services;

pub use condition::evaluate as evaluate_condition;

/// Which outgoing edges a finished node enables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
  /// Every outgoing edge.
  Continue,
  /// Only edges whose handle matches the outcome.
  Branch(bool),
  /// No outgoing edge.
  Stop,
}

/// A successful node result.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOutput {
  pub output: Value,
  pub route: Route,
  pub warnings: Vec<String>,
  pub logs: Vec<String>,
}

impl NodeOutput {
  pub fn new(output: Value) -> Self {
    Self {
      output,
      route: Route::Continue,
      warnings: Vec::new(),
      logs: Vec::new(),
    }
  }

  pub fn with_route(mut self, route: Route) -> Self {
    self.route = route;
    self
  }

  pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
    self.warnings = warnings;
    self
  }

  pub fn with_logs(mut self, logs: Vec<String>) -> Self {
    self.logs = logs;
    self
  }
}

/// What an executor can see while running one node.
pub struct NodeEnv<'a> {
  pub execution_id: &'a str,
  pub flow_id: &'a str,
  pub node: &'a NodeDef,
  pub variables: &'a VariableContext,
  /// Predecessors whose edge into this node was taken.
  pub upstream: &'a [String],
  pub event: &'a Event,
  pub services: &'a Services,
  pub cancel: &'a CancellationToken,
  pub timeout: Duration,
}

/// Run a node's executor.
pub async fn execute(env: &NodeEnv<'_>) -> Result<NodeOutput, NodeError> {
  if env.cancel.is_cancelled() {
    return Err(NodeError::Cancelled);
  }

  let timeout_ms = env.timeout.as_millis() as u64;
  tokio::select! {
    result = tokio::time::timeout(env.timeout, dispatch(env)) => {
      result.unwrap_or(Err(NodeError::Timeout { timeout_ms }))
    }
    _ = env.cancel.cancelled() => Err(NodeError::Cancelled),
  }
}

async fn dispatch(env: &NodeEnv<'_>) -> Result<NodeOutput, NodeError> {
  match &env.node.kind {
    NodeKind::Trigger(_) => trigger::execute(env),
    NodeKind::Linkcheck(config) => linkcheck::execute(config, env).await,
    NodeKind::Action(action) => match action {
      ActionKind::Ai(config) => ai::execute(config, env).await,
      ActionKind::Http(config) => http::execute(config, env).await,
      ActionKind::Script(config) => script::execute(config, env).await,
      ActionKind::Set(config) => set::execute(config, env),
      ActionKind::Publish(config) => publish::execute(config, env).await,
    },
    NodeKind::Condition(config) => condition::execute(config, env),
    NodeKind::Loop(_) => Err(NodeError::config(
      "loop nodes are driven by the orchestrator",
    )),
  }
}

/// Resolves templates for one node and collects the warnings.
#[derive(Debug, Default)]
pub(crate) struct Resolution {
  warnings: Vec<String>,
}

impl Resolution {
  pub(crate) fn template(&mut self, template: &str, ctx: &VariableContext) -> Result<Value, NodeError> {
    let resolved = resolve(template, ctx)?;
    self.extend(&resolved.warnings);
    Ok(resolved.value)
  }

  pub(crate) fn text(&mut self, template: &str, ctx: &VariableContext) -> Result<String, NodeError> {
    Ok(stringify(&self.template(template, ctx)?))
  }

  pub(crate) fn json(&mut self, value: &Value, ctx: &VariableContext) -> Result<Value, NodeError> {
    let resolved = resolve_json(value, ctx)?;
    self.extend(&resolved.warnings);
    Ok(resolved.value)
  }

  pub(crate) fn lookup(&mut self, reference: &str, ctx: &VariableContext) -> Result<Value, NodeError> {
    let resolved = lookup(reference, ctx)?;
    self.extend(&resolved.warnings);
    Ok(resolved.value)
  }

  pub(crate) fn warn(&mut self, message: impl Into<String>) {
    self.warnings.push(message.into());
  }

  pub(crate) fn into_warnings(self) -> Vec<String> {
    self.warnings
  }

  fn extend(&mut self, warnings: &[radar_resolver::ResolveWarning]) {
    self
      .warnings
      .extend(warnings.iter().map(ToString::to_string));
  }
}
