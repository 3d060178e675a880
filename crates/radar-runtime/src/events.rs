//! Execution events and notifiers for observability.
//!
//! The orchestrator emits an event for every state change of a
//! [`FlowExecution`](crate::FlowExecution), including each log entry append.
//! Consumers decide what to do with them (persist, stream to a UI, log).

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::log::{NodeLogEntry, NodeStatus};

/// Events emitted during flow execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExecutionEvent {
  /// The execution moved from pending to running.
  ExecutionStarted {
    execution_id: String,
    flow_id: String,
    trigger_id: String,
  },

  /// A node log entry was appended.
  EntryAppended {
    execution_id: String,
    entry: NodeLogEntry,
  },

  /// The execution completed without a fatal node error.
  ExecutionCompleted { execution_id: String },

  /// The execution failed; `error` is its first fatal node error.
  ExecutionFailed { execution_id: String, error: String },
}

impl ExecutionEvent {
  pub fn execution_id(&self) -> &str {
    match self {
      ExecutionEvent::ExecutionStarted { execution_id, .. }
      | ExecutionEvent::EntryAppended { execution_id, .. }
      | ExecutionEvent::ExecutionCompleted { execution_id }
      | ExecutionEvent::ExecutionFailed { execution_id, .. } => execution_id,
    }
  }
}

/// Trait for receiving execution events.
///
/// Called synchronously from the orchestrator; implementations must not
/// block.
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// Sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded so a slow consumer never stalls an execution.
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }

  /// Create a notifier together with its receiving end.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<ExecutionEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self::new(sender), receiver)
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Receiver may have been dropped.
    let _ = self.sender.send(event);
  }
}

/// Writes every event as a structured `tracing` record.
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

impl ExecutionNotifier for TracingNotifier {
  fn notify(&self, event: ExecutionEvent) {
    match event {
      ExecutionEvent::ExecutionStarted {
        execution_id,
        flow_id,
        trigger_id,
      } => {
        info!(execution_id = %execution_id, flow_id = %flow_id, trigger_id = %trigger_id, "execution_started");
      }
      ExecutionEvent::EntryAppended {
        execution_id,
        entry,
      } => match entry.status {
        NodeStatus::Running => {
          info!(execution_id = %execution_id, node_id = %entry.node_id, node_type = %entry.node_type, "node_started");
        }
        NodeStatus::Completed => {
          info!(
            execution_id = %execution_id,
            node_id = %entry.node_id,
            duration_ms = entry.duration.unwrap_or_default(),
            warnings = entry.warnings.len(),
            "node_completed"
          );
        }
        NodeStatus::Failed => {
          warn!(
            execution_id = %execution_id,
            node_id = %entry.node_id,
            error = entry.error.as_deref().unwrap_or_default(),
            "node_failed"
          );
        }
      },
      ExecutionEvent::ExecutionCompleted { execution_id } => {
        info!(execution_id = %execution_id, "execution_completed");
      }
      ExecutionEvent::ExecutionFailed {
        execution_id,
        error,
      } => {
        warn!(execution_id = %execution_id, error = %error, "execution_failed");
      }
    }
  }
}

impl<N: ExecutionNotifier + ?Sized> ExecutionNotifier for std::sync::Arc<N> {
  fn notify(&self, event: ExecutionEvent) {
    (**self).notify(event)
  }
}
