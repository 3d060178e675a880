//! Flow runner with channel-based triggering.
//!
//! The `FlowRunner` owns an mpsc channel for receiving events, matches each
//! event against the trigger nodes of its registered flows, and starts one
//! execution per match through a [`FlowEngine`].

use std::sync::Arc;

use radar_trigger::{Event, TriggerMatcher};
use radar_workflow::FlowGraph;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::RuntimeError;
use crate::events::{ExecutionNotifier, NoopNotifier};
use crate::orchestrator::FlowEngine;

/// A runner that executes flows in response to events.
///
/// # Usage
///
/// ```ignore
/// let runner = FlowRunner::new(engine, vec![Arc::new(flow)]);
///
/// // Get sender for event producers (uploads, crawlers, webhooks)
/// let sender = runner.sender();
///
/// // Start the execution loop
/// let cancel = CancellationToken::new();
/// runner.start(cancel).await?;
/// ```
pub struct FlowRunner<N: ExecutionNotifier = NoopNotifier> {
  sender: mpsc::Sender<Event>,
  receiver: mpsc::Receiver<Event>,
  engine: FlowEngine<N>,
  flows: Vec<Arc<FlowGraph>>,
  permits: Arc<Semaphore>,
}

impl<N: ExecutionNotifier + 'static> FlowRunner<N> {
  pub fn new(engine: FlowEngine<N>, flows: Vec<Arc<FlowGraph>>) -> Self {
    Self::with_buffer_size(engine, flows, 100)
  }

  /// Create a new runner with a custom buffer size.
  pub fn with_buffer_size(engine: FlowEngine<N>, flows: Vec<Arc<FlowGraph>>, buffer_size: usize) -> Self {
    let (sender, receiver) = mpsc::channel(buffer_size);
    let limit = engine.services().config.max_concurrent_executions.max(1);
    Self {
      sender,
      receiver,
      engine,
      flows,
      permits: Arc::new(Semaphore::new(limit)),
    }
  }

  /// Get a sender handle for submitting events.
  pub fn sender(&self) -> mpsc::Sender<Event> {
    self.sender.clone()
  }

  /// Submit an event through the runner's channel.
  pub async fn submit(&self, event: Event) -> Result<(), RuntimeError> {
    self
      .sender
      .send(event)
      .await
      .map_err(|_| RuntimeError::ChannelClosed)
  }

  pub fn flows(&self) -> &[Arc<FlowGraph>] {
    &self.flows
  }

  pub fn engine(&self) -> &FlowEngine<N> {
    &self.engine
  }

  /// Start the event loop.
  ///
  /// Runs until the cancellation token is triggered or the channel closes.
  /// At most `max_concurrent_executions` executions run at once; further
  /// matches wait for a free slot.
  pub async fn start(mut self, cancel: CancellationToken) -> Result<(), RuntimeError> {
    info!(flows = self.flows.len(), "flow_runner_started");

    loop {
      tokio::select! {
        _ = cancel.cancelled() => {
          info!("flow_runner_cancelled");
          break;
        }
        event = self.receiver.recv() => {
          let Some(event) = event else {
            info!("flow_runner_channel_closed");
            break;
          };
          self.dispatch(event, &cancel).await;
        }
      }
    }

    Ok(())
  }

  async fn dispatch(&self, event: Event, cancel: &CancellationToken) {
    for flow in &self.flows {
      let matches = TriggerMatcher::find_matches(flow.nodes(), &event);
      for found in matches {
        let permit = tokio::select! {
          permit = self.permits.clone().acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => return,
          },
          _ = cancel.cancelled() => return,
        };

        let handle = match self.engine.start_with_cancel(
          flow.clone(),
          &found.node_id,
          event.clone(),
          cancel.child_token(),
        ) {
          Ok(handle) => handle,
          Err(e) => {
            error!(flow_id = %flow.flow_id, trigger_id = %found.node_id, error = %e, "execution_rejected");
            continue;
          }
        };

        info!(
          flow_id = %flow.flow_id,
          trigger_id = %found.node_id,
          execution_id = %handle.id(),
          "execution_dispatched"
        );

        tokio::spawn(async move {
          let _permit = permit;
          match handle.wait().await {
            Ok(execution) => match execution.error_message {
              Some(error) => {
                warn!(execution_id = %execution.id, error = %error, "execution_failed");
              }
              None => {
                info!(
                  execution_id = %execution.id,
                  nodes_executed = execution.nodes_executed.len(),
                  "execution_completed"
                );
              }
            },
            Err(e) => {
              error!(error = %e, "execution_join_failed");
            }
          }
        });
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::events::{ChannelNotifier, ExecutionEvent};
  use crate::services::Services;
  use radar_config::{EngineConfig, FlowDef, NodeDef, NodeKind, TriggerConfig};
  use serde_json::json;
  use std::time::Duration;

  fn create_test_flow() -> Arc<FlowGraph> {
    let def = FlowDef {
      flow_id: "test-flow".to_string(),
      name: "Test Flow".to_string(),
      nodes: vec![NodeDef::new("t1", NodeKind::Trigger(TriggerConfig::default()))],
      edges: vec![],
    };
    Arc::new(FlowGraph::from_def(def).unwrap())
  }

  fn create_script_flow() -> Arc<FlowGraph> {
    let def: FlowDef = serde_json::from_value(json!({
      "flowId": "script-flow",
      "nodes": [
        { "id": "t1", "type": "trigger" },
        { "id": "s", "type": "action", "action": "script",
          "code": "local n = 0 for i = 1, 200000 do n = n + i end result = { n = n }" }
      ],
      "edges": [{ "source": "t1", "target": "s" }]
    }))
    .unwrap();
    Arc::new(FlowGraph::from_def(def).unwrap())
  }

  async fn next_event(events: &mut mpsc::UnboundedReceiver<ExecutionEvent>) -> ExecutionEvent {
    tokio::time::timeout(Duration::from_secs(10), events.recv())
      .await
      .expect("timed out waiting for an execution event")
      .expect("notifier channel closed")
  }

  fn create_test_runner() -> FlowRunner {
    FlowRunner::new(FlowEngine::new(Services::default()), vec![create_test_flow()])
  }

  #[tokio::test]
  async fn test_runner_creation() {
    let runner = create_test_runner();
    assert_eq!(runner.flows().len(), 1);
    assert_eq!(runner.flows()[0].flow_id, "test-flow");
  }

  #[tokio::test]
  async fn test_sender_cloning() {
    let runner = create_test_runner();

    let sender1 = runner.sender();
    let sender2 = runner.sender();

    assert!(!sender1.is_closed());
    assert!(!sender2.is_closed());
  }

  #[tokio::test]
  async fn test_submit_sends_to_channel() {
    let mut runner = create_test_runner();

    runner
      .submit(Event::new("manual_upload").with_field("content", "report"))
      .await
      .unwrap();

    let received = runner.receiver.recv().await.unwrap();
    assert_eq!(received.source, "manual_upload");
  }

  #[tokio::test]
  async fn test_cancellation() {
    let runner = create_test_runner();

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();

    let handle = tokio::spawn(async move { runner.start(cancel_clone).await });

    tokio::time::sleep(Duration::from_millis(10)).await;
    cancel.cancel();

    let result = handle.await.unwrap();
    assert!(result.is_ok());
  }

  #[tokio::test]
  async fn test_dispatches_matching_events_only() {
    let (notifier, mut events) = ChannelNotifier::channel();
    let engine = FlowEngine::with_notifier(Services::default(), notifier);
    let runner = FlowRunner::new(engine, vec![create_test_flow()]);
    let sender = runner.sender();

    let cancel = CancellationToken::new();
    let task = tokio::spawn(runner.start(cancel.clone()));

    sender.send(Event::new("webhook")).await.unwrap();
    sender
      .send(Event::new("manual_upload").with_field("content", "report"))
      .await
      .unwrap();

    let mut started = Vec::new();
    loop {
      match next_event(&mut events).await {
        ExecutionEvent::ExecutionStarted {
          flow_id, trigger_id, ..
        } => started.push((flow_id, trigger_id)),
        ExecutionEvent::ExecutionCompleted { .. } => break,
        ExecutionEvent::ExecutionFailed { error, .. } => panic!("execution failed: {}", error),
        ExecutionEvent::EntryAppended { .. } => {}
      }
    }
    assert_eq!(started, vec![("test-flow".to_string(), "t1".to_string())]);

    cancel.cancel();
    task.await.unwrap().unwrap();
    assert!(events.try_recv().is_err());
  }

  #[tokio::test]
  async fn test_concurrent_executions_bounded() {
    let mut config = EngineConfig::default();
    config.max_concurrent_executions = 1;
    let (notifier, mut events) = ChannelNotifier::channel();
    let engine = FlowEngine::with_notifier(Services::from_config(config), notifier);
    let runner = FlowRunner::new(engine, vec![create_script_flow()]);

    for _ in 0..3 {
      runner.submit(Event::new("manual_upload")).await.unwrap();
    }

    let cancel = CancellationToken::new();
    let task = tokio::spawn(runner.start(cancel.clone()));

    let mut in_flight = 0usize;
    let mut max_in_flight = 0usize;
    let mut finished = 0;
    while finished < 3 {
      match next_event(&mut events).await {
        ExecutionEvent::ExecutionStarted { .. } => {
          in_flight += 1;
          max_in_flight = max_in_flight.max(in_flight);
        }
        ExecutionEvent::ExecutionCompleted { .. } => {
          in_flight -= 1;
          finished += 1;
        }
        ExecutionEvent::ExecutionFailed { error, .. } => panic!("execution failed: {}", error),
        ExecutionEvent::EntryAppended { .. } => {}
      }
    }
    assert_eq!(max_in_flight, 1);

    cancel.cancel();
    task.await.unwrap().unwrap();
  }
}
