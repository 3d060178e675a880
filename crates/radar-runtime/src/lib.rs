//! Radar Runtime
//!
//! Executes flows: node executors, the orchestrator that walks the graph,
//! the live execution log, and a channel-driven runner.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        FlowRunner                           │
//! │  - owns mpsc channel of events                              │
//! │  - matches events against trigger nodes                     │
//! │  - bounds concurrent executions with a semaphore            │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        FlowEngine                           │
//! │  - start(flow, trigger, event) → ExecutionHandle            │
//! │  - one task per execution, waves of ready nodes             │
//! │  - loop passes as nested scopes                             │
//! │  - FlowExecution published over watch + ExecutionNotifier   │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        executor                             │
//! │  - one executor per node kind, under timeout + cancellation │
//! │  - Services: AI, HTTP, link registry, publish sink          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use radar_runtime::{FlowEngine, Services};
//!
//! let engine = FlowEngine::new(Services::from_config(config));
//! let handle = engine.start(Arc::new(flow), "node-1", event)?;
//!
//! let mut updates = handle.subscribe();
//! let execution = handle.wait().await?;
//! ```

mod error;
mod events;
mod log;
mod orchestrator;
mod runner;

pub mod executor;
pub mod services;

pub use error::{NodeError, RuntimeError};
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier, TracingNotifier};
pub use executor::{NodeOutput, Route, evaluate_condition};
pub use log::{
  ExecutionLog, ExecutionStatus, FlowExecution, LoopTag, NodeLogEntry, NodeStatus,
};
pub use orchestrator::{ExecutionHandle, FlowEngine};
pub use runner::FlowRunner;
pub use services::Services;
