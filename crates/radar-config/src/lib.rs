//! Radar Config
//!
//! This crate contains the serializable configuration types for radar:
//! flow definitions as authored in the flow builder, and the engine
//! configuration (timeouts, sandbox limits, AI provider, HTTP policy).
//!
//! Flow definitions are loaded from:
//! - JSON files (via the CLI)
//! - The flow definition store (as JSON blobs)
//!
//! `radar-workflow` validates a [`FlowDef`] into an executable graph.

mod edge;
mod engine;
mod enums;
mod flow;
mod node;

pub use edge::EdgeDef;
pub use engine::{AiProviderConfig, EngineConfig, HttpPolicyConfig, SandboxLimits, TimeoutConfig};
pub use enums::{ConditionOperator, FieldType, HttpMethod, OutputFormat, TriggerSource};
pub use flow::FlowDef;
pub use node::{
  ActionKind, AiConfig, ConditionConfig, HttpConfig, LinkCheckConfig, LoopConfig, NodeDef,
  NodeKind, PublishConfig, ScriptConfig, SetConfig, SetField, TriggerConfig,
};
