//! Radar Workflow
//!
//! This crate provides the validated flow representation for radar.
//! A [`FlowGraph`] is built from a [`radar_config::FlowDef`] and is ready
//! for execution.
//!
//! Key differences from `radar-config`:
//! - Node ids are unique and every edge references existing nodes
//! - At least one trigger node is present
//! - Adjacency (with edge handles) is precomputed for traversal
//!
//! A flow graph is never mutated by the engine.

mod error;
mod flow;
mod graph;

pub use error::WorkflowError;
pub use flow::FlowGraph;
pub use graph::Graph;
