//! Radar Trigger
//!
//! Inbound [`Event`]s and the [`TriggerMatcher`] that decides whether a
//! trigger node accepts one. Matching is pure: the same event can be checked
//! against any number of flows without side effects.

mod event;
mod matcher;

pub use event::{Activation, Event};
pub use matcher::{CONTEXT_FIELDS, TriggerMatch, TriggerMatcher};
