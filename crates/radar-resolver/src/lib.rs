//! Radar Resolver
//!
//! Resolves node-output references embedded in node configuration:
//!
//! - `{{nodeId.field.sub}}`: field access, dotted path, numeric segments
//!   index into arrays (`{{search.items.0.title}}` or `{{search.items[0].title}}`)
//! - `{{nodeId}}` / `{nodeId}`: the node's whole output
//!
//! Templates are tokenized into a [`Template`] of literal and reference
//! segments, then evaluated against a [`VariableContext`]. References that
//! cannot be resolved degrade to an empty string and produce a
//! [`ResolveWarning`] rather than an error; only malformed templates fail.
//!
//! When a template consists of exactly one reference, the referenced value
//! keeps its JSON type (number, bool, object, ...). Otherwise every
//! reference is stringified and concatenated with the surrounding text.

mod context;
mod error;
mod resolve;
mod template;

pub use context::{ACTIVATION_KEY, VariableContext};
pub use error::TemplateError;
pub use resolve::{
  ResolveWarning, Resolved, WarningKind, lookup, resolve, resolve_json, stringify,
};
pub use template::{Reference, ReferenceForm, Segment, Template};
