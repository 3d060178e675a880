//! Radar KV Host
//!
//! [`KvStore`] is the storage seam for state shared across executions, with
//! [`MemoryKvStore`] as the in-process implementation. On top of it sits the
//! [`LinkRegistry`] used by link-check triggers to decide whether a URL or
//! piece of content has been seen before.

mod error;
mod registry;
mod store;

pub use error::KvError;
pub use registry::{KvLinkRegistry, LinkCheck, LinkRegistry, link_key, normalize};
pub use store::{KvFuture, KvStore, MemoryKvStore};
