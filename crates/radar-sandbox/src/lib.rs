//! Radar Sandbox
//!
//! Runs script-node code in an embedded Lua 5.4 interpreter with a narrow
//! capability surface. Scripts see exactly four things:
//!
//! - `inputs`: every node output available to the script, keyed by node id
//! - `context.activation`: the activation briefing, or nil
//! - `log(message)`: appends to a per-call log buffer
//! - `result`: assign the node output here (or `return` it)
//!
//! Only the `table`, `string`, `math` and `utf8` libraries are loaded, and
//! the loaders (`load`, `dofile`, `require`, ...) are removed. Every call gets
//! a fresh interpreter, so nothing leaks between runs.

mod error;
mod sandbox;

pub use error::SandboxError;
pub use sandbox::{ScriptBindings, ScriptOutput, ScriptSandbox, SandboxConfig};
