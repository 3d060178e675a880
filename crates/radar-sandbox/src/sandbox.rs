//! Interpreter setup and execution.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use mlua::{
  DeserializeOptions, HookTriggers, Lua, LuaOptions, LuaSerdeExt, SerializeOptions, StdLib,
  VmState,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::SandboxError;

/// Base-library globals stripped from every interpreter. `pcall` would let a
/// script catch the hook's interrupt and keep running.
const REMOVED_GLOBALS: &[&str] = &[
  "dofile",
  "loadfile",
  "load",
  "loadstring",
  "require",
  "collectgarbage",
  "print",
  "pcall",
  "xpcall",
];

/// Longest pattern accepted by the `string` matching functions.
const MAX_PATTERN_LEN: usize = 256;
/// Longest subject accepted by the `string` matching functions.
const MAX_SUBJECT_LEN: usize = 1024 * 1024;
/// Worst-case backtracking steps allowed for patterns with several
/// repetition items. Pattern matching runs in C where the instruction hook
/// cannot interrupt it.
const MAX_MATCH_STEPS: f64 = 1e9;

/// Wraps the pattern functions so every call passes through `guard` first.
/// `string` is also the string metatable's `__index`, so method calls are
/// covered too.
const GUARD_PATTERNS: &str = r#"
local guard = ...
local find, match, gmatch, gsub = string.find, string.match, string.gmatch, string.gsub
string.find = function(s, p, init, plain)
  if not plain then guard(s, p) end
  return find(s, p, init, plain)
end
string.match = function(s, p, init)
  guard(s, p)
  return match(s, p, init)
end
string.gmatch = function(s, p, init)
  guard(s, p)
  return gmatch(s, p, init)
end
string.gsub = function(s, p, repl, n)
  guard(s, p)
  return gsub(s, p, repl, n)
end
"#;

const RUNNING: u8 = 0;
const TIMED_OUT: u8 = 1;
const CANCELLED: u8 = 2;

/// Limits applied to each script run.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
  /// Wall-clock budget for a single run.
  pub timeout: Duration,
  /// Interpreter memory ceiling in bytes.
  pub memory_limit: usize,
  /// VM instructions between deadline checks.
  pub hook_interval: u32,
}

impl Default for SandboxConfig {
  fn default() -> Self {
    Self {
      timeout: Duration::from_secs(5),
      memory_limit: 32 * 1024 * 1024,
      hook_interval: 1000,
    }
  }
}

impl SandboxConfig {
  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }
}

/// Values injected into the script's globals.
#[derive(Debug, Clone, Default)]
pub struct ScriptBindings {
  /// Node outputs keyed by node id.
  pub inputs: Value,
  /// Activation briefing exposed as `context.activation`.
  pub activation: Value,
}

/// What a script produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptOutput {
  pub result: Value,
  pub logs: Vec<String>,
}

/// Runs scripts in throwaway Lua interpreters.
#[derive(Debug, Clone, Default)]
pub struct ScriptSandbox {
  config: SandboxConfig,
}

impl ScriptSandbox {
  pub fn new(config: SandboxConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &SandboxConfig {
    &self.config
  }

  /// Run a script on the blocking pool.
  ///
  /// Cancelling the token interrupts the interpreter at its next hook check;
  /// the call still waits for the interpreter to unwind before returning.
  pub async fn execute(
    &self,
    code: &str,
    bindings: ScriptBindings,
    cancel: CancellationToken,
  ) -> Result<ScriptOutput, SandboxError> {
    let sandbox = self.clone();
    let code = code.to_string();
    let interrupt = InterruptOnDrop(Arc::new(AtomicBool::new(false)));
    let flag = interrupt.0.clone();

    let mut handle = tokio::task::spawn_blocking(move || sandbox.run(&code, &bindings, &flag));

    let joined = tokio::select! {
      joined = &mut handle => joined,
      _ = cancel.cancelled() => {
        interrupt.0.store(true, Ordering::SeqCst);
        handle.await
      }
    };

    joined.map_err(|e| SandboxError::script(format!("script task failed: {}", e)))?
  }

  /// Run a script on the current thread.
  ///
  /// `cancel` is polled by the instruction hook alongside the deadline.
  pub fn run(
    &self,
    code: &str,
    bindings: &ScriptBindings,
    cancel: &Arc<AtomicBool>,
  ) -> Result<ScriptOutput, SandboxError> {
    let started = Instant::now();
    let lua = Lua::new_with(
      StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::UTF8,
      LuaOptions::default(),
    )
    .map_err(|e| SandboxError::setup(e.to_string()))?;

    lua
      .set_memory_limit(self.config.memory_limit)
      .map_err(|e| SandboxError::setup(e.to_string()))?;
    restrict(&lua).map_err(|e| SandboxError::setup(e.to_string()))?;

    let logs = Arc::new(Mutex::new(Vec::new()));
    bind(&lua, bindings, logs.clone()).map_err(|e| SandboxError::conversion(e.to_string()))?;

    let interrupt = Arc::new(AtomicU8::new(RUNNING));
    let deadline = started + self.config.timeout;
    {
      let interrupt = interrupt.clone();
      let cancel = cancel.clone();
      lua.set_hook(
        HookTriggers::new().every_nth_instruction(self.config.hook_interval.max(1)),
        move |_lua, _debug| {
          if cancel.load(Ordering::Relaxed) {
            interrupt.store(CANCELLED, Ordering::SeqCst);
            return Err(mlua::Error::runtime("script cancelled"));
          }
          if Instant::now() >= deadline {
            interrupt.store(TIMED_OUT, Ordering::SeqCst);
            return Err(mlua::Error::runtime("script timed out"));
          }
          Ok(VmState::Continue)
        },
      );
    }

    let evaluated = lua.load(code).set_name("script").eval::<mlua::Value>();

    match interrupt.load(Ordering::SeqCst) {
      TIMED_OUT => {
        let timeout_ms = self.config.timeout.as_millis() as u64;
        warn!(timeout_ms, "script_timed_out");
        return Err(SandboxError::Timeout { timeout_ms });
      }
      CANCELLED => return Err(SandboxError::Cancelled),
      _ => {}
    }

    // The hook cannot fire inside a long C call, so check the clock again.
    if Instant::now() >= deadline {
      let timeout_ms = self.config.timeout.as_millis() as u64;
      warn!(
        timeout_ms,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "script_overran_deadline"
      );
      return Err(SandboxError::Timeout { timeout_ms });
    }

    let returned = evaluated.map_err(describe)?;
    let assigned: mlua::Value = lua
      .globals()
      .get("result")
      .map_err(|e| SandboxError::conversion(e.to_string()))?;
    let result = match assigned {
      mlua::Value::Nil => returned,
      value => value,
    };
    let result = to_json(&lua, result)?;

    let logs = std::mem::take(&mut *logs.lock().unwrap_or_else(|e| e.into_inner()));
    debug!(
      elapsed_ms = started.elapsed().as_millis() as u64,
      log_lines = logs.len(),
      "script_completed"
    );

    Ok(ScriptOutput { result, logs })
  }
}

/// Stops the interpreter when the caller stops waiting for it, e.g. when
/// an outer timeout drops the `execute` future.
struct InterruptOnDrop(Arc<AtomicBool>);

impl Drop for InterruptOnDrop {
  fn drop(&mut self) {
    self.0.store(true, Ordering::SeqCst);
  }
}

fn restrict(lua: &Lua) -> mlua::Result<()> {
  let globals = lua.globals();
  for name in REMOVED_GLOBALS {
    globals.set(*name, mlua::Value::Nil)?;
  }

  let string: mlua::Table = globals.get("string")?;
  string.set("dump", mlua::Value::Nil)?;

  let guard = lua.create_function(|_, (subject, pattern): (mlua::Value, mlua::Value)| {
    let (Some(subject_len), Some(pattern)) = (text_len(&subject), text(&pattern)) else {
      // Let the wrapped function raise its own argument error.
      return Ok(());
    };
    check_pattern(subject_len, &pattern).map_err(mlua::Error::runtime)
  })?;
  lua.load(GUARD_PATTERNS).set_name("guard").call::<()>(guard)?;

  // Same bindings, same random sequence.
  lua.load("math.randomseed(0)").exec()
}

/// Bytes of a value the string library would coerce to a string.
fn text_len(value: &mlua::Value) -> Option<usize> {
  match value {
    mlua::Value::String(s) => Some(s.as_bytes().len()),
    other => text(other).map(|bytes| bytes.len()),
  }
}

fn text(value: &mlua::Value) -> Option<Vec<u8>> {
  match value {
    mlua::Value::String(s) => Some(s.as_bytes().to_vec()),
    mlua::Value::Integer(i) => Some(i.to_string().into_bytes()),
    mlua::Value::Number(n) => Some(n.to_string().into_bytes()),
    _ => None,
  }
}

/// Reject pattern calls whose worst-case backtracking could outlive the
/// deadline.
fn check_pattern(subject_len: usize, pattern: &[u8]) -> Result<(), String> {
  if pattern.len() > MAX_PATTERN_LEN {
    return Err(format!("pattern longer than {} bytes", MAX_PATTERN_LEN));
  }
  if subject_len > MAX_SUBJECT_LEN {
    return Err(format!("pattern subject longer than {} bytes", MAX_SUBJECT_LEN));
  }

  let (anchored, repeats) = scan_pattern(pattern);
  if repeats < 2 {
    return Ok(());
  }
  let n = subject_len as f64 + 1.0;
  let starts = if anchored { 1.0 } else { n };
  if starts * n.powi(repeats as i32) > MAX_MATCH_STEPS {
    return Err("pattern too complex for subject".to_string());
  }
  Ok(())
}

/// Whether the pattern is anchored, and how many single-character items
/// carry a `*`, `+` or `-` repetition.
fn scan_pattern(pattern: &[u8]) -> (bool, usize) {
  let anchored = pattern.first() == Some(&b'^');
  let mut i = usize::from(anchored);
  let mut repeats = 0;

  while i < pattern.len() {
    let item_end = match pattern[i] {
      b'(' | b')' => {
        i += 1;
        continue;
      }
      b'%' => match pattern.get(i + 1) {
        Some(b'b') => {
          i += 4;
          continue;
        }
        Some(b'f') => {
          i = set_end(pattern, i + 2);
          continue;
        }
        Some(_) => i + 2,
        None => break,
      },
      b'[' => set_end(pattern, i),
      _ => i + 1,
    };

    match pattern.get(item_end) {
      Some(b'*' | b'+' | b'-') => {
        repeats += 1;
        i = item_end + 1;
      }
      Some(b'?') => i = item_end + 1,
      _ => i = item_end,
    }
  }

  (anchored, repeats)
}

/// Index just past the `[...]` set opening at `start`.
fn set_end(pattern: &[u8], start: usize) -> usize {
  let mut i = start + 1;
  if pattern.get(i) == Some(&b'^') {
    i += 1;
  }
  // A `]` first in the set is literal.
  if pattern.get(i) == Some(&b']') {
    i += 1;
  }
  while i < pattern.len() {
    match pattern[i] {
      b'%' => i += 2,
      b']' => return i + 1,
      _ => i += 1,
    }
  }
  pattern.len()
}

fn bind(lua: &Lua, bindings: &ScriptBindings, logs: Arc<Mutex<Vec<String>>>) -> mlua::Result<()> {
  let options = SerializeOptions::new()
    .serialize_none_to_null(false)
    .serialize_unit_to_null(false);
  let globals = lua.globals();

  globals.set("inputs", lua.to_value_with(&bindings.inputs, options)?)?;

  let context = lua.create_table()?;
  context.set("activation", lua.to_value_with(&bindings.activation, options)?)?;
  globals.set("context", context)?;

  let log = lua.create_function(move |lua, message: mlua::Value| {
    let line = display(lua, &message);
    logs
      .lock()
      .map_err(|_| mlua::Error::runtime("log buffer unavailable"))?
      .push(line);
    Ok(())
  })?;
  globals.set("log", log)?;

  Ok(())
}

fn to_json(lua: &Lua, value: mlua::Value) -> Result<Value, SandboxError> {
  lua
    .from_value_with(value, DeserializeOptions::new().deny_unsupported_types(false))
    .map_err(|e| SandboxError::conversion(e.to_string()))
}

fn display(lua: &Lua, value: &mlua::Value) -> String {
  match value {
    mlua::Value::Nil => "nil".to_string(),
    mlua::Value::Boolean(b) => b.to_string(),
    mlua::Value::Integer(i) => i.to_string(),
    mlua::Value::Number(n) => n.to_string(),
    mlua::Value::String(s) => s.to_string_lossy().to_string(),
    mlua::Value::Table(_) => to_json(lua, value.clone())
      .map(|v| v.to_string())
      .unwrap_or_else(|_| "table".to_string()),
    other => other.type_name().to_string(),
  }
}

fn describe(error: mlua::Error) -> SandboxError {
  match error {
    mlua::Error::MemoryError(_) => SandboxError::script("memory limit exceeded"),
    mlua::Error::SyntaxError { message, .. } => SandboxError::script(message),
    mlua::Error::RuntimeError(message) => SandboxError::script(message),
    mlua::Error::CallbackError { cause, .. } => describe((*cause).clone()),
    other => SandboxError::script(other.to_string()),
  }
}
