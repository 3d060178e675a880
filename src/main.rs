use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use radar_config::{EngineConfig, FlowDef};
use radar_runtime::{FlowEngine, Services, TracingNotifier};
use radar_trigger::{Event, TriggerMatcher};
use radar_workflow::FlowGraph;

/// Radar - flow execution engine for media monitoring
#[derive(Parser)]
#[command(name = "radar")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Engine config file (default: ~/.radar/config.json, if present)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Log at debug level
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a flow
  Run {
    #[command(subcommand)]
    target: RunTarget,
  },

  /// Print the triggers of a flow that accept the event on stdin
  Match {
    /// Path to the flow file (JSON)
    flow_file: PathBuf,
  },
}

#[derive(Subcommand)]
enum RunTarget {
  /// Run an entire flow with the event read from stdin
  Flow {
    /// Path to the flow file (JSON)
    flow_file: PathBuf,

    /// Trigger node to start from (default: the first trigger accepting the event)
    #[arg(long)]
    trigger: Option<String>,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let filter = if cli.verbose { "radar=debug,info" } else { "radar=info,warn" };
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
    )
    .with_writer(io::stderr)
    .init();

  match cli.command {
    Some(Commands::Run { target }) => match target {
      RunTarget::Flow { flow_file, trigger } => {
        let config = load_config(cli.config.as_deref())?;
        run_flow(flow_file, trigger, config)?;
      }
    },
    Some(Commands::Match { flow_file }) => {
      match_triggers(&flow_file)?;
    }
    None => {
      println!("radar - use --help to see available commands");
    }
  }

  Ok(())
}

fn run_flow(flow_file: PathBuf, trigger: Option<String>, config: EngineConfig) -> Result<()> {
  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async { run_flow_async(flow_file, trigger, config).await })
}

async fn run_flow_async(flow_file: PathBuf, trigger: Option<String>, config: EngineConfig) -> Result<()> {
  let flow = Arc::new(load_flow(&flow_file)?);
  eprintln!("Loaded flow: {} ({} nodes)", flow.name, flow.nodes().len());

  let event = read_event_from_stdin()?;

  let trigger_id = match trigger {
    Some(id) => id,
    None => TriggerMatcher::find_matches(flow.nodes(), &event)
      .into_iter()
      .next()
      .map(|m| m.node_id)
      .with_context(|| format!("no trigger in flow '{}' accepts the event", flow.flow_id))?,
  };

  let engine = FlowEngine::with_notifier(Services::from_config(config), TracingNotifier);

  // Ctrl-C cancels the execution; its partial log is still printed.
  let cancel = CancellationToken::new();
  let handle = engine
    .start_with_cancel(flow, &trigger_id, event, cancel.clone())
    .context("failed to start execution")?;
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      cancel.cancel();
    }
  });

  let execution = handle.wait().await.context("execution task failed")?;

  eprintln!("Execution {}: {:?}", execution.id, execution.status);
  eprintln!("Nodes executed: {}", execution.nodes_executed.len());
  println!("{}", serde_json::to_string_pretty(&execution)?);

  if let Some(error) = &execution.error_message {
    bail!("execution failed: {}", error);
  }
  Ok(())
}

fn match_triggers(flow_file: &Path) -> Result<()> {
  let flow = load_flow(flow_file)?;
  let event = read_event_from_stdin()?;

  let matches: Vec<serde_json::Value> = TriggerMatcher::find_matches(flow.nodes(), &event)
    .into_iter()
    .map(|m| serde_json::json!({ "node_id": m.node_id, "context": m.context }))
    .collect();

  eprintln!("{} trigger(s) matched", matches.len());
  println!("{}", serde_json::to_string_pretty(&matches)?);
  Ok(())
}

fn load_flow(flow_file: &Path) -> Result<FlowGraph> {
  let content = std::fs::read_to_string(flow_file)
    .with_context(|| format!("failed to read flow file: {}", flow_file.display()))?;

  let def: FlowDef = serde_json::from_str(&content)
    .with_context(|| format!("failed to parse flow file: {}", flow_file.display()))?;

  FlowGraph::from_def(def).with_context(|| format!("invalid flow: {}", flow_file.display()))
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
  let path = match path {
    Some(path) => path.to_path_buf(),
    None => match dirs::home_dir().map(|home| home.join(".radar").join("config.json")) {
      Some(path) if path.exists() => path,
      _ => return Ok(EngineConfig::default()),
    },
  };

  let content = std::fs::read_to_string(&path)
    .with_context(|| format!("failed to read config file: {}", path.display()))?;
  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse config file: {}", path.display()))
}

fn read_event_from_stdin() -> Result<Event> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    // No stdin pipe, treat as a bare manual upload
    return Ok(Event::new("manual_upload"));
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read event from stdin")?;

  if input.trim().is_empty() {
    Ok(Event::new("manual_upload"))
  } else {
    serde_json::from_str(&input).context("failed to parse event JSON from stdin")
  }
}
