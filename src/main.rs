mod demos;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tessera_config::EngineConfig;
use tessera_engine::{Element, ExecutionContext, Output, Workflow, resolve_deep};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::demos::Demo;

/// Tessera - resolves trees of async components
#[derive(Parser)]
#[command(name = "tessera")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to a config file (default: $TESSERA_CONFIG_DIR/config.json or the platform config dir)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a bundled demo workflow
  Run {
    #[arg(value_enum)]
    demo: Demo,

    /// Run inside a streaming scope and print chunks as they arrive
    #[arg(long)]
    streaming: bool,

    /// JSON input for the root component (default depends on the demo)
    #[arg(long)]
    input: Option<String>,

    /// Print the execution tree to stderr after the run
    #[arg(long)]
    tree: bool,
  },

  /// Print the effective configuration
  Config,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .init();

  let cli = Cli::parse();
  let config = load_config(cli.config.as_deref())?;

  match cli.command {
    Some(Commands::Run {
      demo,
      streaming,
      input,
      tree,
    }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(run_demo(config, demo, streaming, input, tree))?;
    }
    Some(Commands::Config) => {
      println!("{}", serde_json::to_string_pretty(&config)?);
    }
    None => {
      println!("tessera - use --help to see available commands");
    }
  }

  Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
  match path {
    Some(path) => {
      tessera_config::load_from(path).with_context(|| format!("failed to load config: {}", path.display()))
    }
    None => tessera_config::load().context("failed to load config"),
  }
}

async fn run_demo(
  config: EngineConfig,
  demo: Demo,
  streaming: bool,
  input: Option<String>,
  tree: bool,
) -> Result<()> {
  let input = match input {
    Some(raw) => serde_json::from_str(&raw).context("failed to parse --input as JSON")?,
    None => demo.default_input(),
  };

  let mut element = demo.element(input);
  if streaming {
    element = Element::stream(element);
  }

  let cancel = CancellationToken::new();
  let ctrl_c = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupt received, cancelling");
      ctrl_c.cancel();
    }
  });

  let run = Workflow::new(demo.name())
    .with_config(config)
    .run_with_cancel(element, cancel)
    .await
    .context("workflow execution failed")?;

  eprintln!("Execution completed: {}", run.execution_id);

  let value = print_output(run.output).await?;
  println!("{}", serde_json::to_string_pretty(&value)?);

  if tree {
    match run.checkpoint {
      Some(root) => eprintln!("{}", serde_json::to_string_pretty(&root)?),
      None => eprintln!("Checkpoints are disabled"),
    }
  }

  Ok(())
}

/// Echo live chunks to stderr as they arrive, then return the final value.
async fn print_output(output: Output) -> Result<serde_json::Value> {
  let live = match output {
    Output::Stream(live) => live,
    other => return tessera_engine::settle(other).await.context("failed to settle output"),
  };

  let (mut chunks, final_value) = live.into_parts();
  let mut stderr = std::io::stderr();
  while let Some(chunk) = chunks.next().await {
    match chunk.map_err(|e| anyhow!(e))? {
      serde_json::Value::String(text) => write!(stderr, "{text}")?,
      other => write!(stderr, "{other}")?,
    }
    stderr.flush()?;
  }
  writeln!(stderr)?;

  let terminal = final_value.await.map_err(|e| anyhow!(e))?;
  resolve_deep(terminal, &ExecutionContext::new())
    .await
    .and_then(Output::into_value)
    .context("failed to resolve final value")
}
