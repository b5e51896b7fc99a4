use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lockstep_engine::{EngineConfig, ProgressToken, ReconcileOutcome, UpdateWorkflow};
use lockstep_model::KeyState;
use lockstep_remote::{InMemoryControlPlane, KeyLifecycle, KeyRecord};

/// Lockstep - a reconciliation engine for remotely managed keys
#[derive(Parser)]
#[command(name = "lockstep")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Reconcile a desired key state against the in-memory control plane,
  /// acting as the external orchestrator (sleep on suspend, replay token)
  Reconcile {
    /// Path to the desired state file (JSON)
    desired_file: PathBuf,

    /// Path to the previous state file (JSON)
    previous_file: PathBuf,

    /// Propagation delay in seconds (shrink it for local demos)
    #[arg(long, default_value_t = 5)]
    propagation_delay: u64,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::registry()
    .with(tracing_subscriber::fmt::layer().with_target(false))
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .init();

  let cli = Cli::parse();

  match cli.command {
    Some(Commands::Reconcile {
      desired_file,
      previous_file,
      propagation_delay,
    }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(async { reconcile(desired_file, previous_file, propagation_delay).await })
    }
    None => {
      println!("lockstep - use --help to see available commands");
      Ok(())
    }
  }
}

async fn reconcile(
  desired_file: PathBuf,
  previous_file: PathBuf,
  propagation_delay: u64,
) -> Result<()> {
  let desired = load_state(&desired_file).await?;
  let previous = load_state(&previous_file).await?;

  // The demo control plane starts out matching the previous state, the way
  // a real remote would after the prior successful reconciliation.
  let plane = InMemoryControlPlane::new(record_from(&previous));

  let config = EngineConfig {
    propagation_delay_seconds: propagation_delay,
    ..EngineConfig::default()
  };
  let engine = UpdateWorkflow::new(&plane, config);

  let mut token = ProgressToken::default();
  let mut invocation = 0u32;
  loop {
    invocation += 1;
    eprintln!("invocation {}", invocation);

    match engine.reconcile(&desired, &previous, token).await {
      ReconcileOutcome::Success { resource } => {
        eprintln!("converged after {} invocation(s)", invocation);
        eprintln!("remote calls: {:?}", plane.calls());
        println!("{}", serde_json::to_string_pretty(&resource)?);
        return Ok(());
      }
      ReconcileOutcome::InProgress {
        token: next,
        delay_seconds,
      } => {
        eprintln!("suspended; resuming in {}s", delay_seconds);
        tokio::time::sleep(Duration::from_secs(delay_seconds)).await;
        token = next;
      }
      ReconcileOutcome::Failed { error } => {
        return Err(anyhow::anyhow!(error).context("reconciliation failed"));
      }
    }
  }
}

async fn load_state(path: &PathBuf) -> Result<KeyState> {
  let raw = tokio::fs::read_to_string(path)
    .await
    .with_context(|| format!("failed to read state file: {}", path.display()))?;
  serde_json::from_str(&raw)
    .with_context(|| format!("failed to parse state file: {}", path.display()))
}

fn record_from(state: &KeyState) -> KeyRecord {
  KeyRecord {
    key_id: state.key_id.clone(),
    lifecycle: if state.enabled {
      KeyLifecycle::Enabled
    } else {
      KeyLifecycle::Disabled
    },
    enabled: state.enabled,
    rotation_enabled: state.rotation_enabled,
    description: state.description.clone(),
    policy: state.policy.clone(),
    tags: state.tags.clone(),
  }
}
