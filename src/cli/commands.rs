//! CLI command definitions for stream-eval.
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tokio::io::AsyncReadExt;
use tracing::info;

use crate::config::{DelegationMode, EvalConfig, RetryConfig, TotalScorePolicy};
use crate::error::EvalError;
use crate::facade::Evaluator;
use crate::gateway::handle_event;
use crate::result::{ErrorEnvelope, EvaluationOutcome};

/// Multi-agent quality evaluation for live-stream content.
#[derive(Parser)]
#[command(name = "stream-eval")]
#[command(about = "Evaluate live-stream content on accuracy, comprehensiveness, logic and professionalism")]
#[command(version)]
#[command(
    long_about = "stream-eval asks a coordinator model to score content on four dimensions and prints a JSON report.\n\nThe model endpoint is configured with STREAMEVAL_API_BASE, STREAMEVAL_API_KEY and STREAMEVAL_MODEL, or with a YAML file passed to --config.\n\nExample usage:\n  stream-eval evaluate \"主播介绍了新款手机的续航和价格\""
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// YAML configuration file. Environment variables override its values.
    #[arg(short, long, global = true, env = "STREAMEVAL_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Evaluate one piece of content and print the result.
    #[command(alias = "eval")]
    Evaluate(EvaluateArgs),

    /// Handle a function-gateway event read from a file or stdin.
    Gateway(GatewayArgs),
}

/// Arguments for `stream-eval evaluate`.
#[derive(Parser, Debug)]
pub struct EvaluateArgs {
    /// Content to evaluate.
    pub content: String,

    /// Override the delegation mode (coordinator, fan_out).
    #[arg(long)]
    pub delegation: Option<DelegationMode>,

    /// Override the total score policy (recompute, trust).
    #[arg(long)]
    pub total_policy: Option<TotalScorePolicy>,

    /// Re-asks with a stricter reminder after an unparseable reply.
    #[arg(long)]
    pub reminder_retries: Option<u32>,

    /// Override the transport retry count (0 disables retries).
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Print compact JSON instead of pretty JSON.
    #[arg(long)]
    pub compact: bool,
}

/// Arguments for `stream-eval gateway`.
#[derive(Parser, Debug)]
pub struct GatewayArgs {
    /// Event file. Reads stdin when omitted.
    #[arg(short, long)]
    pub event: Option<PathBuf>,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parse CLI arguments and execute the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Evaluate(args) => run_evaluate_command(cli.config.as_deref(), args).await,
        Commands::Gateway(args) => run_gateway_command(cli.config.as_deref(), args).await,
    }
}

// ============================================================================
// Evaluate Command
// ============================================================================

async fn run_evaluate_command(config_path: Option<&Path>, args: EvaluateArgs) -> anyhow::Result<()> {
    let outcome = match EvalConfig::load(config_path) {
        Ok(config) => {
            let config = apply_evaluate_overrides(config, &args);
            info!(
                model = %config.model.model,
                delegation = ?config.evaluation.delegation,
                "Evaluating content"
            );
            Evaluator::new(config).evaluate(&args.content).await
        }
        Err(err) => ErrorEnvelope::from_error(&EvalError::from(err), None).into(),
    };

    let rendered = if args.compact {
        outcome.to_json().to_string()
    } else {
        outcome.to_json_pretty()
    };
    println!("{}", rendered);

    match outcome {
        EvaluationOutcome::Success(_) => Ok(()),
        EvaluationOutcome::Failure(envelope) => {
            anyhow::bail!("evaluation failed: {}", envelope.error)
        }
    }
}

fn apply_evaluate_overrides(mut config: EvalConfig, args: &EvaluateArgs) -> EvalConfig {
    if let Some(mode) = args.delegation {
        config = config.with_delegation(mode);
    }
    if let Some(policy) = args.total_policy {
        config = config.with_total_policy(policy);
    }
    if let Some(retries) = args.reminder_retries {
        config = config.with_reminder_retries(retries);
    }
    if let Some(max_retries) = args.max_retries {
        let retry = RetryConfig {
            max_retries,
            ..config.retry.clone()
        };
        config = config.with_retry(retry);
    }
    config
}

// ============================================================================
// Gateway Command
// ============================================================================

async fn run_gateway_command(config_path: Option<&Path>, args: GatewayArgs) -> anyhow::Result<()> {
    let raw = match &args.event {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read event file {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buffer)
                .await
                .context("Failed to read event from stdin")?;
            buffer
        }
    };
    let event: serde_json::Value =
        serde_json::from_str(&raw).context("Gateway event is not valid JSON")?;

    let config = EvalConfig::load(config_path).context("Failed to load configuration")?;
    let response = handle_event(&event, &Evaluator::new(config)).await;
    info!(status = response.status_code, "Gateway event handled");

    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}
