//! Replistor host binary
//!
//! Thin CLI around the reconciliation engine: reads a YAML declaration,
//! merges the last-applied state file, and runs one apply/read/delete pass
//! against the cluster admin API. Ctrl-C cancels cooperatively: calls
//! already issued are never undone, calls not yet issued are skipped.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use replistor::adapters::RestClusterClient;
use replistor::decl::{decode_rules, encode_rules, BucketReplicationSpec};
use replistor::error::{Error, Result};
use replistor::reconcile::Reconciler;
use replistor::statefile::{merge_last_applied, StateFile};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Replistor - declarative bucket-replication reconciler
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cluster admin API endpoint
    #[arg(long, env = "REPLISTOR_ENDPOINT", default_value = "http://127.0.0.1:9000")]
    endpoint: String,

    /// Bearer token for the admin API
    #[arg(long, env = "REPLISTOR_TOKEN", default_value = "")]
    token: String,

    /// Per-call timeout in seconds
    #[arg(long, env = "REPLISTOR_CALL_TIMEOUT_SECONDS", default_value = "30")]
    call_timeout_seconds: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Converge the cluster to the declared configuration
    Apply {
        /// Path to the YAML declaration
        #[arg(long, env = "REPLISTOR_CONFIG")]
        config: PathBuf,

        /// Path to the last-applied state file
        #[arg(long, env = "REPLISTOR_STATE", default_value = "replistor.state.json")]
        state: PathBuf,
    },

    /// Report the cluster's current configuration in declarative shape
    Status {
        #[arg(long, env = "REPLISTOR_CONFIG")]
        config: PathBuf,

        #[arg(long, env = "REPLISTOR_STATE", default_value = "replistor.state.json")]
        state: PathBuf,
    },

    /// Remove the declared configuration and its remote targets
    Delete {
        #[arg(long, env = "REPLISTOR_CONFIG")]
        config: PathBuf,

        #[arg(long, env = "REPLISTOR_STATE", default_value = "replistor.state.json")]
        state: PathBuf,
    },

    /// Print the JSON Schema of the declaration format
    Schema,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(&args);

    if let Err(e) = run(args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    if let Command::Schema = args.command {
        let schema = schemars::schema_for!(BucketReplicationSpec);
        println!(
            "{}",
            serde_json::to_string_pretty(&schema)
                .map_err(|e| Error::Config(format!("unable to render schema: {}", e)))?
        );
        return Ok(());
    }

    let client = RestClusterClient::with_timeout(
        args.endpoint.as_str(),
        args.token.as_str(),
        Duration::from_secs(args.call_timeout_seconds),
    )?;
    let reconciler = Reconciler::new(Arc::new(client));
    let cancel = cancel_on_ctrl_c();

    match args.command {
        Command::Apply { config, state } => {
            let spec = load_declaration(&config)?;
            let mut rules = decode_rules(&spec)?;
            if let Some(last) = StateFile::load(&state)? {
                merge_last_applied(&mut rules, &last.rules);
            }

            let updated = reconciler.apply(&spec.bucket, &rules, &cancel).await?;
            StateFile::new(spec.bucket.as_str(), updated).save(&state)?;
            info!(bucket = %spec.bucket, state = %state.display(), "state file updated");
        }

        Command::Status { config, state } => {
            let spec = load_declaration(&config)?;
            let mut rules = decode_rules(&spec)?;
            if let Some(last) = StateFile::load(&state)? {
                merge_last_applied(&mut rules, &last.rules);
            }

            let projected = reconciler.read(&spec.bucket, &rules, &cancel).await?;
            let rendered = serde_yaml::to_string(&encode_rules(&spec.bucket, &projected))
                .map_err(|e| Error::Config(format!("unable to render status: {}", e)))?;
            println!("{}", rendered);
        }

        Command::Delete { config, state } => {
            let spec = load_declaration(&config)?;
            reconciler.delete(&spec.bucket, &cancel).await?;
            match std::fs::remove_file(&state) {
                Ok(()) => info!(state = %state.display(), "state file removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        Command::Schema => unreachable!("handled above"),
    }

    Ok(())
}

fn load_declaration(path: &Path) -> Result<BucketReplicationSpec> {
    let text = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&text)
        .map_err(|e| Error::Config(format!("unreadable declaration {:?}: {}", path, e)))
}

/// A token that fires when the user hits Ctrl-C. Remote calls already issued
/// are not undone; the pass stops before the next one.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing the in-flight call only");
            token.cancel();
        }
    });
    cancel
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("hyper=warn".parse().expect("static directive"))
        .add_directive("reqwest=info".parse().expect("static directive"));

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
