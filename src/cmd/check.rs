//! One-shot health check of a single roster from the command line.

use clap::{Args, ValueEnum};
use tokio_util::sync::CancellationToken;

use crate::{config::AppConfig, supervisor::Supervisor};

/// Which roster to check.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CheckTarget {
    /// The bootstrap-node roster (TCP probe).
    Bootstrap,
    /// The gRPC-server roster.
    Grpc,
    /// The JSON-RPC-server roster.
    Jsonrpc,
}

/// Arguments of the `check` subcommand.
#[derive(Debug, Args)]
pub struct CheckArgs {
    /// The roster to probe.
    #[arg(value_enum)]
    pub target: CheckTarget,

    /// Path to the configuration file.
    #[arg(short, long)]
    pub config: Option<String>,
}

/// Builds the tracker against the configured store, runs one batch for the
/// selected roster, and prints the summary as JSON.
pub async fn execute(args: CheckArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::new(args.config.as_deref())?;
    let supervisor = Supervisor::build(config).await?;
    let services = supervisor.services();

    let cancel = CancellationToken::new();
    let summary = match args.target {
        CheckTarget::Bootstrap => services.bootstrap_monitor.check_all(&cancel).await?,
        CheckTarget::Grpc => services.grpc_monitor.check_all(&cancel).await?,
        CheckTarget::Jsonrpc => services.jsonrpc_monitor.check_all(&cancel).await?,
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
