use clap::{Parser, Subcommand};
use nodewatch::{
    cmd::check::{self, CheckArgs},
    config::AppConfig,
    supervisor::Supervisor,
};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the tracker: scheduler plus JSON-RPC server.
    Run {
        /// Path to the configuration file.
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Probes one roster once and prints the batch summary.
    Check(CheckArgs),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber =
        FmtSubscriber::builder().with_env_filter(EnvFilter::from_default_env()).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { config } => {
            let config = AppConfig::new(config.as_deref())?;
            let supervisor = Supervisor::build(config).await?;
            tracing::info!("supervisor initialized, starting tracker...");
            supervisor.run().await?;
        }
        Commands::Check(args) => check::execute(args).await?,
    }

    Ok(())
}
