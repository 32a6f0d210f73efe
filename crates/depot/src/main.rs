use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use eyre::Result;
use tracing::info;

use depot_core::api::OpenAiChatGateway;
use depot_core::app::Orchestrator;
use depot_core::app::consequence::ConsequenceEvaluator;
use depot_core::config::DepotConfig;
use depot_core::session::SqliteCheckpointStore;
use depot_core::store::SqliteTransitStore;
use depot_core::tools::transit_registry;

mod server;

#[derive(Parser)]
#[command(name = "depot", about = "Transit operations copilot backend", version)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP chat API.
    Serve {
        #[arg(long, default_value = "127.0.0.1:8000")]
        addr: SocketAddr,
    },
    /// Create the transit database and load the demo dataset.
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = DepotConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Seed => {
            let transit = SqliteTransitStore::new(&config.database.transit_path).await?;
            transit.seed_demo().await?;
            info!(path = %config.database.transit_path.display(), "Transit database seeded");
            Ok(())
        }
        Commands::Serve { addr } => {
            let transit = Arc::new(SqliteTransitStore::new(&config.database.transit_path).await?);
            info!(path = %config.database.transit_path.display(), "Transit store ready");

            let checkpoints =
                Arc::new(SqliteCheckpointStore::new(&config.database.checkpoint_path).await?);
            info!(path = %config.database.checkpoint_path.display(), "Checkpoint store ready");

            let api_key = config.reasoning.api_key()?;
            let gateway = Arc::new(OpenAiChatGateway::new(
                &api_key,
                config.reasoning.base_url.clone(),
                config.reasoning.model.clone(),
            )?);
            info!(model = %config.reasoning.model, "Reasoning gateway configured");

            let orchestrator = Arc::new(Orchestrator::new(
                gateway,
                transit_registry(transit.clone()),
                ConsequenceEvaluator::new(transit),
                checkpoints,
                (&config.orchestrator).into(),
            ));

            server::serve(orchestrator, addr).await
        }
    }
}
