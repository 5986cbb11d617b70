use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use mural_core::config::Config;
use mural_gateway::GatewayState;
use mural_store::{CanvasGeometry, ChunkStore, FsChunkStore};

#[derive(Parser)]
#[command(
    name = "mural",
    about = "Shared multi-writer canvas: WebSocket sync gateway over a chunked pixel store",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the canvas gateway server
    Serve {
        /// Port to listen on (default: 3000)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Initialize the chunk store with the default fill color
    Init {
        /// Overwrite an already-populated store
        #[arg(long)]
        force: bool,
    },

    /// Show canvas geometry and store state
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(Config::config_path);
    let config = Config::load(&config_path)?;

    let filter = if cli.verbose {
        "debug".to_string()
    } else {
        config.log_level().unwrap_or_else(|| "info".to_string())
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let geometry = CanvasGeometry::from_config(&config)?;

    match cli.command {
        Commands::Serve { port } => {
            let store =
                FsChunkStore::open(config.store_path(), geometry, config.fill_color()).await?;
            if !store.is_initialized().await? {
                tracing::info!(
                    chunks = geometry.total_chunks(),
                    "Store is empty, initializing canvas"
                );
                store.initialize().await?;
            }

            let port = port.unwrap_or_else(|| config.gateway_port());
            let state = Arc::new(GatewayState::new(Arc::new(config), Arc::new(store)));
            mural_gateway::start_gateway(state, port).await?;
        }
        Commands::Init { force } => {
            let store =
                FsChunkStore::open(config.store_path(), geometry, config.fill_color()).await?;
            if store.is_initialized().await? && !force {
                anyhow::bail!(
                    "store at {} is already initialized; pass --force to overwrite it",
                    config.store_path().display()
                );
            }
            store.initialize().await?;
        }
        Commands::Status => {
            let store =
                FsChunkStore::open(config.store_path(), geometry, config.fill_color()).await?;
            println!("Mural v{}", env!("CARGO_PKG_VERSION"));
            println!("Config: {}", config_path.display());
            println!(
                "Canvas: {}x{} in {}x{} chunks ({} chunks of {} bytes)",
                geometry.width,
                geometry.height,
                geometry.chunk_width,
                geometry.chunk_height,
                geometry.total_chunks(),
                geometry.chunk_size()
            );
            println!("Store: {}", config.store_path().display());
            println!("Initialized: {}", store.is_initialized().await?);
        }
    }

    Ok(())
}
