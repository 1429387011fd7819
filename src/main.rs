//! docgate - HTTP gateway translating REST and action requests into document database operations

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docgate::api::{self, AppState};
use docgate::config::Config;
use docgate::store::{DocumentStore, MemoryStore, MongoStore};

#[derive(Parser)]
#[command(name = "docgate")]
#[command(about = "HTTP gateway translating REST and action requests into document database operations")]
#[command(version)]
struct Cli {
    /// Path to config file (default: ~/.docgate/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// MongoDB connection string (overrides config)
        #[arg(long)]
        uri: Option<String>,

        /// Serve from an in-process store instead of MongoDB
        #[arg(long)]
        memory: bool,
    },

    /// Connect to MongoDB, ping it and exit
    Ping {
        /// MongoDB connection string (overrides config)
        #[arg(long)]
        uri: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!("docgate={},tower_http=debug", log_level).into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    let _ = dotenvy::dotenv();

    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port, uri, memory } => {
            if let Some(port) = port {
                config.http_port = port;
            }
            if let Some(uri) = uri {
                config.mongo_uri = uri;
            }

            let store: Arc<dyn DocumentStore> = if memory {
                tracing::warn!("Serving from memory, documents are lost on exit");
                Arc::new(MemoryStore::new())
            } else {
                tracing::info!("Connecting to MongoDB...");
                Arc::new(MongoStore::connect(&config.mongo_uri, config.timeouts.connect()).await?)
            };

            let state = AppState::new(store, &config);
            let router = api::create_router(state);

            let listener = tokio::net::TcpListener::bind(config.listen_addr()).await?;
            tracing::info!("Router listening on {}", config.listen_addr());

            println!("docgate running at http://localhost:{}", config.http_port);
            println!("  Action:   POST /{}/{{db}}/{{coll}}", config.action_prefix);
            println!("  REST:     GET|POST|PUT|DELETE /{}/{{db}}/{{coll}}", config.rest_prefix);
            println!("  API Docs: http://localhost:{}/api/openapi.json", config.http_port);
            println!("  Health:   http://localhost:{}/health", config.http_port);

            axum::serve(listener, router).await?;
        }

        Commands::Ping { uri } => {
            let uri = uri.unwrap_or_else(|| config.mongo_uri.clone());
            // connect() pings before returning
            let store = MongoStore::connect(&uri, config.timeouts.connect()).await?;
            println!("✓ {} is reachable", store.kind());
        }
    }

    Ok(())
}
