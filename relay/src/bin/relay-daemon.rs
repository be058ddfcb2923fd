use chatkit_core::{ChatKitClient, ChatKitConfig};
use chatkit_relay::config::RelayConfig;
use chatkit_relay::http_server;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "relay-daemon", about = "ChatKit session relay daemon")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// OpenAI API key
    #[arg(short = 'k', long)]
    api_key: Option<String>,

    /// Default workflow id for requests that name none
    #[arg(short, long)]
    workflow: Option<String>,

    /// ChatKit API base URL
    #[arg(long)]
    api_base: Option<String>,

    /// Deployment environment name; "production" turns on Secure cookies
    #[arg(long)]
    environment: Option<String>,

    /// HTTP server address
    #[arg(long)]
    http_addr: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    info!("Starting ChatKit relay daemon");

    // Pick up a local .env before reading the environment
    if let Ok(path) = dotenvy::dotenv() {
        info!("Loaded environment from {}", path.display());
    }

    // Parse command line args
    let args = Args::parse();

    // Load config from file or the default location
    let mut config = if let Some(config_path) = &args.config {
        match RelayConfig::load_from_file(config_path) {
            Ok(cfg) => {
                info!("Loaded configuration from {}", config_path.display());
                cfg
            }
            Err(e) => {
                error!(
                    "Failed to load configuration from {}: {}",
                    config_path.display(),
                    e
                );
                return Err(anyhow::anyhow!("Configuration error: {}", e));
            }
        }
    } else {
        match RelayConfig::load_default() {
            Ok(cfg) => cfg,
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                return Err(anyhow::anyhow!("Configuration error: {}", e));
            }
        }
    };

    // Overlay: config file < environment < CLI flags
    config.chatkit = config
        .chatkit
        .clone()
        .merge(ChatKitConfig::from_env())
        .merge(ChatKitConfig {
            api_key: args.api_key,
            workflow_id: args.workflow,
            api_base: args.api_base,
            environment: args.environment,
        });

    if let Some(http_addr) = args.http_addr {
        config.http_addr = Some(http_addr);
    }

    // Initialize the ChatKit client when a key is available; without one
    // the server still runs and the exchange route reports the missing key
    // per request.
    let chatkit = if config.chatkit.api_key.is_some() {
        match ChatKitClient::new(config.chatkit.clone()) {
            Ok(client) => {
                info!("Initialized ChatKit client");
                Some(client)
            }
            Err(e) => {
                error!(error = %e, "Failed to initialize ChatKit client");
                return Err(anyhow::anyhow!("Failed to initialize ChatKit client: {}", e));
            }
        }
    } else {
        warn!("No OPENAI_API_KEY configured; session exchanges will fail until one is provided");
        None
    };

    let addr = config
        .http_addr
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8080)));

    http_server::run_server(config, chatkit, addr).await
}
