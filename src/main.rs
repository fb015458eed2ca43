//! PodGate -- credential-gated multi-tenant object storage gateway.
//!
//! The binary loads config, opens the credential store, installs the
//! metrics recorder, and serves the gateway until SIGINT/SIGTERM.

use clap::Parser;
use tracing::info;

/// Command-line arguments for the PodGate server.
#[derive(Parser, Debug)]
#[command(
    name = "podgate",
    version,
    about = "Credential-gated multi-tenant object storage gateway"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "podgate.example.yaml")]
    config: String,

    /// Override the bind address (host:port).
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = podgate::config::load_config(&cli.config)?;

    // Tracing comes up as soon as the logging config is known.
    init_tracing(&config.logging);
    info!("Configuration loaded from {}", cli.config);

    let bind_addr = cli
        .bind
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));

    // Initialize Prometheus metrics recorder and register metric descriptions.
    podgate::metrics::init_metrics();
    podgate::metrics::describe_metrics();
    info!("Prometheus metrics initialized");

    // Open the credential store, creating its parent directory if needed.
    let store_path = &config.store.path;
    if let Some(parent) = std::path::Path::new(store_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let kv = std::sync::Arc::new(podgate::db::SqliteKvStore::new(store_path)?);
    let credentials = podgate::credentials::CredentialStore::new(kv);
    info!("Credential store opened at {}", store_path);

    let state = podgate::AppState::new(config, credentials);
    if state.limiter.is_some() {
        info!(
            "Per-tenant rate limiting enabled: {} requests per {}s",
            state.config.rate_limit.request_limit, state.config.rate_limit.window_seconds
        );
    }

    let app = podgate::server::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("PodGate listening on {}", bind_addr);

    // Graceful shutdown: on SIGTERM/SIGINT, stop accepting new connections
    // and wait for in-flight requests to complete.
    axum::serve(listener, app)
        .with_graceful_shutdown(podgate::server::shutdown_signal())
        .await?;

    info!("PodGate shut down");

    Ok(())
}

/// Initialize the tracing subscriber from the logging config.
///
/// `RUST_LOG` overrides the configured level when set.
fn init_tracing(logging: &podgate::config::LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    if logging.format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
