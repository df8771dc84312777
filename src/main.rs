use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vito_relay::{create_router, AppState, Config};

#[derive(Debug, Parser)]
#[command(name = "vito-relay", about = "Streaming speech-recognition relay")]
struct Args {
    /// Config file path (extension optional)
    #[arg(long, default_value = "config/vito-relay")]
    config: String,

    /// Override service.http.bind
    #[arg(long)]
    bind: Option<String>,

    /// Override service.http.port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Credentials may live in a local .env file.
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("A TLS crypto provider was already installed");
    }

    let args = Args::parse();
    let mut cfg = Config::load(&args.config)?;
    if let Some(bind) = args.bind {
        cfg.service.http.bind = bind;
    }
    if let Some(port) = args.port {
        cfg.service.http.port = port;
    }
    cfg.validate()?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!("Upstream API: {}", cfg.upstream.api_base);
    info!("Stream config: {}", cfg.stream.to_query());
    if cfg.upstream.client_id.is_empty() {
        warn!("upstream.client_id is empty; authentication will fail");
    }

    tokio::fs::create_dir_all(&cfg.audio.upload_dir)
        .await
        .with_context(|| format!("Failed to create {}", cfg.audio.upload_dir.display()))?;

    let address = cfg.server_address();
    let state = AppState::from_config(cfg).context("Failed to initialize relay")?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("HTTP server listening on {}", address);

    axum::serve(listener, app).await.context("HTTP server failed")?;

    Ok(())
}
