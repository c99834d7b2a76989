//! Stream relay
//!
//! ```text
//!   Client                      ┌──────────────────────────────────────────┐
//!   GET /stream?url=…  ────────▶│ http::server ──▶ relay::resolver ────────┼──▶ yt-dlp
//!                               │                        │                 │
//!                               │                        ▼                 │
//!   ◀──── 200/206 + bytes ──────│ relay::session ◀── relay::upstream ◀─────┼─── CDN
//!                               └──────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use stream_relay::config::{self, loader, RelayConfig};
use stream_relay::lifecycle::{wait_for_signal, Shutdown};
use stream_relay::observability::{logging, metrics};
use stream_relay::HttpServer;

#[derive(Parser)]
#[command(name = "stream-relay")]
#[command(about = "Resolve a video URL and relay its media stream", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "STREAM_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address, overriding the config file and PORT.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => RelayConfig::default(),
    };
    loader::apply_port_override(&mut config, std::env::var(loader::PORT_ENV).ok().as_deref());
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "stream-relay starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_sessions = config.listener.max_sessions,
        resolver = %config.resolver.program,
        resolve_timeout_ms = config.timeouts.resolve_ms,
        read_timeout_ms = config.timeouts.read_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new(config.timeouts.drain());
    let server = HttpServer::new(config)?;
    let mut server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    tokio::select! {
        result = &mut server_task => result??,
        _ = wait_for_signal() => {
            if let Some(result) = shutdown.drain(&mut server_task).await {
                result??;
            }
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
