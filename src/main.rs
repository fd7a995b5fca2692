//! wwwhisper-gate binary.
//!
//! Startup order: config → logging → metrics → activation → gate → server.
//! Any error before the listener binds is fatal.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use wwwhisper_gate::config::{load_config_with, Activation};
use wwwhisper_gate::lifecycle::{signals, Shutdown};
use wwwhisper_gate::observability::{logging, metrics};
use wwwhisper_gate::{Gate, GateOptions, GateServer};

#[derive(Debug, Parser)]
#[command(name = "wwwhisper-gate", version, about = "Authorization gate for wwwhisper")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overriding `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config_with(cli.config.as_deref(), |config| {
        if let Some(bind) = cli.bind {
            config.listener.bind_address = bind;
        }
    })?;

    logging::init(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "wwwhisper-gate starting");

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse::<SocketAddr>()?;
        metrics::init_metrics(addr)?;
    }

    let gate = match Activation::resolve(&config.wwwhisper) {
        Ok(Activation::Enabled(endpoint)) => {
            tracing::info!(endpoint = %endpoint, "Access control enabled");
            Some(Arc::new(Gate::new(endpoint, GateOptions::from(&config.wwwhisper))?))
        }
        Ok(Activation::Disabled) => {
            tracing::warn!("Access control disabled, all requests reach the application");
            None
        }
        Err(e) => {
            tracing::error!(error = %e, "Invalid wwwhisper configuration");
            return Err(e.into());
        }
    };

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.app.upstream,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let server = GateServer::new(&config, gate)?;
    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Arc::new(Shutdown::new());
    let server_shutdown = shutdown.subscribe();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move { signals::shutdown_on_signal(&shutdown).await }
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
