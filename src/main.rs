//! Digit Relay (v1)
//!
//! HTTP front end for an int8 handwritten-digit classifier.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                     DIGIT RELAY                      │
//!                     │                                                      │
//!   Client Request    │  ┌─────────┐    ┌──────────┐    ┌──────────────┐     │
//!   ──────────────────┼─▶│   net   │───▶│   http   │───▶│    pixels    │     │
//!                     │  │listener │    │ framing  │    │   decoder    │     │
//!                     │  └─────────┘    └──────────┘    └──────┬───────┘     │
//!                     │                                        │             │
//!                     │                                        ▼             │
//!                     │                                ┌──────────────┐      │
//!                     │                                │  inference   │      │
//!                     │                                │ quantize+run │      │
//!                     │                                └──────┬───────┘      │
//!                     │                                       │              │
//!                     │                                       ▼              │
//!   Client Response   │  ┌──────────┐    ┌──────────┐    ┌──────────────┐    │
//!   ◀─────────────────┼──│   http   │◀───│  relay   │◀───│   response   │    │
//!                     │  │  write   │    │ forwarder│───▶│   encoder    │────┼──▶ Peer
//!                     │  └──────────┘    └──────────┘    └──────────────┘    │
//!                     │                                                      │
//!                     │   config · observability · lifecycle (startup/stop)  │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use digit_relay::config::{load_config, ServiceConfig};
use digit_relay::lifecycle::{load_model, trigger_on_ctrl_c, Shutdown};
use digit_relay::net::Listener;
use digit_relay::observability::{logging, metrics};
use digit_relay::PredictionServer;

#[derive(Parser)]
#[command(name = "digit-relay")]
#[command(about = "Handwritten digit classification service", long_about = None)]
struct Args {
    /// TOML configuration file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => ServiceConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    if let Err(e) = logging::init_logging(&config.observability.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    tracing::info!("digit-relay v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        model_path = %config.model.path,
        peer_enabled = config.peer.enabled,
        peer_url = %config.peer.url(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => {
                tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    "Failed to parse metrics address"
                );
            }
        }
    }

    // A model that fails to load keeps the service up in the not-initialized state.
    let (model, _load_error) = load_model(&config.model);

    let listener = match Listener::bind(&config.listener).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, address = %config.listener.bind_address, "Cannot listen");
            return ExitCode::FAILURE;
        }
    };

    let server = match PredictionServer::new(&config, model) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Failed to set up peer forwarder");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    tokio::spawn(trigger_on_ctrl_c(shutdown.clone()));

    server.run(listener, stop).await;

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}
