//! Fault injector service.
//!
//! ```text
//!     Client Request ─▶ request id ─▶ trace ─▶ timeout ─▶ fault injection ─▶ upstream / echo
//!                                                          │
//!                                                          ├─ http_error    → synthetic error
//!                                                          ├─ http_latency  → delay, then 408
//!                                                          └─ goroutine_leak→ spawn leaks, 500
//!
//!     Admin API ─▶ fault registry (CpuSpike, MemLeak, TaskLeak) + live rule edits
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use fault_injector::config::{load_config, ConfigWatcher, InjectorConfig};
use fault_injector::lifecycle::{wait_for_signal, Shutdown};
use fault_injector::observability::{logging, metrics};
use fault_injector::HttpServer;

#[derive(Parser)]
#[command(name = "fault-injector")]
#[command(about = "HTTP fault injection service", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Do not watch the configuration file for rule changes.
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => InjectorConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!("fault-injector v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        service = %config.service.name,
        upstream = ?config.service.upstream,
        rules = config.rules.len(),
        injection_enabled = config.injection.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    // The watcher handle must outlive the server.
    let (_watcher, config_updates) = match (&args.config, args.no_watch) {
        (Some(path), false) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        _ => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config);
    let server_shutdown = shutdown.subscribe();

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signal_shutdown.trigger();
    });

    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
