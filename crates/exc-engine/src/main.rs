//! Execution core entry point.
//!
//! Wires the Smart Order Executor, Exchange Failover Controller, State
//! Reconciler, and Execution Quality Monitor over one or more exchange
//! adapters and runs their background loops until interrupted.
//!
//! Concrete exchange adapters (wire protocol, authentication, signing) are
//! outside this crate's scope; this binary runs against `SimulatedAdapter`
//! so the wiring has a runnable reference, the same way a real deployment
//! would substitute its own `ExchangeAdapter` implementations per endpoint.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use exc_core::ExchangeAdapter;
use exc_engine::{Engine, EngineConfig, SimulatedAdapter};
use tracing::info;

/// Execution core: Smart Order Executor, Exchange Failover Controller,
/// State Reconciler, and Execution Quality Monitor.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via EXC_CONFIG env var).
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    exc_telemetry::init_logging()?;

    let args = Args::parse();
    let config_path = args.config.or_else(|| std::env::var("EXC_CONFIG").ok()).unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "loading engine configuration");
    let config = match EngineConfig::from_file(&config_path) {
        Ok(config) => config,
        Err(err) => {
            info!(error = %err, "no config file found, starting from defaults with a single simulated endpoint");
            let mut config = EngineConfig::default();
            config.endpoints.push(exc_engine::EndpointConfig { id: "simulated".to_string(), priority: 0, is_primary: true });
            config
        }
    };

    let adapters: Vec<(String, Arc<dyn ExchangeAdapter>)> =
        config.endpoints.iter().map(|e| (e.id.clone(), Arc::new(SimulatedAdapter::new()) as Arc<dyn ExchangeAdapter>)).collect();

    let engine = Arc::new(Engine::new(&config, adapters)?);
    info!(endpoints = engine.endpoints().len(), "execution core started");

    let handles = engine.spawn_background_loops();

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    engine.stop();

    for handle in handles {
        handle.abort();
    }

    Ok(())
}
