use anyhow::{Context, Result};
use mfg_twin::config::{load_config, AppConfig};
use mfg_twin::optimization::ProcessOptimizer;
use mfg_twin::simulation::SimulationEngine;
use mfg_twin::twin::monitor::run_status_reporter;
use mfg_twin::twin::DigitalTwinManager;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mfg_twin=info".into()),
        )
        .init();

    info!("mfg-twin starting...");

    let config = match std::env::var("MFG_TWIN_CONFIG") {
        Ok(path) => load_config(&path)
            .with_context(|| format!("Failed to load configuration from {}", path))?
            .apply_env(),
        Err(_) => AppConfig::default().apply_env(),
    };
    config.validate()?;

    let engine = Arc::new(SimulationEngine::with_builtin_models(config.simulation.clone()));
    info!(process_types = ?engine.get_process_types(), "Simulation engine ready");

    let optimizer = ProcessOptimizer::new(Arc::clone(&engine), config.optimizer.clone());
    info!(
        algorithms = ?optimizer.list_algorithms("parameter")?,
        "Process optimizer ready"
    );

    let manager = Arc::new(DigitalTwinManager::new(Arc::clone(&engine), config.twin.clone()));
    for twin in config.twins {
        let name = twin.name.clone();
        if let Err(e) = manager.create_twin(twin).await {
            error!(name = %name, error = %e, "Failed to create configured twin");
        }
    }

    let reporter = tokio::spawn(run_status_reporter(
        Arc::clone(&manager),
        config.monitor.report_interval_seconds,
    ));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutting down...");

    reporter.abort();
    manager.shutdown_all().await;
    info!("mfg-twin stopped");

    Ok(())
}
