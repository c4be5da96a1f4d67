//! Aqua Sentinel - water-quality forecasting and risk service
//!
//! Loads the per-variable regression models and species thresholds, then
//! serves pond assessments over HTTP.

use anyhow::{Context, Result};
use aqua_sentinel::{api, config::SentinelConfig};
use sentinel_lib::{
    health::HealthRegistry,
    observability::{SentinelMetrics, StructuredLogger},
    predictor::{ModelLoader, ModelSet, ModelWatcher},
    risk::ThresholdRegistry,
    Pipeline,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting aqua-sentinel");

    let config = SentinelConfig::load()?;
    info!(
        instance = %config.instance_name,
        model_dir = %config.model_dir.display(),
        "Sentinel configured"
    );

    let registry = match &config.thresholds_file {
        Some(path) => ThresholdRegistry::with_overrides(path)
            .with_context(|| format!("Failed to load species thresholds from {}", path.display()))?,
        None => ThresholdRegistry::builtin(),
    };

    let health_registry = HealthRegistry::new();
    health_registry.observe_thresholds(&registry).await;

    let loader = ModelLoader::new(&config.model_dir);
    let models = loader.load().unwrap_or_else(|e| {
        // Serve 503s until a model directory appears
        warn!(error = %e, "No models loaded at startup");
        ModelSet::empty()
    });
    health_registry.observe_models(&models).await;

    let logger = StructuredLogger::new(&config.instance_name);
    logger.log_startup(SERVICE_VERSION, models.version(), registry.len());

    let pipeline = Arc::new(
        Pipeline::new(models, registry).with_inference_timeout(config.inference_timeout()),
    );

    let _watcher = if config.watch_models {
        let watcher = ModelWatcher::new(
            loader,
            Arc::clone(&pipeline),
            health_registry.clone(),
            logger.clone(),
        );
        match watcher.start().await {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(error = %e, "Model hot reload disabled");
                None
            }
        }
    } else {
        None
    };

    let app_state = Arc::new(api::AppState::new(
        pipeline,
        health_registry.clone(),
        SentinelMetrics::new(),
        logger.clone(),
    ));

    health_registry.set_ready(true).await;

    api::serve(config.api_port, app_state, shutdown_signal()).await?;
    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
