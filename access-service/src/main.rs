use access_service::{config::AccessConfig, services::metrics, AccessService};
use service_core::error::AppError;
use service_core::observability::logging::init_tracing;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = AccessConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.common.otlp_endpoint.as_deref(),
    )?;

    metrics::init_metrics();

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting access service"
    );

    let access = AccessService::connect(&config).await?;
    access.health_check().await?;
    tracing::info!("Assignment store ready");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Signal handler failed: {}", e)))?;
    tracing::info!("Shutting down access service");
    Ok(())
}
