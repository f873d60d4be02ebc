use anyhow::{Error, Result};
use delivery_service::{api::run_api_server, config::Config, telemetry::init_tracing};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::load()?;

    init_tracing(&config.log_level, &config.log_format)?;

    info!(
        environment = %config.environment,
        adapter_mode = %config.adapter_mode,
        "Configuration validated. Starting delivery service"
    );

    run_api_server(config).await
}
