use headlamp_gateway::app::{App, load_config};
use headlamp_gateway::error::GatewayAppError;
use headlamp_gateway::logger::initialize as LoggerInitialize;

use gateway_core::config::default_config_dir;

use std::process::ExitCode;

use log::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is normal outside development
    let _ = dotenvy::dotenv();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), GatewayAppError> {
    let config_dir = default_config_dir()
        .ok_or_else(|| GatewayAppError::app("Failed to resolve config directory"))?;

    // Initialize logger FIRST
    let log_dir = config_dir.join("logs");
    LoggerInitialize(&log_dir)?;

    info!("Headlamp gateway starting");
    info!("Config directory: {}", config_dir.display());
    info!("Log directory: {}", log_dir.display());

    let config = load_config(&config_dir)?;
    let app = App::start(config).await?;

    info!("Gateway ready at {}", app.base_url());

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| GatewayAppError::app(format!("Failed to listen for shutdown signal: {e}")))?;

    info!("Shutdown signal received");
    app.shutdown().await?;
    info!("Headlamp gateway stopped");

    Ok(())
}
