pub mod logging;
pub mod models;
pub mod services;
pub mod terminal;

use tracing::info;

use services::{AnalysisClient, ConfigStore, SessionController};

pub use logging::{init_logging, init_with, LogSettings};

/// Build a controller wired to the configured backend.
pub fn build_controller() -> anyhow::Result<SessionController<AnalysisClient>> {
    let config = ConfigStore::from_env()?.load_or_default().with_env_overrides();
    let client = AnalysisClient::from_config(&config)?;
    info!(
        backend = %client.base_url(),
        timeout_secs = config.backend.timeout_secs.unwrap_or(0),
        "analysis_client.ready"
    );
    Ok(SessionController::with_rules(client, config.validation))
}

/// Entry point of the interactive front-end.
pub async fn run() -> anyhow::Result<()> {
    init_logging();
    info!(startup_ms = logging::startup_elapsed_ms(), "logging.initialized");

    let controller = build_controller()?;
    let auth = services::FormatCheckAuthenticator::new();
    terminal::Terminal::stdio().drive(controller, &auth).await?;

    info!("=== detectAI Exited ===");
    Ok(())
}
