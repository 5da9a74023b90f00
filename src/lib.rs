pub mod api; // HTTP surface
pub mod config;
pub mod core_state; // Process-wide state shared by handlers
pub mod db;
pub mod locale;
pub mod models;
pub mod pipeline;

use std::sync::Arc;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::core_state::{CoreError, CoreState};

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("State initialization failed: {0}")]
    Core(#[from] CoreError),
    #[error("Server error: {0}")]
    Server(#[from] api::ServerError),
    #[error("Cannot listen for shutdown signal: {0}")]
    Signal(std::io::Error),
}

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the
/// default filter. A second call is a no-op.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();
}

/// Start the service and serve until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    init_tracing();

    let config = AppConfig::from_env();
    tracing::info!(
        version = config::APP_VERSION,
        locale = config.locale.tag(),
        live_provider = config.has_live_provider(),
        "Symptom intake starting"
    );

    let core = Arc::new(CoreState::new(config)?);
    core.initialize_storage()?;

    let mut server = api::start_server_on(core.clone(), core.config.bind_addr).await?;
    tracing::info!(addr = %server.addr, "Listening");

    tokio::signal::ctrl_c().await.map_err(StartupError::Signal)?;
    server.shutdown();
    server.join().await?;
    Ok(())
}
