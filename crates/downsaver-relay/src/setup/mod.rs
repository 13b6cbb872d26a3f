//! Application setup and initialization

pub mod routes;
pub mod server;
pub mod validation;

use std::sync::Arc;

use anyhow::{Context, Result};
use downsaver_core::Config;

use crate::state::AppState;

/// Validate configuration, build state and the router.
pub fn initialize_app(config: Config) -> Result<axum::Router> {
    validation::validate_config(&config).context("Configuration validation failed")?;

    tracing::info!(
        environment = %config.environment(),
        converter_configured = config.converter_url().is_some(),
        "Configuration loaded and validated successfully"
    );

    let state = Arc::new(AppState::new(config.clone())?);
    routes::setup_routes(&config, state)
}
