//! Application state shared by the relay handlers.

use std::time::Duration;

use anyhow::Context;
use downsaver_core::{AppError, Config};

pub struct AppState {
    pub config: Config,
    /// Client for converter calls. Redirects are passed back to the caller, not followed.
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, anyhow::Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs()))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to create upstream HTTP client")?;

        Ok(Self { config, http })
    }

    /// Converter base URL, or `Misconfigured` when none is set.
    pub fn converter_url(&self) -> Result<&str, AppError> {
        self.config
            .converter_url()
            .ok_or_else(|| AppError::Misconfigured("CONVERTER_API_URL is missing".to_string()))
    }
}
