//! HTTP client for the converter service and the Downsaver relay.
//!
//! [`ConverterClient`] talks to whichever [`Endpoint`] the configuration resolves to and exposes
//! the four network operations of a conversion job (presign, staged upload, inline convert,
//! convert by key). [`JobRunner`] drives an [`downsaver_core::models::UploadJob`] through them.

pub mod api;
pub mod convert;
pub mod job;
pub mod presign;
pub mod progress;
mod response;

use std::time::Duration;

use downsaver_core::{AppError, Config, Endpoint};
use reqwest::{redirect, Client};

pub use api::ConverterApi;
pub use job::{JobEvent, JobEventKind, JobRunner, TelemetryHandle};
pub use progress::{progress_fn, ProgressFn};

/// HTTP client bound to one converter or relay endpoint.
#[derive(Clone, Debug)]
pub struct ConverterClient {
    client: Client,
    endpoint: Endpoint,
}

impl ConverterClient {
    /// Redirects are never followed: a 3xx from object storage is the success signal of a
    /// presigned POST.
    pub fn new(endpoint: Endpoint, connect_timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, endpoint })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(
            config.endpoint(),
            Duration::from_secs(config.connect_timeout_secs()),
        )
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Raw client for custom requests.
    pub fn client(&self) -> &Client {
        &self.client
    }
}
