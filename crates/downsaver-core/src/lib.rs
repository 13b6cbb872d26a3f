//! Downsaver Core Library
//!
//! Configuration, the error taxonomy, the conversion job model and transfer telemetry
//! shared by the client, the relay and the CLI.

pub mod config;
pub mod error;
pub mod models;
pub mod transfer;

// Re-export commonly used types
pub use config::{BaseConfig, Config, ConverterConfig, Endpoint, DEFAULT_STAGING_THRESHOLD_BYTES};
pub use error::{AppError, ErrorKind, ErrorMetadata, LogLevel};
pub use transfer::{TransferSample, TransferTelemetry};
