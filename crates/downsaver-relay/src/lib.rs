//! Downsaver Relay Library
//!
//! Same-origin HTTP relay that forwards presign and conversion requests to the converter
//! service and streams its answers back.

mod api_doc;
mod handlers;
mod middleware;
mod upstream;

pub mod error;
pub mod setup;
pub mod state;
pub mod telemetry;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
