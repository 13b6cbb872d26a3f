//! Data models for the upload/convert flow
//!
//! Each sub-module covers one concept of a conversion job.

mod conversion;
mod job;
pub mod presigned_upload;
mod source;
mod strategy;
mod target_version;

pub use conversion::*;
pub use job::*;
pub use presigned_upload::PresignedUploadGrant;
pub use source::*;
pub use strategy::*;
pub use target_version::*;
