use async_trait::async_trait;
use downsaver_core::models::{ConversionOutput, PresignedUploadGrant, SourceFile, TargetVersion};
use downsaver_core::AppError;

use crate::progress::ProgressFn;
use crate::ConverterClient;

/// Network operations a conversion job needs.
///
/// [`ConverterClient`] is the HTTP implementation; the job runner only sees this trait.
#[async_trait]
pub trait ConverterApi: Send + Sync {
    async fn request_grant(&self, filename: &str) -> Result<PresignedUploadGrant, AppError>;

    async fn upload_staged(
        &self,
        grant: &PresignedUploadGrant,
        source: &SourceFile,
        on_progress: Option<ProgressFn>,
    ) -> Result<String, AppError>;

    async fn convert_inline(
        &self,
        source: &SourceFile,
        target: TargetVersion,
        on_progress: Option<ProgressFn>,
    ) -> Result<ConversionOutput, AppError>;

    async fn convert_by_reference(
        &self,
        object_key: &str,
        target: TargetVersion,
        original_filename: &str,
    ) -> Result<ConversionOutput, AppError>;
}

#[async_trait]
impl ConverterApi for ConverterClient {
    async fn request_grant(&self, filename: &str) -> Result<PresignedUploadGrant, AppError> {
        ConverterClient::request_grant(self, filename).await
    }

    async fn upload_staged(
        &self,
        grant: &PresignedUploadGrant,
        source: &SourceFile,
        on_progress: Option<ProgressFn>,
    ) -> Result<String, AppError> {
        ConverterClient::upload_staged(self, grant, source, on_progress).await
    }

    async fn convert_inline(
        &self,
        source: &SourceFile,
        target: TargetVersion,
        on_progress: Option<ProgressFn>,
    ) -> Result<ConversionOutput, AppError> {
        ConverterClient::convert_inline(self, source, target, on_progress).await
    }

    async fn convert_by_reference(
        &self,
        object_key: &str,
        target: TargetVersion,
        original_filename: &str,
    ) -> Result<ConversionOutput, AppError> {
        ConverterClient::convert_by_reference(self, object_key, target, original_filename).await
    }
}
