//! Inline and by-reference conversion requests.

use downsaver_core::models::{ConversionOutput, SourceFile, TargetVersion};
use downsaver_core::AppError;
use reqwest::multipart::Form;

use crate::progress::{file_part, ProgressFn};
use crate::response::read_conversion_output;
use crate::ConverterClient;

impl ConverterClient {
    /// `POST /convert` with the file streamed inline.
    pub async fn convert_inline(
        &self,
        source: &SourceFile,
        target: TargetVersion,
        on_progress: Option<ProgressFn>,
    ) -> Result<ConversionOutput, AppError> {
        let url = self.endpoint().convert_url();
        let form = Form::new()
            .part("file", file_part(source, on_progress).await?)
            .text("targetVersion", target.as_str());

        tracing::debug!(
            url = %url,
            file = %source.name(),
            size = source.size(),
            target = %target,
            "Converting inline"
        );

        let response = self
            .client()
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Conversion {
                status: None,
                message: format!("Converter unreachable: {}", e),
            })?;

        read_conversion_output(response).await
    }

    /// `POST /convert-by-key` for a file already in object storage. No byte progress.
    pub async fn convert_by_reference(
        &self,
        object_key: &str,
        target: TargetVersion,
        original_filename: &str,
    ) -> Result<ConversionOutput, AppError> {
        let url = self.endpoint().convert_by_key_url();
        let form = Form::new()
            .text("key", object_key.to_string())
            .text("targetVersion", target.as_str())
            .text("originalFilename", original_filename.to_string());

        tracing::debug!(url = %url, key = %object_key, target = %target, "Converting by key");

        let response = self
            .client()
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Conversion {
                status: None,
                message: format!("Converter unreachable: {}", e),
            })?;

        read_conversion_output(response).await
    }
}
