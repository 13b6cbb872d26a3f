//! Presigned upload: obtain a grant from the converter, then POST the file to object storage.

use chrono::Utc;
use downsaver_core::models::{PresignedUploadGrant, SourceFile};
use downsaver_core::AppError;
use reqwest::multipart::Form;

use crate::progress::{file_part, ProgressFn};
use crate::response::failure_message;
use crate::ConverterClient;

impl ConverterClient {
    /// `GET /presign?filename=<name>`. Every failure is a `PresignError`.
    pub async fn request_grant(&self, filename: &str) -> Result<PresignedUploadGrant, AppError> {
        let url = self.endpoint().presign_url();
        tracing::debug!(url = %url, filename = %filename, "Requesting presigned upload");

        let response = self
            .client()
            .get(&url)
            .query(&[("filename", filename)])
            .send()
            .await
            .map_err(|e| AppError::Presign(format!("Converter unreachable: {}", e)))?;

        if !response.status().is_success() {
            let (status, message) = failure_message(response).await;
            return Err(AppError::Presign(format!("{} ({})", message, status.as_u16())));
        }

        let grant: PresignedUploadGrant = response
            .json()
            .await
            .map_err(|e| AppError::Presign(format!("Invalid presign response: {}", e)))?;

        if grant.object_key.is_empty() || grant.target_url.is_empty() {
            return Err(AppError::Presign(
                "Presign response is missing the upload URL or key".to_string(),
            ));
        }

        tracing::debug!(
            key = %grant.object_key,
            fields = grant.form_fields.len(),
            expires_in = ?grant.expires_in_seconds,
            "Presigned upload granted"
        );
        Ok(grant)
    }

    /// POST the grant's fields in issuer order, then the file, to the storage target.
    ///
    /// Returns the grant's object key. A 2xx or 3xx answer is success; anything else, a
    /// transport failure, an oversized file or an expired grant is a `StagingUploadError`.
    pub async fn upload_staged(
        &self,
        grant: &PresignedUploadGrant,
        source: &SourceFile,
        on_progress: Option<ProgressFn>,
    ) -> Result<String, AppError> {
        if let Some(limit) = grant.max_size_bytes() {
            if source.size() > limit {
                return Err(AppError::StagingUpload(format!(
                    "{} is {} bytes, storage accepts at most {} bytes",
                    source.name(),
                    source.size(),
                    limit
                )));
            }
        }
        if grant.is_expired(Utc::now()) {
            return Err(AppError::StagingUpload(
                "Presigned upload expired before the upload started".to_string(),
            ));
        }

        let form = grant
            .form_fields
            .iter()
            .fold(Form::new(), |form, (name, value)| {
                form.text(name.clone(), value.clone())
            })
            .part("file", file_part(source, on_progress).await?);

        tracing::debug!(
            url = %grant.target_url,
            key = %grant.object_key,
            size = source.size(),
            "Uploading to object storage"
        );

        let response = self
            .client()
            .post(&grant.target_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::StagingUpload(format!("Upload to storage failed: {}", e)))?;

        let status = response.status();
        if status.is_success() || status.is_redirection() {
            return Ok(grant.object_key.clone());
        }

        let (status, message) = failure_message(response).await;
        Err(AppError::StagingUpload(format!(
            "Storage responded {}: {}",
            status.as_u16(),
            message
        )))
    }
}
