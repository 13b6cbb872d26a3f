//! Incoming multipart forms, read once and rebuilt for the converter.
//!
//! The `file` field is spooled to a temporary file chunk by chunk and streamed from there, so an
//! inline upload never sits in memory whole.

use std::collections::HashMap;

use axum::extract::{
    multipart::{Field, MultipartRejection},
    Multipart,
};
use downsaver_core::AppError;
use reqwest::multipart::{Form, Part};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

/// Uploaded file spooled to disk. The spool is removed when this is dropped.
pub(crate) struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub len: u64,
    spool: NamedTempFile,
}

impl UploadedFile {
    async fn spool(filename: String, mut field: Field<'_>) -> Result<Self, AppError> {
        let spool = NamedTempFile::new()
            .map_err(|e| AppError::Internal(format!("Failed to create upload spool: {}", e)))?;
        let handle = spool
            .reopen()
            .map_err(|e| AppError::Internal(format!("Failed to open upload spool: {}", e)))?;
        let mut writer = tokio::fs::File::from_std(handle);
        let content_type = field.content_type().map(|s| s.to_string());

        let mut len = 0u64;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read file field: {}", e)))?
        {
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to spool upload: {}", e)))?;
            len += chunk.len() as u64;
        }
        writer
            .flush()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to spool upload: {}", e)))?;

        tracing::debug!(filename = %filename, len, "Spooled inline upload");

        Ok(Self {
            filename,
            content_type,
            len,
            spool,
        })
    }
}

/// Non-empty text fields plus at most one `file` part.
#[derive(Default)]
pub(crate) struct RelayForm {
    pub file: Option<UploadedFile>,
    text: HashMap<String, String>,
}

impl RelayForm {
    /// A request that is not multipart at all has no fields.
    pub async fn read(multipart: Result<Multipart, MultipartRejection>) -> Result<Self, AppError> {
        let mut multipart = match multipart {
            Ok(multipart) => multipart,
            Err(rejection) => {
                tracing::debug!(rejection = %rejection.body_text(), "Request is not multipart");
                return Ok(Self::default());
            }
        };

        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read multipart: {}", e)))?
        {
            let name = field.name().map(|s| s.to_string()).unwrap_or_default();

            if name == "file" {
                if form.file.is_some() {
                    return Err(AppError::Validation(
                        "Multiple file fields are not allowed; send exactly one field named 'file'"
                            .to_string(),
                    ));
                }
                let filename = field
                    .file_name()
                    .filter(|n| !n.is_empty())
                    .unwrap_or("file")
                    .to_string();
                form.file = Some(UploadedFile::spool(filename, field).await?);
            } else {
                let value = field.text().await.map_err(|e| {
                    AppError::Validation(format!("Failed to read field {}: {}", name, e))
                })?;
                if !value.is_empty() {
                    form.text.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.text.get(name).map(String::as_str)
    }
}

/// `file` part for the converter request, same name and type as received, streamed from the
/// spool. `file` must outlive the request.
pub(crate) fn file_part(file: &UploadedFile) -> Result<Part, AppError> {
    let handle = file
        .spool
        .reopen()
        .map_err(|e| AppError::Internal(format!("Failed to open upload spool: {}", e)))?;
    let stream = ReaderStream::new(tokio::fs::File::from_std(handle));
    let part = Part::stream_with_length(reqwest::Body::wrap_stream(stream), file.len)
        .file_name(file.filename.clone());
    match &file.content_type {
        Some(content_type) => part
            .mime_str(content_type)
            .map_err(|e| AppError::Validation(format!("Invalid file content type: {}", e))),
        None => Ok(part),
    }
}

/// Append `(name, value)` text fields in order.
pub(crate) fn with_text<'a>(
    form: Form,
    fields: impl IntoIterator<Item = (&'static str, &'a str)>,
) -> Form {
    fields
        .into_iter()
        .fold(form, |form, (name, value)| form.text(name, value.to_string()))
}
