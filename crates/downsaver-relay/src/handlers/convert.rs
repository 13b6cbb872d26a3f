use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, Extension, Multipart, State},
    response::Response,
};
use downsaver_core::AppError;
use reqwest::multipart::Form;
use serde::Serialize;
use utoipa::ToSchema;

use super::form::{file_part, with_text, RelayForm};
use crate::error::{ErrorResponse, HttpAppError};
use crate::middleware::RequestId;
use crate::state::AppState;
use crate::upstream::{relay, with_request_id};

/// Multipart body of `/api/convert`.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct ConvertForm {
    #[schema(value_type = String, format = Binary)]
    file: String,
    /// Rhino version to write, `2` to `7`
    #[schema(example = "6")]
    target_version: String,
}

/// Multipart body of `/api/convert-by-key`.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct ConvertByKeyForm {
    /// Object key returned by the presign call
    key: String,
    #[schema(example = "6")]
    target_version: String,
    original_filename: Option<String>,
}

/// Convert a file sent inline
#[utoipa::path(
    post,
    path = "/api/convert",
    tag = "relay",
    request_body(content = ConvertForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Converted file", content_type = "application/octet-stream"),
        (status = 400, description = "File or target version missing", body = ErrorResponse),
        (status = 500, description = "Converter not configured", body = ErrorResponse),
        (status = 502, description = "Converter failed or unreachable", body = ErrorResponse)
    )
)]
pub async fn convert(
    State(state): State<Arc<AppState>>,
    request_id: Option<Extension<RequestId>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, HttpAppError> {
    let mut form = RelayForm::read(multipart).await?;

    let (Some(file), Some(target_version)) = (form.file.take(), form.text("targetVersion")) else {
        return Err(
            AppError::MissingField("File and target version are required".to_string()).into(),
        );
    };
    let target_version = target_version.to_string();

    let base_url = state.converter_url()?;

    tracing::info!(
        filename = %file.filename,
        size = file.len,
        target_version = %target_version,
        "Relaying inline conversion"
    );

    let upstream_form = with_text(
        Form::new().part("file", file_part(&file)?),
        [("targetVersion", target_version.as_str())],
    );

    let request = state
        .http
        .post(format!("{}/convert", base_url))
        .multipart(upstream_form);
    let result = with_request_id(request, request_id.as_deref()).send().await;
    drop(file);

    Ok(relay(result, "convert").await?)
}

/// Convert a file already uploaded to object storage
#[utoipa::path(
    post,
    path = "/api/convert-by-key",
    tag = "relay",
    request_body(content = ConvertByKeyForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Converted file", content_type = "application/octet-stream"),
        (status = 400, description = "Key or target version missing", body = ErrorResponse),
        (status = 500, description = "Converter not configured", body = ErrorResponse),
        (status = 502, description = "Converter failed or unreachable", body = ErrorResponse)
    )
)]
pub async fn convert_by_key(
    State(state): State<Arc<AppState>>,
    request_id: Option<Extension<RequestId>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, HttpAppError> {
    let form = RelayForm::read(multipart).await?;

    let (Some(key), Some(target_version)) = (form.text("key"), form.text("targetVersion")) else {
        return Err(
            AppError::MissingField("Storage key and target version are required".to_string())
                .into(),
        );
    };

    let base_url = state.converter_url()?;

    tracing::info!(key = %key, target_version = %target_version, "Relaying conversion by key");

    let mut fields = vec![("key", key), ("targetVersion", target_version)];
    if let Some(original_filename) = form.text("originalFilename") {
        fields.push(("originalFilename", original_filename));
    }

    let request = state
        .http
        .post(format!("{}/convert-by-key", base_url))
        .multipart(with_text(Form::new(), fields));
    let result = with_request_id(request, request_id.as_deref()).send().await;

    Ok(relay(result, "convert_by_key").await?)
}
