use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    http::header,
    response::Response,
};
use downsaver_core::AppError;
use serde::Deserialize;
use utoipa::IntoParams;
use validator::Validate;

use crate::error::{ErrorResponse, HttpAppError};
use crate::middleware::RequestId;
use crate::state::AppState;
use crate::upstream::{relay, with_request_id};

#[derive(Debug, Deserialize, Validate, IntoParams)]
pub struct PresignQuery {
    /// Name of the file that will be uploaded
    #[validate(length(max = 1024))]
    pub filename: Option<String>,
}

/// Request a presigned upload target from the converter
#[utoipa::path(
    get,
    path = "/api/presign",
    tag = "relay",
    params(PresignQuery),
    responses(
        (status = 200, description = "Presigned POST target: url, fields, key, bucket, maxMb, expiresIn", content_type = "application/json"),
        (status = 400, description = "Filename missing or invalid", body = ErrorResponse),
        (status = 500, description = "Converter not configured", body = ErrorResponse),
        (status = 502, description = "Converter failed or unreachable", body = ErrorResponse)
    )
)]
pub async fn presign(
    State(state): State<Arc<AppState>>,
    request_id: Option<Extension<RequestId>>,
    Query(query): Query<PresignQuery>,
) -> Result<Response, HttpAppError> {
    query.validate()?;

    let filename = query
        .filename
        .as_deref()
        .filter(|f| !f.is_empty())
        .ok_or_else(|| AppError::MissingField("Filename is required".to_string()))?;

    let base_url = state.converter_url()?;

    tracing::debug!(filename = %filename, "Relaying presign request");

    let request = state
        .http
        .get(format!("{}/presign", base_url))
        .query(&[("filename", filename)])
        .header(header::ACCEPT, "application/json");
    let result = with_request_id(request, request_id.as_deref()).send().await;

    Ok(relay(result, "presign").await?)
}
