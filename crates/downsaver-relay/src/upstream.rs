//! Turning converter responses into relay responses.

use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::Response,
};
use downsaver_core::AppError;
use futures::TryStreamExt;

use crate::middleware::{RequestId, REQUEST_ID_HEADER};

/// Headers that describe the upstream connection, not the payload.
fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-connection"
            | "proxy-authenticate"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Tag the converter request with the caller's request id.
pub(crate) fn with_request_id(
    request: reqwest::RequestBuilder,
    request_id: Option<&RequestId>,
) -> reqwest::RequestBuilder {
    match request_id {
        Some(id) => request.header(REQUEST_ID_HEADER, id.as_str()),
        None => request,
    }
}

/// `Upstream error (<status>): <body or reason>`
pub(crate) fn upstream_error_message(status: StatusCode, body: &str) -> String {
    let detail = if body.is_empty() {
        status.canonical_reason().unwrap_or("Unknown error")
    } else {
        body
    };
    format!("Upstream error ({}): {}", status.as_u16(), detail)
}

/// Relay the outcome of a converter call.
///
/// A transport failure is logged and reported as a synthetic `502 Bad Gateway` upstream
/// status. A non-2xx answer becomes a `GatewayError` carrying the upstream status and body.
/// A success is streamed back unchanged with `Cache-Control: no-store`.
pub(crate) async fn relay(
    result: Result<reqwest::Response, reqwest::Error>,
    operation: &'static str,
) -> Result<Response, AppError> {
    let upstream = match result {
        Ok(upstream) => upstream,
        Err(e) => {
            tracing::warn!(operation, error = %e, "Converter unreachable");
            let status = StatusCode::BAD_GATEWAY;
            return Err(AppError::Gateway {
                status: Some(status.as_u16()),
                message: upstream_error_message(status, ""),
            });
        }
    };

    let status = upstream.status();
    if !status.is_success() {
        let text = upstream.text().await.unwrap_or_default();
        return Err(AppError::Gateway {
            status: Some(status.as_u16()),
            message: upstream_error_message(status, &text),
        });
    }

    tracing::debug!(
        operation,
        status = status.as_u16(),
        content_length = ?upstream.content_length(),
        "Streaming converter response"
    );

    let mut builder = Response::builder().status(status);
    for (name, value) in upstream.headers() {
        if !is_hop_by_hop(name) && *name != header::CACHE_CONTROL {
            builder = builder.header(name, value);
        }
    }
    builder = builder.header(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    let body_stream = upstream
        .bytes_stream()
        .map_err(|e| std::io::Error::other(format!("Converter stream error: {}", e)));

    builder.body(Body::from_stream(body_stream)).map_err(|e| {
        tracing::error!(error = %e, "Failed to build relay response");
        AppError::Internal(e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_uses_body_then_reason() {
        assert_eq!(
            upstream_error_message(StatusCode::INTERNAL_SERVER_ERROR, r#"{"error":"bad file"}"#),
            r#"Upstream error (500): {"error":"bad file"}"#
        );
        assert_eq!(
            upstream_error_message(StatusCode::BAD_GATEWAY, ""),
            "Upstream error (502): Bad Gateway"
        );
    }

    #[test]
    fn strips_connection_headers_only() {
        assert!(is_hop_by_hop(&header::TRANSFER_ENCODING));
        assert!(is_hop_by_hop(&HeaderName::from_static("keep-alive")));
        assert!(!is_hop_by_hop(&header::CONTENT_DISPOSITION));
        assert!(!is_hop_by_hop(&header::CONTENT_TYPE));
    }
}
