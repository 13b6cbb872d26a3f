use downsaver_core::models::{parse_content_disposition_filename, ConversionOutput};
use downsaver_core::AppError;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{Response, StatusCode};

/// Human-readable message of a failed upstream response: JSON `error`, then `detail`, then
/// the raw body, then the status reason.
pub(crate) fn extract_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        for field in ["error", "detail"] {
            match json.get(field) {
                Some(serde_json::Value::String(message)) if !message.trim().is_empty() => {
                    return message.clone();
                }
                Some(value) if !value.is_null() && !value.is_string() => {
                    return value.to_string();
                }
                _ => {}
            }
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }

    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_u16().to_string())
}

/// Read a failed response into its status and message.
pub(crate) async fn failure_message(response: Response) -> (StatusCode, String) {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    (status, extract_error_message(status, &body))
}

/// Conversion responses: binary body on success, `ConversionError` otherwise.
pub(crate) async fn read_conversion_output(
    response: Response,
) -> Result<ConversionOutput, AppError> {
    let status = response.status();
    if !status.is_success() {
        let (status, message) = failure_message(response).await;
        return Err(AppError::Conversion {
            status: Some(status.as_u16()),
            message,
        });
    }

    let filename = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_content_disposition_filename);
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let bytes = response.bytes().await.map_err(|e| AppError::Conversion {
        status: Some(status.as_u16()),
        message: format!("Failed to read converted file: {}", e),
    })?;

    Ok(ConversionOutput {
        bytes,
        filename,
        content_type,
    })
}
