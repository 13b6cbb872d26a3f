//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Downsaver Relay",
        version = "0.1.0",
        description = "Same-origin relay for the Rhino .3dm converter. Forwards presign, inline conversion and conversion-by-key requests and streams converted files back."
    ),
    paths(
        handlers::presign::presign,
        handlers::convert::convert,
        handlers::convert::convert_by_key,
        handlers::health::health,
    ),
    components(schemas(
        error::ErrorResponse,
        handlers::health::HealthResponse,
        handlers::convert::ConvertForm,
        handlers::convert::ConvertByKeyForm,
        downsaver_core::models::TargetVersion,
    )),
    tags(
        (name = "relay", description = "Converter relay endpoints"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;
