//! Route configuration and setup

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use downsaver_core::Config;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::api_doc::ApiDoc;
use crate::handlers;
use crate::middleware::{request_id_middleware, security_headers_middleware, SecurityHeadersConfig};
use crate::state::AppState;

/// Request body ceiling when `MAX_UPLOAD_BYTES` is unset.
const DEFAULT_BODY_LIMIT_BYTES: usize = 512 * 1024 * 1024;
/// Room for multipart boundaries and text fields on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;
const MAX_CONCURRENT_REQUESTS: usize = 512;

pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router, anyhow::Error> {
    let cors = setup_cors(config)?;
    let security_headers_config = Arc::new(SecurityHeadersConfig::new(config.is_production()));
    crate::error::hide_error_details(config.is_production());

    let body_limit = config
        .max_upload_bytes()
        .map(|bytes| {
            usize::try_from(bytes)
                .unwrap_or(usize::MAX)
                .saturating_add(MULTIPART_OVERHEAD_BYTES)
        })
        .unwrap_or(DEFAULT_BODY_LIMIT_BYTES);
    tracing::info!(body_limit, "Request body limit configured");

    let app = Router::new()
        .route("/api/presign", get(handlers::presign::presign))
        .route("/api/convert", post(handlers::convert::convert))
        .route("/api/convert-by-key", post(handlers::convert::convert_by_key))
        .route("/health", get(handlers::health::health))
        .with_state(state)
        .route(
            "/api/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .merge(utoipa_rapidoc::RapiDoc::new("/api/openapi.json").path("/docs"))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(request_id_middleware))
        .layer(from_fn_with_state(
            security_headers_config,
            security_headers_middleware,
        ));

    Ok(app)
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];

    if config.cors_origins().iter().any(|o| o == "*") {
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
            .expose_headers(Any));
    }

    let origins = config
        .cors_origins()
        .iter()
        .map(|o| {
            o.parse::<HeaderValue>()
                .map_err(|e| anyhow::anyhow!("Invalid CORS origin {}: {}", o, e))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(Any)
        .expose_headers(Any))
}
