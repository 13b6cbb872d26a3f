//! Relay endpoints against a mocked converter.

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use downsaver_core::Config;
use mockito::{Matcher, Server};

fn relay(converter_url: Option<String>) -> TestServer {
    let config = Config::default().with_converter_url(converter_url);
    let router = downsaver_relay::setup::initialize_app(config).expect("Failed to build relay");
    TestServer::new(router).expect("Failed to create test server")
}

fn convert_form() -> MultipartForm {
    MultipartForm::new()
        .add_part(
            "file",
            Part::bytes(b"3dm-bytes".as_slice())
                .file_name("bridge.3dm")
                .mime_type("application/octet-stream"),
        )
        .add_text("targetVersion", "6")
}

#[tokio::test]
async fn convert_streams_upstream_body_with_no_store() {
    let mut converter = Server::new_async().await;
    let upstream = converter
        .mock("POST", "/convert")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#"name="file"; filename="bridge.3dm""#.into()),
            Matcher::Regex("3dm-bytes".into()),
            Matcher::Regex(r#"name="targetVersion"\r\n\r\n6\r\n"#.into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/octet-stream")
        .with_header("content-disposition", "attachment; filename=\"bridge_v6.3dm\"")
        .with_header("cache-control", "public, max-age=3600")
        .with_body("converted")
        .expect(1)
        .create_async()
        .await;

    let server = relay(Some(converter.url()));
    let response = server.post("/api/convert").multipart(convert_form()).await;

    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), b"converted");
    assert_eq!(response.header("cache-control"), "no-store");
    assert_eq!(
        response.header("content-disposition"),
        "attachment; filename=\"bridge_v6.3dm\""
    );
    assert_eq!(response.header("content-type"), "application/octet-stream");
    upstream.assert_async().await;
}

#[tokio::test]
async fn convert_without_target_version_is_missing_field() {
    let mut converter = Server::new_async().await;
    let upstream = converter
        .mock("POST", "/convert")
        .expect(0)
        .create_async()
        .await;

    let server = relay(Some(converter.url()));
    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(b"x".as_slice()).file_name("a.3dm"),
    );
    let response = server.post("/api/convert").multipart(form).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "File and target version are required");
    assert_eq!(body["code"], "MISSING_FIELD");
    upstream.assert_async().await;
}

#[tokio::test]
async fn convert_without_converter_is_misconfigured() {
    let server = relay(None);
    let response = server.post("/api/convert").multipart(convert_form()).await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json();
    assert_eq!(
        body["error"],
        "Server not configured: CONVERTER_API_URL is missing"
    );
}

#[tokio::test]
async fn missing_fields_are_reported_before_configuration() {
    let server = relay(None);
    let response = server
        .post("/api/convert-by-key")
        .multipart(MultipartForm::new().add_text("targetVersion", "6"))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Storage key and target version are required");
}

#[tokio::test]
async fn upstream_failure_becomes_bad_gateway() {
    let mut converter = Server::new_async().await;
    converter
        .mock("POST", "/convert")
        .with_status(500)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":"bad file"}"#)
        .create_async()
        .await;

    let server = relay(Some(converter.url()));
    let response = server.post("/api/convert").multipart(convert_form()).await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], r#"Upstream error (500): {"error":"bad file"}"#);
    assert_eq!(body["code"], "GATEWAY_ERROR");
}

#[tokio::test]
async fn unreachable_upstream_hides_transport_error() {
    let server = relay(Some("http://127.0.0.1:9".to_string()));
    let response = server.post("/api/convert").multipart(convert_form()).await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let text = response.text();
    let body: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["error"], "Upstream error (502): Bad Gateway");
    let lowered = text.to_lowercase();
    assert!(!lowered.contains("refused"));
    assert!(!lowered.contains("error sending request"));
}

#[tokio::test]
async fn convert_by_key_forwards_fields() {
    let mut converter = Server::new_async().await;
    let upstream = converter
        .mock("POST", "/convert-by-key")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#"name="key"\r\n\r\nuploads/k1\r\n"#.into()),
            Matcher::Regex(r#"name="targetVersion"\r\n\r\n5\r\n"#.into()),
            Matcher::Regex(r#"name="originalFilename"\r\n\r\nbridge.3dm\r\n"#.into()),
        ]))
        .with_status(200)
        .with_body("by-key")
        .expect(1)
        .create_async()
        .await;

    let server = relay(Some(converter.url()));
    let form = MultipartForm::new()
        .add_text("key", "uploads/k1")
        .add_text("targetVersion", "5")
        .add_text("originalFilename", "bridge.3dm");
    let response = server.post("/api/convert-by-key").multipart(form).await;

    response.assert_status_ok();
    assert_eq!(response.text(), "by-key");
    assert_eq!(response.header("cache-control"), "no-store");
    upstream.assert_async().await;
}

#[tokio::test]
async fn presign_passes_grant_through_unchanged() {
    let grant = r#"{"url":"https://s3/b","fields":{"key":"uploads/k1","policy":"p","x-amz-signature":"s"},"key":"uploads/k1","bucket":"b","maxMb":500,"expiresIn":900}"#;
    let mut converter = Server::new_async().await;
    let upstream = converter
        .mock("GET", "/presign")
        .match_query(Matcher::UrlEncoded("filename".into(), "my part.3dm".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(grant)
        .expect(1)
        .create_async()
        .await;

    let server = relay(Some(converter.url()));
    let response = server
        .get("/api/presign")
        .add_query_param("filename", "my part.3dm")
        .await;

    response.assert_status_ok();
    assert_eq!(response.text(), grant);
    assert_eq!(response.header("cache-control"), "no-store");
    upstream.assert_async().await;
}

#[tokio::test]
async fn presign_requires_filename() {
    let server = relay(Some("http://127.0.0.1:9".to_string()));
    let response = server.get("/api/presign").await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Filename is required");
}

#[tokio::test]
async fn presign_upstream_error_uses_status_text_when_body_is_empty() {
    let mut converter = Server::new_async().await;
    converter
        .mock("GET", "/presign")
        .match_query(Matcher::Any)
        .with_status(404)
        .create_async()
        .await;

    let server = relay(Some(converter.url()));
    let response = server
        .get("/api/presign")
        .add_query_param("filename", "a.3dm")
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Upstream error (404): Not Found");
}

#[tokio::test]
async fn health_reports_converter_configuration() {
    let response = relay(None).get("/health").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["converter_configured"], false);

    let response = relay(Some("http://converter:8000".into())).get("/health").await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["converter_configured"], true);
}

#[tokio::test]
async fn responses_carry_request_id_and_security_headers() {
    let server = relay(None);

    let response = server
        .get("/health")
        .add_header("X-Request-ID", "req-123")
        .await;
    assert_eq!(response.header("x-request-id"), "req-123");
    assert_eq!(response.header("x-content-type-options"), "nosniff");
    assert_eq!(response.header("cache-control"), "no-store, private");

    let generated = server.get("/health").await;
    assert!(!generated.header("x-request-id").is_empty());
}

#[tokio::test]
async fn openapi_document_lists_relay_paths() {
    let response = relay(None).get("/api/openapi.json").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert!(body["paths"]["/api/convert"].is_object());
    assert!(body["paths"]["/api/convert-by-key"].is_object());
    assert!(body["paths"]["/api/presign"].is_object());
}

#[tokio::test]
async fn request_id_is_forwarded_to_the_converter() {
    let mut converter = Server::new_async().await;
    let upstream = converter
        .mock("POST", "/convert")
        .match_header("x-request-id", "trace-42")
        .with_status(200)
        .with_body("converted")
        .expect(1)
        .create_async()
        .await;

    let server = relay(Some(converter.url()));
    let response = server
        .post("/api/convert")
        .add_header("X-Request-ID", "trace-42")
        .multipart(convert_form())
        .await;

    response.assert_status_ok();
    assert_eq!(response.header("x-request-id"), "trace-42");
    upstream.assert_async().await;
}

#[tokio::test]
async fn large_inline_file_reaches_the_converter_intact() {
    let payload: String = (0..200_000).map(|i| format!("chunk-{:06}\n", i)).collect();
    let expected = payload.clone();

    let mut converter = Server::new_async().await;
    let upstream = converter
        .mock("POST", "/convert")
        .match_request(move |request| {
            request
                .body()
                .map(|body| String::from_utf8_lossy(body).contains(expected.as_str()))
                .unwrap_or(false)
        })
        .with_status(200)
        .with_body("converted")
        .expect(1)
        .create_async()
        .await;

    let server = relay(Some(converter.url()));
    let form = MultipartForm::new()
        .add_part(
            "file",
            Part::bytes(payload.into_bytes()).file_name("large.3dm"),
        )
        .add_text("targetVersion", "7");
    let response = server.post("/api/convert").multipart(form).await;

    response.assert_status_ok();
    assert_eq!(response.text(), "converted");
    upstream.assert_async().await;
}
