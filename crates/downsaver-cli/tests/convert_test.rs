use std::sync::{Arc, Mutex};

use downsaver_cli::{run_batch, run_convert, BatchArgs, ConvertArgs, ConvertOutcome};
use downsaver_client::{JobEvent, JobEventKind};
use downsaver_core::models::{JobPhase, TargetVersion, UploadStrategy};
use downsaver_core::{AppError, Config, ErrorKind};
use mockito::{Matcher, Server};

fn args(file: std::path::PathBuf) -> ConvertArgs {
    ConvertArgs {
        file,
        target: TargetVersion::Rhino6,
        output: None,
        overwrite: false,
        server_filename: false,
    }
}

fn never() -> impl std::future::Future<Output = ()> + Send + 'static {
    std::future::pending()
}

#[tokio::test]
async fn converts_small_file_and_writes_output() {
    let mut converter = Server::new_async().await;
    let upstream = converter
        .mock("POST", "/convert")
        .with_status(200)
        .with_header("content-disposition", "attachment; filename=\"from_server.3dm\"")
        .with_body("converted-bytes")
        .expect(1)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bridge.3dm");
    std::fs::write(&input, b"original-bytes").unwrap();

    let config = Config::default().with_converter_url(Some(converter.url()));
    let events: Arc<Mutex<Vec<JobEvent>>> = Arc::default();
    let sink = events.clone();

    let outcome = run_convert(&config, args(input), never(), move |event| {
        sink.lock().unwrap().push(event.clone())
    })
    .await
    .unwrap();

    let ConvertOutcome::Converted(summary) = outcome else {
        panic!("expected a converted file, got {:?}", outcome);
    };
    assert_eq!(summary.output, dir.path().join("bridge_v6.3dm"));
    assert_eq!(summary.bytes, 15);
    assert_eq!(summary.strategy, UploadStrategy::Direct);
    assert_eq!(std::fs::read(&summary.output).unwrap(), b"converted-bytes");
    upstream.assert_async().await;

    let events = events.lock().unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e.kind, JobEventKind::StateChanged(JobPhase::DirectUploading))));
    assert!(events
        .iter()
        .any(|e| matches!(e.kind, JobEventKind::StateChanged(JobPhase::Succeeded))));
}

#[tokio::test]
async fn server_filename_is_used_when_requested() {
    let mut converter = Server::new_async().await;
    converter
        .mock("POST", "/convert")
        .with_status(200)
        .with_header("content-disposition", "attachment; filename=\"from_server.3dm\"")
        .with_body("converted")
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bridge.3dm");
    std::fs::write(&input, b"original").unwrap();

    let config = Config::default().with_converter_url(Some(converter.url()));
    let mut args = args(input);
    args.server_filename = true;

    let outcome = run_convert(&config, args, never(), |_| {}).await.unwrap();
    let ConvertOutcome::Converted(summary) = outcome else {
        panic!("expected a converted file, got {:?}", outcome);
    };
    assert_eq!(summary.output, dir.path().join("from_server.3dm"));
    assert!(summary.output.exists());
}

#[tokio::test]
async fn existing_output_is_refused_before_any_request() {
    let mut converter = Server::new_async().await;
    let upstream = converter
        .mock("POST", "/convert")
        .expect(0)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bridge.3dm");
    std::fs::write(&input, b"original").unwrap();
    std::fs::write(dir.path().join("bridge_v6.3dm"), b"keep me").unwrap();

    let config = Config::default().with_converter_url(Some(converter.url()));
    let result = run_convert(&config, args(input), never(), |_| {}).await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(
        std::fs::read(dir.path().join("bridge_v6.3dm")).unwrap(),
        b"keep me"
    );
    upstream.assert_async().await;
}

#[tokio::test]
async fn converter_failure_is_reported_as_outcome() {
    let mut converter = Server::new_async().await;
    converter
        .mock("POST", "/convert")
        .with_status(422)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":"unsupported object"}"#)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bridge.3dm");
    std::fs::write(&input, b"original").unwrap();

    let config = Config::default().with_converter_url(Some(converter.url()));
    let outcome = run_convert(&config, args(input), never(), |_| {}).await.unwrap();

    let ConvertOutcome::Failed(failure) = outcome else {
        panic!("expected a failure, got {:?}", outcome);
    };
    assert_eq!(failure.kind, ErrorKind::ConversionError);
    assert_eq!(failure.message, "unsupported object");
    assert_eq!(failure.upstream_status, Some(422));
    assert!(!dir.path().join("bridge_v6.3dm").exists());
}

#[tokio::test]
async fn shutdown_before_upload_cancels_the_job() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bridge.3dm");
    std::fs::write(&input, b"original").unwrap();

    let config = Config::default().with_converter_url(Some("http://127.0.0.1:9".to_string()));
    let outcome = run_convert(&config, args(input), async {}, |_| {})
        .await
        .unwrap();

    // The watcher may lose the race against a fast failure on a closed port.
    assert!(matches!(
        outcome,
        ConvertOutcome::Cancelled | ConvertOutcome::Failed(_)
    ));
    assert!(!dir.path().join("bridge_v6.3dm").exists());
}

fn batch(inputs: Vec<std::path::PathBuf>, output_dir: &std::path::Path) -> BatchArgs {
    BatchArgs {
        inputs,
        target: TargetVersion::Rhino5,
        output: None,
        output_dir: Some(output_dir.to_path_buf()),
        recursive: true,
        overwrite: false,
        server_filename: false,
    }
}

#[tokio::test]
async fn batch_mirrors_directories_into_output_dir() {
    let mut converter = Server::new_async().await;
    let upstream = converter
        .mock("POST", "/convert")
        .match_body(Matcher::Regex(r#"name="targetVersion"\r\n\r\n5\r\n"#.into()))
        .with_status(200)
        .with_body("converted")
        .expect(3)
        .create_async()
        .await;

    let root = tempfile::tempdir().unwrap();
    let models = root.path().join("models");
    std::fs::create_dir_all(models.join("sub")).unwrap();
    std::fs::write(models.join("a.3dm"), b"a").unwrap();
    std::fs::write(models.join("sub").join("b.3dm"), b"b").unwrap();
    std::fs::write(models.join("readme.txt"), b"not a model").unwrap();
    let single = root.path().join("single.3dm");
    std::fs::write(&single, b"s").unwrap();
    let notes = root.path().join("notes.txt");
    std::fs::write(&notes, b"n").unwrap();

    let out = root.path().join("out");
    let config = Config::default().with_converter_url(Some(converter.url()));
    let summary = run_batch(&config, batch(vec![models, single, notes], &out), never(), |_| {})
        .await
        .unwrap();

    assert_eq!(summary.processed.len(), 3);
    assert!(!summary.cancelled);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].contains("notes.txt"));
    for written in ["models/a.3dm", "models/sub/b.3dm", "single.3dm"] {
        assert_eq!(std::fs::read(out.join(written)).unwrap(), b"converted", "{written}");
    }
    upstream.assert_async().await;
}

#[tokio::test]
async fn batch_keeps_going_after_a_failed_file() {
    let mut converter = Server::new_async().await;
    let good = converter
        .mock("POST", "/convert")
        .match_body(Matcher::Regex(r#"filename="good.3dm""#.into()))
        .with_status(200)
        .with_body("converted")
        .expect(1)
        .create_async()
        .await;
    let bad = converter
        .mock("POST", "/convert")
        .match_body(Matcher::Regex(r#"filename="bad.3dm""#.into()))
        .with_status(500)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":"bad file"}"#)
        .expect(1)
        .create_async()
        .await;

    let root = tempfile::tempdir().unwrap();
    let bad_input = root.path().join("bad.3dm");
    let good_input = root.path().join("good.3dm");
    std::fs::write(&bad_input, b"x").unwrap();
    std::fs::write(&good_input, b"y").unwrap();

    let out = root.path().join("out");
    let config = Config::default().with_converter_url(Some(converter.url()));
    let summary = run_batch(&config, batch(vec![bad_input, good_input], &out), never(), |_| {})
        .await
        .unwrap();

    assert_eq!(summary.processed.len(), 1);
    assert_eq!(summary.processed[0].output, out.join("good.3dm"));
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].starts_with("Error converting"));
    assert!(summary.errors[0].ends_with("bad file"));
    assert!(!out.join("bad.3dm").exists());
    good.assert_async().await;
    bad.assert_async().await;
}

#[tokio::test]
async fn shutdown_stops_the_batch() {
    let root = tempfile::tempdir().unwrap();
    let first = root.path().join("first.3dm");
    let second = root.path().join("second.3dm");
    std::fs::write(&first, b"1").unwrap();
    std::fs::write(&second, b"2").unwrap();

    let out = root.path().join("out");
    let config = Config::default().with_converter_url(Some("http://127.0.0.1:9".to_string()));
    let summary = run_batch(&config, batch(vec![first, second], &out), async {}, |_| {})
        .await
        .unwrap();

    assert!(summary.cancelled);
    assert!(summary.processed.is_empty());
    assert!(!out.join("second.3dm").exists());
}

#[tokio::test]
async fn output_file_is_rejected_for_several_inputs() {
    let root = tempfile::tempdir().unwrap();
    let mut args = batch(vec![root.path().join("a.3dm"), root.path().join("b.3dm")], root.path());
    args.output_dir = None;
    args.output = Some(root.path().join("one.3dm"));

    let result = run_batch(&Config::default(), args, never(), |_| {}).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}
