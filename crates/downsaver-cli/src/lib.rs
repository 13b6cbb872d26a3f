//! Library side of the `downsaver` command: the single-file and batch convert flows, output
//! naming and progress rendering, kept out of `main` so they can be tested.

pub mod inputs;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use downsaver_client::{ConverterClient, JobEvent, JobEventKind, JobRunner};
use downsaver_core::models::{
    default_output_filename, JobFailure, JobPhase, JobState, SourceFile, TargetVersion, UploadJob,
    UploadStrategy,
};
use downsaver_core::transfer::PLACEHOLDER;
use downsaver_core::{AppError, Config, ErrorMetadata};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use inputs::{collect_inputs, InputFile, InputSet};

const EVENT_DRAIN: Duration = Duration::from_millis(500);

/// Initialize tracing for the CLI binary.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[derive(Debug, Clone)]
pub struct ConvertArgs {
    pub file: PathBuf,
    pub target: TargetVersion,
    pub output: Option<PathBuf>,
    pub overwrite: bool,
    /// Name the output after the server's `Content-Disposition` filename when it sends one.
    pub server_filename: bool,
}

/// Arguments of `downsaver convert`.
#[derive(Debug, Clone)]
pub struct BatchArgs {
    pub inputs: Vec<PathBuf>,
    pub target: TargetVersion,
    /// Output file; only valid for a single file input.
    pub output: Option<PathBuf>,
    /// Directory that receives every output, mirroring each input's relative path.
    pub output_dir: Option<PathBuf>,
    pub recursive: bool,
    pub overwrite: bool,
    pub server_filename: bool,
}

#[derive(Debug, Serialize)]
pub struct ConvertSummary {
    pub output: PathBuf,
    pub bytes: usize,
    pub strategy: UploadStrategy,
}

#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub processed: Vec<ConvertSummary>,
    pub errors: Vec<String>,
    pub cancelled: bool,
}

#[derive(Debug)]
pub enum ConvertOutcome {
    Converted(ConvertSummary),
    Failed(JobFailure),
    Cancelled,
}

/// `--output` when given, else `<stem>_v<target>.3dm` (or the server's name) next to the input.
pub fn resolve_output_path(
    input: &Path,
    target: TargetVersion,
    output: Option<&Path>,
    server_filename: Option<&str>,
) -> PathBuf {
    if let Some(output) = output {
        return output.to_path_buf();
    }
    let name = match server_filename {
        Some(name) => name.to_string(),
        None => default_output_filename(
            input.file_name().and_then(|n| n.to_str()).unwrap_or_default(),
            target,
        ),
    };
    input.with_file_name(name)
}

/// Refuse to replace an existing file unless asked to.
pub fn ensure_writable(path: &Path, overwrite: bool) -> Result<(), AppError> {
    if !overwrite && path.exists() {
        return Err(AppError::Validation(format!(
            "{} already exists; pass --overwrite to replace it",
            path.display()
        )));
    }
    Ok(())
}

fn phase_label(phase: JobPhase) -> &'static str {
    match phase {
        JobPhase::Idle => "Idle",
        JobPhase::SelectingStrategy => "Preparing",
        JobPhase::Presigning => "Requesting upload slot",
        JobPhase::StagedUploading => "Uploading to storage",
        JobPhase::ConvertingByReference => "Converting",
        JobPhase::DirectUploading => "Uploading",
        JobPhase::Succeeded => "Done",
        JobPhase::Failed => "Failed",
        JobPhase::Cancelled => "Cancelled",
    }
}

/// One line of console output for a job event.
pub fn render_event(event: &JobEvent) -> String {
    match &event.kind {
        JobEventKind::StateChanged(phase) => format!("{}...", phase_label(*phase)),
        JobEventKind::Progress(sample) => format!(
            "  {:>3}%  {}/{} bytes  {}  ETA {}",
            sample.percent,
            sample.bytes_loaded,
            sample.bytes_total,
            sample.rate_display(),
            sample.eta_display(),
        ),
        JobEventKind::Processing => format!("  processing on the converter (ETA {})", PLACEHOLDER),
    }
}

/// Cancel `cancel` once `shutdown` resolves.
fn watch_shutdown<S>(shutdown: S, cancel: CancellationToken) -> JoinHandle<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        shutdown.await;
        cancel.cancel();
    })
}

/// Convert one file end to end.
///
/// `shutdown` resolving cancels the job. Events are handed to `on_event` in arrival order.
pub async fn run_convert<S, F>(
    config: &Config,
    args: ConvertArgs,
    shutdown: S,
    on_event: F,
) -> Result<ConvertOutcome, AppError>
where
    S: Future<Output = ()> + Send + 'static,
    F: Fn(&JobEvent) + Send + Sync + 'static,
{
    let cancel = CancellationToken::new();
    let watcher = watch_shutdown(shutdown, cancel.clone());
    let outcome = convert_one(config, &args, &cancel, Arc::new(on_event)).await;
    watcher.abort();
    outcome
}

/// Convert every file named by `args`, one job at a time.
///
/// Per-file failures are collected in the summary and the batch moves on. `shutdown`
/// cancels the running job and stops the batch.
pub async fn run_batch<S, F>(
    config: &Config,
    args: BatchArgs,
    shutdown: S,
    on_event: F,
) -> Result<BatchSummary, AppError>
where
    S: Future<Output = ()> + Send + 'static,
    F: Fn(&JobEvent) + Send + Sync + 'static,
{
    if args.inputs.is_empty() {
        return Err(AppError::Validation("No input files or directories specified".to_string()));
    }
    if args.output.is_some() && (args.inputs.len() != 1 || args.inputs[0].is_dir()) {
        return Err(AppError::Validation(
            "--output names a single output file; use --output-dir for several inputs".to_string(),
        ));
    }

    let inputs = collect_inputs(&args.inputs, args.recursive, config);
    tracing::info!(
        files = inputs.files.len(),
        skipped = inputs.skipped.len(),
        target = %args.target,
        "Converting files"
    );

    let mut summary = BatchSummary {
        processed: Vec::new(),
        errors: inputs.skipped,
        cancelled: false,
    };

    let cancel = CancellationToken::new();
    let watcher = watch_shutdown(shutdown, cancel.clone());
    let on_event = Arc::new(on_event);

    for input in inputs.files {
        if cancel.is_cancelled() {
            summary.cancelled = true;
            break;
        }

        let output = match &args.output_dir {
            Some(dir) => Some(dir.join(&input.relative)),
            None => args.output.clone(),
        };
        let job_args = ConvertArgs {
            file: input.path,
            target: args.target,
            output,
            overwrite: args.overwrite,
            server_filename: args.server_filename,
        };

        match convert_one(config, &job_args, &cancel, on_event.clone()).await {
            Ok(ConvertOutcome::Converted(converted)) => summary.processed.push(converted),
            Ok(ConvertOutcome::Failed(failure)) => summary.errors.push(format!(
                "Error converting {}: {}",
                job_args.file.display(),
                failure.message
            )),
            Ok(ConvertOutcome::Cancelled) => {
                summary.cancelled = true;
                break;
            }
            Err(e) => summary.errors.push(format!(
                "Error converting {}: {}",
                job_args.file.display(),
                e.client_message()
            )),
        }
    }

    watcher.abort();
    Ok(summary)
}

async fn convert_one<F>(
    config: &Config,
    args: &ConvertArgs,
    cancel: &CancellationToken,
    on_event: Arc<F>,
) -> Result<ConvertOutcome, AppError>
where
    F: Fn(&JobEvent) + Send + Sync + 'static,
{
    let default_output = resolve_output_path(&args.file, args.target, args.output.as_deref(), None);
    ensure_writable(&default_output, args.overwrite)?;

    let source = SourceFile::open(&args.file).await?;
    source.validate(config)?;

    let client = ConverterClient::from_config(config)?;
    let mut runner =
        JobRunner::new(Arc::new(client), config.clone()).with_cancel_token(cancel.child_token());
    let mut events = runner
        .take_events()
        .ok_or_else(|| AppError::Internal("Job events already taken".to_string()))?;

    let mut printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            on_event(&event);
        }
    });

    let job = UploadJob::new(source, args.target, config);
    let strategy = job.strategy();
    tracing::debug!(job_id = %job.id(), strategy = ?strategy, "Job created");

    let job = runner.run(job).await;
    // An aborted request body can still hold a progress sender for a moment.
    match tokio::time::timeout(EVENT_DRAIN, &mut printer).await {
        Ok(Err(e)) => tracing::warn!(error = %e, "Progress printer stopped unexpectedly"),
        Ok(Ok(())) => {}
        Err(_) => printer.abort(),
    }

    let output = match job.into_state() {
        JobState::Succeeded(output) => output,
        JobState::Failed(failure) => return Ok(ConvertOutcome::Failed(failure)),
        JobState::Cancelled => return Ok(ConvertOutcome::Cancelled),
        other => {
            return Err(AppError::Internal(format!(
                "Job ended in non-terminal state {:?}",
                other.phase()
            )))
        }
    };

    let server_name = output.filename.as_deref().filter(|_| args.server_filename);
    let path = resolve_output_path(&args.file, args.target, args.output.as_deref(), server_name);
    if path != default_output {
        ensure_writable(&path, args.overwrite)?;
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            AppError::Internal(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }
    tokio::fs::write(&path, &output.bytes)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to write {}: {}", path.display(), e)))?;

    Ok(ConvertOutcome::Converted(ConvertSummary {
        output: path,
        bytes: output.len(),
        strategy,
    }))
}
