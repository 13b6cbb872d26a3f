//! Job runner: drives an [`UploadJob`] through its phases.
//!
//! A runner is built for exactly one job: [`JobRunner::run`] consumes it, so its cancellation
//! token, event channel and telemetry never outlive that job. One network operation is in
//! flight at a time. Phase changes and byte progress are sent on an unbounded event channel;
//! cancelling the runner's token aborts whichever call is pending and ends the job in
//! `Cancelled`.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use downsaver_core::models::{
    ConversionOutput, JobFailure, JobPhase, JobState, UploadJob, UploadStrategy,
};
use downsaver_core::{AppError, Config, ErrorMetadata, LogLevel, TransferSample, TransferTelemetry};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::api::ConverterApi;
use crate::progress::{progress_fn, ProgressFn};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum JobEventKind {
    StateChanged(JobPhase),
    Progress(TransferSample),
    /// Conversion by key is running; no byte progress will follow.
    Processing,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobEvent {
    pub job_id: Uuid,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: JobEventKind,
}

impl JobEvent {
    fn new(job_id: Uuid, kind: JobEventKind) -> Self {
        Self {
            job_id,
            at: Utc::now(),
            kind,
        }
    }
}

/// Latest telemetry of one runner, readable after the runner has been consumed.
#[derive(Clone)]
pub struct TelemetryHandle(Arc<Mutex<TransferTelemetry>>);

impl TelemetryHandle {
    /// Latest progress reading of the current phase.
    pub fn last_sample(&self) -> Option<TransferSample> {
        self.0.lock().ok().and_then(|t| t.last_sample().cloned())
    }
}

/// Runs one job against a [`ConverterApi`].
pub struct JobRunner {
    api: Arc<dyn ConverterApi>,
    config: Config,
    events_tx: mpsc::UnboundedSender<JobEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<JobEvent>>,
    cancel: CancellationToken,
    telemetry: Arc<Mutex<TransferTelemetry>>,
}

impl JobRunner {
    pub fn new(api: Arc<dyn ConverterApi>, config: Config) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            api,
            config,
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
            telemetry: Arc::new(Mutex::new(TransferTelemetry::start(Instant::now()))),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<JobEvent>> {
        self.events_rx.take()
    }

    /// Cancel the job through `cancel` instead of a token of its own, typically a child of a
    /// token shared by a batch.
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels the running job.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn telemetry(&self) -> TelemetryHandle {
        TelemetryHandle(self.telemetry.clone())
    }

    /// Run `job` to a terminal state and return it.
    pub async fn run(self, mut job: UploadJob) -> UploadJob {
        let outcome = self.drive(&mut job).await;

        let terminal = match outcome {
            Ok(output) => {
                tracing::info!(
                    job_id = %job.id(),
                    bytes = output.len(),
                    filename = ?output.filename,
                    "Conversion succeeded"
                );
                JobState::Succeeded(output)
            }
            Err(AppError::Cancelled) => {
                tracing::info!(job_id = %job.id(), phase = ?job.phase(), "Job cancelled");
                JobState::Cancelled
            }
            Err(err) => {
                log_failure(&job, &err);
                JobState::Failed(JobFailure::from(&err))
            }
        };

        if let Err(e) = self.advance(&mut job, terminal) {
            tracing::error!(job_id = %job.id(), error = %e, "Could not finish job");
        }
        job
    }

    async fn drive(&self, job: &mut UploadJob) -> Result<ConversionOutput, AppError> {
        self.advance(job, JobState::SelectingStrategy)?;
        job.source().validate(&self.config)?;

        tracing::info!(
            job_id = %job.id(),
            file = %job.source().name(),
            size = job.source().size(),
            target = %job.target(),
            strategy = ?job.strategy(),
            route = ?job.plan().route,
            "Starting conversion"
        );

        match job.strategy() {
            UploadStrategy::Staged => {
                self.advance(job, JobState::Presigning)?;
                let grant = self
                    .guard(self.api.request_grant(job.source().name()))
                    .await?;

                self.advance(job, JobState::StagedUploading { grant: grant.clone() })?;
                let staging_key = self
                    .guard(self.api.upload_staged(
                        &grant,
                        job.source(),
                        Some(self.progress_sink(job.id())),
                    ))
                    .await?;

                self.advance(
                    job,
                    JobState::ConvertingByReference {
                        staging_key: staging_key.clone(),
                    },
                )?;
                self.emit(job.id(), JobEventKind::Processing);
                self.guard(self.api.convert_by_reference(
                    &staging_key,
                    job.target(),
                    job.source().name(),
                ))
                .await
            }
            UploadStrategy::Direct => {
                self.advance(job, JobState::DirectUploading)?;
                self.guard(self.api.convert_inline(
                    job.source(),
                    job.target(),
                    Some(self.progress_sink(job.id())),
                ))
                .await
            }
        }
    }

    /// Await `op` unless the job is cancelled first.
    async fn guard<T>(&self, op: impl Future<Output = Result<T, AppError>>) -> Result<T, AppError> {
        if self.cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AppError::Cancelled),
            res = op => res,
        }
    }

    /// Transition, reset telemetry for the new phase and announce it.
    fn advance(&self, job: &mut UploadJob, next: JobState) -> Result<(), AppError> {
        job.transition(next)?;
        if let Ok(mut telemetry) = self.telemetry.lock() {
            telemetry.reset(Instant::now());
        }
        tracing::debug!(job_id = %job.id(), phase = ?job.phase(), "Job phase changed");
        self.emit(job.id(), JobEventKind::StateChanged(job.phase()));
        Ok(())
    }

    fn emit(&self, job_id: Uuid, kind: JobEventKind) {
        // Receiver may be gone; the job still runs to completion.
        let _ = self.events_tx.send(JobEvent::new(job_id, kind));
    }

    fn progress_sink(&self, job_id: Uuid) -> ProgressFn {
        let telemetry = self.telemetry.clone();
        let events_tx = self.events_tx.clone();
        progress_fn(move |loaded, total| {
            let sample = match telemetry.lock() {
                Ok(mut t) => t.on_progress(loaded, total, Instant::now()),
                Err(_) => return,
            };
            let _ = events_tx.send(JobEvent::new(job_id, JobEventKind::Progress(sample)));
        })
    }
}

fn log_failure(job: &UploadJob, err: &AppError) {
    match err.log_level() {
        LogLevel::Debug => tracing::debug!(
            job_id = %job.id(),
            phase = ?job.phase(),
            error_type = err.error_type(),
            error = %err,
            "Job failed"
        ),
        LogLevel::Warn => tracing::warn!(
            job_id = %job.id(),
            phase = ?job.phase(),
            error_type = err.error_type(),
            upstream_status = ?err.upstream_status(),
            error = %err,
            "Job failed"
        ),
        LogLevel::Error => tracing::error!(
            job_id = %job.id(),
            phase = ?job.phase(),
            error_type = err.error_type(),
            error = %err.detailed_message(),
            "Job failed"
        ),
    }
}
