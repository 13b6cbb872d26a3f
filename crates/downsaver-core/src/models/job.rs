use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::conversion::ConversionOutput;
use super::presigned_upload::PresignedUploadGrant;
use super::source::SourceFile;
use super::strategy::{StrategyPlan, UploadStrategy};
use super::target_version::TargetVersion;
use crate::config::Config;
use crate::error::{AppError, ErrorKind, ErrorMetadata};

/// Data-free view of [`JobState`], used in events and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Idle,
    SelectingStrategy,
    Presigning,
    StagedUploading,
    ConvertingByReference,
    DirectUploading,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobPhase {
    /// Phases that send file bytes and report byte progress.
    pub fn reports_bytes(&self) -> bool {
        matches!(self, JobPhase::StagedUploading | JobPhase::DirectUploading)
    }
}

/// Terminal failure of a job: one kind and one human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobFailure {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
}

impl From<&AppError> for JobFailure {
    fn from(err: &AppError) -> Self {
        Self {
            kind: err.kind(),
            message: err.client_message(),
            upstream_status: err.upstream_status(),
        }
    }
}

/// Job state; each variant holds only what its phase needs.
#[derive(Debug, Clone)]
pub enum JobState {
    Idle,
    SelectingStrategy,
    Presigning,
    StagedUploading { grant: PresignedUploadGrant },
    ConvertingByReference { staging_key: String },
    DirectUploading,
    Succeeded(ConversionOutput),
    Failed(JobFailure),
    Cancelled,
}

impl JobState {
    pub fn phase(&self) -> JobPhase {
        match self {
            JobState::Idle => JobPhase::Idle,
            JobState::SelectingStrategy => JobPhase::SelectingStrategy,
            JobState::Presigning => JobPhase::Presigning,
            JobState::StagedUploading { .. } => JobPhase::StagedUploading,
            JobState::ConvertingByReference { .. } => JobPhase::ConvertingByReference,
            JobState::DirectUploading => JobPhase::DirectUploading,
            JobState::Succeeded(_) => JobPhase::Succeeded,
            JobState::Failed(_) => JobPhase::Failed,
            JobState::Cancelled => JobPhase::Cancelled,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded(_) | JobState::Failed(_) | JobState::Cancelled
        )
    }
}

/// One user-initiated conversion. Never persisted.
#[derive(Debug)]
pub struct UploadJob {
    id: Uuid,
    source: SourceFile,
    target: TargetVersion,
    plan: StrategyPlan,
    staging_key: Option<String>,
    state: JobState,
    created_at: DateTime<Utc>,
}

impl UploadJob {
    /// The strategy is fixed here, from the file size and configuration alone.
    pub fn new(source: SourceFile, target: TargetVersion, config: &Config) -> Self {
        let plan = StrategyPlan::for_size(source.size(), config);
        Self {
            id: Uuid::new_v4(),
            source,
            target,
            plan,
            staging_key: None,
            state: JobState::Idle,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source(&self) -> &SourceFile {
        &self.source
    }

    pub fn target(&self) -> TargetVersion {
        self.target
    }

    pub fn plan(&self) -> StrategyPlan {
        self.plan
    }

    pub fn strategy(&self) -> UploadStrategy {
        self.plan.strategy
    }

    pub fn staging_key(&self) -> Option<&str> {
        self.staging_key.as_deref()
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn phase(&self) -> JobPhase {
        self.state.phase()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Move to `next`, rejecting edges the protocol does not allow.
    pub fn transition(&mut self, next: JobState) -> Result<(), AppError> {
        use JobPhase as P;

        let from = self.phase();
        let to = next.phase();
        let staged = self.plan.strategy == UploadStrategy::Staged;

        let allowed = match (from, to) {
            (_, P::Cancelled) | (_, P::Failed) => !self.state.is_terminal(),
            (P::Idle, P::SelectingStrategy) => true,
            (P::SelectingStrategy, P::Presigning) => staged,
            (P::SelectingStrategy, P::DirectUploading) => !staged,
            (P::Presigning, P::StagedUploading) => true,
            (P::StagedUploading, P::ConvertingByReference) => true,
            (P::ConvertingByReference, P::Succeeded) | (P::DirectUploading, P::Succeeded) => true,
            _ => false,
        };

        if !allowed {
            return Err(AppError::Internal(format!(
                "Illegal job transition {:?} -> {:?}",
                from, to
            )));
        }

        if let JobState::ConvertingByReference { staging_key } = &next {
            self.staging_key = Some(staging_key.clone());
        }
        self.state = next;
        Ok(())
    }

    /// Consume the job, yielding the result when it succeeded.
    pub fn into_state(self) -> JobState {
        self.state
    }
}
