use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;

use crate::config::ReconcileConfig;
use crate::models::job::{CompressionJob, JobStatus, ObjectId};
use crate::services::compressor::{CompressorClient, QueryError};
use crate::services::jobs::JobRepository;
use crate::services::metadata::StoreError;

/// What a single reconciliation pass did to one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Nothing to persist: still queued, already terminal, or a stale remote report.
    Unchanged,
    /// Stored status moved from queued to processing.
    Advanced,
    Completed,
    Failed,
    /// Remote reported completion but the result carried neither a video nor an image result.
    MissingResult,
    /// The status or result query failed; retried on the next tick.
    PollError,
}

/// Per-tick counts, logged by the caller.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub examined: usize,
    pub unchanged: usize,
    pub advanced: usize,
    pub completed: usize,
    pub failed: usize,
    pub missing_result: usize,
    pub errors: usize,
}

impl ReconcileSummary {
    fn record(&mut self, outcome: JobOutcome) {
        self.examined += 1;
        match outcome {
            JobOutcome::Unchanged => self.unchanged += 1,
            JobOutcome::Advanced => self.advanced += 1,
            JobOutcome::Completed => self.completed += 1,
            JobOutcome::Failed => self.failed += 1,
            JobOutcome::MissingResult => self.missing_result += 1,
            JobOutcome::PollError => self.errors += 1,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum ReconcileError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure of an on-demand status check. Carries no remote detail; see the logs.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("No compression job recorded for object {0}")]
    NotFound(ObjectId),

    #[error("Failed to check compression status")]
    Unavailable,
}

/// Polls outstanding jobs and applies remote status changes to the metadata store.
pub struct Reconciler {
    client: Arc<CompressorClient>,
    jobs: JobRepository,
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(client: Arc<CompressorClient>, jobs: JobRepository, config: ReconcileConfig) -> Self {
        Self {
            client,
            jobs,
            config,
        }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// List up to `batch_size` queued/processing jobs and reconcile them.
    pub async fn tick(&self) -> Result<ReconcileSummary, StoreError> {
        let pending = self.jobs.pending(self.config.batch_size).await?;
        if pending.is_empty() {
            tracing::debug!("No pending compression jobs");
            return Ok(ReconcileSummary::default());
        }
        Ok(self.reconcile(&pending).await)
    }

    /// Reconcile each job against the remote service. Per-job failures are
    /// logged and counted, never propagated.
    pub async fn reconcile(&self, pending: &[CompressionJob]) -> ReconcileSummary {
        let start = Instant::now();

        let outcomes: Vec<JobOutcome> = stream::iter(pending)
            .map(|job| self.reconcile_job(job))
            .buffer_unordered(self.config.workers.max(1))
            .collect()
            .await;

        let mut summary = ReconcileSummary::default();
        for outcome in outcomes {
            summary.record(outcome);
        }

        metrics::histogram!("compression_reconcile_seconds").record(start.elapsed().as_secs_f64());
        tracing::info!(
            examined = summary.examined,
            completed = summary.completed,
            failed = summary.failed,
            advanced = summary.advanced,
            errors = summary.errors,
            duration_ms = start.elapsed().as_millis() as u64,
            "Reconciliation pass finished"
        );

        summary
    }

    /// Manually re-check a single object's job. Returns the stored status afterwards.
    pub async fn check(&self, id: ObjectId) -> Result<JobStatus, CheckError> {
        let job = match self.jobs.load(id).await {
            Ok(Some(job)) => job,
            Ok(None) => return Err(CheckError::NotFound(id)),
            Err(e) => {
                tracing::error!(object_id = %id, error = %e, "Failed to load compression job");
                return Err(CheckError::Unavailable);
            }
        };

        if let Err(e) = self.apply(&job).await {
            tracing::warn!(object_id = %id, job_id = %job.job_id, error = %e, "Manual status check failed");
            return Err(CheckError::Unavailable);
        }

        match self.jobs.status(id).await {
            Ok(Some(status)) => Ok(status),
            Ok(None) => Err(CheckError::NotFound(id)),
            Err(e) => {
                tracing::error!(object_id = %id, error = %e, "Failed to read compression status");
                Err(CheckError::Unavailable)
            }
        }
    }

    async fn reconcile_job(&self, job: &CompressionJob) -> JobOutcome {
        match self.apply(job).await {
            Ok(outcome) => outcome,
            Err(e) => {
                metrics::counter!("compression_poll_errors_total").increment(1);
                tracing::warn!(
                    object_id = %job.object_id,
                    job_id = %job.job_id,
                    error = %e,
                    "Failed to reconcile compression job, will retry next tick"
                );
                JobOutcome::PollError
            }
        }
    }

    async fn apply(&self, job: &CompressionJob) -> Result<JobOutcome, ReconcileError> {
        if job.status.is_terminal() {
            return Ok(JobOutcome::Unchanged);
        }

        let report = self.client.get_status(&job.job_id).await?;
        tracing::debug!(
            object_id = %job.object_id,
            job_id = %job.job_id,
            remote_status = ?report.overall_status,
            progress = ?report.overall_progress,
            "Fetched compression status"
        );

        match report.overall_status.local() {
            JobStatus::Queued => Ok(JobOutcome::Unchanged),
            JobStatus::Processing => {
                if self.jobs.transition(job.object_id, JobStatus::Processing).await? {
                    Ok(JobOutcome::Advanced)
                } else {
                    Ok(JobOutcome::Unchanged)
                }
            }
            JobStatus::Failed => {
                if !self.jobs.transition(job.object_id, JobStatus::Failed).await? {
                    return Ok(JobOutcome::Unchanged);
                }
                metrics::counter!("compression_jobs_failed_total").increment(1);
                tracing::warn!(object_id = %job.object_id, job_id = %job.job_id, "Compression job failed");
                Ok(JobOutcome::Failed)
            }
            JobStatus::Completed => {
                let result = self.client.get_result(&job.job_id).await?;
                if result.overall_status.local() != JobStatus::Completed {
                    tracing::debug!(
                        job_id = %job.job_id,
                        result_status = ?result.overall_status,
                        "Status reports completion but result does not yet"
                    );
                    return Ok(JobOutcome::Unchanged);
                }
                if !result.has_payload() {
                    tracing::warn!(
                        object_id = %job.object_id,
                        job_id = %job.job_id,
                        "Completed result has neither video nor image output"
                    );
                    return Ok(JobOutcome::MissingResult);
                }
                if !self.jobs.complete(job.object_id, &result).await? {
                    return Ok(JobOutcome::Unchanged);
                }
                metrics::counter!("compression_jobs_completed_total").increment(1);
                tracing::info!(
                    object_id = %job.object_id,
                    job_id = %job.job_id,
                    compressed_url = result.compressed_video_url().unwrap_or("-"),
                    "Compression job completed"
                );
                Ok(JobOutcome::Completed)
            }
        }
    }
}
