use async_trait::async_trait;
use std::sync::Arc;

use crate::models::job::{CompressionKind, JobHandle, ObjectId};
use crate::services::compressor::{CompressorClient, SubmitError, SubmitOptions};
use crate::services::jobs::JobRepository;
use crate::services::metadata::StoreError;

/// Resolves a host object to a URL the compression service can fetch.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    async fn source_url(&self, id: ObjectId) -> Result<Option<String>, StoreError>;
}

/// Resolves sources from the URL registered alongside the object's metadata.
pub struct MetadataSourceResolver {
    jobs: JobRepository,
}

impl MetadataSourceResolver {
    pub fn new(jobs: JobRepository) -> Self {
        Self { jobs }
    }
}

#[async_trait]
impl SourceResolver for MetadataSourceResolver {
    async fn source_url(&self, id: ObjectId) -> Result<Option<String>, StoreError> {
        self.jobs.source_url(id).await
    }
}

/// Submits objects for compression and records the accepted job.
pub struct Submitter {
    client: Arc<CompressorClient>,
    jobs: JobRepository,
    resolver: Arc<dyn SourceResolver>,
}

impl Submitter {
    pub fn new(
        client: Arc<CompressorClient>,
        jobs: JobRepository,
        resolver: Arc<dyn SourceResolver>,
    ) -> Self {
        Self {
            client,
            jobs,
            resolver,
        }
    }

    /// Submit `id` and persist the job as queued. Nothing is written when the
    /// submission fails, and failures are not retried.
    ///
    /// An object whose current job is still queued or processing is refused
    /// before anything is sent.
    pub async fn submit(
        &self,
        id: ObjectId,
        kind: CompressionKind,
        options: &SubmitOptions,
    ) -> Result<JobHandle, SubmitError> {
        if let Some(status) = self.jobs.status(id).await? {
            if !status.is_terminal() {
                tracing::warn!(object_id = %id, status = %status, "Compression job already pending");
                return Err(SubmitError::AlreadyPending(id));
            }
        }

        let source_url = self
            .resolver
            .source_url(id)
            .await?
            .filter(|url| !url.is_empty())
            .ok_or(SubmitError::UnresolvedSource(id))?;

        let handle = match self.client.submit(id, &source_url, kind, options).await {
            Ok(handle) => handle,
            Err(e) => {
                metrics::counter!("compression_submit_failures_total").increment(1);
                tracing::error!(object_id = %id, kind = %kind, error = %e, "Compression submission failed");
                return Err(e);
            }
        };

        match self.jobs.record_submission(id, kind, &handle).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::error!(
                    object_id = %id,
                    job_id = %handle.job_id,
                    "Another job was recorded while submitting; accepted job is not tracked"
                );
                return Err(SubmitError::AlreadyPending(id));
            }
            Err(e) => {
                tracing::error!(
                    object_id = %id,
                    job_id = %handle.job_id,
                    error = %e,
                    "Compression job accepted but could not be recorded"
                );
                return Err(e.into());
            }
        }
        metrics::counter!("compression_jobs_submitted_total").increment(1);

        tracing::info!(
            object_id = %id,
            job_id = %handle.job_id,
            kind = %kind,
            quality = %options.quality,
            queue_position = ?handle.queue_position,
            "Compression job queued"
        );

        Ok(handle)
    }
}
