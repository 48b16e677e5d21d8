use std::sync::Arc;
use std::time::Duration;

use crate::models::api::ResultReport;
use crate::models::job::{CompressionJob, CompressionKind, JobHandle, JobStatus, ObjectId};
use crate::services::metadata::{Guard, MetadataStore, StoreError};

pub const JOB_ID_FIELD: &str = "_compression_job_id";
pub const STATUS_FIELD: &str = "_compression_status";
pub const KIND_FIELD: &str = "_compression_type";
pub const QUEUE_POSITION_FIELD: &str = "_compression_queue_position";
pub const ESTIMATED_TIME_FIELD: &str = "_compression_estimated_time";
pub const RESULT_FIELD: &str = "_compression_result";
pub const VIDEO_URL_FIELD: &str = "_compressed_video_url";
pub const IMAGE_DATA_FIELD: &str = "_compressed_image_data";
pub const SOURCE_URL_FIELD: &str = "_compression_source_url";

/// Fields that belong to one submission and are cleared when it is replaced.
const SUBMISSION_SCOPED_FIELDS: [&str; 5] = [
    QUEUE_POSITION_FIELD,
    ESTIMATED_TIME_FIELD,
    RESULT_FIELD,
    VIDEO_URL_FIELD,
    IMAGE_DATA_FIELD,
];

/// Fields a store must be able to query for job listing and reconciliation.
pub const INDEXED_FIELDS: [&str; 1] = [STATUS_FIELD];

/// Reads and writes compression jobs as individual metadata fields.
///
/// Holds no job state of its own; every call goes to the store.
#[derive(Clone)]
pub struct JobRepository {
    store: Arc<dyn MetadataStore>,
}

impl JobRepository {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    /// Record the fetchable URL the host exposes for an object.
    pub async fn register_source(&self, id: ObjectId, source_url: &str) -> Result<(), StoreError> {
        self.store.set(id, SOURCE_URL_FIELD, source_url).await
    }

    pub async fn source_url(&self, id: ObjectId) -> Result<Option<String>, StoreError> {
        self.store.get(id, SOURCE_URL_FIELD).await
    }

    /// Persist a freshly submitted job as queued.
    ///
    /// Only objects without a job, or whose job is completed or failed, are
    /// written. A replaced job's result, output and queue fields are dropped in
    /// the same write. Returns `false` when a queued or processing job is
    /// already recorded.
    pub async fn record_submission(
        &self,
        id: ObjectId,
        kind: CompressionKind,
        handle: &JobHandle,
    ) -> Result<bool, StoreError> {
        let mut fields = vec![
            (JOB_ID_FIELD, handle.job_id.clone()),
            (KIND_FIELD, kind.to_string()),
            (STATUS_FIELD, JobStatus::Queued.to_string()),
        ];
        if let Some(position) = handle.queue_position {
            fields.push((QUEUE_POSITION_FIELD, position.to_string()));
        }
        if let Some(eta) = handle.estimated_time {
            fields.push((ESTIMATED_TIME_FIELD, eta.as_secs().to_string()));
        }

        let replaceable = JobStatus::terminal_values();
        let guard = Guard {
            field: STATUS_FIELD,
            one_of: &replaceable,
            or_absent: true,
        };
        self.store
            .update_if(id, guard, &SUBMISSION_SCOPED_FIELDS, &fields)
            .await
    }

    /// Load the job recorded for an object, if any.
    pub async fn load(&self, id: ObjectId) -> Result<Option<CompressionJob>, StoreError> {
        let Some(job_id) = self.store.get(id, JOB_ID_FIELD).await? else {
            return Ok(None);
        };
        let Some(status) = self.status(id).await? else {
            return Ok(None);
        };

        let kind = match self.store.get(id, KIND_FIELD).await? {
            Some(raw) => raw.parse().map_err(|_| corrupt(id, KIND_FIELD, &raw))?,
            None => return Err(corrupt(id, KIND_FIELD, "")),
        };
        let queue_position = self.parsed::<u32>(id, QUEUE_POSITION_FIELD).await?;
        let estimated_time = self
            .parsed::<u64>(id, ESTIMATED_TIME_FIELD)
            .await?
            .map(Duration::from_secs);
        let compressed_video_url = self.store.get(id, VIDEO_URL_FIELD).await?;
        let result = match self.store.get(id, RESULT_FIELD).await? {
            Some(raw) => Some(serde_json::from_str(&raw).map_err(|_| corrupt(id, RESULT_FIELD, &raw))?),
            None => None,
        };

        Ok(Some(CompressionJob {
            object_id: id,
            job_id,
            kind,
            status,
            queue_position,
            estimated_time,
            compressed_video_url,
            result,
        }))
    }

    pub async fn status(&self, id: ObjectId) -> Result<Option<JobStatus>, StoreError> {
        match self.store.get(id, STATUS_FIELD).await? {
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| corrupt(id, STATUS_FIELD, &raw)),
            None => Ok(None),
        }
    }

    /// Jobs still queued or processing, at most `limit`.
    pub async fn pending(&self, limit: usize) -> Result<Vec<CompressionJob>, StoreError> {
        self.load_by_status(&JobStatus::PENDING, limit).await
    }

    /// Every object that has a job, whatever its status.
    pub async fn list(&self, limit: usize) -> Result<Vec<CompressionJob>, StoreError> {
        self.load_by_status(&JobStatus::ALL, limit).await
    }

    /// Loads up to `limit` readable jobs in ascending id order. Unreadable
    /// records are logged and do not count towards the limit.
    async fn load_by_status(
        &self,
        statuses: &[JobStatus],
        limit: usize,
    ) -> Result<Vec<CompressionJob>, StoreError> {
        let values: Vec<&str> = statuses.iter().map(|s| s.as_ref()).collect();
        let ids = self.store.query(STATUS_FIELD, &values, usize::MAX).await?;

        let mut jobs = Vec::with_capacity(limit.min(ids.len()));
        for id in ids {
            if jobs.len() >= limit {
                break;
            }
            match self.load(id).await {
                Ok(Some(job)) => jobs.push(job),
                Ok(None) => tracing::error!(object_id = %id, "Object has a status but no job id"),
                Err(e) => tracing::error!(object_id = %id, error = %e, "Skipping unreadable job"),
            }
        }
        Ok(jobs)
    }

    /// Move a job to `next` if that is a forward transition from its stored
    /// status. Returns whether anything was written.
    pub async fn transition(&self, id: ObjectId, next: JobStatus) -> Result<bool, StoreError> {
        debug_assert!(next != JobStatus::Completed, "use complete() to store a result");
        let fields = [(STATUS_FIELD, next.to_string())];
        self.guarded_move(id, next, &fields).await
    }

    /// Mark a job completed together with its result payload.
    pub async fn complete(&self, id: ObjectId, result: &ResultReport) -> Result<bool, StoreError> {
        let mut fields = vec![(RESULT_FIELD, serde_json::to_string(result)?)];
        if let Some(url) = result.compressed_video_url() {
            fields.push((VIDEO_URL_FIELD, url.to_string()));
        }
        if let Some(image) = &result.image_result {
            fields.push((IMAGE_DATA_FIELD, serde_json::to_string(image)?));
        }
        fields.push((STATUS_FIELD, JobStatus::Completed.to_string()));

        self.guarded_move(id, JobStatus::Completed, &fields).await
    }

    /// Writes `fields` only while the stored status may still move to `next`.
    async fn guarded_move(
        &self,
        id: ObjectId,
        next: JobStatus,
        fields: &[(&str, String)],
    ) -> Result<bool, StoreError> {
        let allowed = next.predecessors();
        let guard = Guard {
            field: STATUS_FIELD,
            one_of: &allowed,
            or_absent: false,
        };
        self.store.update_if(id, guard, &[], fields).await
    }

    async fn parsed<T: std::str::FromStr>(
        &self,
        id: ObjectId,
        field: &str,
    ) -> Result<Option<T>, StoreError> {
        match self.store.get(id, field).await? {
            Some(raw) => raw.parse().map(Some).map_err(|_| corrupt(id, field, &raw)),
            None => Ok(None),
        }
    }
}

fn corrupt(id: ObjectId, field: &str, value: &str) -> StoreError {
    StoreError::Corrupt {
        id,
        field: field.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::api::{RemoteStatus, VideoResult};
    use crate::services::metadata::InMemoryMetadataStore;

    fn repo() -> JobRepository {
        JobRepository::new(Arc::new(InMemoryMetadataStore::new()))
    }

    fn handle(job_id: &str) -> JobHandle {
        JobHandle {
            job_id: job_id.to_string(),
            queue_position: Some(3),
            estimated_time: Some(Duration::from_secs(120)),
        }
    }

    fn video_result(url: &str) -> ResultReport {
        ResultReport {
            job_id: None,
            overall_status: RemoteStatus::Completed,
            video_result: Some(VideoResult {
                compressed_url: Some(url.to_string()),
                hls_playlist_url: None,
                original_size: None,
                compressed_size: None,
                compression_ratio: None,
            }),
            image_result: None,
            error_message: None,
        }
    }

    #[tokio::test]
    async fn test_record_and_load_submission() {
        let jobs = repo();
        jobs.record_submission(ObjectId(10), CompressionKind::Image, &handle("J1"))
            .await
            .unwrap();

        let job = jobs.load(ObjectId(10)).await.unwrap().unwrap();
        assert_eq!(job.job_id, "J1");
        assert_eq!(job.kind, CompressionKind::Image);
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.queue_position, Some(3));
        assert_eq!(job.estimated_time, Some(Duration::from_secs(120)));
        assert!(job.result.is_none());

        assert!(jobs.load(ObjectId(11)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transition_is_forward_only() {
        let jobs = repo();
        jobs.record_submission(ObjectId(1), CompressionKind::Video, &handle("J1"))
            .await
            .unwrap();

        assert!(jobs.transition(ObjectId(1), JobStatus::Processing).await.unwrap());
        assert!(!jobs.transition(ObjectId(1), JobStatus::Queued).await.unwrap());
        assert!(!jobs.transition(ObjectId(1), JobStatus::Processing).await.unwrap());
        assert!(jobs.transition(ObjectId(1), JobStatus::Failed).await.unwrap());
        assert!(!jobs.complete(ObjectId(1), &video_result("https://x/y.mp4")).await.unwrap());

        let job = jobs.load(ObjectId(1)).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.result.is_none());
    }

    #[tokio::test]
    async fn test_transition_without_job_is_noop() {
        let jobs = repo();
        assert!(!jobs.transition(ObjectId(4), JobStatus::Failed).await.unwrap());
        assert_eq!(jobs.status(ObjectId(4)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_complete_stores_result_fields() {
        let jobs = repo();
        jobs.record_submission(ObjectId(2), CompressionKind::Video, &handle("J2"))
            .await
            .unwrap();

        assert!(jobs.complete(ObjectId(2), &video_result("https://x/y.mp4")).await.unwrap());

        let job = jobs.load(ObjectId(2)).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.compressed_video_url.as_deref(), Some("https://x/y.mp4"));
        assert_eq!(job.result, Some(video_result("https://x/y.mp4")));
        assert_eq!(
            jobs.store().get(ObjectId(2), IMAGE_DATA_FIELD).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_pending_and_list() {
        let jobs = repo();
        for (id, job_id) in [(1, "A"), (2, "B"), (3, "C")] {
            jobs.record_submission(ObjectId(id), CompressionKind::Video, &handle(job_id))
                .await
                .unwrap();
        }
        jobs.transition(ObjectId(2), JobStatus::Failed).await.unwrap();
        jobs.register_source(ObjectId(9), "https://site/unsubmitted.mp4")
            .await
            .unwrap();

        let pending: Vec<_> = jobs.pending(50).await.unwrap().into_iter().map(|j| j.job_id).collect();
        assert_eq!(pending, vec!["A", "C"]);

        let all = jobs.list(50).await.unwrap();
        assert_eq!(all.len(), 3);

        assert_eq!(jobs.pending(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_status_is_reported() {
        let jobs = repo();
        jobs.store().set(ObjectId(5), JOB_ID_FIELD, "J5").await.unwrap();
        jobs.store().set(ObjectId(5), STATUS_FIELD, "bogus").await.unwrap();
        assert!(matches!(
            jobs.load(ObjectId(5)).await,
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_kind_is_reported() {
        let jobs = repo();
        jobs.store().set(ObjectId(6), JOB_ID_FIELD, "J6").await.unwrap();
        jobs.store().set(ObjectId(6), STATUS_FIELD, "queued").await.unwrap();
        match jobs.load(ObjectId(6)).await {
            Err(StoreError::Corrupt { field, .. }) => assert_eq!(field, KIND_FIELD),
            other => panic!("expected a corrupt kind, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_submission_is_refused_while_pending() {
        let jobs = repo();
        assert!(jobs
            .record_submission(ObjectId(7), CompressionKind::Video, &handle("J1"))
            .await
            .unwrap());
        assert!(!jobs
            .record_submission(ObjectId(7), CompressionKind::Image, &handle("J2"))
            .await
            .unwrap());

        let job = jobs.load(ObjectId(7)).await.unwrap().unwrap();
        assert_eq!(job.job_id, "J1");
        assert_eq!(job.kind, CompressionKind::Video);
    }

    #[tokio::test]
    async fn test_resubmission_clears_previous_outcome() {
        let jobs = repo();
        jobs.record_submission(ObjectId(8), CompressionKind::Video, &handle("J1"))
            .await
            .unwrap();
        jobs.complete(ObjectId(8), &video_result("https://x/old.mp4")).await.unwrap();

        let bare = JobHandle {
            job_id: "J2".to_string(),
            queue_position: None,
            estimated_time: None,
        };
        assert!(jobs
            .record_submission(ObjectId(8), CompressionKind::Video, &bare)
            .await
            .unwrap());

        let job = jobs.load(ObjectId(8)).await.unwrap().unwrap();
        assert_eq!(job.job_id, "J2");
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.result.is_none());
        assert!(job.compressed_video_url.is_none());
        assert_eq!(job.queue_position, None);
        assert_eq!(job.estimated_time, None);
    }

    #[tokio::test]
    async fn test_unreadable_records_do_not_use_up_the_batch() {
        let jobs = repo();
        for id in 1..=3 {
            jobs.store().set(ObjectId(id), STATUS_FIELD, "queued").await.unwrap();
        }
        jobs.store().set(ObjectId(2), JOB_ID_FIELD, "broken").await.unwrap();
        jobs.record_submission(ObjectId(10), CompressionKind::Video, &handle("J10"))
            .await
            .unwrap();
        jobs.record_submission(ObjectId(11), CompressionKind::Video, &handle("J11"))
            .await
            .unwrap();

        let pending: Vec<_> = jobs.pending(1).await.unwrap().into_iter().map(|j| j.job_id).collect();
        assert_eq!(pending, vec!["J10"]);
        assert_eq!(jobs.pending(5).await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_completion_racing_a_stale_transition_stays_completed() {
        let jobs = repo();
        for round in 0..200u64 {
            let id = ObjectId(round);
            jobs.record_submission(id, CompressionKind::Video, &handle("J"))
                .await
                .unwrap();

            let poller = jobs.clone();
            let checker = jobs.clone();
            let advance = tokio::spawn(async move { poller.transition(id, JobStatus::Processing).await });
            let finish = tokio::spawn(async move {
                checker.complete(id, &video_result("https://x/y.mp4")).await
            });
            advance.await.unwrap().unwrap();
            assert!(finish.await.unwrap().unwrap());

            let job = jobs.load(id).await.unwrap().unwrap();
            assert_eq!(job.status, JobStatus::Completed, "round {round}");
            assert!(job.result.is_some());
        }
    }
}
