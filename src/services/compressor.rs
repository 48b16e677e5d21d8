use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::models::api::{
    ImageData, ResultReport, StatusReport, SubmitRequest, SubmitResponse, VideoData,
};
use crate::models::job::{CompressionKind, JobHandle, ObjectId, Quality};

const API_KEY_HEADER: &str = "X-API-Key";

/// Priority sent with every submission; queue ordering is the service's concern.
pub const DEFAULT_PRIORITY: u8 = 5;

/// Image renditions requested when the caller names none.
pub const DEFAULT_VARIANTS: [&str; 3] = ["thumbnail", "medium", "large"];

/// Per-submission options.
#[derive(Debug, Clone)]
pub struct SubmitOptions {
    pub quality: Quality,
    /// Named output sizes; only sent for image compression.
    pub variants: Vec<String>,
    pub hls_enabled: bool,
    pub priority: u8,
}

impl SubmitOptions {
    pub fn with_quality(quality: Quality) -> Self {
        Self {
            quality,
            ..Self::default()
        }
    }
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            variants: DEFAULT_VARIANTS.iter().map(|v| v.to_string()).collect(),
            hls_enabled: false,
            priority: DEFAULT_PRIORITY,
        }
    }
}

/// Client for the remote compression API.
///
/// Stateless apart from its configuration: every call is a single HTTP
/// request with its own timeout, and nothing is retried.
pub struct CompressorClient {
    http: Client,
    base_url: Url,
    api_key: String,
    submit_timeout: Duration,
    query_timeout: Duration,
}

impl CompressorClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let base_url = Url::parse(&config.api_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", config.api_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(config.api_url));
        }

        let http = Client::builder()
            .user_agent(concat!("compress-relay/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url,
            api_key: config.api_key,
            submit_timeout: config.submit_timeout,
            query_timeout: config.query_timeout,
        })
    }

    /// Build `{base}/{segments...}`, escaping each segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Build the `POST /compress` body for an object.
    pub fn build_request(
        object_id: ObjectId,
        source_url: &str,
        kind: CompressionKind,
        options: &SubmitOptions,
    ) -> SubmitRequest {
        SubmitRequest {
            post_id: object_id,
            compression_type: kind,
            priority: options.priority,
            video_data: kind.includes_video().then(|| VideoData {
                file_url: source_url.to_string(),
                quality: options.quality,
                hls_enabled: options.hls_enabled,
            }),
            image_data: kind.includes_image().then(|| ImageData {
                file_url: source_url.to_string(),
                quality: options.quality,
                variants: options.variants.clone(),
            }),
        }
    }

    /// Submit a compression job. Succeeds only on HTTP 200 with a non-empty `job_id`.
    pub async fn submit(
        &self,
        object_id: ObjectId,
        source_url: &str,
        kind: CompressionKind,
        options: &SubmitOptions,
    ) -> Result<JobHandle, SubmitError> {
        let payload = Self::build_request(object_id, source_url, kind, options);

        let response = self
            .http
            .post(self.endpoint(&["compress"]))
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(self.submit_timeout)
            .json(&payload)
            .send()
            .await
            .map_err(SubmitError::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(SubmitError::Transport)?;

        if status != StatusCode::OK {
            return Err(SubmitError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let decoded: SubmitResponse = match serde_json::from_str(&body) {
            Ok(decoded) => decoded,
            Err(source) => return Err(SubmitError::Malformed { body, source }),
        };

        let Some(job_id) = decoded.job_id.filter(|id| !id.is_empty()) else {
            return Err(SubmitError::MissingJobId { body });
        };

        Ok(JobHandle {
            job_id,
            queue_position: decoded.queue_position,
            estimated_time: decoded.estimated_time.map(Duration::from_secs),
        })
    }

    /// Query the current status of a job.
    pub async fn get_status(&self, job_id: &str) -> Result<StatusReport, QueryError> {
        self.query(&["status", job_id]).await
    }

    /// Fetch the result of a job.
    pub async fn get_result(&self, job_id: &str) -> Result<ResultReport, QueryError> {
        self.query(&["result", job_id]).await
    }

    async fn query<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, QueryError> {
        let response = self
            .http
            .get(self.endpoint(segments))
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(self.query_timeout)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(QueryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|source| QueryError::Decode { body, source })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Invalid compression API URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Compression request failed: {0}")]
    Transport(reqwest::Error),

    #[error("Compression API returned status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Compression API returned an undecodable body ({source}): {body}")]
    Malformed {
        body: String,
        source: serde_json::Error,
    },

    #[error("Compression API response has no job_id: {body}")]
    MissingJobId { body: String },

    #[error("Could not resolve a source URL for object {0}")]
    UnresolvedSource(ObjectId),

    #[error("Object {0} already has a queued or processing compression job")]
    AlreadyPending(ObjectId),

    #[error("Failed to persist submitted job: {0}")]
    Store(#[from] crate::services::metadata::StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Status request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Compression API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Compression API returned an undecodable body ({source}): {body}")]
    Decode {
        body: String,
        source: serde_json::Error,
    },
}
