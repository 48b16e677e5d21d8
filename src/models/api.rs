//! Wire types for the remote compression API.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::job::{CompressionKind, JobStatus, ObjectId, Quality};

/// Body of `POST {base}/compress`.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitRequest {
    pub post_id: ObjectId,
    pub compression_type: CompressionKind,
    pub priority: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_data: Option<VideoData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_data: Option<ImageData>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoData {
    pub file_url: String,
    pub quality: Quality,
    pub hls_enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageData {
    pub file_url: String,
    pub quality: Quality,
    pub variants: Vec<String>,
}

/// Success body of `POST {base}/compress`. `job_id` is checked by the client
/// so a missing id can be reported with the raw body.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    pub job_id: Option<String>,
    #[serde(default)]
    pub queue_position: Option<u32>,
    #[serde(default)]
    pub estimated_time: Option<u64>,
}

/// Job status as reported by the remote service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    Pending,
    Queued,
    Scheduled,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl RemoteStatus {
    /// Maps the remote vocabulary onto the locally persisted statuses.
    pub fn local(self) -> JobStatus {
        match self {
            Self::Pending | Self::Queued | Self::Scheduled => JobStatus::Queued,
            Self::Processing => JobStatus::Processing,
            Self::Completed => JobStatus::Completed,
            Self::Failed | Self::Cancelled => JobStatus::Failed,
        }
    }
}

/// Body of `GET {base}/status/{job_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    #[serde(default)]
    pub job_id: Option<String>,
    pub overall_status: RemoteStatus,
    #[serde(default)]
    pub overall_progress: Option<u8>,
    #[serde(default)]
    pub estimated_time: Option<u64>,
}

/// Body of `GET {base}/result/{job_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub overall_status: RemoteStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_result: Option<VideoResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_result: Option<ImageResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ResultReport {
    /// True when at least one of the video or image sub-results is present.
    pub fn has_payload(&self) -> bool {
        self.video_result.is_some() || self.image_result.is_some()
    }

    pub fn compressed_video_url(&self) -> Option<&str> {
        self.video_result
            .as_ref()
            .and_then(|v| v.compressed_url.as_deref())
            .filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compressed_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hls_playlist_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compressed_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResult {
    #[serde(default)]
    pub variants: BTreeMap<String, ImageVariant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compressed_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageVariant {
    pub url: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub dimensions: Option<String>,
}
