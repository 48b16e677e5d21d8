use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::models::job::{CompressionKind, JobStatus, ObjectId, Quality};

/// Notification that the host created a new object.
#[derive(Debug, Deserialize, Validate)]
pub struct ObjectCreatedRequest {
    #[garde(skip)]
    pub object_id: ObjectId,

    #[garde(length(min = 1, max = 255))]
    pub mime_type: String,

    #[garde(length(min = 1, max = 2048))]
    pub source_url: String,
}

/// Explicit compression request for an already registered object.
#[derive(Debug, Deserialize, Validate)]
pub struct CompressRequest {
    #[garde(skip)]
    pub kind: CompressionKind,

    #[garde(skip)]
    pub quality: Option<Quality>,

    #[garde(length(min = 1, max = 16))]
    pub variants: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct SubmittedResponse {
    pub object_id: ObjectId,
    pub job_id: Option<String>,
    pub queue_position: Option<u32>,
    pub estimated_time: Option<u64>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub object_id: ObjectId,
    pub status: JobStatus,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}
