use std::sync::Arc;

use crate::models::job::{CompressionKind, JobHandle, ObjectId, Quality};
use crate::services::compressor::{SubmitError, SubmitOptions};
use crate::services::submission::Submitter;

/// Compression kind for a newly created object, or `None` when it is neither
/// a video nor an image.
pub fn kind_for_mime(mime_type: &str) -> Option<CompressionKind> {
    let (top_level, _) = mime_type.split_once('/')?;
    match top_level.trim().to_ascii_lowercase().as_str() {
        "video" => Some(CompressionKind::Video),
        "image" => Some(CompressionKind::Image),
        _ => None,
    }
}

/// Turns host "object created" events into compression submissions.
pub struct EventAdapter {
    submitter: Arc<Submitter>,
    auto_compress: bool,
    default_quality: Quality,
}

impl EventAdapter {
    pub fn new(submitter: Arc<Submitter>, auto_compress: bool, default_quality: Quality) -> Self {
        Self {
            submitter,
            auto_compress,
            default_quality,
        }
    }

    /// Returns the submitted job, or `None` when the object was skipped.
    pub async fn on_object_created(
        &self,
        id: ObjectId,
        mime_type: &str,
    ) -> Result<Option<JobHandle>, SubmitError> {
        if !self.auto_compress {
            tracing::debug!(object_id = %id, "Auto compression disabled, ignoring new object");
            return Ok(None);
        }

        let Some(kind) = kind_for_mime(mime_type) else {
            tracing::debug!(object_id = %id, mime_type, "Not a video or image, ignoring");
            return Ok(None);
        };

        let options = SubmitOptions::with_quality(self.default_quality);
        self.submitter.submit(id, kind, &options).await.map(Some)
    }
}
