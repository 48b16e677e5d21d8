use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

use crate::models::api::ResultReport;

/// Host-owned identifier of an uploaded object (a WordPress attachment id on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ObjectId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(ObjectId)
    }
}

/// What the remote service should compress for an object.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, AsRefStr, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CompressionKind {
    Video,
    Image,
    Both,
}

impl CompressionKind {
    pub fn includes_video(self) -> bool {
        matches!(self, Self::Video | Self::Both)
    }

    pub fn includes_image(self) -> bool {
        matches!(self, Self::Image | Self::Both)
    }
}

/// Compression quality preset understood by the remote service.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, EnumString, Display, AsRefStr, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Quality {
    Low,
    #[default]
    Medium,
    High,
    Ultra,
}

/// Locally persisted status of a compression job.
///
/// Transitions only move forward: `queued -> processing -> completed | failed`.
/// Completed and failed are terminal.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, AsRefStr, IntoStaticStr, PartialEq, Eq,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Statuses the reconciler still has to poll.
    pub const PENDING: [JobStatus; 2] = [JobStatus::Queued, JobStatus::Processing];

    pub const ALL: [JobStatus; 4] = [
        JobStatus::Queued,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Processing => 1,
            Self::Completed | Self::Failed => 2,
        }
    }

    /// Whether moving from `self` to `next` is a forward transition.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    /// Stored values from which moving to `self` is allowed.
    pub fn predecessors(self) -> Vec<&'static str> {
        Self::ALL
            .into_iter()
            .filter(|current| current.can_transition_to(self))
            .map(<&'static str>::from)
            .collect()
    }

    /// Stored values of jobs that are finished and may be replaced.
    pub fn terminal_values() -> Vec<&'static str> {
        Self::ALL
            .into_iter()
            .filter(|status| status.is_terminal())
            .map(<&'static str>::from)
            .collect()
    }
}

/// Job details returned by the remote service on a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub job_id: String,
    pub queue_position: Option<u32>,
    pub estimated_time: Option<Duration>,
}

/// A compression job as reconstructed from the object's metadata fields.
#[derive(Debug, Clone, Serialize)]
pub struct CompressionJob {
    pub object_id: ObjectId,
    pub job_id: String,
    pub kind: CompressionKind,
    pub status: JobStatus,
    pub queue_position: Option<u32>,
    #[serde(with = "duration_secs")]
    pub estimated_time: Option<Duration>,
    pub compressed_video_url: Option<String>,
    pub result: Option<ResultReport>,
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }
}
