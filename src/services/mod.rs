pub mod compressor;
pub mod events;
pub mod jobs;
pub mod metadata;
pub mod reconcile;
pub mod redis_store;
pub mod submission;
