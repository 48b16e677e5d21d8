use std::sync::Arc;

use crate::config::{AppConfig, ReconcileConfig};
use crate::models::job::Quality;
use crate::services::{
    compressor::CompressorClient,
    events::EventAdapter,
    jobs::JobRepository,
    metadata::MetadataStore,
    reconcile::Reconciler,
    submission::{MetadataSourceResolver, Submitter},
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<CompressorClient>,
    pub jobs: JobRepository,
    pub submitter: Arc<Submitter>,
    pub events: Arc<EventAdapter>,
    pub reconciler: Arc<Reconciler>,
    pub default_quality: Quality,
}

impl AppState {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        client: CompressorClient,
        auto_compress: bool,
        default_quality: Quality,
        reconcile: ReconcileConfig,
    ) -> Self {
        let client = Arc::new(client);
        let jobs = JobRepository::new(store);
        let resolver = Arc::new(MetadataSourceResolver::new(jobs.clone()));
        let submitter = Arc::new(Submitter::new(client.clone(), jobs.clone(), resolver));
        let events = Arc::new(EventAdapter::new(
            submitter.clone(),
            auto_compress,
            default_quality,
        ));
        let reconciler = Arc::new(Reconciler::new(client.clone(), jobs.clone(), reconcile));

        Self {
            client,
            jobs,
            submitter,
            events,
            reconciler,
            default_quality,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn MetadataStore>,
        client: CompressorClient,
    ) -> Self {
        Self::new(
            store,
            client,
            config.auto_compress,
            config.default_quality,
            config.reconcile_config(),
        )
    }
}
