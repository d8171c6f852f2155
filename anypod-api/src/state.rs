use std::collections::HashMap;
use std::sync::Arc;

use anypod_core::config::FeedConfig;
use anypod_core::models::FeedId;
use anypod_core::path_manager::PathManager;
use anypod_extractor::ExtractorWrapper;
use anypod_scheduler::FeedScheduler;
use anypod_store::MetadataStore;

/// Shared handles the HTTP layer needs. The read side talks to `store` and
/// `paths` directly; the admin side additionally drives `scheduler` for
/// background passes and constructs a `Coordinator` on demand from
/// `extractor`/`paths`/`max_errors` for its synchronous operations.
#[derive(Clone)]
pub struct AppState {
    pub store: MetadataStore,
    pub paths: Arc<PathManager>,
    pub extractor: Arc<dyn ExtractorWrapper>,
    pub max_errors: u32,
    pub scheduler: FeedScheduler,
    pub feed_configs: Arc<HashMap<FeedId, FeedConfig>>,
}

impl AppState {
    pub fn new(
        store: MetadataStore,
        paths: PathManager,
        extractor: Arc<dyn ExtractorWrapper>,
        max_errors: u32,
        scheduler: FeedScheduler,
        feed_configs: HashMap<FeedId, FeedConfig>,
    ) -> Self {
        Self { store, paths: Arc::new(paths), extractor, max_errors, scheduler, feed_configs: Arc::new(feed_configs) }
    }
}
