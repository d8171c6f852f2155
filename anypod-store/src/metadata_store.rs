use sqlx::SqlitePool;

use crate::download_store::DownloadRepository;
use crate::feed_store::FeedRepository;

/// Facade combining the feed and download repositories behind one handle,
/// so the pipeline and scheduler crates depend on a single store type
/// instead of wiring both repositories themselves.
#[derive(Clone)]
pub struct MetadataStore {
    pub feeds: FeedRepository,
    pub downloads: DownloadRepository,
}

impl MetadataStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            feeds: FeedRepository::new(pool.clone()),
            downloads: DownloadRepository::new(pool),
        }
    }
}
