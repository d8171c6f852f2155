use anypod_core::error::Result;
use anypod_core::file_store::FileStore;
use anypod_core::models::{Download, DownloadStatus, Feed};
use anypod_core::path_manager::PathManager;
use anypod_store::MetadataStore;
use tracing::{info, warn};

/// Applies `keep_last` and `since` retention to one feed's active downloads.
pub struct Pruner<'a> {
    store: &'a MetadataStore,
    paths: &'a PathManager,
}

#[derive(Debug, Default)]
pub struct PruneOutcome {
    pub archived: u32,
}

impl<'a> Pruner<'a> {
    pub fn new(store: &'a MetadataStore, paths: &'a PathManager) -> Self {
        Self { store, paths }
    }

    pub async fn run(&self, feed: &Feed) -> Result<PruneOutcome> {
        let mut candidates: Vec<Download> = Vec::new();

        if let Some(keep_last) = feed.keep_last {
            candidates.extend(self.store.downloads.list_candidates_by_keep_last(&feed.id, keep_last).await?);
        }
        if let Some(since) = feed.since {
            candidates.extend(self.store.downloads.list_candidates_by_before_date(&feed.id, since).await?);
        }
        candidates.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        candidates.dedup_by(|a, b| a.id == b.id);

        let mut outcome = PruneOutcome::default();
        for download in &candidates {
            if download.status == DownloadStatus::Downloaded {
                self.delete_artifacts(feed, download).await;
            }
            self.store.downloads.archive(&feed.id, &download.id).await?;
            outcome.archived += 1;
            info!(feed_id = %feed.id, download_id = %download.id, "archived by retention policy");
        }

        let total = self.store.downloads.count_non_archived(&feed.id).await?;
        self.store.feeds.set_total_downloads(&feed.id, total).await?;

        Ok(outcome)
    }

    async fn delete_artifacts(&self, feed: &Feed, download: &Download) {
        let store = FileStore;
        if let Some(ext) = &download.ext {
            if let Ok(path) = self.paths.media_path(&feed.id, &download.id, ext) {
                match store.delete(&path).await {
                    Ok(false) => warn!(feed_id = %feed.id, download_id = %download.id, "media file already absent during prune"),
                    Err(e) => warn!(feed_id = %feed.id, download_id = %download.id, error = %e, "failed to delete media file during prune"),
                    Ok(true) => {}
                }
            }
        }
        if let Some(ext) = &download.thumbnail_ext {
            if let Ok(path) = self.paths.image_path(&feed.id, Some(&download.id), ext) {
                let _ = store.delete(&path).await;
            }
        }
        if let (Some(ext), Some(lang)) = (&download.transcript_ext, &download.transcript_lang) {
            if let Ok(path) = self.paths.transcript_path(&feed.id, &download.id, lang, ext) {
                let _ = store.delete(&path).await;
            }
        }
    }
}
