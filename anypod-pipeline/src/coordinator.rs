use anypod_core::config::FeedConfig;
use anypod_core::error::{Error, Result};
use anypod_core::file_store::FileStore;
use anypod_core::models::{DownloadId, DownloadStatus, Feed};
use anypod_core::path_manager::PathManager;
use anypod_extractor::{ArtifactMask, DownloadOptions, ExtractorWrapper, PlaylistFetchOptions};
use anypod_store::MetadataStore;
use chrono::Utc;
use tracing::{info, warn};

use crate::downloader::Downloader;
use crate::enqueuer::Enqueuer;
use crate::pruner::Pruner;
use crate::rss::render_feed_xml;

/// Orchestrates a single feed's processing pass: enqueue → download → prune
/// → regenerate RSS. Also exposes targeted operations that reuse the phases
/// without running a whole pass.
pub struct Coordinator<'a> {
    store: &'a MetadataStore,
    extractor: &'a dyn ExtractorWrapper,
    paths: &'a PathManager,
    max_errors: u32,
}

#[derive(Debug, Default)]
pub struct PassOutcome {
    pub inserted: u32,
    pub downloaded: u32,
    pub errored: u32,
    pub archived: u32,
}

#[derive(Debug)]
pub struct RefreshOutcome {
    pub metadata_changed: bool,
    pub updated_fields: Vec<&'static str>,
    pub thumbnail_refreshed: bool,
    pub transcript_refreshed: bool,
}

#[derive(Debug)]
pub struct ManualSubmissionOutcome {
    pub download_id: DownloadId,
    pub status: DownloadStatus,
    pub new: bool,
    /// Whether this call actually changed the row's status (a fresh insert
    /// or an ERROR/ARCHIVED row requeued to QUEUED). Repeating a submission
    /// against an already-materialized item leaves this `false`, so callers
    /// know not to schedule another pass.
    pub needs_pass: bool,
}

impl<'a> Coordinator<'a> {
    pub fn new(store: &'a MetadataStore, extractor: &'a dyn ExtractorWrapper, paths: &'a PathManager, max_errors: u32) -> Self {
        Self { store, extractor, paths, max_errors }
    }

    /// Runs all four phases in order. Phase-level fatal failures abort the
    /// remaining phases except RSS regeneration, which still runs whenever
    /// `DOWNLOADED` rows exist.
    pub async fn process_feed(&self, feed: &Feed, feed_config: &FeedConfig) -> Result<PassOutcome> {
        let mut outcome = PassOutcome::default();

        let enqueue_result = Enqueuer::new(self.store, self.extractor).run(feed, feed_config).await;
        match enqueue_result {
            Ok(enqueue_outcome) => outcome.inserted = enqueue_outcome.inserted,
            Err(e) => {
                warn!(feed_id = %feed.id, error = %e, "enqueue phase failed fatally; skipping download and prune");
                self.regenerate_rss_if_any_downloaded(feed).await;
                return Err(e);
            }
        }

        let download_outcome = Downloader::new(self.store, self.extractor, self.paths, self.max_errors).run(feed).await?;
        outcome.downloaded = download_outcome.downloaded;
        outcome.errored = download_outcome.errored;

        let prune_outcome = Pruner::new(self.store, self.paths).run(feed).await?;
        outcome.archived = prune_outcome.archived;

        self.regenerate_rss_if_any_downloaded(feed).await;

        info!(feed_id = %feed.id, ?outcome, "feed pass completed");
        Ok(outcome)
    }

    async fn regenerate_rss_if_any_downloaded(&self, feed: &Feed) {
        if let Err(e) = self.regenerate_rss(feed).await {
            warn!(feed_id = %feed.id, error = %e, "rss regeneration failed");
        }
    }

    async fn regenerate_rss(&self, feed: &Feed) -> Result<()> {
        let downloaded = self
            .store
            .downloads
            .list_by_status(Some(&feed.id), DownloadStatus::Downloaded, i64::MAX, 0)
            .await?;
        let mut sorted = downloaded;
        sorted.sort_by(|a, b| b.published.cmp(&a.published));

        let xml = render_feed_xml(feed, &sorted, self.paths)?;
        let target = self.paths.feed_xml_path(&feed.id);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| Error::Filesystem(e.to_string()))?;
        }
        FileStore.save(&target, xml.as_bytes()).await?;
        self.store.feeds.set_last_rss_generation(&feed.id, Utc::now()).await?;
        Ok(())
    }

    /// Re-fetches single-item metadata via the extractor, diff-merges into
    /// the row, and optionally triggers artifact-selective re-downloads when
    /// the thumbnail URL or transcript metadata changed.
    pub async fn refresh_download_metadata(
        &self,
        feed: &Feed,
        download_id: &DownloadId,
        refresh_transcript: bool,
    ) -> Result<RefreshOutcome> {
        let existing = self
            .store
            .downloads
            .get(&feed.id, download_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("download {}/{}", feed.id, download_id)))?;

        let options = PlaylistFetchOptions { since: None, keep_last: Some(1), auth: Default::default() };
        let refreshed = self
            .extractor
            .fetch_playlist_metadata(&feed.id, &existing.source_url, &options)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Extractor(anypod_core::ExtractorErrorKind::NotFound))?;

        let mut updated_fields = Vec::new();
        let mut merged = existing.clone();
        if merged.title != refreshed.title {
            merged.title = refreshed.title.clone();
            updated_fields.push("title");
        }
        if merged.description != refreshed.description {
            merged.description = refreshed.description.clone();
            updated_fields.push("description");
        }
        let thumbnail_url_changed = merged.remote_thumbnail_url != refreshed.remote_thumbnail_url;
        if thumbnail_url_changed {
            merged.remote_thumbnail_url = refreshed.remote_thumbnail_url.clone();
            updated_fields.push("remote_thumbnail_url");
        }
        merged.updated_at = Utc::now();

        let metadata_changed = !updated_fields.is_empty();
        if metadata_changed {
            self.store.downloads.upsert_download(&merged).await?;
        }

        let downloader = Downloader::new(self.store, self.extractor, self.paths, self.max_errors);
        let mut thumbnail_refreshed = false;
        if thumbnail_url_changed {
            if let Err(e) = downloader.download_artifacts(feed, &merged, ArtifactMask { media: false, thumbnail: true, transcript: false }).await {
                warn!(download_id = %download_id, error = %e, "thumbnail refresh failed");
            } else {
                thumbnail_refreshed = true;
            }
        }

        let mut transcript_refreshed = false;
        if refresh_transcript && feed.transcript_lang.is_some() {
            if let Err(e) = downloader.download_artifacts(feed, &merged, ArtifactMask { media: false, thumbnail: false, transcript: true }).await {
                warn!(download_id = %download_id, error = %e, "transcript refresh failed");
            } else {
                transcript_refreshed = true;
            }
        }

        Ok(RefreshOutcome { metadata_changed, updated_fields, thumbnail_refreshed, transcript_refreshed })
    }

    /// For manual feeds: fetch single-item metadata, insert or requeue the
    /// row. The caller (the scheduler's task registry) is responsible for
    /// scheduling the resulting background pass.
    pub async fn add_manual_submission(&self, feed: &Feed, url: &str) -> Result<ManualSubmissionOutcome> {
        let options = PlaylistFetchOptions { since: None, keep_last: Some(1), auth: Default::default() };
        let item = self
            .extractor
            .fetch_playlist_metadata(&feed.id, url, &options)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Extractor(anypod_core::ExtractorErrorKind::NotFound))?;

        if item.status == DownloadStatus::Upcoming {
            return Err(Error::Extractor(anypod_core::ExtractorErrorKind::ItemFiltered));
        }

        let existing = self.store.downloads.get(&feed.id, &item.id).await?;
        let (status, is_new, needs_pass) = match existing {
            Some(row) => {
                if row.status == DownloadStatus::Error || row.status == DownloadStatus::Archived {
                    self.store.downloads.requeue_one(&feed.id, &row.id, row.status).await?;
                    (DownloadStatus::Queued, false, true)
                } else {
                    (row.status, false, false)
                }
            }
            None => {
                self.store.downloads.upsert_download(&item).await?;
                (item.status, true, true)
            }
        };

        Ok(ManualSubmissionOutcome { download_id: item.id, status, new: is_new, needs_pass })
    }
}
