use anypod_core::config::FeedConfig;
use anypod_core::error::Result;
use anypod_core::models::{DownloadStatus, Feed};
use anypod_extractor::{ExtractorWrapper, PlaylistFetchOptions};
use anypod_store::MetadataStore;
use chrono::Utc;
use tracing::{debug, info, warn};

/// Discovers new items for one feed and keeps its `UPCOMING` set honest.
/// Stateless: all state lives in the `MetadataStore`.
pub struct Enqueuer<'a> {
    store: &'a MetadataStore,
    extractor: &'a dyn ExtractorWrapper,
}

#[derive(Debug, Default)]
pub struct EnqueueOutcome {
    pub inserted: u32,
    pub upserted: u32,
    pub upcoming_promoted: u32,
    pub upcoming_archived: u32,
}

impl<'a> Enqueuer<'a> {
    pub fn new(store: &'a MetadataStore, extractor: &'a dyn ExtractorWrapper) -> Self {
        Self { store, extractor }
    }

    pub async fn run(&self, feed: &Feed, feed_config: &FeedConfig) -> Result<EnqueueOutcome> {
        let mut outcome = EnqueueOutcome::default();

        if let Err(e) = self.reconcile_upcoming(feed, &mut outcome).await {
            warn!(feed_id = %feed.id, error = %e, "reconciling upcoming downloads failed; continuing enqueue pass");
        }

        let fetch_result = self.fetch_current_items(feed, feed_config).await;
        match fetch_result {
            Ok(items) => {
                for item in items {
                    if let Some(since) = feed.since {
                        if item.published < since {
                            continue;
                        }
                    }
                    let existing = self.store.downloads.get(&feed.id, &item.id).await?;
                    match existing {
                        Some(_) => {
                            self.store.downloads.upsert_download(&item).await?;
                            outcome.upserted += 1;
                        }
                        None => {
                            self.store.downloads.upsert_download(&item).await?;
                            outcome.inserted += 1;
                        }
                    }
                }
                self.store.feeds.record_sync_success(&feed.id, Utc::now()).await?;
                info!(feed_id = %feed.id, inserted = outcome.inserted, upserted = outcome.upserted, "enqueue pass completed");
                Ok(outcome)
            }
            Err(e) => {
                self.store.feeds.record_sync_failure(&feed.id, Utc::now()).await?;
                warn!(feed_id = %feed.id, error = %e, "enqueue pass failed fatally");
                Err(e)
            }
        }
    }

    async fn reconcile_upcoming(&self, feed: &Feed, outcome: &mut EnqueueOutcome) -> Result<()> {
        let upcoming = self.store.downloads.list_upcoming(&feed.id).await?;
        for download in upcoming {
            let options = PlaylistFetchOptions {
                since: None,
                keep_last: Some(1),
                auth: Default::default(),
            };
            let refreshed = match self
                .extractor
                .fetch_playlist_metadata(&feed.id, &download.source_url, &options)
                .await
            {
                Ok(items) => items,
                Err(e) => {
                    debug!(feed_id = %feed.id, download_id = %download.id, error = %e, "could not re-poll upcoming item");
                    continue;
                }
            };

            if let Some(fresh) = refreshed.into_iter().next() {
                if fresh.status == DownloadStatus::Queued {
                    self.store.downloads.mark_upcoming_as_queued(&feed.id, &download.id).await?;
                    outcome.upcoming_promoted += 1;
                    continue;
                }
            }

            if let Some(since) = feed.since {
                if download.published < since {
                    self.store.downloads.archive(&feed.id, &download.id).await?;
                    outcome.upcoming_archived += 1;
                }
            }
        }
        Ok(())
    }

    async fn fetch_current_items(
        &self,
        feed: &Feed,
        feed_config: &FeedConfig,
    ) -> Result<Vec<anypod_core::models::Download>> {
        let url = feed
            .resolved_url
            .clone()
            .or_else(|| feed.source_url.clone())
            .ok_or_else(|| anypod_core::error::Error::Configuration(format!("feed {} has no source url", feed.id)))?;

        let options = PlaylistFetchOptions {
            since: feed.since,
            keep_last: feed.keep_last,
            auth: anypod_extractor::AuthOptions {
                cookies_path: feed_config.cookies_path.clone(),
                pot_provider_url: None,
            },
        };
        self.extractor.fetch_playlist_metadata(&feed.id, &url, &options).await
    }
}
