use std::collections::HashMap;
use std::sync::Arc;

use anypod_core::config::FeedConfig;
use anypod_core::error::Result;
use anypod_core::models::FeedId;
use anypod_core::path_manager::PathManager;
use anypod_extractor::ExtractorWrapper;
use anypod_pipeline::Coordinator;
use anypod_store::MetadataStore;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

struct Inner {
    store: MetadataStore,
    extractor: Arc<dyn ExtractorWrapper>,
    paths: PathManager,
    max_errors: u32,
    feed_configs: HashMap<FeedId, FeedConfig>,
    semaphore: Semaphore,
    pending: Mutex<HashMap<FeedId, JoinHandle<()>>>,
}

/// Registers cron triggers for every non-manual feed and serializes all
/// processing passes (cron-fired and manually submitted alike) behind a
/// semaphore of capacity 1, so no two feeds' passes ever run concurrently.
#[derive(Clone)]
pub struct FeedScheduler {
    inner: Arc<Inner>,
}

impl FeedScheduler {
    pub fn new(
        store: MetadataStore,
        extractor: Arc<dyn ExtractorWrapper>,
        paths: PathManager,
        max_errors: u32,
        feed_configs: Vec<FeedConfig>,
    ) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(feed_configs.len());
        for config in feed_configs {
            let feed_id = FeedId::new(&config.id)?;
            by_id.insert(feed_id, config);
        }
        Ok(Self {
            inner: Arc::new(Inner {
                store,
                extractor,
                paths,
                max_errors,
                feed_configs: by_id,
                semaphore: Semaphore::new(1),
                pending: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Spawns one background task per feed with a real cron schedule (feeds
    /// configured as `"manual"` are skipped). Each task sleeps until its
    /// next scheduled fire time, then submits a pass the same way a manual
    /// submission would. Returns the task handles so the caller can abort
    /// them on shutdown.
    pub fn spawn_cron_triggers(&self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        for (feed_id, config) in &self.inner.feed_configs {
            if config.is_manual() {
                continue;
            }
            let scheduler = self.clone();
            let feed_id = feed_id.clone();
            handles.push(tokio::spawn(async move {
                scheduler.run_cron_loop(feed_id).await;
            }));
        }
        handles
    }

    async fn run_cron_loop(&self, feed_id: FeedId) {
        loop {
            let Some(config) = self.inner.feed_configs.get(&feed_id) else { return };
            // Schedules are validated eagerly at startup
            // (`config::validate_feed_configs`), so a parse error here would
            // mean that check was skipped or the config mutated since boot.
            let schedule = match config.cron_schedule() {
                Ok(schedule) => schedule,
                Err(e) => {
                    error!(feed_id = %feed_id, error = %e, "invalid cron schedule, trigger disabled");
                    return;
                }
            };
            let Some(next_fire) = schedule.upcoming(chrono::Utc).next() else {
                warn!(feed_id = %feed_id, "cron schedule has no upcoming fire time, trigger disabled");
                return;
            };
            let delay = (next_fire - chrono::Utc::now()).to_std().unwrap_or(std::time::Duration::ZERO);
            tokio::time::sleep(delay).await;
            self.submit(feed_id.clone()).await;
        }
    }

    /// Submits a processing pass for `feed_id`, deduplicating against any
    /// task already queued-but-not-started for the same feed. Used by both
    /// cron triggers and admin-initiated manual submissions/requeues — both
    /// are just callers of the same submission path.
    pub async fn submit(&self, feed_id: FeedId) {
        let mut pending = self.inner.pending.lock().await;
        if let Some(handle) = pending.get(&feed_id) {
            if !handle.is_finished() {
                return;
            }
        }
        let scheduler = self.clone();
        let spawned_id = feed_id.clone();
        let handle = tokio::spawn(async move {
            scheduler.run_one(spawned_id).await;
        });
        pending.insert(feed_id, handle);
    }

    async fn run_one(&self, feed_id: FeedId) {
        let permit = match self.inner.semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_) => return,
        };
        // Clear the registry slot as soon as the permit is held, not when
        // the pass finishes, so a submission arriving mid-run schedules a
        // fresh follow-up task rather than being silently dropped.
        self.inner.pending.lock().await.remove(&feed_id);

        if let Err(e) = self.execute_pass(&feed_id).await {
            error!(feed_id = %feed_id, error = %e, "feed pass failed");
        }
        drop(permit);
    }

    async fn execute_pass(&self, feed_id: &FeedId) -> Result<()> {
        let Some(config) = self.inner.feed_configs.get(feed_id) else {
            warn!(feed_id = %feed_id, "submission for a feed absent from configuration, skipping");
            return Ok(());
        };
        let Some(feed) = self.inner.store.feeds.get(feed_id).await? else {
            warn!(feed_id = %feed_id, "submission for a feed with no stored row, skipping");
            return Ok(());
        };
        if !feed.is_enabled {
            info!(feed_id = %feed_id, "skipping pass for disabled feed");
            return Ok(());
        }

        let coordinator = Coordinator::new(&self.inner.store, &*self.inner.extractor, &self.inner.paths, self.inner.max_errors);
        let outcome = coordinator.process_feed(&feed, config).await?;
        info!(
            feed_id = %feed_id,
            inserted = outcome.inserted,
            downloaded = outcome.downloaded,
            errored = outcome.errored,
            archived = outcome.archived,
            "feed pass complete"
        );
        Ok(())
    }
}
