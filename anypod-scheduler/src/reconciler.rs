use anypod_core::config::FeedConfig;
use anypod_core::error::Result;
use anypod_core::models::{Feed, FeedId};
use anypod_store::FeedRepository;
use chrono::Utc;
use tracing::{info, warn};

/// Startup reconciliation between configured feeds and stored rows: new
/// configuration entries get a fresh row, rows whose feed id dropped out of
/// configuration are disabled (never deleted), and feeds present in both
/// are left untouched.
pub struct StateReconciler<'a> {
    feeds: &'a FeedRepository,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub inserted: u32,
    pub disabled: u64,
}

impl<'a> StateReconciler<'a> {
    pub const fn new(feeds: &'a FeedRepository) -> Self {
        Self { feeds }
    }

    pub async fn reconcile(&self, configs: &[FeedConfig]) -> Result<ReconcileOutcome> {
        let mut outcome = ReconcileOutcome::default();
        let mut known_ids = Vec::with_capacity(configs.len());

        for config in configs {
            let feed_id = FeedId::new(&config.id)?;
            if self.feeds.get(&feed_id).await?.is_none() {
                let feed = Feed::new_from_config(feed_id.clone(), config.url.clone(), Utc::now());
                self.feeds.insert_new(&feed).await?;
                outcome.inserted += 1;
                info!(feed_id = %feed.id, "registered new feed from configuration");
            }
            // Re-applied on every boot, not just on insert, so editing a
            // feed's retention or presentation settings in configuration
            // takes effect without deleting and re-adding the feed entry.
            self.feeds.apply_config(&feed_id, config).await?;
            known_ids.push(feed_id);
        }

        outcome.disabled = self.feeds.disable_missing(&known_ids).await?;
        if outcome.disabled > 0 {
            warn!(count = outcome.disabled, "disabled feeds no longer present in configuration");
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use anypod_store::MetadataStore;

    use super::*;

    fn config(id: &str) -> FeedConfig {
        FeedConfig {
            id: id.to_string(),
            enabled: true,
            url: Some(format!("https://example.test/{id}")),
            schedule: "manual".to_string(),
            since: None,
            keep_last: None,
            title: None,
            subtitle: None,
            description: None,
            language: None,
            author: None,
            author_email: None,
            remote_image_url: None,
            category: None,
            podcast_type: None,
            explicit: None,
            transcript_lang: None,
            transcript_source_priority: None,
            cookies_path: None,
        }
    }

    #[tokio::test]
    async fn inserts_new_and_disables_dropped_feeds() {
        let pool = anypod_store::init_in_memory().await;
        let store = MetadataStore::new(pool);

        let reconciler = StateReconciler::new(&store.feeds);
        let outcome = reconciler.reconcile(&[config("a"), config("b")]).await.unwrap();
        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.disabled, 0);

        // "b" dropped out of configuration on the next boot.
        let outcome = reconciler.reconcile(&[config("a")]).await.unwrap();
        assert_eq!(outcome.inserted, 0);
        assert_eq!(outcome.disabled, 1);

        let a = store.feeds.get(&FeedId::new("a").unwrap()).await.unwrap().unwrap();
        let b = store.feeds.get(&FeedId::new("b").unwrap()).await.unwrap().unwrap();
        assert!(a.is_enabled);
        assert!(!b.is_enabled);
    }

    #[tokio::test]
    async fn leaves_existing_feed_untouched() {
        let pool = anypod_store::init_in_memory().await;
        let store = MetadataStore::new(pool);
        let reconciler = StateReconciler::new(&store.feeds);

        reconciler.reconcile(&[config("a")]).await.unwrap();
        store.feeds.record_sync_success(&FeedId::new("a").unwrap(), Utc::now()).await.unwrap();

        reconciler.reconcile(&[config("a")]).await.unwrap();
        let a = store.feeds.get(&FeedId::new("a").unwrap()).await.unwrap().unwrap();
        assert!(a.last_successful_sync.is_some(), "re-reconciling must not reset an existing row");
    }

    #[tokio::test]
    async fn reconcile_applies_retention_settings_from_config() {
        let pool = anypod_store::init_in_memory().await;
        let store = MetadataStore::new(pool);
        let reconciler = StateReconciler::new(&store.feeds);

        let mut cfg = config("a");
        cfg.keep_last = Some(2);
        cfg.since = Some(Utc::now());
        reconciler.reconcile(&[cfg]).await.unwrap();

        let a = store.feeds.get(&FeedId::new("a").unwrap()).await.unwrap().unwrap();
        assert_eq!(a.keep_last, Some(2));
        assert!(a.since.is_some());
    }

    #[tokio::test]
    async fn reconcile_does_not_clear_a_previously_set_title_when_config_omits_it() {
        let pool = anypod_store::init_in_memory().await;
        let store = MetadataStore::new(pool);
        let reconciler = StateReconciler::new(&store.feeds);

        let mut titled = config("a");
        titled.title = Some("Configured Title".to_string());
        reconciler.reconcile(&[titled]).await.unwrap();
        let feed_id = FeedId::new("a").unwrap();
        let a = store.feeds.get(&feed_id).await.unwrap().unwrap();
        assert_eq!(a.title, Some("Configured Title".to_string()));

        // A later boot's config drops the `title` override (back to `None`);
        // reconciling with it must not blank out the title already stored.
        let mut cfg = config("a");
        cfg.keep_last = Some(5);
        reconciler.reconcile(&[cfg]).await.unwrap();
        let a = store.feeds.get(&feed_id).await.unwrap().unwrap();
        assert_eq!(a.title, Some("Configured Title".to_string()), "applying keep_last must not reset title");
        assert_eq!(a.keep_last, Some(5));
    }
}
