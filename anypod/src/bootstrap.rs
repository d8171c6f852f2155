use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use anypod_core::config::{load_feed_configs, validate_feed_configs, FeedConfig, Settings};
use anypod_core::models::FeedId;
use anypod_core::path_manager::PathManager;
use anypod_extractor::{ExtractorWrapper, YtDlpWrapper};
use anypod_scheduler::{FeedScheduler, StateReconciler};
use anypod_store::MetadataStore;
use tracing::{info, warn};

pub struct Bootstrapped {
    pub store: MetadataStore,
    pub paths: PathManager,
    pub extractor: Arc<dyn ExtractorWrapper>,
    pub scheduler: FeedScheduler,
    pub feed_configs: HashMap<FeedId, FeedConfig>,
}

/// Loads settings, opens the database, reconciles feeds, and wires up the
/// scheduler. Any failure here is a startup error (exit code 1).
pub async fn bootstrap(settings: &Settings) -> Result<Bootstrapped> {
    let paths = PathManager::new(settings.data_dir.clone(), settings.base_url.clone());

    let pool = anypod_store::init_database(&paths.db_path("anypod.sqlite3"))
        .await
        .context("initializing database")?;
    let store = MetadataStore::new(pool);

    let feed_configs: Vec<FeedConfig> = match &settings.config_file {
        Some(path) => load_feed_configs(path).with_context(|| format!("loading feed config {}", path.display()))?,
        None => {
            warn!("no config_file set; starting with zero configured feeds");
            Vec::new()
        }
    };

    if let Err(errors) = validate_feed_configs(&feed_configs) {
        for err in &errors {
            warn!("{err}");
        }
        bail!("invalid feed configuration: {}", errors.join("; "));
    }

    let reconciler = StateReconciler::new(&store.feeds);
    let reconcile_outcome = reconciler.reconcile(&feed_configs).await.context("reconciling feed configuration")?;
    info!(inserted = reconcile_outcome.inserted, disabled = reconcile_outcome.disabled, "feed configuration reconciled");

    let extractor: Arc<dyn ExtractorWrapper> = Arc::new(
        YtDlpWrapper::new("yt-dlp", Duration::from_secs(300))
            .with_cookies(settings.cookies_path.clone())
            .with_pot_provider(settings.pot_provider_url.clone()),
    );

    let scheduler = FeedScheduler::new(store.clone(), extractor.clone(), paths.clone(), settings.max_errors, feed_configs.clone())
        .context("building feed scheduler")?;

    let mut feed_config_map = HashMap::with_capacity(feed_configs.len());
    for config in feed_configs {
        feed_config_map.insert(FeedId::new(&config.id)?, config);
    }

    Ok(Bootstrapped { store, paths, extractor, scheduler, feed_configs: feed_config_map })
}
