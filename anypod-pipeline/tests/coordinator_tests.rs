//! End-to-end tests for one feed's processing pass, against a stub
//! extractor instead of a real yt-dlp binary.
//!
//! Run with: cargo test --test coordinator_tests

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anypod_core::config::FeedConfig;
use anypod_core::error::{Error, ExtractorErrorKind, Result};
use anypod_core::models::{Download, DownloadId, DownloadStatus, Feed, FeedId};
use anypod_core::path_manager::PathManager;
use anypod_extractor::{
    DiscoveredSource, DownloadOptions, ExtractorWrapper, PlaylistFetchOptions, RefinedMediaFields, TranscriptRequest,
};
use anypod_pipeline::Coordinator;
use anypod_store::MetadataStore;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};

/// Always reports the same three items, in descending publish order, and
/// "downloads" by writing a small placeholder file.
struct StubExtractor {
    items: Vec<Download>,
    fail_downloads: Mutex<Vec<DownloadId>>,
}

#[async_trait]
impl ExtractorWrapper for StubExtractor {
    async fn discover_feed_properties(&self, _url: &str) -> Result<DiscoveredSource> {
        Ok(DiscoveredSource {
            source_type: anypod_core::models::SourceType::Channel,
            resolved_url: Some("https://example.test/@c/videos".to_string()),
            suggested_title: Some("Demo Channel".to_string()),
            suggested_author: None,
            feed_thumbnail_url: None,
        })
    }

    async fn fetch_playlist_metadata(
        &self,
        _feed_id: &FeedId,
        _url: &str,
        _options: &PlaylistFetchOptions,
    ) -> Result<Vec<Download>> {
        Ok(self.items.clone())
    }

    async fn download_media(
        &self,
        download: &Download,
        tmp_dir: &Path,
        _options: &DownloadOptions,
    ) -> Result<(PathBuf, RefinedMediaFields)> {
        if self.fail_downloads.lock().unwrap().contains(&download.id) {
            return Err(Error::Extractor(ExtractorErrorKind::ExtractorFailed("stub failure".to_string())));
        }
        tokio::fs::create_dir_all(tmp_dir).await.unwrap();
        let path = tmp_dir.join(format!("{}.mp4", download.id));
        tokio::fs::write(&path, b"fake-media-bytes").await.unwrap();
        Ok((
            path,
            RefinedMediaFields { ext: "mp4".to_string(), mime_type: "video/mp4".to_string(), filesize: 17, duration: 42 },
        ))
    }

    async fn download_media_thumbnail(&self, _download: &Download, _tmp_dir: &Path) -> Result<Option<PathBuf>> {
        Ok(None)
    }

    async fn download_transcript(
        &self,
        _download: &Download,
        _request: &TranscriptRequest,
        _tmp_dir: &Path,
    ) -> Result<Option<PathBuf>> {
        Ok(None)
    }
}

fn feed_config(id: &str, keep_last: Option<u32>) -> FeedConfig {
    FeedConfig {
        id: id.to_string(),
        enabled: true,
        url: Some("https://example.test/@c".to_string()),
        schedule: "0 3 * * *".to_string(),
        since: None,
        keep_last,
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

fn item(feed_id: &FeedId, id: &str, days_ago: i64) -> Download {
    let now = Utc::now();
    Download::new_discovered(
        feed_id.clone(),
        DownloadId::new(id).unwrap(),
        format!("https://example.test/{id}"),
        format!("Episode {id}"),
        now - ChronoDuration::days(days_ago),
        DownloadStatus::Queued,
        now,
    )
    .unwrap()
}

#[tokio::test]
async fn fresh_channel_first_pass_respects_keep_last() {
    let pool = anypod_store::init_in_memory().await;
    let store = MetadataStore::new(pool);
    let feed_id = FeedId::new("demo").unwrap();

    let mut feed = Feed::new_from_config(feed_id.clone(), Some("https://example.test/@c".to_string()), Utc::now());
    feed.keep_last = Some(2);
    store.feeds.insert_new(&feed).await.unwrap();

    let extractor = StubExtractor {
        items: vec![item(&feed_id, "v1", 2), item(&feed_id, "v2", 1), item(&feed_id, "v3", 0)],
        fail_downloads: Mutex::new(Vec::new()),
    };

    let tmp = tempfile::tempdir().unwrap();
    let paths = PathManager::new(tmp.path(), "http://example.test");
    let coordinator = Coordinator::new(&store, &extractor, &paths, 3);
    let config = feed_config("demo", Some(2));

    coordinator.process_feed(&feed, &config).await.unwrap();

    let v1 = store.downloads.get(&feed_id, &DownloadId::new("v1").unwrap()).await.unwrap().unwrap();
    let v2 = store.downloads.get(&feed_id, &DownloadId::new("v2").unwrap()).await.unwrap().unwrap();
    let v3 = store.downloads.get(&feed_id, &DownloadId::new("v3").unwrap()).await.unwrap().unwrap();

    assert_eq!(v1.status, DownloadStatus::Archived, "oldest item beyond keep_last must be archived");
    assert_eq!(v2.status, DownloadStatus::Downloaded);
    assert_eq!(v3.status, DownloadStatus::Downloaded);

    let xml = tokio::fs::read_to_string(paths.feed_xml_path(&feed_id)).await.unwrap();
    assert!(xml.contains("v2"));
    assert!(xml.contains("v3"));
    assert!(!xml.contains("v1.mp4"));
}

#[tokio::test]
async fn retry_ceiling_transitions_to_error_then_requeue_resets() {
    let pool = anypod_store::init_in_memory().await;
    let store = MetadataStore::new(pool);
    let feed_id = FeedId::new("demo").unwrap();
    let feed = Feed::new_from_config(feed_id.clone(), Some("https://example.test/@c".to_string()), Utc::now());
    store.feeds.insert_new(&feed).await.unwrap();

    let target = item(&feed_id, "v9", 0);
    store.downloads.upsert_download(&target).await.unwrap();

    let extractor = StubExtractor {
        items: vec![],
        fail_downloads: Mutex::new(vec![DownloadId::new("v9").unwrap()]),
    };
    let tmp = tempfile::tempdir().unwrap();
    let paths = PathManager::new(tmp.path(), "http://example.test");
    let coordinator = Coordinator::new(&store, &extractor, &paths, 3);
    let config = feed_config("demo", None);

    for _ in 0..3 {
        coordinator.process_feed(&feed, &config).await.unwrap();
    }

    let row = store.downloads.get(&feed_id, &DownloadId::new("v9").unwrap()).await.unwrap().unwrap();
    assert_eq!(row.status, DownloadStatus::Error);
    assert_eq!(row.retries, 3);

    let requeued = store.downloads.requeue_one(&feed_id, &row.id, DownloadStatus::Error).await.unwrap();
    assert!(requeued);
    let row = store.downloads.get(&feed_id, &DownloadId::new("v9").unwrap()).await.unwrap().unwrap();
    assert_eq!(row.status, DownloadStatus::Queued);
    assert_eq!(row.retries, 0);
    assert!(row.last_error.is_none());
}

#[tokio::test]
async fn prune_archives_missing_media_gracefully() {
    let pool = anypod_store::init_in_memory().await;
    let store = MetadataStore::new(pool);
    let feed_id = FeedId::new("demo").unwrap();
    let mut feed = Feed::new_from_config(feed_id.clone(), Some("https://example.test/@c".to_string()), Utc::now());
    feed.keep_last = Some(0);
    store.feeds.insert_new(&feed).await.unwrap();

    let mut downloaded = item(&feed_id, "v1", 0);
    downloaded.status = DownloadStatus::Downloaded;
    downloaded.ext = Some("mp4".to_string());
    downloaded.mime_type = Some("video/mp4".to_string());
    downloaded.filesize = Some(10);
    downloaded.duration = Some(5);
    downloaded.downloaded_at = Some(Utc::now());
    store.downloads.upsert_download(&downloaded).await.unwrap();

    let tmp = tempfile::tempdir().unwrap();
    let paths = PathManager::new(tmp.path(), "http://example.test");
    let pruner = anypod_pipeline::Pruner::new(&store, &paths);
    let outcome = pruner.run(&feed).await.unwrap();

    assert_eq!(outcome.archived, 1);
    let row = store.downloads.get(&feed_id, &DownloadId::new("v1").unwrap()).await.unwrap().unwrap();
    assert_eq!(row.status, DownloadStatus::Archived);
}
