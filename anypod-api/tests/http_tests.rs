//! End-to-end HTTP tests against a stub extractor, exercising both
//! listeners through `tower::ServiceExt::oneshot` rather than a bound port.
//!
//! Run with: cargo test --test http_tests

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anypod_api::{admin_router, public_router, AppState};
use anypod_core::config::FeedConfig;
use anypod_core::error::{Error, ExtractorErrorKind, Result};
use anypod_core::models::{Download, DownloadId, DownloadStatus, Feed, FeedId, SourceType};
use anypod_core::path_manager::PathManager;
use anypod_extractor::{DiscoveredSource, DownloadOptions, ExtractorWrapper, PlaylistFetchOptions, RefinedMediaFields, TranscriptRequest};
use anypod_scheduler::FeedScheduler;
use anypod_store::MetadataStore;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use tower::ServiceExt;

struct StubExtractor {
    next_item: Option<Download>,
}

#[async_trait]
impl ExtractorWrapper for StubExtractor {
    async fn discover_feed_properties(&self, _url: &str) -> Result<DiscoveredSource> {
        Ok(DiscoveredSource { source_type: SourceType::SingleVideo, resolved_url: None, suggested_title: None, suggested_author: None, feed_thumbnail_url: None })
    }

    async fn fetch_playlist_metadata(&self, _feed_id: &FeedId, _url: &str, _options: &PlaylistFetchOptions) -> Result<Vec<Download>> {
        Ok(self.next_item.clone().into_iter().collect())
    }

    async fn download_media(&self, _download: &Download, _tmp_dir: &Path, _options: &DownloadOptions) -> Result<(PathBuf, RefinedMediaFields)> {
        Err(Error::Extractor(ExtractorErrorKind::ExtractorFailed("not used in this test".to_string())))
    }

    async fn download_media_thumbnail(&self, _download: &Download, _tmp_dir: &Path) -> Result<Option<PathBuf>> {
        Ok(None)
    }

    async fn download_transcript(&self, _download: &Download, _request: &TranscriptRequest, _tmp_dir: &Path) -> Result<Option<PathBuf>> {
        Ok(None)
    }
}

fn manual_config(id: &str) -> FeedConfig {
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

async fn build_state(next_item: Option<Download>) -> (AppState, tempfile::TempDir) {
    let pool = anypod_store::init_in_memory().await;
    let store = MetadataStore::new(pool);
    let feed_id = FeedId::new("demo").unwrap();
    let feed = Feed::new_from_config(feed_id.clone(), Some("https://example.test/demo".to_string()), Utc::now());
    store.feeds.insert_new(&feed).await.unwrap();

    let config = manual_config("demo");
    let tmp = tempfile::tempdir().unwrap();
    let paths = PathManager::new(tmp.path(), "http://example.test");
    let scheduler = FeedScheduler::new(store.clone(), Arc::new(StubExtractor { next_item: None }), paths.clone(), 3, vec![config.clone()]).unwrap();

    let mut feed_configs = HashMap::new();
    feed_configs.insert(feed_id, config);

    let state = AppState::new(store, paths, Arc::new(StubExtractor { next_item }), 3, scheduler, feed_configs);
    (state, tmp)
}

#[tokio::test]
async fn health_probe_returns_ok() {
    let (state, _tmp) = build_state(None).await;
    let app = public_router(state);
    let response = app
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn feed_xml_404s_before_first_pass() {
    let (state, _tmp) = build_state(None).await;
    let app = public_router(state);
    let response = app
        .oneshot(Request::builder().uri("/feeds/demo.xml").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn requeue_non_error_download_is_rejected_with_400() {
    let (state, _tmp) = build_state(None).await;
    let download = Download::new_discovered(
        FeedId::new("demo").unwrap(),
        DownloadId::new("v1").unwrap(),
        "https://example.test/v1".to_string(),
        "Episode One".to_string(),
        Utc::now(),
        DownloadStatus::Queued,
        Utc::now(),
    )
    .unwrap();
    state.store.downloads.upsert_download(&download).await.unwrap();

    let app = admin_router(state);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/feeds/demo/downloads/v1/requeue")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn repeat_manual_submission_of_downloaded_item_does_not_reschedule() {
    let mut materialized = Download::new_discovered(
        FeedId::new("demo").unwrap(),
        DownloadId::new("v1").unwrap(),
        "https://example.test/v1".to_string(),
        "Episode One".to_string(),
        Utc::now(),
        DownloadStatus::Queued,
        Utc::now(),
    )
    .unwrap();
    materialized.status = DownloadStatus::Downloaded;
    materialized.ext = Some("mp4".to_string());
    materialized.mime_type = Some("video/mp4".to_string());
    materialized.filesize = Some(1024);
    materialized.duration = Some(60);
    materialized.downloaded_at = Some(Utc::now());

    let (state, _tmp) = build_state(Some(materialized.clone())).await;
    state.store.downloads.upsert_download(&materialized).await.unwrap();

    let app = admin_router(state);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/feeds/demo/downloads")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"url":"https://example.test/v1"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["new"], false);
    assert_eq!(json["status"], "DOWNLOADED");
}

#[tokio::test]
async fn manual_submission_of_upcoming_item_is_rejected_with_422() {
    let upcoming = Download::new_discovered(
        FeedId::new("demo").unwrap(),
        DownloadId::new("v9").unwrap(),
        "https://example.test/v9".to_string(),
        "Premiere".to_string(),
        Utc::now(),
        DownloadStatus::Upcoming,
        Utc::now(),
    )
    .unwrap();
    let (state, _tmp) = build_state(Some(upcoming)).await;

    let app = admin_router(state);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/feeds/demo/downloads")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"url":"https://example.test/v9"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
