pub mod download_store;
pub mod feed_store;
pub mod metadata_store;
pub mod pool;
mod rows;

pub use download_store::DownloadRepository;
pub use feed_store::FeedRepository;
pub use metadata_store::MetadataStore;
pub use pool::{init_database, init_in_memory};

#[cfg(test)]
mod tests {
    use anypod_core::models::{Download, DownloadStatus, Feed, FeedId, SourceType};
    use chrono::Utc;

    use super::*;

    async fn store() -> MetadataStore {
        MetadataStore::new(pool::init_in_memory().await)
    }

    #[tokio::test]
    async fn insert_and_get_feed_round_trips() {
        let store = store().await;
        let feed = Feed::new_from_config(
            FeedId::new("demo").unwrap(),
            Some("https://example.test/channel".to_string()),
            Utc::now(),
        );
        store.feeds.insert_new(&feed).await.unwrap();
        let fetched = store.feeds.get(&feed.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, feed.id);
        assert_eq!(fetched.source_type, SourceType::Unknown);
    }

    #[tokio::test]
    async fn disable_missing_leaves_known_feeds_enabled() {
        let store = store().await;
        let a = Feed::new_from_config(FeedId::new("a").unwrap(), None, Utc::now());
        let b = Feed::new_from_config(FeedId::new("b").unwrap(), None, Utc::now());
        store.feeds.insert_new(&a).await.unwrap();
        store.feeds.insert_new(&b).await.unwrap();

        let affected = store.feeds.disable_missing(&[a.id.clone()]).await.unwrap();
        assert_eq!(affected, 1);

        assert!(store.feeds.get(&a.id).await.unwrap().unwrap().is_enabled);
        assert!(!store.feeds.get(&b.id).await.unwrap().unwrap().is_enabled);
    }

    #[tokio::test]
    async fn download_lifecycle_through_mark_downloaded() {
        let store = store().await;
        let feed = Feed::new_from_config(FeedId::new("demo").unwrap(), None, Utc::now());
        store.feeds.insert_new(&feed).await.unwrap();

        let now = Utc::now();
        let download = Download::new_discovered(
            feed.id.clone(),
            anypod_core::models::DownloadId::new("v1").unwrap(),
            "https://example.test/v1".to_string(),
            "Episode One".to_string(),
            now,
            DownloadStatus::Queued,
            now,
        )
        .unwrap();
        store.downloads.upsert_download(&download).await.unwrap();

        store
            .downloads
            .mark_downloaded(&feed.id, &download.id, "mp4", "video/mp4", 1024, 60, None, None, None, None)
            .await
            .unwrap();

        let fetched = store.downloads.get(&feed.id, &download.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, DownloadStatus::Downloaded);
        assert!(fetched.validate_downloaded_invariant().is_ok());
    }

    #[tokio::test]
    async fn mark_downloaded_rejects_from_archived() {
        let store = store().await;
        let feed = Feed::new_from_config(FeedId::new("demo").unwrap(), None, Utc::now());
        store.feeds.insert_new(&feed).await.unwrap();

        let now = Utc::now();
        let download = Download::new_discovered(
            feed.id.clone(),
            anypod_core::models::DownloadId::new("v1").unwrap(),
            "https://example.test/v1".to_string(),
            "Episode One".to_string(),
            now,
            DownloadStatus::Queued,
            now,
        )
        .unwrap();
        store.downloads.upsert_download(&download).await.unwrap();
        store.downloads.archive(&feed.id, &download.id).await.unwrap();

        let result = store
            .downloads
            .mark_downloaded(&feed.id, &download.id, "mp4", "video/mp4", 1024, 60, None, None, None, None)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn bump_retries_escalates_to_error_at_ceiling() {
        let store = store().await;
        let feed = Feed::new_from_config(FeedId::new("demo").unwrap(), None, Utc::now());
        store.feeds.insert_new(&feed).await.unwrap();

        let now = Utc::now();
        let download = Download::new_discovered(
            feed.id.clone(),
            anypod_core::models::DownloadId::new("v1").unwrap(),
            "https://example.test/v1".to_string(),
            "Episode One".to_string(),
            now,
            DownloadStatus::Queued,
            now,
        )
        .unwrap();
        store.downloads.upsert_download(&download).await.unwrap();

        let s1 = store.downloads.bump_retries(&feed.id, &download.id, "timeout", 3).await.unwrap();
        assert_eq!(s1, DownloadStatus::Queued);
        let s2 = store.downloads.bump_retries(&feed.id, &download.id, "timeout", 3).await.unwrap();
        assert_eq!(s2, DownloadStatus::Queued);
        let s3 = store.downloads.bump_retries(&feed.id, &download.id, "timeout", 3).await.unwrap();
        assert_eq!(s3, DownloadStatus::Error);
    }

    #[tokio::test]
    async fn list_candidates_by_keep_last_returns_overflow_only() {
        let store = store().await;
        let feed = Feed::new_from_config(FeedId::new("demo").unwrap(), None, Utc::now());
        store.feeds.insert_new(&feed).await.unwrap();

        for i in 0..5u32 {
            let now = Utc::now();
            let published = now - chrono::Duration::days(i as i64);
            let download = Download::new_discovered(
                feed.id.clone(),
                anypod_core::models::DownloadId::new(format!("v{i}")).unwrap(),
                format!("https://example.test/v{i}"),
                format!("Episode {i}"),
                published,
                DownloadStatus::Downloaded,
                now,
            )
            .unwrap();
            store.downloads.upsert_download(&download).await.unwrap();
        }

        let overflow = store.downloads.list_candidates_by_keep_last(&feed.id, 3).await.unwrap();
        assert_eq!(overflow.len(), 2);
        assert!(overflow.iter().all(|d| d.id.as_str() == "v3" || d.id.as_str() == "v4"));
    }

    #[tokio::test]
    async fn count_non_archived_excludes_archived_rows() {
        let store = store().await;
        let feed = Feed::new_from_config(FeedId::new("demo").unwrap(), None, Utc::now());
        store.feeds.insert_new(&feed).await.unwrap();

        let now = Utc::now();
        let d1 = Download::new_discovered(
            feed.id.clone(),
            anypod_core::models::DownloadId::new("v1").unwrap(),
            "https://example.test/v1".to_string(),
            "Episode One".to_string(),
            now,
            DownloadStatus::Queued,
            now,
        )
        .unwrap();
        let d2 = Download::new_discovered(
            feed.id.clone(),
            anypod_core::models::DownloadId::new("v2").unwrap(),
            "https://example.test/v2".to_string(),
            "Episode Two".to_string(),
            now,
            DownloadStatus::Queued,
            now,
        )
        .unwrap();
        store.downloads.upsert_download(&d1).await.unwrap();
        store.downloads.upsert_download(&d2).await.unwrap();
        store.downloads.archive(&feed.id, &d2.id).await.unwrap();

        assert_eq!(store.downloads.count_non_archived(&feed.id).await.unwrap(), 1);
    }
}
