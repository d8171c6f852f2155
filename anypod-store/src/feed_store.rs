use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use anypod_core::config::FeedConfig;
use anypod_core::error::{Error, Result};
use anypod_core::models::{Feed, FeedId, SourceType};

use crate::rows::row_to_feed;

/// Feed-row persistence. Named operations only — no generic `update(Feed)`
/// is exposed, to keep status/accounting transitions auditable.
#[derive(Clone)]
pub struct FeedRepository {
    pool: SqlitePool,
}

impl FeedRepository {
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Startup reconciliation insert: a fresh row for a feed id present in
    /// configuration but absent from the store.
    pub async fn insert_new(&self, feed: &Feed) -> Result<()> {
        sqlx::query(
            "INSERT INTO feeds (
                id, is_enabled, source_type, source_url, resolved_url,
                consecutive_failures, since, keep_last,
                title, subtitle, description, language, author, author_email,
                remote_image_url, image_ext, category, podcast_type, explicit,
                transcript_lang, transcript_source_priority,
                created_at, updated_at, total_downloads
            ) VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?)",
        )
        .bind(feed.id.as_str())
        .bind(feed.is_enabled)
        .bind(feed.source_type.as_db_str())
        .bind(&feed.source_url)
        .bind(&feed.resolved_url)
        .bind(feed.consecutive_failures as i64)
        .bind(feed.since)
        .bind(feed.keep_last.map(|v| v as i64))
        .bind(&feed.title)
        .bind(&feed.subtitle)
        .bind(&feed.description)
        .bind(&feed.language)
        .bind(&feed.author)
        .bind(&feed.author_email)
        .bind(&feed.remote_image_url)
        .bind(&feed.image_ext)
        .bind(&feed.category)
        .bind(match feed.podcast_type {
            anypod_core::models::PodcastType::Episodic => "episodic",
            anypod_core::models::PodcastType::Serial => "serial",
        })
        .bind(match feed.explicit {
            anypod_core::models::Explicit::Yes => "yes",
            anypod_core::models::Explicit::No => "no",
            anypod_core::models::Explicit::Clean => "clean",
        })
        .bind(&feed.transcript_lang)
        .bind(
            feed.transcript_source_priority
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| Error::Persistence(e.to_string()))?,
        )
        .bind(feed.created_at)
        .bind(feed.updated_at)
        .bind(feed.total_downloads as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Persistence(e.to_string()))?;
        Ok(())
    }

    pub async fn get(&self, feed_id: &FeedId) -> Result<Option<Feed>> {
        let row = sqlx::query("SELECT * FROM feeds WHERE id = ?")
            .bind(feed_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;
        row.map(row_to_feed).transpose()
    }

    pub async fn list(&self) -> Result<Vec<Feed>> {
        let rows = sqlx::query("SELECT * FROM feeds ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;
        rows.into_iter().map(row_to_feed).collect()
    }

    pub async fn list_enabled(&self) -> Result<Vec<Feed>> {
        let rows = sqlx::query("SELECT * FROM feeds WHERE is_enabled = 1 ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;
        rows.into_iter().map(row_to_feed).collect()
    }

    /// Startup reconciliation: feeds stored but no longer present in
    /// configuration are disabled, never deleted.
    pub async fn disable_missing(&self, known_ids: &[FeedId]) -> Result<u64> {
        if known_ids.is_empty() {
            let result = sqlx::query("UPDATE feeds SET is_enabled = 0 WHERE is_enabled = 1")
                .execute(&self.pool)
                .await
                .map_err(|e| Error::Persistence(e.to_string()))?;
            return Ok(result.rows_affected());
        }
        let placeholders = known_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!("UPDATE feeds SET is_enabled = 0 WHERE is_enabled = 1 AND id NOT IN ({placeholders})");
        let mut query = sqlx::query(&sql);
        for id in known_ids {
            query = query.bind(id.as_str());
        }
        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;
        Ok(result.rows_affected())
    }

    pub async fn set_enabled(&self, feed_id: &FeedId, enabled: bool) -> Result<()> {
        sqlx::query("UPDATE feeds SET is_enabled = ?, updated_at = ? WHERE id = ?")
            .bind(enabled)
            .bind(Utc::now())
            .bind(feed_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;
        Ok(())
    }

    /// Discovery landed on a resolved URL/source type.
    pub async fn set_resolved_source(
        &self,
        feed_id: &FeedId,
        source_type: SourceType,
        resolved_url: Option<&str>,
    ) -> Result<()> {
        sqlx::query("UPDATE feeds SET source_type = ?, resolved_url = ?, updated_at = ? WHERE id = ?")
            .bind(source_type.as_db_str())
            .bind(resolved_url)
            .bind(Utc::now())
            .bind(feed_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;
        Ok(())
    }

    /// Successful enqueue pass: reset `consecutive_failures` and stamp
    /// `last_successful_sync`.
    pub async fn record_sync_success(&self, feed_id: &FeedId, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE feeds SET last_successful_sync = ?, consecutive_failures = 0, updated_at = ? WHERE id = ?",
        )
        .bind(now)
        .bind(now)
        .bind(feed_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Persistence(e.to_string()))?;
        Ok(())
    }

    /// Fatal enqueue failure: stamp `last_failed_sync`, increment
    /// `consecutive_failures`.
    pub async fn record_sync_failure(&self, feed_id: &FeedId, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE feeds SET last_failed_sync = ?, consecutive_failures = consecutive_failures + 1, updated_at = ? WHERE id = ?",
        )
        .bind(now)
        .bind(now)
        .bind(feed_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Persistence(e.to_string()))?;
        Ok(())
    }

    pub async fn set_image_extension(&self, feed_id: &FeedId, ext: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE feeds SET image_ext = ?, updated_at = ? WHERE id = ?")
            .bind(ext)
            .bind(Utc::now())
            .bind(feed_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;
        Ok(())
    }

    /// `total_downloads` equals the count of non-`ARCHIVED` rows. Callers
    /// recompute via `DownloadRepository::count_non_archived` and write it
    /// back here.
    pub async fn set_total_downloads(&self, feed_id: &FeedId, total: u32) -> Result<()> {
        sqlx::query("UPDATE feeds SET total_downloads = ? WHERE id = ?")
            .bind(total as i64)
            .bind(feed_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;
        Ok(())
    }

    pub async fn set_last_rss_generation(&self, feed_id: &FeedId, now: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE feeds SET last_rss_generation = ? WHERE id = ?")
            .bind(now)
            .bind(feed_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;
        Ok(())
    }

    /// Applies the operator-configured half of a feed's data: `since` and
    /// `keep_last` always take the config's value (the operator is
    /// authoritative for retention policy, so removing a setting from the
    /// config clears it too); every presentation/transcript field only
    /// overwrites the stored row when the config actually sets it, so a
    /// value discovery already filled in isn't clobbered by an absent
    /// config field. Does not touch sync accounting or status.
    pub async fn apply_config(&self, feed_id: &FeedId, config: &FeedConfig) -> Result<()> {
        let transcript_source_priority = config
            .transcript_source_priority
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| Error::Persistence(e.to_string()))?;

        sqlx::query(
            "UPDATE feeds SET
                since = ?,
                keep_last = ?,
                title = COALESCE(?, title),
                subtitle = COALESCE(?, subtitle),
                description = COALESCE(?, description),
                language = COALESCE(?, language),
                author = COALESCE(?, author),
                author_email = COALESCE(?, author_email),
                remote_image_url = COALESCE(?, remote_image_url),
                category = COALESCE(?, category),
                podcast_type = COALESCE(?, podcast_type),
                explicit = COALESCE(?, explicit),
                transcript_lang = COALESCE(?, transcript_lang),
                transcript_source_priority = COALESCE(?, transcript_source_priority),
                updated_at = ?
             WHERE id = ?",
        )
        .bind(config.since)
        .bind(config.keep_last.map(|v| v as i64))
        .bind(&config.title)
        .bind(&config.subtitle)
        .bind(&config.description)
        .bind(&config.language)
        .bind(&config.author)
        .bind(&config.author_email)
        .bind(&config.remote_image_url)
        .bind(&config.category)
        .bind(config.podcast_type.map(|p| match p {
            anypod_core::models::PodcastType::Episodic => "episodic",
            anypod_core::models::PodcastType::Serial => "serial",
        }))
        .bind(config.explicit.map(|e| match e {
            anypod_core::models::Explicit::Yes => "yes",
            anypod_core::models::Explicit::No => "no",
            anypod_core::models::Explicit::Clean => "clean",
        }))
        .bind(&config.transcript_lang)
        .bind(transcript_source_priority)
        .bind(Utc::now())
        .bind(feed_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Persistence(e.to_string()))?;
        Ok(())
    }

    #[cfg(test)]
    pub async fn row_count(&self) -> i64 {
        sqlx::query("SELECT COUNT(*) as c FROM feeds")
            .fetch_one(&self.pool)
            .await
            .unwrap()
            .get("c")
    }
}
