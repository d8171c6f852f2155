use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use anypod_core::error::{Error, Result};
use anypod_core::models::{Download, DownloadId, DownloadStatus, FeedId, TranscriptSource};

use crate::rows::row_to_download;

/// Download-row persistence. Every status change goes through one of these
/// named operations — there is deliberately no generic `update(Download)`.
#[derive(Clone)]
pub struct DownloadRepository {
    pool: SqlitePool,
}

fn transcript_source_str(source: TranscriptSource) -> &'static str {
    match source {
        TranscriptSource::Creator => "creator",
        TranscriptSource::Auto => "auto",
    }
}

impl DownloadRepository {
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts a new row, or upserts metadata-only fields onto an existing
    /// one — never touches `status`, `retries`, or `last_error`.
    pub async fn upsert_download(&self, download: &Download) -> Result<()> {
        let existing = self.get(&download.feed_id, &download.id).await?;
        if let Some(existing) = existing {
            sqlx::query(
                "UPDATE downloads SET
                    source_url = ?, title = ?, published = ?,
                    remote_thumbnail_url = ?, description = ?, quality_info = ?,
                    playlist_index = ?, updated_at = ?
                 WHERE feed_id = ? AND id = ?",
            )
            .bind(&download.source_url)
            .bind(&download.title)
            .bind(download.published)
            .bind(&download.remote_thumbnail_url)
            .bind(&download.description)
            .bind(&download.quality_info)
            .bind(download.playlist_index.map(|v| v as i64))
            .bind(Utc::now())
            .bind(download.feed_id.as_str())
            .bind(download.id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;
            let _ = existing;
            return Ok(());
        }

        sqlx::query(
            "INSERT INTO downloads (
                feed_id, id, source_url, title, published,
                ext, mime_type, filesize, duration,
                status, retries, last_error, download_logs,
                discovered_at, updated_at, downloaded_at,
                remote_thumbnail_url, thumbnail_ext,
                description, quality_info, playlist_index,
                transcript_ext, transcript_lang, transcript_source
            ) VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?)",
        )
        .bind(download.feed_id.as_str())
        .bind(download.id.as_str())
        .bind(&download.source_url)
        .bind(&download.title)
        .bind(download.published)
        .bind(&download.ext)
        .bind(&download.mime_type)
        .bind(download.filesize.map(|v| v as i64))
        .bind(download.duration.map(|v| v as i64))
        .bind(download.status.as_db_str())
        .bind(download.retries as i64)
        .bind(&download.last_error)
        .bind(&download.download_logs)
        .bind(download.discovered_at)
        .bind(download.updated_at)
        .bind(download.downloaded_at)
        .bind(&download.remote_thumbnail_url)
        .bind(&download.thumbnail_ext)
        .bind(&download.description)
        .bind(&download.quality_info)
        .bind(download.playlist_index.map(|v| v as i64))
        .bind(&download.transcript_ext)
        .bind(&download.transcript_lang)
        .bind(download.transcript_source.map(transcript_source_str))
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Persistence(e.to_string()))?;
        Ok(())
    }

    pub async fn get(&self, feed_id: &FeedId, id: &DownloadId) -> Result<Option<Download>> {
        let row = sqlx::query("SELECT * FROM downloads WHERE feed_id = ? AND id = ?")
            .bind(feed_id.as_str())
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;
        row.map(row_to_download).transpose()
    }

    /// Increments `retries`; escalates to `ERROR` once the ceiling is hit.
    /// Returns the resulting status.
    pub async fn bump_retries(
        &self,
        feed_id: &FeedId,
        id: &DownloadId,
        error_msg: &str,
        max_errors: u32,
    ) -> Result<DownloadStatus> {
        let current = self
            .get(feed_id, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("download {feed_id}/{id}")))?;
        let new_retries = current.retries + 1;
        let new_status = if new_retries >= max_errors {
            DownloadStatus::Error
        } else {
            current.status
        };
        sqlx::query(
            "UPDATE downloads SET retries = ?, last_error = ?, status = ?, updated_at = ? WHERE feed_id = ? AND id = ?",
        )
        .bind(new_retries as i64)
        .bind(error_msg)
        .bind(new_status.as_db_str())
        .bind(Utc::now())
        .bind(feed_id.as_str())
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Persistence(e.to_string()))?;
        Ok(new_status)
    }

    /// Requires current status in `{QUEUED, UPCOMING}`.
    #[allow(clippy::too_many_arguments)]
    pub async fn mark_downloaded(
        &self,
        feed_id: &FeedId,
        id: &DownloadId,
        ext: &str,
        mime_type: &str,
        filesize: u64,
        duration: u64,
        thumbnail_ext: Option<&str>,
        transcript_ext: Option<&str>,
        transcript_lang: Option<&str>,
        transcript_source: Option<TranscriptSource>,
    ) -> Result<()> {
        let current = self
            .get(feed_id, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("download {feed_id}/{id}")))?;
        if !matches!(current.status, DownloadStatus::Queued | DownloadStatus::Upcoming) {
            return Err(Error::IllegalTransition(format!(
                "mark_downloaded requires QUEUED or UPCOMING, found {:?}",
                current.status
            )));
        }
        let now = Utc::now();
        sqlx::query(
            "UPDATE downloads SET
                status = 'DOWNLOADED', downloaded_at = ?, ext = ?, mime_type = ?,
                filesize = ?, duration = ?, retries = 0, last_error = NULL,
                thumbnail_ext = ?, transcript_ext = ?, transcript_lang = ?, transcript_source = ?,
                updated_at = ?
             WHERE feed_id = ? AND id = ?",
        )
        .bind(now)
        .bind(ext)
        .bind(mime_type)
        .bind(filesize as i64)
        .bind(duration as i64)
        .bind(thumbnail_ext)
        .bind(transcript_ext)
        .bind(transcript_lang)
        .bind(transcript_source.map(transcript_source_str))
        .bind(now)
        .bind(feed_id.as_str())
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Persistence(e.to_string()))?;
        Ok(())
    }

    /// Requires `UPCOMING`.
    pub async fn mark_upcoming_as_queued(&self, feed_id: &FeedId, id: &DownloadId) -> Result<()> {
        let current = self
            .get(feed_id, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("download {feed_id}/{id}")))?;
        if current.status != DownloadStatus::Upcoming {
            return Err(Error::IllegalTransition(format!(
                "mark_upcoming_as_queued requires UPCOMING, found {:?}",
                current.status
            )));
        }
        sqlx::query("UPDATE downloads SET status = 'QUEUED', updated_at = ? WHERE feed_id = ? AND id = ?")
            .bind(Utc::now())
            .bind(feed_id.as_str())
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;
        Ok(())
    }

    /// Any non-`ARCHIVED` status transitions to `ARCHIVED`; idempotent once
    /// already archived.
    pub async fn archive(&self, feed_id: &FeedId, id: &DownloadId) -> Result<()> {
        sqlx::query(
            "UPDATE downloads SET status = 'ARCHIVED', updated_at = ? WHERE feed_id = ? AND id = ? AND status != 'ARCHIVED'",
        )
        .bind(Utc::now())
        .bind(feed_id.as_str())
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Persistence(e.to_string()))?;
        Ok(())
    }

    /// Single-row requeue: requires the row currently be `from_status`.
    /// Returns whether a row was changed.
    pub async fn requeue_one(&self, feed_id: &FeedId, id: &DownloadId, from_status: DownloadStatus) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE downloads SET status = 'QUEUED', retries = 0, last_error = NULL, updated_at = ?
             WHERE feed_id = ? AND id = ? AND status = ?",
        )
        .bind(Utc::now())
        .bind(feed_id.as_str())
        .bind(id.as_str())
        .bind(from_status.as_db_str())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Persistence(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    /// Bulk requeue: every row in `feed_id` currently `from_status`. Returns
    /// the count affected.
    pub async fn requeue_all(&self, feed_id: &FeedId, from_status: DownloadStatus) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE downloads SET status = 'QUEUED', retries = 0, last_error = NULL, updated_at = ?
             WHERE feed_id = ? AND status = ?",
        )
        .bind(Utc::now())
        .bind(feed_id.as_str())
        .bind(from_status.as_db_str())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Persistence(e.to_string()))?;
        Ok(result.rows_affected())
    }

    pub async fn set_thumbnail_extension(&self, feed_id: &FeedId, id: &DownloadId, ext: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE downloads SET thumbnail_ext = ?, updated_at = ? WHERE feed_id = ? AND id = ?")
            .bind(ext)
            .bind(Utc::now())
            .bind(feed_id.as_str())
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;
        Ok(())
    }

    pub async fn set_transcript_fields(
        &self,
        feed_id: &FeedId,
        id: &DownloadId,
        ext: Option<&str>,
        lang: Option<&str>,
        source: Option<TranscriptSource>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE downloads SET transcript_ext = ?, transcript_lang = ?, transcript_source = ?, updated_at = ?
             WHERE feed_id = ? AND id = ?",
        )
        .bind(ext)
        .bind(lang)
        .bind(source.map(transcript_source_str))
        .bind(Utc::now())
        .bind(feed_id.as_str())
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Persistence(e.to_string()))?;
        Ok(())
    }

    pub async fn set_download_logs(&self, feed_id: &FeedId, id: &DownloadId, logs: &str) -> Result<()> {
        sqlx::query("UPDATE downloads SET download_logs = ?, updated_at = ? WHERE feed_id = ? AND id = ?")
            .bind(logs)
            .bind(Utc::now())
            .bind(feed_id.as_str())
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;
        Ok(())
    }

    pub async fn list_by_status(
        &self,
        feed_id: Option<&FeedId>,
        status: DownloadStatus,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Download>> {
        let rows = match feed_id {
            Some(feed_id) => {
                sqlx::query(
                    "SELECT * FROM downloads WHERE feed_id = ? AND status = ? ORDER BY published ASC LIMIT ? OFFSET ?",
                )
                .bind(feed_id.as_str())
                .bind(status.as_db_str())
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query("SELECT * FROM downloads WHERE status = ? ORDER BY published ASC LIMIT ? OFFSET ?")
                    .bind(status.as_db_str())
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| Error::Persistence(e.to_string()))?;
        rows.into_iter().map(row_to_download).collect()
    }

    /// Rows ranked by `published` descending within the active set whose
    /// rank exceeds `keep_last`. `keep_last = 0` means "archive all".
    pub async fn list_candidates_by_keep_last(&self, feed_id: &FeedId, keep_last: u32) -> Result<Vec<Download>> {
        let rows = sqlx::query(
            "SELECT * FROM (
                SELECT *, ROW_NUMBER() OVER (ORDER BY published DESC) AS rn
                FROM downloads
                WHERE feed_id = ? AND status IN ('DOWNLOADED', 'ERROR', 'UPCOMING')
             ) WHERE rn > ?",
        )
        .bind(feed_id.as_str())
        .bind(keep_last as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Persistence(e.to_string()))?;
        rows.into_iter().map(row_to_download).collect()
    }

    /// Rows with `published < since` in the active set. Exactly-equal is
    /// kept.
    pub async fn list_candidates_by_before_date(&self, feed_id: &FeedId, since: DateTime<Utc>) -> Result<Vec<Download>> {
        let rows = sqlx::query(
            "SELECT * FROM downloads
             WHERE feed_id = ? AND status IN ('DOWNLOADED', 'ERROR', 'UPCOMING') AND published < ?",
        )
        .bind(feed_id.as_str())
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Persistence(e.to_string()))?;
        rows.into_iter().map(row_to_download).collect()
    }

    pub async fn list_upcoming(&self, feed_id: &FeedId) -> Result<Vec<Download>> {
        self.list_by_status(Some(feed_id), DownloadStatus::Upcoming, i64::MAX, 0).await
    }

    /// Count of non-`ARCHIVED` rows for a feed.
    pub async fn count_non_archived(&self, feed_id: &FeedId) -> Result<u32> {
        let row = sqlx::query("SELECT COUNT(*) as c FROM downloads WHERE feed_id = ? AND status != 'ARCHIVED'")
            .bind(feed_id.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;
        Ok(row.get::<i64, _>("c") as u32)
    }

    pub async fn known_ids(&self, feed_id: &FeedId) -> Result<Vec<DownloadId>> {
        let rows = sqlx::query("SELECT id FROM downloads WHERE feed_id = ?")
            .bind(feed_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;
        rows.into_iter()
            .map(|r| DownloadId::new(r.get::<String, _>("id")))
            .collect()
    }
}
