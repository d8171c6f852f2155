//! Row <-> domain conversions. Kept separate from the repositories so a
//! malformed row is always converted into the same data-integrity error
//! regardless of which query produced it.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use anypod_core::error::{Error, Result};
use anypod_core::models::{
    Download, DownloadId, DownloadStatus, Explicit, Feed, FeedId, PodcastType, SourceType, TranscriptSource,
};

fn integrity(entity: impl Into<String>, reason: impl Into<String>) -> Error {
    Error::DataIntegrity {
        entity: entity.into(),
        reason: reason.into(),
    }
}

pub fn row_to_feed(row: SqliteRow) -> Result<Feed> {
    let id_str: String = row.try_get("id").map_err(|e| integrity("feed", e.to_string()))?;
    let id = FeedId::new(id_str.clone()).map_err(|_| integrity(&id_str, "stored feed id fails validation"))?;

    let source_type_str: String = row
        .try_get("source_type")
        .map_err(|e| integrity(&id_str, e.to_string()))?;
    let source_type = SourceType::from_db_str(&source_type_str)
        .ok_or_else(|| integrity(&id_str, format!("unknown source_type '{source_type_str}'")))?;

    let podcast_type_str: String = row
        .try_get("podcast_type")
        .map_err(|e| integrity(&id_str, e.to_string()))?;
    let podcast_type = match podcast_type_str.as_str() {
        "episodic" => PodcastType::Episodic,
        "serial" => PodcastType::Serial,
        other => return Err(integrity(&id_str, format!("unknown podcast_type '{other}'"))),
    };

    let explicit_str: String = row.try_get("explicit").map_err(|e| integrity(&id_str, e.to_string()))?;
    let explicit = match explicit_str.as_str() {
        "yes" => Explicit::Yes,
        "no" => Explicit::No,
        "clean" => Explicit::Clean,
        other => return Err(integrity(&id_str, format!("unknown explicit '{other}'"))),
    };

    let transcript_priority_json: Option<String> = row
        .try_get("transcript_source_priority")
        .map_err(|e| integrity(&id_str, e.to_string()))?;
    let transcript_source_priority = transcript_priority_json
        .map(|j| serde_json::from_str::<Vec<TranscriptSource>>(&j))
        .transpose()
        .map_err(|e| integrity(&id_str, format!("bad transcript_source_priority json: {e}")))?;

    Ok(Feed {
        id,
        is_enabled: row.try_get::<i64, _>("is_enabled").map_err(|e| integrity(&id_str, e.to_string()))? != 0,
        source_type,
        source_url: row.try_get("source_url").ok(),
        resolved_url: row.try_get("resolved_url").ok(),
        last_successful_sync: row.try_get::<Option<DateTime<Utc>>, _>("last_successful_sync").unwrap_or(None),
        last_failed_sync: row.try_get::<Option<DateTime<Utc>>, _>("last_failed_sync").unwrap_or(None),
        consecutive_failures: row
            .try_get::<i64, _>("consecutive_failures")
            .map_err(|e| integrity(&id_str, e.to_string()))? as u32,
        since: row.try_get::<Option<DateTime<Utc>>, _>("since").unwrap_or(None),
        keep_last: row.try_get::<Option<i64>, _>("keep_last").unwrap_or(None).map(|v| v as u32),
        title: row.try_get("title").ok(),
        subtitle: row.try_get("subtitle").ok(),
        description: row.try_get("description").ok(),
        language: row.try_get("language").ok(),
        author: row.try_get("author").ok(),
        author_email: row.try_get("author_email").ok(),
        remote_image_url: row.try_get("remote_image_url").ok(),
        image_ext: row.try_get("image_ext").ok(),
        category: row.try_get("category").map_err(|e| integrity(&id_str, e.to_string()))?,
        podcast_type,
        explicit,
        transcript_lang: row.try_get("transcript_lang").ok(),
        transcript_source_priority,
        created_at: row.try_get("created_at").map_err(|e| integrity(&id_str, e.to_string()))?,
        updated_at: row.try_get("updated_at").map_err(|e| integrity(&id_str, e.to_string()))?,
        last_rss_generation: row.try_get::<Option<DateTime<Utc>>, _>("last_rss_generation").unwrap_or(None),
        total_downloads: row
            .try_get::<i64, _>("total_downloads")
            .map_err(|e| integrity(&id_str, e.to_string()))? as u32,
    })
}

pub fn row_to_download(row: SqliteRow) -> Result<Download> {
    let feed_id_str: String = row.try_get("feed_id").map_err(|e| integrity("download", e.to_string()))?;
    let id_str: String = row.try_get("id").map_err(|e| integrity("download", e.to_string()))?;
    let label = format!("{feed_id_str}/{id_str}");

    let feed_id = FeedId::new(feed_id_str).map_err(|_| integrity(&label, "stored feed_id fails validation"))?;
    let id = DownloadId::new(id_str).map_err(|_| integrity(&label, "stored id fails validation"))?;

    let status_str: String = row.try_get("status").map_err(|e| integrity(&label, e.to_string()))?;
    let status = DownloadStatus::from_db_str(&status_str)
        .ok_or_else(|| integrity(&label, format!("unknown status '{status_str}'")))?;

    let transcript_source_str: Option<String> = row.try_get("transcript_source").ok();
    let transcript_source = transcript_source_str
        .map(|s| match s.as_str() {
            "creator" => Ok(TranscriptSource::Creator),
            "auto" => Ok(TranscriptSource::Auto),
            other => Err(integrity(&label, format!("unknown transcript_source '{other}'"))),
        })
        .transpose()?;

    Ok(Download {
        feed_id,
        id,
        source_url: row.try_get("source_url").map_err(|e| integrity(&label, e.to_string()))?,
        title: row.try_get("title").map_err(|e| integrity(&label, e.to_string()))?,
        published: row.try_get("published").map_err(|e| integrity(&label, e.to_string()))?,
        ext: row.try_get("ext").ok(),
        mime_type: row.try_get("mime_type").ok(),
        filesize: row.try_get::<Option<i64>, _>("filesize").unwrap_or(None).map(|v| v as u64),
        duration: row.try_get::<Option<i64>, _>("duration").unwrap_or(None).map(|v| v as u64),
        status,
        retries: row.try_get::<i64, _>("retries").map_err(|e| integrity(&label, e.to_string()))? as u32,
        last_error: row.try_get("last_error").ok(),
        download_logs: row.try_get("download_logs").ok(),
        discovered_at: row.try_get("discovered_at").map_err(|e| integrity(&label, e.to_string()))?,
        updated_at: row.try_get("updated_at").map_err(|e| integrity(&label, e.to_string()))?,
        downloaded_at: row.try_get::<Option<DateTime<Utc>>, _>("downloaded_at").unwrap_or(None),
        remote_thumbnail_url: row.try_get("remote_thumbnail_url").ok(),
        thumbnail_ext: row.try_get("thumbnail_ext").ok(),
        description: row.try_get("description").ok(),
        quality_info: row.try_get("quality_info").ok(),
        playlist_index: row.try_get::<Option<i64>, _>("playlist_index").unwrap_or(None).map(|v| v as u32),
        transcript_ext: row.try_get("transcript_ext").ok(),
        transcript_lang: row.try_get("transcript_lang").ok(),
        transcript_source,
    })
}
