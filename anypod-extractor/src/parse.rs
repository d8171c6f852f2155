use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use thiserror::Error;

use anypod_core::models::{Download, DownloadId, DownloadStatus, FeedId};

/// Raised while converting one schemaless extractor JSON object into a
/// typed `Download`. Kept separate from the subprocess-level error
/// taxonomy: a malformed record doesn't fail the whole enumeration, the
/// caller drops the record and keeps the well-formed ones.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("entry missing required field '{0}'")]
    MissingField(&'static str),
    #[error("entry field '{field}' had an unexpected shape: {reason}")]
    BadFormat { field: &'static str, reason: String },
}

fn field<'a>(entry: &'a Value, name: &'static str) -> Result<&'a Value, ParseError> {
    entry.get(name).filter(|v| !v.is_null()).ok_or(ParseError::MissingField(name))
}

fn field_str<'a>(entry: &'a Value, name: &'static str) -> Result<&'a str, ParseError> {
    field(entry, name)?
        .as_str()
        .ok_or_else(|| ParseError::BadFormat { field: name, reason: "expected a string".to_string() })
}

fn opt_str(entry: &Value, name: &'static str) -> Option<String> {
    entry.get(name).and_then(Value::as_str).map(str::to_string)
}

fn opt_u64(entry: &Value, name: &'static str) -> Option<u64> {
    entry.get(name).and_then(Value::as_u64)
}

/// yt-dlp reports publish dates as `YYYYMMDD` in `upload_date`, or as a unix
/// `timestamp`. Prefer the timestamp when present since it carries
/// time-of-day precision.
fn parse_published(entry: &Value) -> Result<DateTime<Utc>, ParseError> {
    if let Some(ts) = entry.get("timestamp").and_then(Value::as_i64) {
        return Utc
            .timestamp_opt(ts, 0)
            .single()
            .ok_or_else(|| ParseError::BadFormat { field: "timestamp", reason: "out of range".to_string() });
    }
    let raw = field_str(entry, "upload_date")?;
    if raw.len() != 8 {
        return Err(ParseError::BadFormat { field: "upload_date", reason: format!("expected YYYYMMDD, got '{raw}'") });
    }
    let (y, rest) = raw.split_at(4);
    let (m, d) = rest.split_at(2);
    let (y, m, d): (i32, u32, u32) = (
        y.parse().map_err(|_| ParseError::BadFormat { field: "upload_date", reason: raw.to_string() })?,
        m.parse().map_err(|_| ParseError::BadFormat { field: "upload_date", reason: raw.to_string() })?,
        d.parse().map_err(|_| ParseError::BadFormat { field: "upload_date", reason: raw.to_string() })?,
    );
    chrono::NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| ParseError::BadFormat { field: "upload_date", reason: raw.to_string() })
}

/// `is_live`/`live_status` fields that mean "not yet a fetchable VOD".
fn is_upcoming(entry: &Value) -> bool {
    matches!(
        entry.get("live_status").and_then(Value::as_str),
        Some("is_upcoming") | Some("is_live") | Some("post_live")
    ) || entry.get("is_upcoming").and_then(Value::as_bool).unwrap_or(false)
}

/// Converts one playlist/enumeration entry into a freshly discovered
/// `Download`, defaulting to `QUEUED` unless the entry's own live-status
/// fields indicate it is not yet a VOD.
pub fn parse_playlist_entry(feed_id: &FeedId, entry: &Value, now: DateTime<Utc>) -> Result<Download, ParseError> {
    let id_str = field_str(entry, "id")?;
    let id = DownloadId::new(id_str)
        .map_err(|_| ParseError::BadFormat { field: "id", reason: format!("'{id_str}' is not a valid download id") })?;

    let source_url = opt_str(entry, "webpage_url")
        .or_else(|| opt_str(entry, "url"))
        .ok_or(ParseError::MissingField("webpage_url"))?;
    let title = field_str(entry, "title")?.to_string();
    let published = parse_published(entry)?;

    let status = if is_upcoming(entry) { DownloadStatus::Upcoming } else { DownloadStatus::Queued };

    let mut download = Download::new_discovered(feed_id.clone(), id, source_url, title, published, status, now)
        .map_err(|e| ParseError::BadFormat { field: "title", reason: e.to_string() })?;

    download.description = opt_str(entry, "description");
    download.remote_thumbnail_url = opt_str(entry, "thumbnail");
    download.playlist_index = opt_u64(entry, "playlist_index").map(|v| v as u32);
    download.quality_info = entry
        .get("format_note")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| opt_str(entry, "resolution"));

    Ok(download)
}
