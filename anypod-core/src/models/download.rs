use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::feed::TranscriptSource;
use super::ids::{DownloadId, FeedId};
use crate::error::{Error, Result};

/// The download status machine. Transitions are exposed only through
/// `MetadataStore` named operations; this enum exists so every layer agrees
/// on which moves are legal without duplicating the rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DownloadStatus {
    Upcoming,
    Queued,
    Downloaded,
    Error,
    Skipped,
    Archived,
}

impl DownloadStatus {
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Upcoming => "UPCOMING",
            Self::Queued => "QUEUED",
            Self::Downloaded => "DOWNLOADED",
            Self::Error => "ERROR",
            Self::Skipped => "SKIPPED",
            Self::Archived => "ARCHIVED",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "UPCOMING" => Some(Self::Upcoming),
            "QUEUED" => Some(Self::Queued),
            "DOWNLOADED" => Some(Self::Downloaded),
            "ERROR" => Some(Self::Error),
            "SKIPPED" => Some(Self::Skipped),
            "ARCHIVED" => Some(Self::Archived),
            _ => None,
        }
    }

    /// Active means "not a terminal archive" — the set the pruner's
    /// candidate queries draw from.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Archived)
    }
}

/// One item belonging to a feed; the unit of state in the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Download {
    pub feed_id: FeedId,
    pub id: DownloadId,

    pub source_url: String,
    pub title: String,
    pub published: DateTime<Utc>,

    pub ext: Option<String>,
    pub mime_type: Option<String>,
    pub filesize: Option<u64>,
    pub duration: Option<u64>,

    pub status: DownloadStatus,
    pub retries: u32,
    pub last_error: Option<String>,
    pub download_logs: Option<String>,

    pub discovered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub downloaded_at: Option<DateTime<Utc>>,

    pub remote_thumbnail_url: Option<String>,
    pub thumbnail_ext: Option<String>,

    pub description: Option<String>,
    pub quality_info: Option<String>,

    pub playlist_index: Option<u32>,

    pub transcript_ext: Option<String>,
    pub transcript_lang: Option<String>,
    pub transcript_source: Option<TranscriptSource>,
}

impl Download {
    /// A bare row for a freshly discovered item, not yet fetched.
    pub fn new_discovered(
        feed_id: FeedId,
        id: DownloadId,
        source_url: String,
        title: String,
        published: DateTime<Utc>,
        status: DownloadStatus,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if title.is_empty() {
            return Err(Error::DataIntegrity {
                entity: format!("download {feed_id}/{id}"),
                reason: "title must not be empty".to_string(),
            });
        }
        if !matches!(status, DownloadStatus::Upcoming | DownloadStatus::Queued) {
            return Err(Error::IllegalTransition(format!(
                "new downloads must start UPCOMING or QUEUED, got {status:?}"
            )));
        }
        Ok(Self {
            feed_id,
            id,
            source_url,
            title,
            published,
            ext: None,
            mime_type: None,
            filesize: None,
            duration: None,
            status,
            retries: 0,
            last_error: None,
            download_logs: None,
            discovered_at: now,
            updated_at: now,
            downloaded_at: None,
            remote_thumbnail_url: None,
            thumbnail_ext: None,
            description: None,
            quality_info: None,
            playlist_index: None,
            transcript_ext: None,
            transcript_lang: None,
            transcript_source: None,
        })
    }

    /// A `DOWNLOADED` row must have its media fields populated. Pure
    /// validation, no I/O.
    pub fn validate_downloaded_invariant(&self) -> Result<()> {
        if self.status != DownloadStatus::Downloaded {
            return Ok(());
        }
        let missing = self.downloaded_at.is_none()
            || self.ext.is_none()
            || self.mime_type.is_none()
            || !matches!(self.filesize, Some(n) if n > 0)
            || !matches!(self.duration, Some(n) if n > 0);
        if missing {
            return Err(Error::DataIntegrity {
                entity: format!("download {}/{}", self.feed_id, self.id),
                reason: "DOWNLOADED row missing required media fields".to_string(),
            });
        }
        Ok(())
    }

    /// A transcript extension implies both language and source are set.
    pub fn validate_transcript_invariant(&self) -> Result<()> {
        if self.transcript_ext.is_some()
            && (self.transcript_lang.is_none() || self.transcript_source.is_none())
        {
            return Err(Error::DataIntegrity {
                entity: format!("download {}/{}", self.feed_id, self.id),
                reason: "transcript_ext set without transcript_lang/transcript_source".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_id() -> FeedId {
        FeedId::new("demo").unwrap()
    }

    fn dl_id() -> DownloadId {
        DownloadId::new("v1").unwrap()
    }

    #[test]
    fn new_discovered_rejects_empty_title() {
        let now = Utc::now();
        let result = Download::new_discovered(
            feed_id(),
            dl_id(),
            "https://example.test/v1".to_string(),
            String::new(),
            now,
            DownloadStatus::Queued,
            now,
        );
        assert!(result.is_err());
    }

    #[test]
    fn new_discovered_rejects_non_initial_status() {
        let now = Utc::now();
        let result = Download::new_discovered(
            feed_id(),
            dl_id(),
            "https://example.test/v1".to_string(),
            "title".to_string(),
            now,
            DownloadStatus::Downloaded,
            now,
        );
        assert!(result.is_err());
    }

    #[test]
    fn downloaded_invariant_requires_media_fields() {
        let now = Utc::now();
        let mut d = Download::new_discovered(
            feed_id(),
            dl_id(),
            "https://example.test/v1".to_string(),
            "title".to_string(),
            now,
            DownloadStatus::Queued,
            now,
        )
        .unwrap();
        d.status = DownloadStatus::Downloaded;
        assert!(d.validate_downloaded_invariant().is_err());

        d.downloaded_at = Some(now);
        d.ext = Some("mp4".to_string());
        d.mime_type = Some("video/mp4".to_string());
        d.filesize = Some(100);
        d.duration = Some(10);
        assert!(d.validate_downloaded_invariant().is_ok());
    }

    #[test]
    fn transcript_invariant_requires_lang_and_source_together() {
        let now = Utc::now();
        let mut d = Download::new_discovered(
            feed_id(),
            dl_id(),
            "https://example.test/v1".to_string(),
            "title".to_string(),
            now,
            DownloadStatus::Queued,
            now,
        )
        .unwrap();
        d.transcript_ext = Some("srt".to_string());
        assert!(d.validate_transcript_invariant().is_err());
        d.transcript_lang = Some("en".to_string());
        d.transcript_source = Some(TranscriptSource::Auto);
        assert!(d.validate_transcript_invariant().is_ok());
    }
}
