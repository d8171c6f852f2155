use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::FeedId;

/// What kind of thing the extractor resolved a feed's `source_url` to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Channel,
    Playlist,
    SingleVideo,
    Manual,
    Unknown,
}

impl SourceType {
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Channel => "CHANNEL",
            Self::Playlist => "PLAYLIST",
            Self::SingleVideo => "SINGLE_VIDEO",
            Self::Manual => "MANUAL",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "CHANNEL" => Some(Self::Channel),
            "PLAYLIST" => Some(Self::Playlist),
            "SINGLE_VIDEO" => Some(Self::SingleVideo),
            "MANUAL" => Some(Self::Manual),
            "UNKNOWN" => Some(Self::Unknown),
            _ => None,
        }
    }

    pub fn is_manual(self) -> bool {
        matches!(self, Self::Manual)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PodcastType {
    Episodic,
    Serial,
}

impl Default for PodcastType {
    fn default() -> Self {
        Self::Episodic
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Explicit {
    Yes,
    No,
    Clean,
}

impl Default for Explicit {
    fn default() -> Self {
        Self::No
    }
}

/// An ordered preference over transcript sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptSource {
    Creator,
    Auto,
}

/// A configured logical media source, materialized as a podcast feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    pub id: FeedId,
    pub is_enabled: bool,
    pub source_type: SourceType,
    pub source_url: Option<String>,
    pub resolved_url: Option<String>,

    pub last_successful_sync: Option<DateTime<Utc>>,
    pub last_failed_sync: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,

    pub since: Option<DateTime<Utc>>,
    pub keep_last: Option<u32>,

    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub author: Option<String>,
    pub author_email: Option<String>,
    pub remote_image_url: Option<String>,
    pub image_ext: Option<String>,
    pub category: String,
    pub podcast_type: PodcastType,
    pub explicit: Explicit,

    pub transcript_lang: Option<String>,
    pub transcript_source_priority: Option<Vec<TranscriptSource>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_rss_generation: Option<DateTime<Utc>>,

    pub total_downloads: u32,
}

impl Feed {
    /// A fresh row for a feed discovered by the startup reconciliation pass.
    /// Everything discovery-derived starts empty.
    pub fn new_from_config(id: FeedId, source_url: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            is_enabled: true,
            source_type: SourceType::Unknown,
            source_url,
            resolved_url: None,
            last_successful_sync: None,
            last_failed_sync: None,
            consecutive_failures: 0,
            since: None,
            keep_last: None,
            title: None,
            subtitle: None,
            description: None,
            language: None,
            author: None,
            author_email: None,
            remote_image_url: None,
            image_ext: None,
            category: "TV & Film".to_string(),
            podcast_type: PodcastType::default(),
            explicit: Explicit::default(),
            transcript_lang: None,
            transcript_source_priority: None,
            created_at: now,
            updated_at: now,
            last_rss_generation: None,
            total_downloads: 0,
        }
    }
}
