use std::path::PathBuf;

use chrono::{DateTime, Utc};

use anypod_core::models::TranscriptSource;

/// Where the extractor should look for cookies/auth and auxiliary token
/// services. Threaded through every call that hits the network.
#[derive(Debug, Clone, Default)]
pub struct AuthOptions {
    pub cookies_path: Option<PathBuf>,
    pub pot_provider_url: Option<String>,
}

/// Bounds derived from a feed's retention configuration, passed to
/// `fetch_playlist_metadata` so the extractor does as little enumeration
/// work as the caller actually needs.
#[derive(Debug, Clone, Default)]
pub struct PlaylistFetchOptions {
    pub since: Option<DateTime<Utc>>,
    pub keep_last: Option<u32>,
    pub auth: AuthOptions,
}

/// Which item inside a multi-attachment post to select, and auth context,
/// for a single media download.
#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    pub playlist_index: Option<u32>,
    pub auth: AuthOptions,
}

/// Which artifacts a caller wants out of one download call — used by the
/// downloader's artifact-selective refresh entry point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArtifactMask {
    pub media: bool,
    pub thumbnail: bool,
    pub transcript: bool,
}

impl ArtifactMask {
    pub const fn all() -> Self {
        Self {
            media: true,
            thumbnail: true,
            transcript: true,
        }
    }

    pub const fn none() -> Self {
        Self {
            media: false,
            thumbnail: false,
            transcript: false,
        }
    }
}

/// What `discover_feed_properties` reports about a configured source URL.
#[derive(Debug, Clone)]
pub struct DiscoveredSource {
    pub source_type: anypod_core::models::SourceType,
    pub resolved_url: Option<String>,
    pub suggested_title: Option<String>,
    pub suggested_author: Option<String>,
    pub feed_thumbnail_url: Option<String>,
}

/// Refined fields the extractor learns only once the media file actually
/// lands on disk (the playlist-metadata pass often has estimates only).
#[derive(Debug, Clone)]
pub struct RefinedMediaFields {
    pub ext: String,
    pub mime_type: String,
    pub filesize: u64,
    pub duration: u64,
}

/// A transcript preference: which language, and whether creator-authored
/// captions are acceptable or only auto-generated ones.
#[derive(Debug, Clone)]
pub struct TranscriptRequest {
    pub lang: String,
    pub source: TranscriptSource,
}
