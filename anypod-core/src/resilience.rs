//! Timeout defaults for suspension points: extractor invocations have a
//! wall-clock timeout that is unbounded by default for media downloads and
//! bounded for metadata-only calls.

use std::time::Duration;

/// Timeout applied to metadata-only extractor calls (`discover_feed_properties`,
/// `fetch_playlist_metadata`).
pub const METADATA_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout applied to database operations through the connection pool.
pub const DB_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
pub struct TimeoutConfig {
    pub metadata_call: Duration,
    pub db_query: Duration,
    /// `None` means unbounded, the default for media downloads.
    pub media_download: Option<Duration>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            metadata_call: METADATA_CALL_TIMEOUT,
            db_query: DB_QUERY_TIMEOUT,
            media_download: None,
        }
    }
}
