use std::fmt;

use crate::error::{Error, Result};

/// Validates a string used as a filesystem path component: not empty, not
/// `.`/`..`, no path separator, no control character. Shared by `FeedId`,
/// download ids, and any other identifier that ends up in a path.
fn validate_path_component(kind: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::invalid_identifier(kind, value, "must not be empty"));
    }
    if value == "." || value == ".." {
        return Err(Error::invalid_identifier(kind, value, "must not be '.' or '..'"));
    }
    if value.contains('/') || value.contains('\\') {
        return Err(Error::invalid_identifier(kind, value, "must not contain a path separator"));
    }
    if value.chars().any(|c| c.is_control()) {
        return Err(Error::invalid_identifier(kind, value, "must not contain a control character"));
    }
    Ok(())
}

/// A feed's stable configuration-drawn identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct FeedId(String);

impl FeedId {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        validate_path_component("feed_id", &value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The extractor's native identifier for a download, validated the same way
/// as `FeedId` since it is also used as a filename stem.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct DownloadId(String);

impl DownloadId {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        validate_path_component("download_id", &value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DownloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
