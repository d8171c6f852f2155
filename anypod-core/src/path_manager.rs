//! Deterministic two-way mapping between logical identifiers and physical
//! layout.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::{DownloadId, FeedId};

/// Validates an extension (container/ language code) the same way
/// identifiers are validated: no separators, no control chars, non-empty.
/// Extensions are operator/extractor-supplied strings that also land in a
/// path, so they get the same scrutiny as `FeedId`/`DownloadId`.
fn validate_ext(kind: &'static str, ext: &str) -> Result<()> {
    if ext.is_empty() || ext == "." || ext == ".." {
        return Err(Error::invalid_identifier(kind, ext, "must not be empty, '.' or '..'"));
    }
    if ext.contains('/') || ext.contains('\\') {
        return Err(Error::invalid_identifier(kind, ext, "must not contain a path separator"));
    }
    if ext.chars().any(|c| c.is_control()) {
        return Err(Error::invalid_identifier(kind, ext, "must not contain a control character"));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PathManager {
    data_root: PathBuf,
    base_url: String,
}

impl PathManager {
    pub fn new(data_root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            data_root: data_root.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn media_path(&self, feed_id: &FeedId, download_id: &DownloadId, ext: &str) -> Result<PathBuf> {
        validate_ext("ext", ext)?;
        Ok(self
            .data_root
            .join("media")
            .join(feed_id.as_str())
            .join(format!("{download_id}.{ext}")))
    }

    pub fn media_url(&self, feed_id: &FeedId, download_id: &DownloadId, ext: &str) -> Result<String> {
        validate_ext("ext", ext)?;
        Ok(format!(
            "{}/media/{}/{}.{}",
            self.base_url,
            feed_id.as_str(),
            download_id,
            ext
        ))
    }

    /// Feed artwork when `download_id` is `None`, per-item thumbnail otherwise.
    pub fn image_path(&self, feed_id: &FeedId, download_id: Option<&DownloadId>, ext: &str) -> Result<PathBuf> {
        validate_ext("ext", ext)?;
        Ok(match download_id {
            None => self.data_root.join("images").join(format!("{feed_id}.{ext}")),
            Some(id) => self
                .data_root
                .join("images")
                .join(feed_id.as_str())
                .join("downloads")
                .join(format!("{id}.{ext}")),
        })
    }

    pub fn image_url(&self, feed_id: &FeedId, download_id: Option<&DownloadId>, ext: &str) -> Result<String> {
        validate_ext("ext", ext)?;
        Ok(match download_id {
            None => format!("{}/images/{}.{}", self.base_url, feed_id, ext),
            Some(id) => format!("{}/images/{}/{}.{}", self.base_url, feed_id, id, ext),
        })
    }

    pub fn transcript_path(
        &self,
        feed_id: &FeedId,
        download_id: &DownloadId,
        lang: &str,
        ext: &str,
    ) -> Result<PathBuf> {
        validate_ext("lang", lang)?;
        validate_ext("ext", ext)?;
        Ok(self
            .data_root
            .join("transcripts")
            .join(feed_id.as_str())
            .join(format!("{download_id}.{lang}.{ext}")))
    }

    pub fn transcript_url(
        &self,
        feed_id: &FeedId,
        download_id: &DownloadId,
        lang: &str,
        ext: &str,
    ) -> Result<String> {
        validate_ext("lang", lang)?;
        validate_ext("ext", ext)?;
        Ok(format!(
            "{}/transcripts/{}/{}.{}.{}",
            self.base_url, feed_id, download_id, lang, ext
        ))
    }

    pub fn feed_xml_path(&self, feed_id: &FeedId) -> PathBuf {
        self.data_root.join("feeds").join(format!("{feed_id}.xml"))
    }

    pub fn feed_xml_url(&self, feed_id: &FeedId) -> String {
        format!("{}/feeds/{}.xml", self.base_url, feed_id)
    }

    /// A unique, feed-scoped scratch path. The caller is responsible for
    /// creating the parent directory and cleaning it up.
    pub fn tmp_file(&self, feed_id: &FeedId) -> PathBuf {
        self.data_root
            .join("tmp")
            .join(feed_id.as_str())
            .join(nanoid::nanoid!(16))
    }

    pub fn tmp_dir(&self, feed_id: &FeedId) -> PathBuf {
        self.data_root.join("tmp").join(feed_id.as_str())
    }

    pub fn db_path(&self, database_name: &str) -> PathBuf {
        self.data_root.join("db").join(database_name)
    }
}
