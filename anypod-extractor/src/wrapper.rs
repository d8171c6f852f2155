use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use backon::{BackoffBuilder, ExponentialBuilder};
use tokio::process::Command;
use tracing::{debug, warn};

use anypod_core::error::{Error, ExtractorErrorKind, Result};
use anypod_core::models::{Download, FeedId, SourceType};

use crate::error::classify_stderr;
use crate::options::{DiscoveredSource, DownloadOptions, PlaylistFetchOptions, RefinedMediaFields, TranscriptRequest};
use crate::parse::parse_playlist_entry;

/// A narrow contract over an opaque external tool that enumerates media
/// sources and downloads media. Only the first three methods are mandatory;
/// a wrapper that genuinely cannot produce thumbnails/transcripts may accept
/// the no-op defaults.
#[async_trait]
pub trait ExtractorWrapper: Send + Sync {
    async fn discover_feed_properties(&self, url: &str) -> Result<DiscoveredSource>;

    async fn fetch_playlist_metadata(
        &self,
        feed_id: &FeedId,
        url: &str,
        options: &PlaylistFetchOptions,
    ) -> Result<Vec<Download>>;

    async fn download_media(
        &self,
        download: &Download,
        tmp_dir: &Path,
        options: &DownloadOptions,
    ) -> Result<(PathBuf, RefinedMediaFields)>;

    async fn download_feed_thumbnail(&self, _feed_url: &str, _tmp_dir: &Path) -> Result<Option<PathBuf>> {
        Ok(None)
    }

    async fn download_media_thumbnail(&self, _download: &Download, _tmp_dir: &Path) -> Result<Option<PathBuf>> {
        Ok(None)
    }

    async fn download_transcript(
        &self,
        _download: &Download,
        _request: &TranscriptRequest,
        _tmp_dir: &Path,
    ) -> Result<Option<PathBuf>> {
        Ok(None)
    }
}

/// `yt-dlp`-backed implementation. Every call shells out to the configured
/// binary and interprets its stdout/stderr; no yt-dlp internals leak past
/// this module.
pub struct YtDlpWrapper {
    binary: PathBuf,
    cookies_path: Option<PathBuf>,
    pot_provider_url: Option<String>,
    call_timeout: Duration,
}

impl YtDlpWrapper {
    pub fn new(binary: impl Into<PathBuf>, call_timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            cookies_path: None,
            pot_provider_url: None,
            call_timeout,
        }
    }

    pub fn with_cookies(mut self, cookies_path: Option<PathBuf>) -> Self {
        self.cookies_path = cookies_path;
        self
    }

    pub fn with_pot_provider(mut self, pot_provider_url: Option<String>) -> Self {
        self.pot_provider_url = pot_provider_url;
        self
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
        if let Some(cookies) = &self.cookies_path {
            cmd.arg("--cookies").arg(cookies);
        }
        match &self.pot_provider_url {
            Some(url) => {
                cmd.arg("--extractor-args").arg(format!("youtubepot-bgutilhttp:base_url={url}"));
            }
            None => {
                cmd.arg("--extractor-args").arg("youtube:fetch_pot=never");
            }
        }
        cmd
    }

    async fn run(&self, mut cmd: Command) -> std::result::Result<(bool, String, String), Error> {
        let output = tokio::time::timeout(self.call_timeout, cmd.output())
            .await
            .map_err(|_| Error::Extractor(ExtractorErrorKind::ExtractorFailed("timed out".to_string())))?
            .map_err(|e| Error::Extractor(ExtractorErrorKind::ExtractorFailed(format!("spawn failed: {e}"))))?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        Ok((output.status.success(), stdout, stderr))
    }
}

#[async_trait]
impl ExtractorWrapper for YtDlpWrapper {
    async fn discover_feed_properties(&self, url: &str) -> Result<DiscoveredSource> {
        let mut backoff = ExponentialBuilder::default().with_max_times(3).build();
        let (stdout, stderr) = loop {
            let mut cmd = self.base_command();
            cmd.args(["--dump-single-json", "--flat-playlist", "--playlist-items", "1"]).arg(url);
            let (ok, stdout, stderr) = self.run(cmd).await?;
            if ok && !stdout.trim().is_empty() {
                break (stdout, stderr);
            }
            if matches!(classify_stderr(&stderr), ExtractorErrorKind::RateLimited) {
                if let Some(delay) = backoff.next() {
                    warn!(url, "rate limited during discovery, backing off before retry");
                    tokio::time::sleep(delay).await;
                    continue;
                }
            }
            return Err(Error::Extractor(classify_stderr(&stderr)));
        };

        let value: serde_json::Value = serde_json::from_str(stdout.trim())
            .map_err(|e| Error::Extractor(ExtractorErrorKind::ExtractorFailed(format!("bad discovery json: {e}"))))?;

        Ok(DiscoveredSource {
            source_type: classify_source_type(&value),
            resolved_url: value.get("webpage_url").and_then(serde_json::Value::as_str).map(str::to_string),
            suggested_title: value.get("title").and_then(serde_json::Value::as_str).map(str::to_string),
            suggested_author: value
                .get("uploader")
                .or_else(|| value.get("channel"))
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
            feed_thumbnail_url: value.get("thumbnail").and_then(serde_json::Value::as_str).map(str::to_string),
        })
    }

    async fn fetch_playlist_metadata(
        &self,
        feed_id: &FeedId,
        url: &str,
        options: &PlaylistFetchOptions,
    ) -> Result<Vec<Download>> {
        let mut cmd = self.base_command();
        cmd.args(["--dump-json", "--no-warnings"]).arg(url);
        if let Some(since) = options.since {
            cmd.arg("--dateafter").arg(since.format("%Y%m%d").to_string());
        }
        if let Some(keep_last) = options.keep_last {
            cmd.arg("--playlist-end").arg(keep_last.to_string());
        }
        if let Some(cookies) = &options.auth.cookies_path {
            cmd.arg("--cookies").arg(cookies);
        }

        let (ok, stdout, stderr) = self.run(cmd).await?;
        let now = chrono::Utc::now();
        let mut items = Vec::new();
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            let entry: serde_json::Value = match serde_json::from_str(line) {
                Ok(v) => v,
                Err(e) => {
                    warn!(feed_id = %feed_id, error = %e, "skipping malformed extractor output line");
                    continue;
                }
            };
            match parse_playlist_entry(feed_id, &entry, now) {
                Ok(download) => items.push(download),
                Err(e) => warn!(feed_id = %feed_id, error = %e, "skipping unparsable entry"),
            }
        }

        if items.is_empty() && !ok {
            return Err(Error::Extractor(classify_stderr(&stderr)));
        }
        if !ok {
            debug!(feed_id = %feed_id, "extractor exited non-zero but produced well-formed records; keeping them");
        }
        Ok(items)
    }

    async fn download_media(
        &self,
        download: &Download,
        tmp_dir: &Path,
        options: &DownloadOptions,
    ) -> Result<(PathBuf, RefinedMediaFields)> {
        tokio::fs::create_dir_all(tmp_dir)
            .await
            .map_err(|e| Error::Filesystem(format!("creating tmp dir {}: {e}", tmp_dir.display())))?;

        let output_template = tmp_dir.join(format!("{}.%(ext)s", download.id));
        let mut cmd = self.base_command();
        cmd.arg("-o").arg(&output_template).arg("--no-warnings").arg("--print-json");
        if let Some(index) = options.playlist_index {
            cmd.arg("--playlist-items").arg(index.to_string());
        }
        if let Some(cookies) = &options.auth.cookies_path {
            cmd.arg("--cookies").arg(cookies);
        }
        cmd.arg(&download.source_url);

        let (ok, stdout, stderr) = self.run(cmd).await?;
        if !ok {
            return Err(Error::Extractor(classify_stderr(&stderr)));
        }

        let last_line = stdout.lines().rfind(|l| !l.trim().is_empty()).ok_or_else(|| {
            Error::Extractor(ExtractorErrorKind::ExtractorFailed("no output from download".to_string()))
        })?;
        let info: serde_json::Value = serde_json::from_str(last_line)
            .map_err(|e| Error::Extractor(ExtractorErrorKind::ExtractorFailed(format!("bad download json: {e}"))))?;

        let ext = info
            .get("ext")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| Error::Extractor(ExtractorErrorKind::ExtractorFailed("missing ext in output".to_string())))?
            .to_string();
        let media_path = tmp_dir.join(format!("{}.{}", download.id, ext));

        let metadata = tokio::fs::metadata(&media_path)
            .await
            .map_err(|e| Error::Filesystem(format!("stat {}: {e}", media_path.display())))?;

        let mime_type = mime_guess::from_path(&media_path).first_or_octet_stream().to_string();
        let duration = info.get("duration").and_then(serde_json::Value::as_f64).map(|d| d.round() as u64).unwrap_or(0);

        Ok((
            media_path,
            RefinedMediaFields {
                ext,
                mime_type,
                filesize: metadata.len(),
                duration,
            },
        ))
    }

    async fn download_feed_thumbnail(&self, feed_url: &str, tmp_dir: &Path) -> Result<Option<PathBuf>> {
        self.download_thumbnail_common(feed_url, tmp_dir, "feed").await
    }

    async fn download_media_thumbnail(&self, download: &Download, tmp_dir: &Path) -> Result<Option<PathBuf>> {
        self.download_thumbnail_common(&download.source_url, tmp_dir, download.id.as_str()).await
    }

    async fn download_transcript(
        &self,
        download: &Download,
        request: &TranscriptRequest,
        tmp_dir: &Path,
    ) -> Result<Option<PathBuf>> {
        tokio::fs::create_dir_all(tmp_dir)
            .await
            .map_err(|e| Error::Filesystem(format!("creating tmp dir {}: {e}", tmp_dir.display())))?;

        let stem = format!("{}.transcript", download.id);
        let output_template = tmp_dir.join(format!("{stem}.%(ext)s"));
        let mut cmd = self.base_command();
        cmd.arg("--skip-download").arg("-o").arg(&output_template).arg("--sub-langs").arg(&request.lang);
        match request.source {
            anypod_core::models::TranscriptSource::Creator => {
                cmd.arg("--write-subs");
            }
            anypod_core::models::TranscriptSource::Auto => {
                cmd.arg("--write-auto-subs");
            }
        }
        cmd.arg(&download.source_url);

        let (ok, _stdout, stderr) = self.run(cmd).await?;
        if !ok {
            warn!(download_id = %download.id, error = %stderr, "transcript fetch failed, skipping");
            return Ok(None);
        }

        let mut entries = tokio::fs::read_dir(tmp_dir)
            .await
            .map_err(|e| Error::Filesystem(format!("reading tmp dir {}: {e}", tmp_dir.display())))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::Filesystem(format!("reading tmp dir {}: {e}", tmp_dir.display())))?
        {
            let name = entry.file_name();
            if name.to_string_lossy().starts_with(&stem) {
                return Ok(Some(entry.path()));
            }
        }
        Ok(None)
    }
}

impl YtDlpWrapper {
    async fn download_thumbnail_common(&self, source_url: &str, tmp_dir: &Path, stem: &str) -> Result<Option<PathBuf>> {
        tokio::fs::create_dir_all(tmp_dir)
            .await
            .map_err(|e| Error::Filesystem(format!("creating tmp dir {}: {e}", tmp_dir.display())))?;

        let output_template = tmp_dir.join(format!("{stem}.thumbnail.%(ext)s"));
        let mut cmd = self.base_command();
        cmd.arg("--skip-download")
            .arg("--write-thumbnail")
            .arg("--convert-thumbnails")
            .arg("jpg")
            .arg("-o")
            .arg(&output_template)
            .arg(source_url);

        let (ok, _stdout, stderr) = self.run(cmd).await?;
        if !ok {
            warn!(stem, error = %stderr, "thumbnail fetch failed, skipping");
            return Ok(None);
        }

        let candidate = tmp_dir.join(format!("{stem}.thumbnail.jpg"));
        if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            Ok(Some(candidate))
        } else {
            Ok(None)
        }
    }
}

/// Classifies a discovery result's `_type`/`channel_id` fields into a
/// `SourceType`, rewriting channel-like playlists distinctly from bare
/// playlists.
fn classify_source_type(value: &serde_json::Value) -> SourceType {
    let type_str = value.get("_type").and_then(serde_json::Value::as_str).unwrap_or("video");
    match type_str {
        "playlist" => {
            if value.get("channel_id").is_some() || value.get("uploader_id").is_some() {
                SourceType::Channel
            } else {
                SourceType::Playlist
            }
        }
        _ => SourceType::SingleVideo,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_channel_playlist() {
        let value = json!({ "_type": "playlist", "channel_id": "UC123" });
        assert_eq!(classify_source_type(&value), SourceType::Channel);
    }

    #[test]
    fn classifies_bare_playlist() {
        let value = json!({ "_type": "playlist" });
        assert_eq!(classify_source_type(&value), SourceType::Playlist);
    }

    #[test]
    fn classifies_single_video_by_default() {
        let value = json!({ "_type": "video" });
        assert_eq!(classify_source_type(&value), SourceType::SingleVideo);

        let value = json!({});
        assert_eq!(classify_source_type(&value), SourceType::SingleVideo);
    }
}
