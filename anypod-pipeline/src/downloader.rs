use std::path::Path;

use anypod_core::error::{Error, ExtractorErrorKind, Result};
use anypod_core::file_store::FileStore;
use anypod_core::models::{Download, DownloadStatus, Feed, TranscriptSource};
use anypod_core::path_manager::PathManager;
use anypod_extractor::{ArtifactMask, DownloadOptions, ExtractorWrapper, TranscriptRequest};
use anypod_store::MetadataStore;
use tracing::{info, warn};

/// Drains the `QUEUED` set for one feed, one item at a time, oldest first.
pub struct Downloader<'a> {
    store: &'a MetadataStore,
    extractor: &'a dyn ExtractorWrapper,
    paths: &'a PathManager,
    max_errors: u32,
}

#[derive(Debug, Default)]
pub struct DownloadOutcome {
    pub downloaded: u32,
    pub errored: u32,
    pub filtered: u32,
}

impl<'a> Downloader<'a> {
    pub fn new(store: &'a MetadataStore, extractor: &'a dyn ExtractorWrapper, paths: &'a PathManager, max_errors: u32) -> Self {
        Self { store, extractor, paths, max_errors }
    }

    pub async fn run(&self, feed: &Feed) -> Result<DownloadOutcome> {
        let mut outcome = DownloadOutcome::default();
        let queued = self.store.downloads.list_by_status(Some(&feed.id), DownloadStatus::Queued, i64::MAX, 0).await?;

        for download in queued {
            match self.download_one(feed, &download).await {
                Ok(DownloadResult::Downloaded) => outcome.downloaded += 1,
                Ok(DownloadResult::Filtered) => outcome.filtered += 1,
                Err(e) => {
                    outcome.errored += 1;
                    let new_status = self
                        .store
                        .downloads
                        .bump_retries(&feed.id, &download.id, &e.to_string(), self.max_errors)
                        .await?;
                    warn!(feed_id = %feed.id, download_id = %download.id, error = %e, status = ?new_status, "download attempt failed");
                }
            }
        }
        Ok(outcome)
    }

    async fn download_one(&self, feed: &Feed, download: &Download) -> Result<DownloadResult> {
        let tmp_dir = self.paths.tmp_dir(&feed.id);
        let options = DownloadOptions {
            playlist_index: download.playlist_index,
            auth: Default::default(),
        };

        let media_result = self.extractor.download_media(download, &tmp_dir, &options).await;
        let (media_path, refined) = match media_result {
            Ok(v) => v,
            Err(Error::Extractor(ExtractorErrorKind::ItemFiltered)) => {
                self.store.downloads.archive(&feed.id, &download.id).await?;
                return Ok(DownloadResult::Filtered);
            }
            Err(e) => return Err(e),
        };

        let thumbnail_path = self.extractor.download_media_thumbnail(download, &tmp_dir).await.unwrap_or_else(|e| {
            warn!(download_id = %download.id, error = %e, "thumbnail fetch failed, continuing without it");
            None
        });

        let transcript_path = match &feed.transcript_lang {
            Some(lang) => {
                let source = feed
                    .transcript_source_priority
                    .as_ref()
                    .and_then(|p| p.first().copied())
                    .unwrap_or(TranscriptSource::Auto);
                let request = TranscriptRequest { lang: lang.clone(), source };
                self.extractor.download_transcript(download, &request, &tmp_dir).await.unwrap_or_else(|e| {
                    warn!(download_id = %download.id, error = %e, "transcript fetch failed, continuing without it");
                    None
                })
            }
            None => None,
        };

        let final_media_path = self.paths.media_path(&feed.id, &download.id, &refined.ext)?;
        self.stage_file(&media_path, &final_media_path).await?;

        let thumbnail_ext = match thumbnail_path {
            Some(path) => {
                let ext = extension_of(&path);
                let target = self.paths.image_path(&feed.id, Some(&download.id), &ext)?;
                match self.stage_file(&path, &target).await {
                    Ok(()) => Some(ext),
                    Err(e) => {
                        warn!(download_id = %download.id, error = %e, "failed to stage thumbnail");
                        None
                    }
                }
            }
            None => None,
        };

        let (transcript_ext, transcript_lang, transcript_source) = match (&transcript_path, &feed.transcript_lang) {
            (Some(path), Some(lang)) => {
                let ext = extension_of(path);
                let source = feed
                    .transcript_source_priority
                    .as_ref()
                    .and_then(|p| p.first().copied())
                    .unwrap_or(TranscriptSource::Auto);
                let target = self.paths.transcript_path(&feed.id, &download.id, lang, &ext)?;
                match self.stage_file(path, &target).await {
                    Ok(()) => (Some(ext), Some(lang.clone()), Some(source)),
                    Err(e) => {
                        warn!(download_id = %download.id, error = %e, "failed to stage transcript");
                        (None, None, None)
                    }
                }
            }
            _ => (None, None, None),
        };

        self.store
            .downloads
            .mark_downloaded(
                &feed.id,
                &download.id,
                &refined.ext,
                &refined.mime_type,
                refined.filesize,
                refined.duration,
                thumbnail_ext.as_deref(),
                transcript_ext.as_deref(),
                transcript_lang.as_deref(),
                transcript_source,
            )
            .await?;

        info!(feed_id = %feed.id, download_id = %download.id, "download completed");
        Ok(DownloadResult::Downloaded)
    }

    /// Artifact-selective variant used by refresh operations: downloads only
    /// the artifacts named in `mask` and writes only the corresponding
    /// fields, leaving status untouched.
    pub async fn download_artifacts(&self, feed: &Feed, download: &Download, mask: ArtifactMask) -> Result<()> {
        let tmp_dir = self.paths.tmp_dir(&feed.id);

        if mask.media {
            let options = DownloadOptions { playlist_index: download.playlist_index, auth: Default::default() };
            let (media_path, refined) = self.extractor.download_media(download, &tmp_dir, &options).await?;
            let target = self.paths.media_path(&feed.id, &download.id, &refined.ext)?;
            self.stage_file(&media_path, &target).await?;
        }

        if mask.thumbnail {
            if let Some(path) = self.extractor.download_media_thumbnail(download, &tmp_dir).await? {
                let ext = extension_of(&path);
                let target = self.paths.image_path(&feed.id, Some(&download.id), &ext)?;
                self.stage_file(&path, &target).await?;
                self.store.downloads.set_thumbnail_extension(&feed.id, &download.id, Some(&ext)).await?;
            }
        }

        if mask.transcript {
            if let Some(lang) = &feed.transcript_lang {
                let source = feed
                    .transcript_source_priority
                    .as_ref()
                    .and_then(|p| p.first().copied())
                    .unwrap_or(TranscriptSource::Auto);
                let request = TranscriptRequest { lang: lang.clone(), source };
                if let Some(path) = self.extractor.download_transcript(download, &request, &tmp_dir).await? {
                    let ext = extension_of(&path);
                    let target = self.paths.transcript_path(&feed.id, &download.id, lang, &ext)?;
                    self.stage_file(&path, &target).await?;
                    self.store
                        .downloads
                        .set_transcript_fields(&feed.id, &download.id, Some(&ext), Some(lang), Some(source))
                        .await?;
                }
            }
        }

        Ok(())
    }

    async fn stage_file(&self, source_in_tmp: &Path, target: &Path) -> Result<()> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Filesystem(format!("creating {}: {e}", parent.display())))?;
        }
        FileStore.move_into_place(source_in_tmp, target).await
    }
}

fn extension_of(path: &Path) -> String {
    path.extension().and_then(|e| e.to_str()).unwrap_or("bin").to_string()
}

enum DownloadResult {
    Downloaded,
    Filtered,
}
