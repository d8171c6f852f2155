//! Read-only serving of published artifacts: feed XML, media, artwork,
//! thumbnails, and transcripts, plus the liveness probe.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use anypod_core::models::{DownloadId, FeedId};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/feeds/:filename", get(get_feed_xml))
        .route("/media/:feed_id/:filename", get(get_media))
        .route("/images/:filename", get(get_feed_artwork))
        .route("/images/:feed_id/:filename", get(get_download_thumbnail))
        .route("/transcripts/:feed_id/:filename", get(get_transcript))
        .route("/api/health", get(health))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// Splits `"stem.ext"` on the last dot. Used for single-extension filenames.
fn split_ext(filename: &str) -> AppResult<(&str, &str)> {
    filename
        .rsplit_once('.')
        .filter(|(stem, ext)| !stem.is_empty() && !ext.is_empty())
        .ok_or_else(|| AppError::bad_request(format!("malformed filename: {filename}")))
}

async fn read_file(path: std::path::PathBuf, content_type: &str) -> AppResult<Response> {
    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::not_found(format!("{} not found", path.display()))
        } else {
            AppError::internal(format!("reading {}: {e}", path.display()))
        }
    })?;
    Ok(([(header::CONTENT_TYPE, content_type.to_string())], bytes).into_response())
}

async fn get_feed_xml(State(state): State<AppState>, Path(filename): Path<String>) -> AppResult<Response> {
    let (stem, ext) = split_ext(&filename)?;
    if ext != "xml" {
        return Err(AppError::bad_request("feed files are served as .xml"));
    }
    let feed_id = FeedId::new(stem)?;
    let path = state.paths.feed_xml_path(&feed_id);
    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|_| AppError::not_found(format!("feed {feed_id} has no published file yet")))?;
    let bytes = tokio::fs::read(&path).await.map_err(|e| AppError::internal(format!("reading feed xml: {e}")))?;

    let mut response = (
        [(header::CONTENT_TYPE, "application/rss+xml".to_string())],
        bytes,
    )
        .into_response();
    if let Ok(modified) = metadata.modified() {
        if let Ok(since_epoch) = modified.duration_since(std::time::UNIX_EPOCH) {
            let etag = format!("\"{}-{}\"", since_epoch.as_secs(), metadata.len());
            response.headers_mut().insert(header::ETAG, etag.parse().unwrap());
        }
    }
    Ok(response)
}

async fn get_media(State(state): State<AppState>, Path((feed_id, filename)): Path<(String, String)>) -> AppResult<Response> {
    let (stem, ext) = split_ext(&filename)?;
    let feed_id = FeedId::new(feed_id)?;
    let download_id = DownloadId::new(stem)?;
    let path = state.paths.media_path(&feed_id, &download_id, ext)?;
    let content_type = mime_guess::from_path(&path).first_or_octet_stream().to_string();
    read_file(path, &content_type).await
}

async fn get_feed_artwork(State(state): State<AppState>, Path(filename): Path<String>) -> AppResult<Response> {
    let (stem, ext) = split_ext(&filename)?;
    let feed_id = FeedId::new(stem)?;
    let path = state.paths.image_path(&feed_id, None, ext)?;
    let content_type = mime_guess::from_path(&path).first_or_octet_stream().to_string();
    read_file(path, &content_type).await
}

async fn get_download_thumbnail(
    State(state): State<AppState>,
    Path((feed_id, filename)): Path<(String, String)>,
) -> AppResult<Response> {
    let (stem, ext) = split_ext(&filename)?;
    let feed_id = FeedId::new(feed_id)?;
    let download_id = DownloadId::new(stem)?;
    let path = state.paths.image_path(&feed_id, Some(&download_id), ext)?;
    let content_type = mime_guess::from_path(&path).first_or_octet_stream().to_string();
    read_file(path, &content_type).await
}

async fn get_transcript(State(state): State<AppState>, Path((feed_id, filename)): Path<(String, String)>) -> AppResult<Response> {
    let (rest, ext) = split_ext(&filename)?;
    let (stem, lang) = split_ext(rest)?;
    let feed_id = FeedId::new(feed_id)?;
    let download_id = DownloadId::new(stem)?;
    let path = state.paths.transcript_path(&feed_id, &download_id, lang, ext)?;
    let content_type = mime_guess::from_path(&path).first_or_octet_stream().to_string();
    read_file(path, &content_type).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_ext_rejects_extensionless_names() {
        assert!(split_ext("noext").is_err());
    }

    #[test]
    fn split_ext_splits_on_last_dot() {
        let (stem, ext) = split_ext("v1.en.srt").unwrap();
        assert_eq!(stem, "v1.en");
        assert_eq!(ext, "srt");
    }
}
