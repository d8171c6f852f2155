//! Admin handlers: requeueing, targeted metadata refresh, and manual
//! submissions. Served from a separate listener than the public routes;
//! access control is that separate binding, not an in-process auth layer.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use anypod_core::models::{DownloadId, DownloadStatus, FeedId};
use anypod_pipeline::Coordinator;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/feeds/:feed_id/requeue", post(requeue_feed))
        .route("/admin/feeds/:feed_id/downloads/:download_id/requeue", post(requeue_download))
        .route(
            "/admin/feeds/:feed_id/downloads/:download_id/refresh-metadata",
            post(refresh_download_metadata),
        )
        .route("/admin/feeds/:feed_id/downloads", post(add_manual_submission))
}

fn resolve_feed_id(raw: String) -> AppResult<FeedId> {
    FeedId::new(raw).map_err(AppError::from)
}

fn resolve_download_id(raw: String) -> AppResult<DownloadId> {
    DownloadId::new(raw).map_err(AppError::from)
}

#[derive(Serialize)]
struct RequeueFeedResponse {
    feed_id: String,
    requeue_count: u64,
}

async fn requeue_feed(State(state): State<AppState>, Path(feed_id): Path<String>) -> AppResult<(StatusCode, Json<RequeueFeedResponse>)> {
    let feed_id = resolve_feed_id(feed_id)?;
    let requeue_count = state.store.downloads.requeue_all(&feed_id, DownloadStatus::Error).await?;
    if requeue_count > 0 {
        state.scheduler.submit(feed_id.clone()).await;
    }
    Ok((StatusCode::ACCEPTED, Json(RequeueFeedResponse { feed_id: feed_id.to_string(), requeue_count })))
}

#[derive(Serialize)]
struct RequeueDownloadResponse {
    feed_id: String,
    download_id: String,
    status: &'static str,
}

async fn requeue_download(
    State(state): State<AppState>,
    Path((feed_id, download_id)): Path<(String, String)>,
) -> AppResult<Json<RequeueDownloadResponse>> {
    let feed_id = resolve_feed_id(feed_id)?;
    let download_id = resolve_download_id(download_id)?;

    let download = state
        .store
        .downloads
        .get(&feed_id, &download_id)
        .await?
        .ok_or_else(|| AppError::not_found("download not found").with_feed(feed_id.to_string()).with_download(download_id.to_string()))?;

    if download.status != DownloadStatus::Error {
        return Err(AppError::bad_request("download is not currently ERROR")
            .with_feed(feed_id.to_string())
            .with_download(download_id.to_string()));
    }

    state.store.downloads.requeue_one(&feed_id, &download_id, DownloadStatus::Error).await?;
    state.scheduler.submit(feed_id.clone()).await;

    Ok(Json(RequeueDownloadResponse { feed_id: feed_id.to_string(), download_id: download_id.to_string(), status: "QUEUED" }))
}

#[derive(Deserialize)]
struct RefreshMetadataQuery {
    #[serde(default)]
    refresh_transcript: bool,
}

#[derive(Serialize)]
struct RefreshMetadataResponse {
    metadata_changed: bool,
    updated_fields: Vec<&'static str>,
    thumbnail_refreshed: bool,
    transcript_refreshed: bool,
}

async fn refresh_download_metadata(
    State(state): State<AppState>,
    Path((feed_id, download_id)): Path<(String, String)>,
    Query(query): Query<RefreshMetadataQuery>,
) -> AppResult<Json<RefreshMetadataResponse>> {
    let feed_id = resolve_feed_id(feed_id)?;
    let download_id = resolve_download_id(download_id)?;

    let feed = state
        .store
        .feeds
        .get(&feed_id)
        .await?
        .ok_or_else(|| AppError::not_found("feed not found").with_feed(feed_id.to_string()))?;

    let coordinator = Coordinator::new(&state.store, &*state.extractor, &state.paths, state.max_errors);
    let outcome = coordinator.refresh_download_metadata(&feed, &download_id, query.refresh_transcript).await?;

    Ok(Json(RefreshMetadataResponse {
        metadata_changed: outcome.metadata_changed,
        updated_fields: outcome.updated_fields,
        thumbnail_refreshed: outcome.thumbnail_refreshed,
        transcript_refreshed: outcome.transcript_refreshed,
    }))
}

#[derive(Deserialize)]
struct ManualSubmissionRequest {
    url: String,
}

#[derive(Serialize)]
struct ManualSubmissionResponse {
    feed_id: String,
    download_id: String,
    status: &'static str,
    new: bool,
    message: &'static str,
}

async fn add_manual_submission(
    State(state): State<AppState>,
    Path(feed_id): Path<String>,
    Json(body): Json<ManualSubmissionRequest>,
) -> AppResult<Json<ManualSubmissionResponse>> {
    let feed_id = resolve_feed_id(feed_id)?;

    let config = state
        .feed_configs
        .get(&feed_id)
        .ok_or_else(|| AppError::not_found("feed not found").with_feed(feed_id.to_string()))?;
    if !config.is_manual() {
        return Err(AppError::bad_request("feed is not configured for manual submissions").with_feed(feed_id.to_string()));
    }

    let feed = state
        .store
        .feeds
        .get(&feed_id)
        .await?
        .ok_or_else(|| AppError::not_found("feed not found").with_feed(feed_id.to_string()))?;

    let coordinator = Coordinator::new(&state.store, &*state.extractor, &state.paths, state.max_errors);
    let outcome = coordinator.add_manual_submission(&feed, &body.url).await?;
    if outcome.needs_pass {
        state.scheduler.submit(feed_id.clone()).await;
    }

    Ok(Json(ManualSubmissionResponse {
        feed_id: feed_id.to_string(),
        download_id: outcome.download_id.to_string(),
        status: outcome.status.as_db_str(),
        new: outcome.new,
        message: if outcome.needs_pass {
            "submission accepted, processing scheduled in the background"
        } else {
            "item already materialized, no pass scheduled"
        },
    }))
}
