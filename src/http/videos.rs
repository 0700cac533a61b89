//! Catalog endpoints under `/api/videos`.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::http::error::{ApiError, ApiResult};
use crate::http::state::AppState;
use crate::media::catalog::ScanSummary;
use crate::media::library::{Quality, VideoRecord};
use crate::media::stats::CatalogStats;

/// A record as listed in the grid: the record itself plus its thumbnail.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    #[serde(flatten)]
    pub video: Arc<VideoRecord>,
    pub quality: Quality,
    pub thumbnail_url: Option<String>,
}

/// Pair a record with its thumbnail, asking for one to be generated when it
/// does not exist yet.
fn summarize(state: &AppState, video: &Arc<VideoRecord>) -> VideoSummary {
    let thumbnail_url = match state.thumbnails.thumbnail_path(&video.id) {
        Some(_) => Some(format!("/api/thumbnails/{}", video.id)),
        None => {
            state.thumbnails.request(&video.id, &video.path);
            None
        }
    };
    VideoSummary {
        video: Arc::clone(video),
        quality: video.quality(),
        thumbnail_url,
    }
}

/// GET /api/videos
pub async fn list_videos(State(state): State<AppState>) -> Json<Vec<VideoSummary>> {
    let videos = state.catalog.all_videos();
    Json(videos.iter().map(|v| summarize(&state, v)).collect())
}

/// GET /api/videos/{id}
pub async fn get_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<VideoSummary>> {
    let video = state
        .catalog
        .get(&id)
        .ok_or_else(|| ApiError::not_found("unknown_video", format!("no video with id {id}")))?;
    Ok(Json(summarize(&state, &video)))
}

/// GET /api/videos/search/{query}
pub async fn search(
    State(state): State<AppState>,
    Path(query): Path<String>,
) -> Json<Vec<VideoSummary>> {
    let results = state.catalog.search(&query);
    Json(results.iter().map(|v| summarize(&state, v)).collect())
}

/// GET /api/videos/categories
pub async fn list_categories(
    State(state): State<AppState>,
) -> Json<BTreeMap<String, Vec<VideoSummary>>> {
    let groups = state
        .catalog
        .by_category()
        .into_iter()
        .map(|(category, videos)| {
            let videos = videos.iter().map(|v| summarize(&state, v)).collect();
            (category, videos)
        })
        .collect();
    Json(groups)
}

/// GET /api/videos/stats/overview
pub async fn stats_overview(State(state): State<AppState>) -> Json<Arc<CatalogStats>> {
    Json(state.catalog.stats())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub videos: usize,
    pub estimated: usize,
    pub excluded: usize,
    pub elapsed_secs: f64,
}

impl From<ScanSummary> for RefreshResponse {
    fn from(s: ScanSummary) -> Self {
        Self {
            videos: s.videos,
            estimated: s.estimated,
            excluded: s.excluded,
            elapsed_secs: s.elapsed_secs,
        }
    }
}

/// POST /api/videos/refresh: rescan the folder and swap in the new catalog.
/// Concurrent refreshes run one after another.
pub async fn refresh(State(state): State<AppState>) -> ApiResult<Json<RefreshResponse>> {
    let catalog = Arc::clone(&state.catalog);
    let summary = tokio::task::spawn_blocking(move || catalog.refresh())
        .await
        .map_err(|e| ApiError::internal(format!("refresh task failed: {e}"), state.development))?
        .map_err(|e| ApiError::from_scan(e, state.development))?;
    tracing::info!("Catalog refreshed: {} videos", summary.videos);
    Ok(Json(summary.into()))
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub videos: usize,
}

/// GET /api/health: open even when an access code is set.
pub async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        videos: state.catalog.len(),
    })
}
