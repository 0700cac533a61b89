use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Response,
    Json,
};
use serde::Serialize;
use tokio::sync::oneshot;

use crate::http::error::{ApiError, ApiResult};
use crate::http::state::AppState;
use crate::media::library::{Quality, VideoRecord};
use crate::media::mime::content_type_for;
use crate::stream::responder::{self, Disposition, StreamRequest};
use crate::stream::transfer::{TransferOutcome, TransferTally};

/// GET /api/stream/{id}: full file or one byte range.
pub async fn stream_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    serve(&state, &id, &headers, Disposition::Inline).await
}

/// GET /api/stream/{id}/download: same bytes, saved as a file. Ranges still
/// work so interrupted downloads can resume.
pub async fn download_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    serve(&state, &id, &headers, Disposition::Attachment).await
}

/// HEAD /api/stream/{id}: headers a GET would send, without opening the file.
pub async fn head_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let request = StreamRequest::from_headers(&id, &headers);
    let plan = responder::prepare(&state.catalog, &state.stream, request)
        .await
        .map_err(|e| ApiError::from_stream(e, state.development))?;
    Ok(plan.head_response(&state.stream, Disposition::Inline))
}

async fn serve(
    state: &AppState,
    id: &str,
    headers: &HeaderMap,
    disposition: Disposition,
) -> ApiResult<Response> {
    let request = StreamRequest::from_headers(id, headers);
    let plan = responder::prepare(&state.catalog, &state.stream, request)
        .await
        .map_err(|e| ApiError::from_stream(e, state.development))?;

    let (response, outcome) = plan
        .respond(&state.stream, disposition, state.shutdown.child_token())
        .await
        .map_err(|e| ApiError::from_stream(e, state.development))?;

    if let Some(outcome) = outcome {
        tokio::spawn(log_outcome(
            id.to_string(),
            outcome,
            Arc::clone(&state.transfers),
        ));
    }
    Ok(response)
}

async fn log_outcome(
    id: String,
    outcome: oneshot::Receiver<TransferOutcome>,
    tally: Arc<TransferTally>,
) {
    let Ok(outcome) = outcome.await else {
        return;
    };
    tally.record(&outcome);
    match outcome {
        TransferOutcome::Completed { bytes } => {
            tracing::debug!(video = %id, bytes, "Transfer completed");
        }
        TransferOutcome::Aborted { bytes_sent } => {
            tracing::debug!(video = %id, bytes_sent, "Client went away mid-transfer");
        }
        TransferOutcome::Failed { bytes_sent, error } => {
            tracing::warn!(video = %id, bytes_sent, "Transfer aborted by read error: {error}");
        }
    }
}

/// Player bootstrap payload for GET /api/stream/{id}/info.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    #[serde(flatten)]
    pub video: Arc<VideoRecord>,
    pub quality: Quality,
    pub resolution: Option<String>,
    pub category: String,
    pub mime_type: &'static str,
    pub stream_url: String,
    pub download_url: String,
    pub thumbnail_url: Option<String>,
}

impl VideoInfo {
    pub fn new(video: Arc<VideoRecord>, thumbnail_url: Option<String>) -> Self {
        Self {
            quality: video.quality(),
            resolution: video.resolution(),
            category: video.category(),
            mime_type: content_type_for(&video.path),
            stream_url: format!("/api/stream/{}", video.id),
            download_url: format!("/api/stream/{}/download", video.id),
            thumbnail_url,
            video,
        }
    }
}

/// GET /api/stream/{id}/info
pub async fn video_info(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<VideoInfo>> {
    let video = state
        .catalog
        .get(&id)
        .ok_or_else(|| ApiError::not_found("unknown_video", format!("no video with id {id}")))?;
    let thumbnail_url = state
        .thumbnails
        .thumbnail_path(&video.id)
        .map(|_| format!("/api/thumbnails/{}", video.id));
    Ok(Json(VideoInfo::new(video, thumbnail_url)))
}
