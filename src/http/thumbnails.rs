use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;

use crate::http::error::{ApiError, ApiResult};
use crate::http::state::AppState;

/// GET /api/thumbnails/{id}: the generated JPEG, or 404 while it is still
/// being produced.
pub async fn serve_thumbnail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let video = state
        .catalog
        .get(&id)
        .ok_or_else(|| ApiError::not_found("unknown_video", format!("no video with id {id}")))?;

    let Some(path) = state.thumbnails.thumbnail_path(&video.id) else {
        state.thumbnails.request(&video.id, &video.path);
        return Err(ApiError::not_found("thumbnail_pending", "thumbnail not generated yet"));
    };

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(_) => {
            state.thumbnails.forget(&video.id);
            return Err(ApiError::not_found("thumbnail_missing", "thumbnail not found"));
        }
    };

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/jpeg"),
            (header::CACHE_CONTROL, "public, max-age=86400"),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}
