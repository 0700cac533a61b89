pub mod auth;
pub mod error;
pub mod state;
pub mod stream;
pub mod thumbnails;
pub mod videos;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::http::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let gated = Router::new()
        // Streaming
        .route("/api/stream/{id}", get(stream::stream_video).head(stream::head_video))
        .route("/api/stream/{id}/info", get(stream::video_info))
        .route("/api/stream/{id}/download", get(stream::download_video))
        // Catalog
        .route("/api/videos", get(videos::list_videos))
        .route("/api/videos/categories", get(videos::list_categories))
        .route("/api/videos/refresh", post(videos::refresh))
        .route("/api/videos/search/{query}", get(videos::search))
        .route("/api/videos/stats/overview", get(videos::stats_overview))
        .route("/api/videos/{id}", get(videos::get_video))
        .route("/api/thumbnails/{id}", get(thumbnails::serve_thumbnail))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_access,
        ));

    Router::new()
        .route("/api/health", get(videos::health))
        .merge(gated)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
