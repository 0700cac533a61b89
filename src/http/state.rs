use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::http::auth::Authenticator;
use crate::media::catalog::Catalog;
use crate::stream::responder::StreamSettings;
use crate::stream::transfer::TransferTally;
use crate::thumbnails::ThumbnailGenerator;

/// Context object built once in `main` and handed to every route handler via
/// `axum::extract::State`. Cloning is cheap: everything shared sits behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub stream: StreamSettings,
    pub thumbnails: Arc<dyn ThumbnailGenerator>,
    pub auth: Arc<dyn Authenticator>,
    pub transfers: Arc<TransferTally>,
    /// Cancelled on shutdown; every transfer runs on a child token.
    pub shutdown: CancellationToken,
    /// Expose internal error detail in 500 responses.
    pub development: bool,
}
