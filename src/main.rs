use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use vidshelf::http::auth::{Authenticator, OpenAccess, SharedAccessCode};
use vidshelf::media::catalog::{self, Catalog};
use vidshelf::media::metadata::ContainerProber;
use vidshelf::thumbnails::FfmpegThumbnails;
use vidshelf::{cli, config, http};

/// Set to true once the first Ctrl+C is received. Second Ctrl+C force-exits.
static SHUTTING_DOWN: AtomicBool = AtomicBool::new(false);

/// Resolve on the first Ctrl+C. A second Ctrl+C while connections drain exits
/// the process immediately.
async fn wait_for_shutdown(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        return;
    }
    SHUTTING_DOWN.store(true, Ordering::SeqCst);
    tracing::info!("Shutting down, waiting for open streams to close...");
    shutdown.cancel();

    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() && SHUTTING_DOWN.load(Ordering::SeqCst) {
            eprintln!("\nvidshelf: forced exit");
            std::process::exit(1);
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = cli::Args::parse();

    let file_config = config::find_config_file(args.config.as_deref()).and_then(|path| {
        match config::load_config(&path) {
            Ok(cfg) => {
                tracing::debug!("Loaded config from {}", path.display());
                Some(cfg)
            }
            Err(e) => {
                tracing::warn!("Failed to parse config file: {}", e);
                None
            }
        }
    });

    let config = config::Config::resolve(file_config, &args);

    tracing::info!(
        "vidshelf {} on port {}, serving {}",
        env!("CARGO_PKG_VERSION"),
        config.port,
        config.video_folder.display()
    );

    let catalog = Arc::new(Catalog::new(
        config.catalog_settings(),
        Arc::new(ContainerProber),
    ));

    // Initial scan runs before the listener binds; a broken folder is fatal,
    // an empty one is not.
    let scanner = Arc::clone(&catalog);
    let summary = tokio::task::spawn_blocking(move || scanner.scan())
        .await
        .context("initial scan task failed")?
        .context("initial scan failed")?;
    if summary.videos == 0 {
        tracing::warn!(
            "No videos found in {} -- add files and POST /api/videos/refresh",
            config.video_folder.display()
        );
    }

    let auth: Arc<dyn Authenticator> = match &config.access_code {
        Some(code) => {
            tracing::info!("Access code required for /api routes");
            Arc::new(SharedAccessCode::new(code.clone()))
        }
        None => Arc::new(OpenAccess),
    };

    let shutdown = CancellationToken::new();
    let state = http::state::AppState {
        catalog: Arc::clone(&catalog),
        stream: config.stream_settings(),
        thumbnails: Arc::new(FfmpegThumbnails::new(config.thumbnail_dir.clone())),
        auth,
        transfers: Arc::default(),
        shutdown: shutdown.clone(),
        development: config.development,
    };
    let app = http::build_router(state);

    let sweeper = tokio::spawn(catalog::run_sweeper(
        Arc::clone(&catalog),
        config.sweep_interval,
        shutdown.clone(),
    ));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Serving {} videos on http://{}", catalog.len(), addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown(shutdown.clone()))
        .await
        .context("HTTP server error")?;

    shutdown.cancel();
    let _ = sweeper.await;
    tracing::info!("Goodbye.");
    Ok(())
}
