#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use vidshelf::media::catalog::{Catalog, CatalogSettings};
use vidshelf::media::metadata::{DurationEstimator, MetadataProber, ProbeError, ProbedMeta};
use vidshelf::media::mime::DEFAULT_EXTENSIONS;
use vidshelf::media::scanner::ScanOptions;

/// What the fake prober reports for a given filename.
#[derive(Debug, Clone)]
pub enum Probe {
    Video { width: u32, height: u32, duration: f64 },
    Corrupted,
    Unsupported,
}

/// Prober that answers from a table keyed by filename and counts calls.
/// Files not in the table probe as 640x360, 60 seconds.
#[derive(Default)]
pub struct FakeProber {
    table: Mutex<HashMap<String, Probe>>,
    calls: AtomicUsize,
}

impl FakeProber {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, filename: &str, probe: Probe) {
        self.table.lock().insert(filename.to_string(), probe);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MetadataProber for FakeProber {
    fn probe(&self, path: &Path) -> Result<ProbedMeta, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let probe = self.table.lock().get(&name).cloned().unwrap_or(Probe::Video {
            width: 640,
            height: 360,
            duration: 60.0,
        });
        match probe {
            Probe::Video { width, height, duration } => Ok(ProbedMeta {
                duration_seconds: Some(duration),
                width: Some(width),
                height: Some(height),
                frame_rate: Some(25.0),
                video_codec: Some("h264".to_string()),
                audio_codec: Some("aac".to_string()),
                has_video: Some(true),
                has_audio: Some(true),
                bitrate_bps: None,
            }),
            Probe::Corrupted => Err(ProbeError::Corrupted("bad moov atom".to_string())),
            Probe::Unsupported => Err(ProbeError::Unsupported("no demuxer".to_string())),
        }
    }
}

pub fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    path
}

pub fn settings(folder: &Path) -> CatalogSettings {
    CatalogSettings {
        scan: ScanOptions {
            folder: folder.to_path_buf(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            recursive: false,
            estimator: DurationEstimator::default(),
        },
        search_ttl: Duration::from_secs(300),
        stats_ttl: Duration::from_secs(600),
    }
}

/// Catalog over `folder`, already scanned.
pub fn scanned_catalog(folder: &Path, prober: Arc<FakeProber>) -> Arc<Catalog> {
    let catalog = Arc::new(Catalog::new(settings(folder), prober));
    catalog.scan().unwrap();
    catalog
}

pub fn app_state(catalog: Arc<Catalog>) -> vidshelf::http::state::AppState {
    vidshelf::http::state::AppState {
        catalog,
        stream: vidshelf::stream::responder::StreamSettings::default(),
        thumbnails: Arc::new(vidshelf::thumbnails::NoThumbnails),
        auth: Arc::new(vidshelf::http::auth::OpenAccess),
        transfers: Arc::default(),
        shutdown: tokio_util::sync::CancellationToken::new(),
        development: false,
    }
}

pub async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    use http_body_util::BodyExt;
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
