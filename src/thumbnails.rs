//! Thumbnail collaborator.
//!
//! The catalog only needs to know whether a thumbnail exists and to ask for
//! one. Generation is fire-and-forget: a missing thumbnail never blocks or
//! fails a catalog request.

use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Semaphore;

pub trait ThumbnailGenerator: Send + Sync {
    /// Path of the finished JPEG for `id`, if one exists.
    fn thumbnail_path(&self, id: &str) -> Option<PathBuf>;

    /// Start generating a thumbnail for `id` from `video` in the background.
    fn request(&self, id: &str, video: &Path);

    /// The file for `id` turned out to be gone; stop reporting it.
    fn forget(&self, _id: &str) {}
}

/// Used when thumbnails are disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoThumbnails;

impl ThumbnailGenerator for NoThumbnails {
    fn thumbnail_path(&self, _id: &str) -> Option<PathBuf> {
        None
    }

    fn request(&self, _id: &str, _video: &Path) {}
}

/// ffmpeg processes allowed to run at once.
pub const MAX_CONCURRENT_JOBS: usize = 2;

/// Background jobs keyed by video id. A second submit for an id that is
/// still queued or running is dropped, and at most `limit` jobs run at once.
#[derive(Debug, Clone)]
pub struct JobQueue {
    permits: Arc<Semaphore>,
    limit: usize,
    queued: Arc<Mutex<HashSet<String>>>,
}

impl JobQueue {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            permits: Arc::new(Semaphore::new(limit)),
            limit,
            queued: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Returns `false` when the job was dropped.
    pub fn submit<F>(&self, id: &str, job: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No runtime, skipping job for {id}");
            return false;
        };
        if !self.queued.lock().insert(id.to_string()) {
            return false;
        }

        let id = id.to_string();
        let permits = Arc::clone(&self.permits);
        let queued = Arc::clone(&self.queued);
        handle.spawn(async move {
            if let Ok(_permit) = permits.acquire_owned().await {
                job.await;
            }
            queued.lock().remove(&id);
        });
        true
    }

    /// Jobs currently holding a slot.
    pub fn running(&self) -> usize {
        self.limit - self.permits.available_permits()
    }

    /// Jobs queued or running.
    pub fn pending(&self) -> usize {
        self.queued.lock().len()
    }
}

/// Seconds into the video to grab the frame from; the opening seconds are
/// often black.
const SEEK_SECS: &str = "10";

/// Writes `<dir>/<id>.jpg` by shelling out to `ffmpeg`.
///
/// Which thumbnails exist is kept in memory, seeded from the directory once
/// at startup, so handlers never stat the disk.
#[derive(Debug)]
pub struct FfmpegThumbnails {
    dir: PathBuf,
    ready: Arc<Mutex<HashSet<String>>>,
    jobs: JobQueue,
}

impl FfmpegThumbnails {
    pub fn new(dir: PathBuf) -> Self {
        let ready = existing_thumbnails(&dir);
        tracing::debug!("{} thumbnails already in {}", ready.len(), dir.display());
        Self {
            dir,
            ready: Arc::new(Mutex::new(ready)),
            jobs: JobQueue::new(MAX_CONCURRENT_JOBS),
        }
    }

    fn output_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.jpg"))
    }
}

/// Ids of the `*.jpg` files already in `dir`. A missing dir is empty.
fn existing_thumbnails(dir: &Path) -> HashSet<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return HashSet::new();
    };
    entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "jpg") && path.is_file())
        .filter_map(|path| Some(path.file_stem()?.to_str()?.to_string()))
        .collect()
}

impl ThumbnailGenerator for FfmpegThumbnails {
    fn thumbnail_path(&self, id: &str) -> Option<PathBuf> {
        self.ready
            .lock()
            .contains(id)
            .then(|| self.output_path(id))
    }

    fn request(&self, id: &str, video: &Path) {
        let job_id = id.to_string();
        let video = video.to_path_buf();
        let output = self.output_path(id);
        let dir = self.dir.clone();
        let ready = Arc::clone(&self.ready);

        self.jobs.submit(id, async move {
            if let Err(e) = tokio::fs::create_dir_all(&dir).await {
                tracing::warn!("Cannot create thumbnail dir {}: {}", dir.display(), e);
                return;
            }
            // Short clips have no frame at SEEK_SECS; retry from the start.
            for seek in [SEEK_SECS, "0"] {
                if let Err(e) = run_ffmpeg(&video, &output, seek).await {
                    tracing::warn!("Thumbnail generation failed for {job_id}: {e}");
                    return;
                }
                if tokio::fs::try_exists(&output).await.unwrap_or(false) {
                    tracing::debug!("Thumbnail ready for {job_id}");
                    ready.lock().insert(job_id);
                    return;
                }
            }
        });
    }

    fn forget(&self, id: &str) {
        self.ready.lock().remove(id);
    }
}

async fn run_ffmpeg(video: &Path, output: &Path, seek: &str) -> std::io::Result<()> {
    let status = tokio::process::Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error", "-y", "-ss", seek, "-i"])
        .arg(video)
        .args(["-frames:v", "1", "-vf", "scale=480:-2", "-q:v", "4"])
        .arg(output)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await?;
    if !status.success() {
        tracing::debug!("ffmpeg exited with {status} for {}", video.display());
    }
    Ok(())
}
