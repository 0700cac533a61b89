use std::collections::HashMap;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use crate::media::library::{title_from_filename, MetadataSource, VideoRecord};
use crate::media::metadata::{video_id, DurationEstimator, MetadataProber, ProbedMeta};
use crate::media::mime::{container_for, has_supported_extension};

/// Inputs for one scan pass.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub folder: PathBuf,
    /// Suffixes such as `".mp4"`, matched case-insensitively.
    pub extensions: Vec<String>,
    /// Descend into subfolders. Off by default: the library is a flat folder.
    pub recursive: bool,
    pub estimator: DurationEstimator,
}

/// Result of a scan pass.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub records: Vec<VideoRecord>,
    /// Records whose duration came from the size-based estimate.
    pub estimated: usize,
    /// Files left out: corrupted containers, unreadable entries.
    pub excluded: usize,
    pub elapsed_secs: f64,
}

/// Errors that leave the catalog in no usable state. Per-file problems are
/// never reported here.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("video folder is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("cannot read video folder {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("video id {id} is shared by {} and {}", first.display(), second.display())]
    IdCollision {
        id: String,
        first: PathBuf,
        second: PathBuf,
    },
}

/// List `options.folder`, probe every file with a supported extension and
/// return the resulting records sorted by title.
///
/// A missing folder yields an empty report with a warning. A folder that
/// exists but cannot be listed is fatal, as is an id collision.
pub fn scan(options: &ScanOptions, prober: &dyn MetadataProber) -> Result<ScanReport, ScanError> {
    let start = Instant::now();
    let root = &options.folder;

    match std::fs::metadata(root) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("Video folder does not exist, catalog is empty: {}", root.display());
            return Ok(ScanReport::default());
        }
        Err(e) => {
            return Err(ScanError::Unreadable {
                path: root.clone(),
                source: e,
            })
        }
        Ok(meta) if !meta.is_dir() => return Err(ScanError::NotADirectory(root.clone())),
        Ok(_) => {}
    }

    let max_depth = if options.recursive { usize::MAX } else { 1 };
    let mut report = ScanReport::default();
    let mut seen: HashMap<String, PathBuf> = HashMap::new();

    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            // The root listing itself failed: nothing useful can be served.
            Err(e) if e.depth() == 0 || e.path() == Some(root.as_path()) => {
                return Err(ScanError::Unreadable {
                    path: root.clone(),
                    source: e.into(),
                });
            }
            Err(e) => {
                tracing::warn!("Cannot access entry: {}", e);
                report.excluded += 1;
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let Some(filename) = entry.file_name().to_str() else {
            tracing::warn!("Skipping non UTF-8 filename: {}", entry.path().display());
            continue;
        };
        // Dotfiles include macOS "._name.mp4" resource forks, which are never playable.
        if filename.starts_with('.') || !has_supported_extension(filename, &options.extensions) {
            continue;
        }

        let id = video_id(filename);
        if let Some(first) = seen.get(&id) {
            return Err(ScanError::IdCollision {
                id,
                first: first.clone(),
                second: entry.path().to_path_buf(),
            });
        }
        seen.insert(id.clone(), entry.path().to_path_buf());

        match process_file(entry.path(), id, filename, options, prober) {
            Some(record) => {
                if record.metadata_source == MetadataSource::Estimated {
                    report.estimated += 1;
                }
                tracing::debug!("indexed {} -> {}", record.id, record.path.display());
                report.records.push(record);
            }
            None => report.excluded += 1,
        }
    }

    report.records.sort_by(|a, b| {
        a.title
            .to_lowercase()
            .cmp(&b.title.to_lowercase())
            .then_with(|| a.filename.cmp(&b.filename))
    });
    report.elapsed_secs = start.elapsed().as_secs_f64();

    tracing::info!(
        "Scanned {} videos ({} estimated, {} excluded) in {:.1}s",
        report.records.len(),
        report.estimated,
        report.excluded,
        report.elapsed_secs
    );

    Ok(report)
}

fn process_file(
    path: &Path,
    id: String,
    filename: &str,
    options: &ScanOptions,
    prober: &dyn MetadataProber,
) -> Option<VideoRecord> {
    let canonical = match std::fs::canonicalize(path) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!("Cannot canonicalize {}: {}", path.display(), e);
            return None;
        }
    };

    let fs_meta = match std::fs::metadata(&canonical) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!("Cannot stat {}: {}", canonical.display(), e);
            return None;
        }
    };

    let probed = match prober.probe(&canonical) {
        Ok(meta) => Some(meta),
        Err(e) if e.is_corrupted() => {
            tracing::warn!("Skipping {}: {}", canonical.display(), e);
            return None;
        }
        Err(e) => {
            tracing::warn!(
                "Metadata extraction failed for {}, using estimate: {}",
                canonical.display(),
                e
            );
            None
        }
    };

    Some(build_record(id, filename, canonical, &fs_meta, probed, options.estimator))
}

/// Merge probe output, filesystem facts and the fallback estimate into a record.
pub fn build_record(
    id: String,
    filename: &str,
    path: PathBuf,
    fs_meta: &Metadata,
    probed: Option<ProbedMeta>,
    estimator: DurationEstimator,
) -> VideoRecord {
    let size_bytes = fs_meta.len();
    let modified_at: DateTime<Utc> = fs_meta
        .modified()
        .map(DateTime::from)
        .unwrap_or_else(|_| Utc::now());
    let created_at: DateTime<Utc> = fs_meta.created().map(DateTime::from).unwrap_or(modified_at);

    let probed_ok = probed.is_some();
    let meta = probed.unwrap_or_default();

    let (duration_seconds, metadata_source) = match meta.duration_seconds {
        Some(d) if probed_ok && d.is_finite() && d > 0.0 => (d, MetadataSource::Probed),
        _ => (estimator.estimate(size_bytes), MetadataSource::Estimated),
    };

    let bitrate_bps = meta.bitrate_bps.or_else(|| {
        (duration_seconds > 0.0).then(|| ((size_bytes as f64 * 8.0) / duration_seconds) as u64)
    });

    VideoRecord {
        id,
        filename: filename.to_string(),
        container_format: container_for(&path),
        path,
        size_bytes,
        created_at,
        modified_at,
        duration_seconds,
        width: meta.width,
        height: meta.height,
        frame_rate: meta.frame_rate,
        video_codec: meta.video_codec,
        audio_codec: meta.audio_codec,
        has_video: meta.has_video.unwrap_or(true),
        has_audio: meta.has_audio.unwrap_or(false),
        bitrate_bps,
        title: title_from_filename(filename),
        metadata_source,
    }
}
