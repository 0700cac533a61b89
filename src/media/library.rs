use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Where a record's technical fields came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataSource {
    /// Read from the container headers.
    Probed,
    /// Probing failed; duration and bitrate were extrapolated from file size.
    Estimated,
}

/// Resolution bucket used for search and the stats histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Quality {
    #[serde(rename = "HD")]
    Hd,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "SD")]
    Sd,
}

impl Quality {
    /// Bucket a frame size. Both dimensions must reach a threshold; unknown
    /// dimensions are `SD`.
    pub fn from_dimensions(width: Option<u32>, height: Option<u32>) -> Self {
        let (w, h) = (width.unwrap_or(0), height.unwrap_or(0));
        if w >= 1920 && h >= 1080 {
            Quality::Hd
        } else if w >= 1280 && h >= 720 {
            Quality::P720
        } else if w >= 854 && h >= 480 {
            Quality::P480
        } else {
            Quality::Sd
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Quality::Hd => "HD",
            Quality::P720 => "720p",
            Quality::P480 => "480p",
            Quality::Sd => "SD",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One discovered video file.
///
/// Records are immutable once built; a refresh replaces the whole catalog
/// rather than editing records in place.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    /// Short stable id derived from the filename (see `metadata::video_id`).
    pub id: String,
    pub filename: String,
    /// Canonical absolute path. Never sent to clients.
    #[serde(skip)]
    pub path: PathBuf,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// Seconds; `0.0` when neither probe nor estimate produced a value.
    pub duration_seconds: f64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f64>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub has_video: bool,
    pub has_audio: bool,
    pub bitrate_bps: Option<u64>,
    /// Lowercased extension without the dot, e.g. `"mkv"`.
    pub container_format: String,
    /// Filename without its extension.
    pub title: String,
    pub metadata_source: MetadataSource,
}

impl VideoRecord {
    pub fn quality(&self) -> Quality {
        Quality::from_dimensions(self.width, self.height)
    }

    /// Grouping key for `Catalog::by_category`: the lowercased extension with
    /// its dot.
    pub fn category(&self) -> String {
        crate::media::mime::category_for(&self.filename)
    }

    /// `"1920x1080"` when both dimensions are known.
    pub fn resolution(&self) -> Option<String> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some(format!("{w}x{h}")),
            _ => None,
        }
    }

    /// Case-insensitive substring match over title, filename, container and
    /// quality label. `needle` must already be lowercased.
    pub fn matches(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(needle)
            || self.filename.to_lowercase().contains(needle)
            || self.container_format.to_lowercase().contains(needle)
            || self.quality().label().to_lowercase().contains(needle)
    }
}

/// Filename without its final extension.
pub fn title_from_filename(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => filename.to_string(),
    }
}
