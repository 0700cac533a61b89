use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::media::library::VideoRecord;

/// Aggregate view over the catalog, served by `GET /api/videos/stats/overview`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    pub total_videos: usize,
    pub total_size_bytes: u64,
    pub total_duration_seconds: f64,
    pub average_size_bytes: u64,
    pub average_duration_seconds: f64,
    /// Distinct container formats, sorted.
    pub formats: Vec<String>,
    /// Quality label → count.
    pub quality_distribution: BTreeMap<String, usize>,
    /// Container format → count.
    pub format_distribution: BTreeMap<String, usize>,
    pub computed_at: DateTime<Utc>,
}

impl CatalogStats {
    pub fn compute(videos: &[Arc<VideoRecord>]) -> Self {
        let total_videos = videos.len();
        let mut total_size_bytes = 0u64;
        let mut total_duration_seconds = 0.0f64;
        let mut formats = BTreeSet::new();
        let mut quality_distribution = BTreeMap::new();
        let mut format_distribution = BTreeMap::new();

        for video in videos {
            total_size_bytes = total_size_bytes.saturating_add(video.size_bytes);
            total_duration_seconds += video.duration_seconds;
            formats.insert(video.container_format.clone());
            *quality_distribution
                .entry(video.quality().label().to_string())
                .or_insert(0) += 1;
            *format_distribution
                .entry(video.container_format.clone())
                .or_insert(0) += 1;
        }

        let (average_size_bytes, average_duration_seconds) = if total_videos == 0 {
            (0, 0.0)
        } else {
            (
                total_size_bytes / total_videos as u64,
                total_duration_seconds / total_videos as f64,
            )
        };

        Self {
            total_videos,
            total_size_bytes,
            total_duration_seconds,
            average_size_bytes,
            average_duration_seconds,
            formats: formats.into_iter().collect(),
            quality_distribution,
            format_distribution,
            computed_at: Utc::now(),
        }
    }
}
