//! In-memory video catalog.
//!
//! The catalog holds one immutable [`Snapshot`] behind an `Arc`. Readers clone
//! the `Arc` and work on that snapshot; [`Catalog::refresh`] builds a complete
//! new snapshot off to the side and swaps the handle, so a reader sees either
//! the old catalog or the new one, never a mix. The search and stats caches
//! live inside the snapshot and are dropped with it.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::media::cache::ExpiringCache;
use crate::media::library::VideoRecord;
use crate::media::metadata::MetadataProber;
use crate::media::scanner::{self, ScanError, ScanOptions};
use crate::media::stats::CatalogStats;

/// Shared, immutable list of records. Cloning is cheap and callers can hold
/// on to it across a refresh.
pub type VideoList = Arc<[Arc<VideoRecord>]>;

pub const DEFAULT_SEARCH_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_STATS_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub scan: ScanOptions,
    pub search_ttl: Duration,
    pub stats_ttl: Duration,
}

struct Snapshot {
    videos: HashMap<String, Arc<VideoRecord>>,
    ordered: VideoList,
    search: ExpiringCache<String, VideoList>,
    stats: ExpiringCache<(), Arc<CatalogStats>>,
}

impl Snapshot {
    fn new(records: Vec<VideoRecord>, settings: &CatalogSettings) -> Self {
        let ordered: Vec<Arc<VideoRecord>> = records.into_iter().map(Arc::new).collect();
        let videos = ordered
            .iter()
            .map(|record| (record.id.clone(), Arc::clone(record)))
            .collect();
        Self {
            videos,
            ordered: ordered.into(),
            search: ExpiringCache::new(settings.search_ttl),
            stats: ExpiringCache::new(settings.stats_ttl),
        }
    }
}

/// Summary of a completed scan or refresh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanSummary {
    pub videos: usize,
    pub estimated: usize,
    pub excluded: usize,
    pub elapsed_secs: f64,
}

pub struct Catalog {
    settings: CatalogSettings,
    prober: Arc<dyn MetadataProber>,
    current: RwLock<Arc<Snapshot>>,
    /// Serialises scans; a second refresh waits for the first to finish.
    scan_lock: Mutex<()>,
    search_passes: AtomicU64,
    stats_passes: AtomicU64,
}

impl Catalog {
    /// An empty catalog. Call [`scan`](Self::scan) to populate it.
    pub fn new(settings: CatalogSettings, prober: Arc<dyn MetadataProber>) -> Self {
        let empty = Arc::new(Snapshot::new(Vec::new(), &settings));
        Self {
            settings,
            prober,
            current: RwLock::new(empty),
            scan_lock: Mutex::new(()),
            search_passes: AtomicU64::new(0),
            stats_passes: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &CatalogSettings {
        &self.settings
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        self.current.read().clone()
    }

    /// Scan the configured folder and install the result.
    ///
    /// Blocking: probes every file. Call from `spawn_blocking` inside async
    /// code. On error the previous catalog stays in place.
    pub fn scan(&self) -> Result<ScanSummary, ScanError> {
        let _guard = self.scan_lock.lock();
        let report = scanner::scan(&self.settings.scan, self.prober.as_ref())?;
        let summary = ScanSummary {
            videos: report.records.len(),
            estimated: report.estimated,
            excluded: report.excluded,
            elapsed_secs: report.elapsed_secs,
        };
        let next = Arc::new(Snapshot::new(report.records, &self.settings));
        *self.current.write() = next;
        Ok(summary)
    }

    /// Discard the catalog and both caches and rebuild from the filesystem.
    pub fn refresh(&self) -> Result<ScanSummary, ScanError> {
        tracing::info!("Refreshing catalog from {}", self.settings.scan.folder.display());
        self.scan()
    }

    /// Every video, ordered by title.
    pub fn all_videos(&self) -> VideoList {
        Arc::clone(&self.snapshot().ordered)
    }

    pub fn len(&self) -> usize {
        self.snapshot().videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &str) -> Option<Arc<VideoRecord>> {
        self.snapshot().videos.get(id).cloned()
    }

    /// Case-insensitive search over title, filename, container and quality
    /// label. An empty query returns every video. Results are cached per
    /// lowercased query for the search TTL.
    pub fn search(&self, query: &str) -> VideoList {
        let needle = query.trim().to_lowercase();
        let snapshot = self.snapshot();
        if needle.is_empty() {
            return Arc::clone(&snapshot.ordered);
        }
        snapshot.search.get_or_insert_with(needle.clone(), || {
            self.search_passes.fetch_add(1, Ordering::Relaxed);
            snapshot
                .ordered
                .iter()
                .filter(|record| record.matches(&needle))
                .cloned()
                .collect()
        })
    }

    /// Videos grouped by lowercased extension (with the dot).
    pub fn by_category(&self) -> BTreeMap<String, Vec<Arc<VideoRecord>>> {
        let mut groups: BTreeMap<String, Vec<Arc<VideoRecord>>> = BTreeMap::new();
        for record in self.snapshot().ordered.iter() {
            groups
                .entry(record.category())
                .or_default()
                .push(Arc::clone(record));
        }
        groups
    }

    /// Aggregate stats, recomputed from the video list once the stats TTL
    /// has passed.
    pub fn stats(&self) -> Arc<CatalogStats> {
        let snapshot = self.snapshot();
        snapshot.stats.get_or_insert_with((), || {
            self.stats_passes.fetch_add(1, Ordering::Relaxed);
            Arc::new(CatalogStats::compute(&snapshot.ordered))
        })
    }

    /// Evict expired search and stats entries. Returns the number removed.
    pub fn sweep_expired(&self) -> usize {
        let snapshot = self.snapshot();
        snapshot.search.sweep() + snapshot.stats.sweep()
    }

    /// Times a search actually filtered the video list (cache misses).
    pub fn search_passes(&self) -> u64 {
        self.search_passes.load(Ordering::Relaxed)
    }

    /// Times stats were recomputed.
    pub fn stats_passes(&self) -> u64 {
        self.stats_passes.load(Ordering::Relaxed)
    }
}

/// Periodically evict expired cache entries until `shutdown` is cancelled.
pub async fn run_sweeper(catalog: Arc<Catalog>, every: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // First tick completes immediately.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let removed = catalog.sweep_expired();
                if removed > 0 {
                    tracing::debug!("Swept {} expired cache entries", removed);
                }
            }
        }
    }
}
