mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{scanned_catalog, settings, write_file, FakeProber, Probe};
use vidshelf::media::catalog::Catalog;
use vidshelf::media::library::{MetadataSource, Quality};
use vidshelf::media::metadata::video_id;
use vidshelf::media::scanner::ScanError;

// ── Scanning ─────────────────────────────────────────────────────────────────

#[test]
fn scan_indexes_supported_files() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "b.mkv", b"bbbb");
    write_file(dir.path(), "a.mp4", b"aaaaaaaa");
    write_file(dir.path(), "notes.txt", b"not a video");
    write_file(dir.path(), "._a.mp4", b"resource fork");

    let prober = FakeProber::new();
    let catalog = scanned_catalog(dir.path(), Arc::clone(&prober));

    assert_eq!(catalog.len(), 2);
    assert_eq!(prober.calls(), 2, "only supported, visible files are probed");

    let id = video_id("a.mp4");
    let record = catalog.get(&id).expect("a.mp4 indexed");
    assert_eq!(record.filename, "a.mp4");
    assert_eq!(record.title, "a");
    assert_eq!(record.size_bytes, 8);
    assert_eq!(record.container_format, "mp4");
    assert_eq!(record.metadata_source, MetadataSource::Probed);
    assert!(record.path.is_absolute());
}

#[test]
fn unknown_id_is_absent() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.mp4", b"a");
    let catalog = scanned_catalog(dir.path(), FakeProber::new());
    assert!(catalog.get("0000000000000000").is_none());
}

#[test]
fn ids_survive_rescans() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.mp4", b"a");
    let catalog = scanned_catalog(dir.path(), FakeProber::new());
    let before = catalog.all_videos()[0].id.clone();
    catalog.refresh().unwrap();
    assert_eq!(catalog.all_videos()[0].id, before);
}

#[test]
fn videos_ordered_by_title_ignoring_case() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["charlie.mp4", "Bravo.mkv", "alpha.webm"] {
        write_file(dir.path(), name, b"x");
    }
    let catalog = scanned_catalog(dir.path(), FakeProber::new());
    let titles: Vec<_> = catalog.all_videos().iter().map(|v| v.title.clone()).collect();
    assert_eq!(titles, ["alpha", "Bravo", "charlie"]);
}

#[test]
fn missing_folder_gives_empty_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Catalog::new(settings(&dir.path().join("nope")), FakeProber::new());
    let summary = catalog.scan().unwrap();
    assert_eq!(summary.videos, 0);
    assert!(catalog.is_empty());
}

#[test]
fn file_as_folder_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(dir.path(), "plain.mp4", b"x");
    let catalog = Catalog::new(settings(&file), FakeProber::new());
    assert!(matches!(catalog.scan(), Err(ScanError::NotADirectory(_))));
}

#[test]
fn same_filename_in_two_subfolders_collides() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "one/clip.mp4", b"1");
    write_file(dir.path(), "two/clip.mp4", b"2");
    let mut s = settings(dir.path());
    s.scan.recursive = true;
    let catalog = Catalog::new(s, FakeProber::new());
    match catalog.scan() {
        Err(ScanError::IdCollision { id, .. }) => assert_eq!(id, video_id("clip.mp4")),
        other => panic!("expected id collision, got {other:?}"),
    }
}

#[test]
fn subfolders_ignored_unless_recursive() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "top.mp4", b"1");
    write_file(dir.path(), "nested/deep.mp4", b"2");
    let catalog = scanned_catalog(dir.path(), FakeProber::new());
    assert_eq!(catalog.len(), 1);

    let mut s = settings(dir.path());
    s.scan.recursive = true;
    let catalog = Catalog::new(s, FakeProber::new());
    catalog.scan().unwrap();
    assert_eq!(catalog.len(), 2);
}

#[test]
fn corrupted_files_are_excluded() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "good.mp4", b"ok");
    write_file(dir.path(), "broken.mp4", b"??");
    let prober = FakeProber::new();
    prober.set("broken.mp4", Probe::Corrupted);

    let catalog = Catalog::new(settings(dir.path()), prober);
    let summary = catalog.scan().unwrap();
    assert_eq!(summary.videos, 1);
    assert_eq!(summary.excluded, 1);
    assert!(catalog.get(&video_id("broken.mp4")).is_none());
}

#[test]
fn probe_failure_falls_back_to_estimate() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "odd.avi", &vec![0u8; 625_000]);
    let prober = FakeProber::new();
    prober.set("odd.avi", Probe::Unsupported);

    let catalog = Catalog::new(settings(dir.path()), prober);
    let summary = catalog.scan().unwrap();
    assert_eq!(summary.estimated, 1);

    let record = catalog.get(&video_id("odd.avi")).unwrap();
    assert_eq!(record.metadata_source, MetadataSource::Estimated);
    assert!(record.duration_seconds.is_finite() && record.duration_seconds >= 0.0);
    assert!((record.duration_seconds - 1.0).abs() < 1e-9);
    assert_eq!(record.width, None);
    assert_eq!(record.quality(), Quality::Sd);
    assert!(record.has_video);
    assert!(!record.has_audio);
}

// ── Search ───────────────────────────────────────────────────────────────────

fn two_resolution_catalog(dir: &std::path::Path) -> Arc<Catalog> {
    write_file(dir, "beach.mp4", b"720");
    write_file(dir, "city.mp4", b"1080");
    let prober = FakeProber::new();
    prober.set("beach.mp4", Probe::Video { width: 1280, height: 720, duration: 30.0 });
    prober.set("city.mp4", Probe::Video { width: 1920, height: 1080, duration: 90.0 });
    scanned_catalog(dir, prober)
}

#[test]
fn search_matches_quality_label_and_is_cached() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = two_resolution_catalog(dir.path());

    let first = catalog.search("720");
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].filename, "beach.mp4");
    assert_eq!(catalog.search_passes(), 1);

    let second = catalog.search("720");
    assert!(Arc::ptr_eq(&first, &second), "repeat search must return the cached list");
    assert_eq!(catalog.search_passes(), 1);
}

#[test]
fn search_key_is_trimmed_and_case_folded() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = two_resolution_catalog(dir.path());
    let a = catalog.search("CITY");
    let b = catalog.search("  city ");
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.len(), 1);
    assert_eq!(catalog.search_passes(), 1);
}

#[test]
fn search_matches_title_and_container() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = two_resolution_catalog(dir.path());
    assert_eq!(catalog.search("bea").len(), 1);
    assert_eq!(catalog.search("mp4").len(), 2);
    assert_eq!(catalog.search("hd").len(), 1);
    assert!(catalog.search("nothing-like-this").is_empty());
}

#[test]
fn empty_search_returns_everything_uncached() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = two_resolution_catalog(dir.path());
    assert_eq!(catalog.search("   ").len(), 2);
    assert_eq!(catalog.search_passes(), 0);
}

#[tokio::test(start_paused = true)]
async fn search_recomputed_after_ttl() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = two_resolution_catalog(dir.path());
    let first = catalog.search("720");
    tokio::time::advance(Duration::from_secs(301)).await;
    let second = catalog.search("720");
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(catalog.search_passes(), 2);
}

// ── Stats ────────────────────────────────────────────────────────────────────

#[test]
fn stats_aggregate_the_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = two_resolution_catalog(dir.path());
    let stats = catalog.stats();
    assert_eq!(stats.total_videos, 2);
    assert_eq!(stats.total_size_bytes, 7);
    assert!((stats.total_duration_seconds - 120.0).abs() < 1e-9);
    assert!((stats.average_duration_seconds - 60.0).abs() < 1e-9);
    assert_eq!(stats.formats, ["mp4"]);
    assert_eq!(stats.quality_distribution.get("HD"), Some(&1));
    assert_eq!(stats.quality_distribution.get("720p"), Some(&1));
    assert_eq!(stats.format_distribution.get("mp4"), Some(&2));
}

#[test]
fn stats_are_cached() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = two_resolution_catalog(dir.path());
    let a = catalog.stats();
    let b = catalog.stats();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(catalog.stats_passes(), 1);
}

#[tokio::test(start_paused = true)]
async fn stats_recomputed_after_ttl() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = two_resolution_catalog(dir.path());
    let a = catalog.stats();
    tokio::time::advance(Duration::from_secs(599)).await;
    assert!(Arc::ptr_eq(&a, &catalog.stats()));
    tokio::time::advance(Duration::from_secs(1)).await;
    let b = catalog.stats();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(catalog.stats_passes(), 2);
}

#[test]
fn empty_catalog_stats_are_zero() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = scanned_catalog(dir.path(), FakeProber::new());
    let stats = catalog.stats();
    assert_eq!(stats.total_videos, 0);
    assert_eq!(stats.average_size_bytes, 0);
    assert_eq!(stats.average_duration_seconds, 0.0);
}

// ── Categories, refresh, sweeping ────────────────────────────────────────────

#[test]
fn categories_group_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.mp4", b"1");
    write_file(dir.path(), "b.MP4", b"2");
    write_file(dir.path(), "c.webm", b"3");
    let catalog = scanned_catalog(dir.path(), FakeProber::new());
    let groups = catalog.by_category();
    assert_eq!(groups.keys().cloned().collect::<Vec<_>>(), [".mp4", ".webm"]);
    assert_eq!(groups[".mp4"].len(), 2);
}

#[test]
fn refresh_picks_up_new_files_and_drops_caches() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = two_resolution_catalog(dir.path());
    let stats_before = catalog.stats();
    assert_eq!(catalog.search("mp4").len(), 2);

    write_file(dir.path(), "dunes.mp4", b"new");
    let summary = catalog.refresh().unwrap();
    assert_eq!(summary.videos, 3);

    assert_eq!(catalog.search("mp4").len(), 3);
    assert_eq!(catalog.search_passes(), 2);
    let stats_after = catalog.stats();
    assert!(!Arc::ptr_eq(&stats_before, &stats_after));
    assert_eq!(stats_after.total_videos, 3);
}

#[test]
fn failed_refresh_keeps_previous_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let folder = dir.path().join("videos");
    write_file(&folder, "a.mp4", b"1");
    let catalog = scanned_catalog(&folder, FakeProber::new());
    assert_eq!(catalog.len(), 1);

    std::fs::remove_dir_all(&folder).unwrap();
    std::fs::write(&folder, b"now a file").unwrap();

    assert!(catalog.refresh().is_err());
    assert_eq!(catalog.len(), 1);
}

#[test]
fn readers_see_whole_snapshots_during_refresh() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..20 {
        write_file(dir.path(), &format!("v{i:02}.mp4"), b"x");
    }
    let catalog = scanned_catalog(dir.path(), FakeProber::new());
    for i in 20..40 {
        write_file(dir.path(), &format!("v{i:02}.mp4"), b"x");
    }

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..500 {
                    let n = catalog.all_videos().len();
                    assert!(n == 20 || n == 40, "torn snapshot with {n} videos");
                }
            });
        }
        s.spawn(|| catalog.refresh().unwrap());
    });
    assert_eq!(catalog.len(), 40);
}

#[tokio::test(start_paused = true)]
async fn sweep_evicts_expired_entries() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = two_resolution_catalog(dir.path());
    catalog.search("720");
    catalog.search("city");
    catalog.stats();
    assert_eq!(catalog.sweep_expired(), 0);

    tokio::time::advance(Duration::from_secs(301)).await;
    assert_eq!(catalog.sweep_expired(), 2);
    tokio::time::advance(Duration::from_secs(300)).await;
    assert_eq!(catalog.sweep_expired(), 1);
}

#[tokio::test(start_paused = true)]
async fn background_sweeper_evicts_and_stops_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = two_resolution_catalog(dir.path());
    let shutdown = tokio_util::sync::CancellationToken::new();
    let sweeper = tokio::spawn(vidshelf::media::catalog::run_sweeper(
        Arc::clone(&catalog),
        Duration::from_secs(1),
        shutdown.clone(),
    ));
    tokio::task::yield_now().await;

    catalog.search("720");
    tokio::time::advance(Duration::from_secs(301)).await;
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    assert_eq!(catalog.sweep_expired(), 0, "sweeper already evicted the search entry");

    shutdown.cancel();
    sweeper.await.unwrap();
}
