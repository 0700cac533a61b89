use std::path::Path;
use vidshelf::media::mime::{
    category_for, container_for, content_type_for, has_supported_extension, DEFAULT_EXTENSIONS,
    FALLBACK_MIME,
};

fn defaults() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

#[test]
fn test_mp4_content_type() {
    assert_eq!(content_type_for(Path::new("movie.mp4")), "video/mp4");
}

#[test]
fn test_mkv_mime_is_matroska() {
    assert_eq!(content_type_for(Path::new("video.mkv")), "video/x-matroska");
}

#[test]
fn test_webm_and_mov() {
    assert_eq!(content_type_for(Path::new("clip.webm")), "video/webm");
    assert_eq!(content_type_for(Path::new("clip.mov")), "video/quicktime");
}

#[test]
fn test_unknown_extension_falls_back() {
    assert_eq!(content_type_for(Path::new("readme.txt")), FALLBACK_MIME);
}

#[test]
fn test_no_extension_falls_back() {
    assert_eq!(content_type_for(Path::new("Makefile")), FALLBACK_MIME);
}

#[test]
fn test_case_insensitive() {
    // Extensions should be lowercased before matching
    assert_eq!(content_type_for(Path::new("MOVIE.MKV")), "video/x-matroska");
    assert!(has_supported_extension("MOVIE.MP4", &defaults()));
}

#[test]
fn test_unsupported_extension_rejected() {
    assert!(!has_supported_extension("notes.txt", &defaults()));
    assert!(!has_supported_extension("mp4", &defaults()));
}

#[test]
fn test_extension_without_dot_accepted() {
    assert!(has_supported_extension("a.ts", &["ts".to_string()]));
}

#[test]
fn test_category_is_lowercased_extension() {
    assert_eq!(category_for("Holiday.MP4"), ".mp4");
    assert_eq!(category_for("noext"), "");
}

#[test]
fn test_container_name() {
    assert_eq!(container_for(Path::new("/x/a.MKV")), "mkv");
    assert_eq!(container_for(Path::new("/x/a")), "unknown");
}
