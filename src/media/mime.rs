use std::path::Path;

/// Extensions indexed when the configuration does not name any.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    ".mp4", ".mkv", ".avi", ".mov", ".wmv", ".flv", ".webm", ".m4v",
];

/// Content type used when the extension is unknown. Browsers will still try
/// to sniff the container, which is what the player wants.
pub const FALLBACK_MIME: &str = "video/mp4";

/// Map a file path to the MIME type sent in `Content-Type`.
///
/// Extensions are matched case-insensitively. Unknown extensions fall back to
/// [`FALLBACK_MIME`].
pub fn content_type_for(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return FALLBACK_MIME;
    };

    match ext.to_ascii_lowercase().as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "wmv" => "video/x-ms-wmv",
        "flv" => "video/x-flv",
        "webm" => "video/webm",
        "ogv" => "video/ogg",
        "ts" | "m2ts" | "mts" => "video/mp2t",
        "mpg" | "mpeg" => "video/mpeg",
        "3gp" => "video/3gpp",
        _ => FALLBACK_MIME,
    }
}

/// True when `file_name` ends with one of `extensions`, ignoring ASCII case.
///
/// Extensions are suffixes such as `".mp4"`; entries without a leading dot are
/// accepted and treated as if they had one.
pub fn has_supported_extension(file_name: &str, extensions: &[String]) -> bool {
    let lower = file_name.to_ascii_lowercase();
    extensions.iter().any(|ext| {
        let ext = ext.trim().to_ascii_lowercase();
        if ext.is_empty() {
            return false;
        }
        if ext.starts_with('.') {
            lower.ends_with(&ext)
        } else {
            lower.ends_with(&format!(".{ext}"))
        }
    })
}

/// Category label for a file: its extension, lowercased, including the dot.
/// Files without an extension land in `""`.
pub fn category_for(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Container format name derived from the extension (`"mp4"`, `"mkv"`, ...).
pub fn container_for(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "unknown".to_string())
}
