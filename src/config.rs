use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::media::catalog::{CatalogSettings, DEFAULT_SEARCH_TTL, DEFAULT_STATS_TTL};
use crate::media::metadata::DurationEstimator;
use crate::media::mime::DEFAULT_EXTENSIONS;
use crate::media::scanner::ScanOptions;
use crate::stream::range::{ChunkPolicy, DEFAULT_CHUNK, MAX_CHUNK, MIN_CHUNK};
use crate::stream::responder::{StreamSettings, DEFAULT_CACHE_MAX_AGE};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_VIDEO_FOLDER: &str = "./videos";
const DEFAULT_THUMBNAIL_DIR: &str = "./thumbnails";
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_FALLBACK_BITRATE_KBPS: u64 = 5_000;

#[derive(Deserialize, Default, Debug)]
pub struct FileConfig {
    pub video_folder: Option<PathBuf>,
    pub port: Option<u16>,
    pub localhost: Option<bool>,
    pub extensions: Option<Vec<String>>,
    pub recursive: Option<bool>,
    pub search_ttl_secs: Option<u64>,
    pub stats_ttl_secs: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
    pub min_chunk_bytes: Option<u64>,
    pub default_chunk_bytes: Option<u64>,
    pub max_chunk_bytes: Option<u64>,
    pub cache_max_age_secs: Option<u64>,
    pub fallback_bitrate_kbps: Option<u64>,
    pub access_code: Option<String>,
    pub thumbnail_dir: Option<PathBuf>,
    pub development: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub video_folder: PathBuf,
    pub port: u16,
    pub localhost: bool,
    pub extensions: Vec<String>,
    pub recursive: bool,
    pub search_ttl: Duration,
    pub stats_ttl: Duration,
    pub sweep_interval: Duration,
    pub chunks: ChunkPolicy,
    pub cache_max_age: u64,
    pub fallback_bitrate_kbps: u64,
    pub access_code: Option<String>,
    pub thumbnail_dir: PathBuf,
    pub development: bool,
}

/// Normalize configured extensions to lowercase with a leading dot.
fn normalize_extensions(exts: Vec<String>) -> Vec<String> {
    exts.into_iter()
        .map(|e| e.trim().to_ascii_lowercase())
        .filter(|e| !e.is_empty() && e != ".")
        .map(|e| if e.starts_with('.') { e } else { format!(".{e}") })
        .collect()
}

impl Config {
    /// Merge CLI flags over the config file over built-in defaults.
    pub fn resolve(file: Option<FileConfig>, args: &crate::cli::Args) -> Self {
        let file = file.unwrap_or_default();
        let extensions = file
            .extensions
            .map(normalize_extensions)
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect());
        let chunks = ChunkPolicy::new(
            file.min_chunk_bytes.unwrap_or(MIN_CHUNK),
            file.default_chunk_bytes.unwrap_or(DEFAULT_CHUNK),
            file.max_chunk_bytes.unwrap_or(MAX_CHUNK),
        );
        Config {
            video_folder: args
                .folder
                .clone()
                .or(file.video_folder)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_VIDEO_FOLDER)),
            port: args.port.or(file.port).unwrap_or(DEFAULT_PORT),
            localhost: args.localhost || file.localhost.unwrap_or(false),
            extensions,
            recursive: args.recursive || file.recursive.unwrap_or(false),
            search_ttl: file
                .search_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_SEARCH_TTL),
            stats_ttl: file
                .stats_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_STATS_TTL),
            sweep_interval: Duration::from_secs(
                file.sweep_interval_secs
                    .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS)
                    .max(1),
            ),
            chunks,
            cache_max_age: file.cache_max_age_secs.unwrap_or(DEFAULT_CACHE_MAX_AGE),
            fallback_bitrate_kbps: file
                .fallback_bitrate_kbps
                .filter(|k| *k > 0)
                .unwrap_or(DEFAULT_FALLBACK_BITRATE_KBPS),
            access_code: args
                .access_code
                .clone()
                .or(file.access_code)
                .filter(|c| !c.trim().is_empty()),
            thumbnail_dir: file
                .thumbnail_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_THUMBNAIL_DIR)),
            development: args.dev || file.development.unwrap_or(false),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        let ip = if self.localhost {
            Ipv4Addr::LOCALHOST
        } else {
            Ipv4Addr::UNSPECIFIED
        };
        SocketAddr::from((ip, self.port))
    }

    pub fn catalog_settings(&self) -> CatalogSettings {
        CatalogSettings {
            scan: ScanOptions {
                folder: self.video_folder.clone(),
                extensions: self.extensions.clone(),
                recursive: self.recursive,
                estimator: DurationEstimator::from_kbps(self.fallback_bitrate_kbps),
            },
            search_ttl: self.search_ttl,
            stats_ttl: self.stats_ttl,
        }
    }

    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            chunks: self.chunks,
            cache_max_age: self.cache_max_age,
        }
    }
}

pub fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_owned());
    }
    let cwd_config = PathBuf::from("vidshelf.toml");
    if cwd_config.exists() {
        return Some(cwd_config);
    }
    if let Some(config_dir) = dirs::config_dir() {
        let xdg_config = config_dir.join("vidshelf").join("config.toml");
        if xdg_config.exists() {
            return Some(xdg_config);
        }
    }
    None
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: FileConfig = toml::from_str(&content)?;
    Ok(config)
}
