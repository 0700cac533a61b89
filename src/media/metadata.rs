use std::io::BufReader;
use std::path::Path;

use uuid::Uuid;

use crate::media::mime::container_for;

/// Technical fields read from a container. Every field is optional; a prober
/// fills in what the container exposes and leaves the rest `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbedMeta {
    pub duration_seconds: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f64>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    /// `None` when the demuxer cannot see video tracks at all.
    pub has_video: Option<bool>,
    pub has_audio: Option<bool>,
    pub bitrate_bps: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("cannot read file: {0}")]
    Unreadable(#[from] std::io::Error),
    #[error("unsupported container: {0}")]
    Unsupported(String),
    #[error("corrupted container: {0}")]
    Corrupted(String),
}

impl ProbeError {
    /// Corrupted files are left out of the catalog; everything else gets an
    /// estimated record.
    pub fn is_corrupted(&self) -> bool {
        matches!(self, ProbeError::Corrupted(_))
    }
}

/// Reads technical metadata for a single file. Called once per file during a
/// scan, on a blocking thread.
pub trait MetadataProber: Send + Sync {
    fn probe(&self, path: &Path) -> Result<ProbedMeta, ProbeError>;
}

/// Fallback used when probing fails: extrapolates duration from file size at
/// an assumed constant bitrate.
#[derive(Debug, Clone, Copy)]
pub struct DurationEstimator {
    pub bitrate_bps: u64,
}

impl Default for DurationEstimator {
    fn default() -> Self {
        Self { bitrate_bps: 5_000_000 }
    }
}

impl DurationEstimator {
    pub fn from_kbps(kbps: u64) -> Self {
        Self { bitrate_bps: kbps.saturating_mul(1000) }
    }

    /// Estimated duration in seconds. Always finite and non-negative.
    pub fn estimate(&self, size_bytes: u64) -> f64 {
        if self.bitrate_bps == 0 {
            return 0.0;
        }
        let secs = (size_bytes as f64 * 8.0) / self.bitrate_bps as f64;
        if secs.is_finite() && secs >= 0.0 {
            secs
        } else {
            0.0
        }
    }
}

/// Namespace for video ids. Fixed so ids survive restarts and moves of the
/// library folder.
pub static VIDEO_ID_NAMESPACE: std::sync::LazyLock<Uuid> =
    std::sync::LazyLock::new(|| Uuid::new_v5(&Uuid::NAMESPACE_URL, b"vidshelf:video"));

/// Length of the hex id handed to clients.
pub const VIDEO_ID_LEN: usize = 16;

/// Derive the catalog id for a file from its name alone.
///
/// The directory is deliberately not part of the input, so the same file keeps
/// its id wherever the library lives. Two files with the same name therefore
/// collide, which the scanner reports as a fatal error.
pub fn video_id(filename: &str) -> String {
    let uuid = Uuid::new_v5(&VIDEO_ID_NAMESPACE, filename.as_bytes());
    let mut hex = uuid.simple().to_string();
    hex.truncate(VIDEO_ID_LEN);
    hex
}

/// Default prober: MP4-family headers through the `mp4` crate, everything else
/// through symphonia's demuxers.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContainerProber;

impl MetadataProber for ContainerProber {
    fn probe(&self, path: &Path) -> Result<ProbedMeta, ProbeError> {
        let len = std::fs::metadata(path)?.len();
        if len == 0 {
            return Err(ProbeError::Corrupted("file is empty".to_string()));
        }

        match container_for(path).as_str() {
            "mp4" | "m4v" => probe_mp4(path, len, true),
            // QuickTime files often carry atoms the mp4 crate rejects; treat a
            // parse failure as "unsupported" rather than corrupted.
            "mov" => probe_mp4(path, len, false),
            _ => probe_with_symphonia(path),
        }
    }
}

fn probe_mp4(path: &Path, len: u64, strict: bool) -> Result<ProbedMeta, ProbeError> {
    use mp4::TrackType;

    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mp4 = mp4::Mp4Reader::read_header(reader, len).map_err(|e| match e {
        mp4::Error::IoError(io) => ProbeError::Unreadable(io),
        other if strict => ProbeError::Corrupted(other.to_string()),
        other => ProbeError::Unsupported(other.to_string()),
    })?;

    let mut meta = ProbedMeta {
        has_video: Some(false),
        has_audio: Some(false),
        ..ProbedMeta::default()
    };

    let duration = mp4.duration().as_secs_f64();
    if duration > 0.0 {
        meta.duration_seconds = Some(duration);
    }

    for track in mp4.tracks().values() {
        match track.track_type() {
            Ok(TrackType::Video) => {
                meta.has_video = Some(true);
                if meta.width.is_some() {
                    continue;
                }
                let (w, h) = (u32::from(track.width()), u32::from(track.height()));
                if w > 0 && h > 0 {
                    meta.width = Some(w);
                    meta.height = Some(h);
                }
                let fps = track.frame_rate();
                if fps.is_finite() && fps > 0.0 {
                    meta.frame_rate = Some(fps);
                }
                meta.video_codec = track.media_type().ok().and_then(codec_name);
                let bps = track.bitrate();
                if bps > 0 {
                    meta.bitrate_bps = Some(u64::from(bps));
                }
            }
            Ok(TrackType::Audio) => {
                meta.has_audio = Some(true);
                if meta.audio_codec.is_none() {
                    meta.audio_codec = track.media_type().ok().and_then(codec_name);
                }
            }
            _ => {}
        }
    }

    Ok(meta)
}

#[allow(unreachable_patterns)]
fn codec_name(media_type: mp4::MediaType) -> Option<String> {
    let name = match media_type {
        mp4::MediaType::H264 => "h264",
        mp4::MediaType::H265 => "hevc",
        mp4::MediaType::VP9 => "vp9",
        mp4::MediaType::AAC => "aac",
        mp4::MediaType::TTXT => "ttxt",
        _ => return None,
    };
    Some(name.to_string())
}

/// Non-MP4 containers (MKV, WebM, AVI, ...). Symphonia only decodes audio, so
/// the result carries duration and audio codec but never frame dimensions.
fn probe_with_symphonia(path: &Path) -> Result<ProbedMeta, ProbeError> {
    use symphonia::core::codecs::CODEC_TYPE_NULL;
    use symphonia::core::errors::Error as SymphoniaError;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::probe::Hint;

    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &Default::default(), &Default::default())
        .map_err(|e| match e {
            SymphoniaError::IoError(io) => ProbeError::Unreadable(io),
            SymphoniaError::DecodeError(msg) => ProbeError::Corrupted(msg.to_string()),
            SymphoniaError::Unsupported(msg) => ProbeError::Unsupported(msg.to_string()),
            other => ProbeError::Unsupported(other.to_string()),
        })?;

    let format = probed.format;
    let audio = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL);

    let Some(track) = audio else {
        tracing::debug!("No decodable tracks in {}", path.display());
        return Ok(ProbedMeta::default());
    };

    let duration_seconds = track.codec_params.time_base.and_then(|tb| {
        track.codec_params.n_frames.map(|n| {
            let t = tb.calc_time(n);
            t.seconds as f64 + t.frac
        })
    });

    let audio_codec = symphonia::default::get_codecs()
        .get_codec(track.codec_params.codec)
        .map(|d| d.short_name.to_string());

    Ok(ProbedMeta {
        duration_seconds,
        audio_codec,
        has_audio: Some(true),
        ..ProbedMeta::default()
    })
}
