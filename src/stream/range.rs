//! `Range` header resolution.
//!
//! Pure functions: no I/O, no clock. Given the raw header and the current file
//! size they decide the status code, the byte window and the read granularity.

/// Smallest read used for ranged responses.
pub const MIN_CHUNK: u64 = 64 * 1024;
/// Read size for full responses of ordinary files.
pub const DEFAULT_CHUNK: u64 = 1024 * 1024;
/// Largest read, and the largest window a single ranged response covers.
pub const MAX_CHUNK: u64 = 8 * 1024 * 1024;

/// Chunk-size constants. `max` also caps the window of a 206 response, so
/// players have to come back with follow-up range requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPolicy {
    pub min: u64,
    pub default: u64,
    pub max: u64,
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self {
            min: MIN_CHUNK,
            default: DEFAULT_CHUNK,
            max: MAX_CHUNK,
        }
    }
}

impl ChunkPolicy {
    /// Build a policy, repairing nonsensical combinations (zero sizes, min
    /// above max) instead of rejecting them.
    pub fn new(min: u64, default: u64, max: u64) -> Self {
        let max = max.max(1);
        let min = min.clamp(1, max);
        let default = default.clamp(min, max);
        Self { min, default, max }
    }

    /// Read size for a full-file response: one hundredth of the file, never
    /// below `default`, never above `max`.
    pub fn full_chunk(&self, file_size: u64) -> usize {
        (file_size / 100).max(self.default).min(self.max) as usize
    }

    /// Read size for a ranged response of `length` bytes.
    pub fn ranged_chunk(&self, length: u64) -> usize {
        length.max(self.min).min(self.max) as usize
    }

    /// Resolve `range_header` against a file of `file_size` bytes.
    pub fn resolve(&self, range_header: Option<&str>, file_size: u64) -> RangeResult {
        let full = || {
            RangeResult::Full(ByteWindow {
                start: 0,
                end: file_size.saturating_sub(1),
                length: file_size,
                chunk_hint: self.full_chunk(file_size),
            })
        };

        let Some(raw) = range_header else {
            return full();
        };
        let Some(spec) = parse_range(raw) else {
            // Syntactically invalid ranges are ignored, not rejected.
            tracing::debug!("Ignoring malformed Range header: {raw:?}");
            return full();
        };

        if file_size == 0 {
            return RangeResult::NotSatisfiable;
        }
        let last = file_size - 1;

        let (start, end) = match spec {
            RangeSpec::FromTo(start, end) => {
                if start >= file_size {
                    return RangeResult::NotSatisfiable;
                }
                (start, end.unwrap_or(last).min(last))
            }
            RangeSpec::Suffix(0) => return RangeResult::NotSatisfiable,
            RangeSpec::Suffix(len) => (file_size.saturating_sub(len), last),
        };

        if start > end {
            return RangeResult::NotSatisfiable;
        }

        let end = end.min(start.saturating_add(self.max - 1));
        let length = end - start + 1;
        RangeResult::Partial(ByteWindow {
            start,
            end,
            length,
            chunk_hint: self.ranged_chunk(length),
        })
    }
}

/// Resolve with the default chunk policy.
pub fn resolve(range_header: Option<&str>, file_size: u64) -> RangeResult {
    ChunkPolicy::default().resolve(range_header, file_size)
}

/// Inclusive byte window plus the read size to stream it with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteWindow {
    pub start: u64,
    /// Inclusive. `0` for an empty file.
    pub end: u64,
    pub length: u64,
    pub chunk_hint: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeStatus {
    FullContent,
    PartialContent,
    NotSatisfiable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeResult {
    /// 200 with the whole file.
    Full(ByteWindow),
    /// 206 with `Content-Range: bytes start-end/size`.
    Partial(ByteWindow),
    /// 416 with `Content-Range: bytes */size` and no body.
    NotSatisfiable,
}

impl RangeResult {
    pub fn status(&self) -> RangeStatus {
        match self {
            RangeResult::Full(_) => RangeStatus::FullContent,
            RangeResult::Partial(_) => RangeStatus::PartialContent,
            RangeResult::NotSatisfiable => RangeStatus::NotSatisfiable,
        }
    }

    pub fn window(&self) -> Option<ByteWindow> {
        match self {
            RangeResult::Full(w) | RangeResult::Partial(w) => Some(*w),
            RangeResult::NotSatisfiable => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeSpec {
    /// `bytes=start-` or `bytes=start-end`.
    FromTo(u64, Option<u64>),
    /// `bytes=-len`: the last `len` bytes.
    Suffix(u64),
}

/// Parse the first range of a `bytes=` header. Multi-range requests are
/// answered with their first range only.
fn parse_range(value: &str) -> Option<RangeSpec> {
    let (unit, ranges) = value.trim().split_once('=')?;
    if !unit.trim().eq_ignore_ascii_case("bytes") {
        return None;
    }
    let first = ranges.split(',').next()?.trim();
    let (start, end) = first.split_once('-')?;
    let (start, end) = (start.trim(), end.trim());

    match (start.is_empty(), end.is_empty()) {
        (false, true) => Some(RangeSpec::FromTo(parse_pos(start)?, None)),
        (false, false) => Some(RangeSpec::FromTo(parse_pos(start)?, Some(parse_pos(end)?))),
        (true, false) => Some(RangeSpec::Suffix(parse_pos(end)?)),
        (true, true) => None,
    }
}

fn parse_pos(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
