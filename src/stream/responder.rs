//! Turns a catalog lookup plus request headers into a streamed response.
//!
//! [`prepare`] does everything that can still fail with a clean status code:
//! lookup, stat, validator checks and range resolution. The resulting
//! [`StreamPlan`] then either renders headers only (HEAD, 304) or opens the
//! file and hands back a body whose errors can only abort the connection.

use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use tokio::io::AsyncSeekExt;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::media::catalog::Catalog;
use crate::media::library::VideoRecord;
use crate::media::mime::content_type_for;
use crate::stream::range::{ByteWindow, ChunkPolicy, RangeResult};
use crate::stream::transfer::{transfer, TransferOutcome};

/// One year; streamed bytes only change when the file does, and then the
/// ETag changes with it.
pub const DEFAULT_CACHE_MAX_AGE: u64 = 31_536_000;

#[derive(Debug, Clone, Copy)]
pub struct StreamSettings {
    pub chunks: ChunkPolicy,
    /// `Cache-Control: max-age` for streamed content, in seconds.
    pub cache_max_age: u64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            chunks: ChunkPolicy::default(),
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("no video with id {0}")]
    UnknownVideo(String),
    #[error("video {id} is indexed but {} is missing on disk", path.display())]
    FileMissing { id: String, path: PathBuf },
    #[error("requested range not satisfiable ({size} byte file)")]
    RangeNotSatisfiable { size: u64 },
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Request headers the responder cares about.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamRequest<'a> {
    pub video_id: &'a str,
    pub range: Option<&'a str>,
    pub if_range: Option<&'a str>,
    pub if_none_match: Option<&'a str>,
}

impl<'a> StreamRequest<'a> {
    pub fn from_headers(video_id: &'a str, headers: &'a HeaderMap) -> Self {
        let get = move |name: header::HeaderName| headers.get(name).and_then(|v| v.to_str().ok());
        Self {
            video_id,
            range: get(header::RANGE),
            if_range: get(header::IF_RANGE),
            if_none_match: get(header::IF_NONE_MATCH),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Inline,
    Attachment,
}

/// Version validators for a file at request time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validators {
    /// Strong ETag, quotes included.
    pub etag: String,
    pub last_modified: DateTime<Utc>,
}

impl Validators {
    pub fn new(size: u64, mtime: SystemTime) -> Self {
        Self {
            etag: etag_for(size, mtime),
            last_modified: DateTime::from(mtime),
        }
    }

    /// `If-Range` holds only when it names exactly the current strong ETag.
    pub fn if_range_matches(&self, if_range: &str) -> bool {
        if_range.trim() == self.etag
    }

    /// Weak comparison against an `If-None-Match` list.
    pub fn none_match_hits(&self, if_none_match: &str) -> bool {
        if_none_match.split(',').map(str::trim).any(|tag| {
            tag == "*" || tag.strip_prefix("W/").unwrap_or(tag) == self.etag
        })
    }

    pub fn last_modified_http(&self) -> String {
        self.last_modified
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string()
    }
}

/// ETag derived from size and modification time.
pub fn etag_for(size: u64, mtime: SystemTime) -> String {
    let millis = mtime
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("\"{size:x}-{millis:x}\"")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanKind {
    Full,
    Partial,
    NotModified,
}

/// Everything needed to answer a stream request, decided before any byte
/// of the response is written.
#[derive(Debug, Clone)]
pub struct StreamPlan {
    pub record: Arc<VideoRecord>,
    pub path: PathBuf,
    pub file_size: u64,
    pub kind: PlanKind,
    pub window: ByteWindow,
    pub validators: Validators,
    pub content_type: &'static str,
}

/// Look up the video, stat its file and resolve the request headers.
pub async fn prepare(
    catalog: &Catalog,
    settings: &StreamSettings,
    request: StreamRequest<'_>,
) -> Result<StreamPlan, StreamError> {
    let record = catalog
        .get(request.video_id)
        .ok_or_else(|| StreamError::UnknownVideo(request.video_id.to_string()))?;

    let missing = || StreamError::FileMissing {
        id: record.id.clone(),
        path: record.path.clone(),
    };
    let meta = match tokio::fs::metadata(&record.path).await {
        Ok(meta) if meta.is_file() => meta,
        Ok(_) => return Err(missing()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("Stale catalog entry {}: {} is gone", record.id, record.path.display());
            return Err(missing());
        }
        Err(source) => {
            return Err(StreamError::Io {
                path: record.path.clone(),
                source,
            })
        }
    };

    let file_size = meta.len();
    let validators = Validators::new(file_size, meta.modified().unwrap_or(UNIX_EPOCH));

    let range = match (request.range, request.if_range) {
        (Some(_), Some(cond)) if !validators.if_range_matches(cond) => {
            tracing::debug!("If-Range {cond:?} is stale, sending full content");
            None
        }
        (range, _) => range,
    };

    let resolved = settings.chunks.resolve(range, file_size);
    let (kind, window) = match resolved {
        RangeResult::NotSatisfiable => {
            return Err(StreamError::RangeNotSatisfiable { size: file_size })
        }
        RangeResult::Partial(window) => (PlanKind::Partial, window),
        RangeResult::Full(window) => {
            let fresh = request
                .if_none_match
                .is_some_and(|v| validators.none_match_hits(v));
            (if fresh { PlanKind::NotModified } else { PlanKind::Full }, window)
        }
    };

    Ok(StreamPlan {
        path: record.path.clone(),
        content_type: content_type_for(&record.path),
        record,
        file_size,
        kind,
        window,
        validators,
    })
}

impl StreamPlan {
    pub fn status(&self) -> StatusCode {
        match self.kind {
            PlanKind::Full => StatusCode::OK,
            PlanKind::Partial => StatusCode::PARTIAL_CONTENT,
            PlanKind::NotModified => StatusCode::NOT_MODIFIED,
        }
    }

    pub fn headers(&self, settings: &StreamSettings, disposition: Disposition) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        insert_str(&mut headers, header::ETAG, &self.validators.etag);
        insert_str(
            &mut headers,
            header::LAST_MODIFIED,
            &self.validators.last_modified_http(),
        );
        insert_str(
            &mut headers,
            header::CACHE_CONTROL,
            &format!("public, max-age={}", settings.cache_max_age),
        );

        if self.kind == PlanKind::NotModified {
            return headers;
        }

        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(self.content_type),
        );
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(self.window.length));
        if self.kind == PlanKind::Partial {
            insert_str(
                &mut headers,
                header::CONTENT_RANGE,
                &format!(
                    "bytes {}-{}/{}",
                    self.window.start, self.window.end, self.file_size
                ),
            );
        }
        if disposition == Disposition::Attachment {
            insert_str(
                &mut headers,
                header::CONTENT_DISPOSITION,
                &attachment_disposition(&self.record.filename),
            );
        }
        headers
    }

    /// Headers without a body, for HEAD and 304. Never touches the file.
    pub fn head_response(&self, settings: &StreamSettings, disposition: Disposition) -> Response {
        (self.status(), self.headers(settings, disposition)).into_response()
    }

    /// Open the file, seek to the window and build the streaming response.
    ///
    /// Errors returned here happen before the head is written and can still
    /// become a 404/500. The receiver reports how the body transfer ended.
    pub async fn respond(
        &self,
        settings: &StreamSettings,
        disposition: Disposition,
        cancel: CancellationToken,
    ) -> Result<(Response, Option<oneshot::Receiver<TransferOutcome>>), StreamError> {
        if self.kind == PlanKind::NotModified || self.window.length == 0 {
            return Ok((self.head_response(settings, disposition), None));
        }

        let io_err = |source: std::io::Error| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StreamError::FileMissing {
                    id: self.record.id.clone(),
                    path: self.path.clone(),
                }
            } else {
                StreamError::Io {
                    path: self.path.clone(),
                    source,
                }
            }
        };

        let mut file = tokio::fs::File::open(&self.path).await.map_err(io_err)?;
        if self.window.start > 0 {
            file.seek(SeekFrom::Start(self.window.start))
                .await
                .map_err(io_err)?;
        }

        let transfer = transfer(file, self.window.length, self.window.chunk_hint, cancel);
        let response = (
            self.status(),
            self.headers(settings, disposition),
            Body::from_stream(transfer.body),
        )
            .into_response();
        Ok((response, Some(transfer.outcome)))
    }
}

fn insert_str(headers: &mut HeaderMap, name: header::HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(_) => tracing::warn!("Dropping invalid {name} header value: {value:?}"),
    }
}

/// `attachment; filename="..."; filename*=UTF-8''...`
///
/// The quoted form is an ASCII-only fallback; the extended form carries the
/// exact name for clients that understand RFC 6266.
pub fn attachment_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    let mut encoded = String::with_capacity(filename.len());
    for byte in filename.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }

    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}
