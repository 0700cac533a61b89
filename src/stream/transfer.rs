//! Chunked body for one response.
//!
//! The body reads the next chunk only when the transport polls for it, so
//! hyper's flow control paces the file I/O and at most one chunk is buffered.
//! Dropping the body (client went away) or cancelling its token stops reading
//! at once. Each transfer reports how it ended on a oneshot channel.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Lifecycle of one response body. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// Body built, response not yet handed to the transport.
    Pending,
    /// The transport wrote the head and asked for the first chunk.
    HeadersSent,
    /// At least one chunk has been read.
    Streaming,
    Completed,
    Aborted,
}

/// How a transfer ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Every byte of the window was handed to the transport.
    Completed { bytes: u64 },
    /// The client disconnected or the server is shutting down.
    Aborted { bytes_sent: u64 },
    /// Reading the file failed after the headers went out.
    Failed { bytes_sent: u64, error: String },
}

/// A body stream plus the receiver for its [`TransferOutcome`].
pub struct Transfer {
    pub body: BoxStream<'static, io::Result<Bytes>>,
    pub outcome: oneshot::Receiver<TransferOutcome>,
}

/// Stream exactly `length` bytes from `reader` in reads of `chunk_size`.
///
/// `reader` must already be positioned at the first byte of the window. A
/// reader that ends early yields an `UnexpectedEof` error, which makes hyper
/// abort the connection instead of sending a short body.
pub fn transfer<R>(reader: R, length: u64, chunk_size: usize, cancel: CancellationToken) -> Transfer
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (done, outcome) = oneshot::channel();
    let task = TransferTask {
        reader,
        remaining: length,
        sent: 0,
        chunk_size: chunk_size.max(1),
        cancel,
        state: TransferState::Pending,
        done: Some(done),
    };
    let body = stream::unfold(task, TransferTask::next_chunk).boxed();
    Transfer { body, outcome }
}

struct TransferTask<R> {
    reader: R,
    remaining: u64,
    sent: u64,
    chunk_size: usize,
    cancel: CancellationToken,
    state: TransferState,
    done: Option<oneshot::Sender<TransferOutcome>>,
}

impl<R> TransferTask<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    async fn next_chunk(mut self) -> Option<(io::Result<Bytes>, Self)> {
        match self.state {
            TransferState::Completed | TransferState::Aborted => return None,
            TransferState::Pending => self.state = TransferState::HeadersSent,
            TransferState::HeadersSent | TransferState::Streaming => {}
        }

        if self.remaining == 0 {
            let bytes = self.sent;
            self.finish(TransferState::Completed, TransferOutcome::Completed { bytes });
            return None;
        }

        let want = self.remaining.min(self.chunk_size as u64) as usize;
        let mut buf = BytesMut::with_capacity(want);

        let read = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = fill(&mut self.reader, &mut buf, want) => Some(result),
        };

        match read {
            None => {
                let bytes_sent = self.sent;
                tracing::debug!(bytes_sent, "Transfer cancelled");
                self.finish(TransferState::Aborted, TransferOutcome::Aborted { bytes_sent });
                None
            }
            Some(Ok(())) => {
                self.state = TransferState::Streaming;
                self.remaining -= buf.len() as u64;
                self.sent += buf.len() as u64;
                // hyper stops polling once Content-Length bytes are out, so
                // the last chunk has to settle the outcome itself.
                if self.remaining == 0 {
                    let bytes = self.sent;
                    self.finish(TransferState::Completed, TransferOutcome::Completed { bytes });
                }
                Some((Ok(buf.freeze()), self))
            }
            Some(Err(e)) => {
                let bytes_sent = self.sent;
                self.finish(
                    TransferState::Aborted,
                    TransferOutcome::Failed {
                        bytes_sent,
                        error: e.to_string(),
                    },
                );
                Some((Err(e), self))
            }
        }
    }
}

impl<R> TransferTask<R> {
    fn finish(&mut self, state: TransferState, outcome: TransferOutcome) {
        self.state = state;
        if let Some(done) = self.done.take() {
            let _ = done.send(outcome);
        }
    }
}

impl<R> Drop for TransferTask<R> {
    fn drop(&mut self) {
        if self.done.is_some() {
            let bytes_sent = self.sent;
            self.finish(TransferState::Aborted, TransferOutcome::Aborted { bytes_sent });
        }
    }
}

/// Read exactly `want` bytes into `buf`.
async fn fill<R>(reader: &mut R, buf: &mut BytesMut, want: usize) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut limited = (&mut *reader).take(want as u64);
    while buf.len() < want {
        if limited.read_buf(buf).await? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "file ended before the advertised length",
            ));
        }
    }
    Ok(())
}

/// Running totals of finished transfers, kept in the app state.
#[derive(Debug, Default)]
pub struct TransferTally {
    completed: AtomicU64,
    aborted: AtomicU64,
    failed: AtomicU64,
    bytes_sent: AtomicU64,
}

impl TransferTally {
    pub fn record(&self, outcome: &TransferOutcome) {
        let (counter, bytes) = match outcome {
            TransferOutcome::Completed { bytes } => (&self.completed, *bytes),
            TransferOutcome::Aborted { bytes_sent } => (&self.aborted, *bytes_sent),
            TransferOutcome::Failed { bytes_sent, .. } => (&self.failed, *bytes_sent),
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn aborted(&self) -> u64 {
        self.aborted.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Body bytes handed to the transport across all finished transfers.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }
}
