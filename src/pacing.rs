//! Time-paced chunked delivery of an in-memory payload.

use bytes::Bytes;
use futures_util::stream::{self, Stream};
use std::convert::Infallible;
use std::time::Duration;

/// How a payload is cut into chunks and spaced out in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// Bytes per chunk; the last chunk may be shorter.
    pub chunk_size: usize,
    /// Wait before the first chunk.
    pub lead: Duration,
    /// Wait before every later chunk.
    pub pause: Duration,
}

impl Schedule {
    /// Everything at once, in chunks of `chunk_size`.
    pub fn immediate(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            lead: Duration::ZERO,
            pause: Duration::ZERO,
        }
    }

    /// Number of chunks `len` bytes are cut into.
    pub fn chunks_for(&self, len: usize) -> usize {
        len.div_ceil(self.chunk_size.max(1))
    }
}

/// Streams `payload` according to `schedule`.
///
/// Chunks are produced strictly in order and each is handed to the transport
/// before the next wait begins. Dropping the stream (the client went away)
/// cancels any pending wait, so nothing more is produced.
pub fn paced(
    payload: Bytes,
    schedule: Schedule,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    let chunk_size = schedule.chunk_size.max(1);
    stream::unfold((payload, true), move |(mut rest, first)| async move {
        if rest.is_empty() {
            return None;
        }
        let wait = if first { schedule.lead } else { schedule.pause };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        let chunk = rest.split_to(chunk_size.min(rest.len()));
        Some((Ok(chunk), (rest, false)))
    })
}
