use crate::pool::PooledEncoder;
use bytes::{Buf, Bytes};
use http::HeaderMap;
use http_body::{Body, Frame, SizeHint};
use std::io;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A response body that may be compressed.
///
/// The compressed variant runs every data frame of the inner body through a
/// pooled encoder. The encoder goes back to its pool as soon as the stream is
/// finished, errors, or the body is dropped.
pub enum CompressionBody<B> {
    /// Compressed body with encoder.
    Compressed {
        /// The handler's body.
        inner: Pin<Box<B>>,
        /// Encoder and framing state.
        state: CompressedBody,
    },
    /// Body forwarded unchanged.
    Passthrough {
        /// The handler's body.
        inner: Pin<Box<B>>,
        /// A frame, error, or end already taken from `inner` before the
        /// encoding decision was made.
        replay: Replay,
    },
}

/// Output of the inner body consumed while deciding whether to compress.
#[derive(Debug, Default)]
pub enum Replay {
    /// Nothing was consumed.
    #[default]
    Nothing,
    /// A frame to hand out before polling the inner body again.
    Frame(Frame<Bytes>),
    /// An error to hand out, after which the body is over.
    Error(io::Error),
    /// The inner body already ended.
    End,
}

/// State and buffers for an actively compressed body.
pub struct CompressedBody {
    encoder: Option<PooledEncoder>,
    first: Option<Bytes>,
    output: Vec<u8>,
    always_flush: bool,
    unflushed: bool,
    state: CompressState,
    pending_trailers: Option<HeaderMap>,
}

/// State machine for compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompressState {
    /// Reading data from inner body and compressing.
    Reading,
    /// Finishing compression after inner body is done.
    Finishing,
    /// Emitting buffered trailers.
    Trailers,
    /// Compression is complete.
    Done,
}

impl CompressedBody {
    fn new(encoder: PooledEncoder, first: Bytes, always_flush: bool) -> Self {
        Self {
            encoder: Some(encoder),
            first: Some(first),
            output: Vec::new(),
            always_flush,
            unflushed: false,
            state: CompressState::Reading,
            pending_trailers: None,
        }
    }

    pub(crate) fn state(&self) -> CompressState {
        self.state
    }

    fn encoder(&mut self) -> io::Result<&mut PooledEncoder> {
        self.encoder
            .as_mut()
            .ok_or_else(|| io::Error::other("encoder already released"))
    }

    /// Hands the encoder back to its pool.
    fn release(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            tracing::trace!(codec = encoder.codec().content_encoding(), "releasing encoder");
        }
    }

    fn fail(&mut self, error: io::Error) -> Poll<Option<Result<Frame<Bytes>, io::Error>>> {
        self.release();
        self.state = CompressState::Done;
        Poll::Ready(Some(Err(error)))
    }

    fn take_output(&mut self) -> Option<Bytes> {
        if self.output.is_empty() {
            None
        } else {
            Some(Bytes::from(mem::take(&mut self.output)))
        }
    }

    /// Polls the inner body and compresses data.
    fn poll_compressed<B>(
        &mut self,
        cx: &mut Context<'_>,
        inner: &mut Pin<Box<B>>,
    ) -> Poll<Option<Result<Frame<Bytes>, io::Error>>>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        loop {
            match self.state {
                CompressState::Done => return Poll::Ready(None),

                CompressState::Trailers => {
                    self.state = CompressState::Done;
                    if let Some(trailers) = self.pending_trailers.take() {
                        return Poll::Ready(Some(Ok(Frame::trailers(trailers))));
                    }
                }

                CompressState::Finishing => {
                    let mut output = mem::take(&mut self.output);
                    let finished = self.encoder().and_then(|e| e.finish(&mut output));
                    self.output = output;
                    if let Err(e) = finished {
                        return self.fail(e);
                    }
                    self.release();
                    self.state = if self.pending_trailers.is_some() {
                        CompressState::Trailers
                    } else {
                        CompressState::Done
                    };
                    if let Some(data) = self.take_output() {
                        return Poll::Ready(Some(Ok(Frame::data(data))));
                    }
                }

                CompressState::Reading => {
                    if let Some(first) = self.first.take() {
                        match self.compress_chunk(&first) {
                            Ok(Some(data)) => return Poll::Ready(Some(Ok(Frame::data(data)))),
                            Ok(None) => continue,
                            Err(e) => return self.fail(e),
                        }
                    }

                    match inner.as_mut().poll_frame(cx) {
                        Poll::Pending => {
                            // The producer stalled: push out what has been buffered so far.
                            if self.unflushed {
                                match self.flush_encoder() {
                                    Ok(Some(data)) => {
                                        return Poll::Ready(Some(Ok(Frame::data(data))));
                                    }
                                    Ok(None) => {}
                                    Err(e) => return self.fail(e),
                                }
                            }
                            return Poll::Pending;
                        }
                        Poll::Ready(None) => {
                            self.state = CompressState::Finishing;
                        }
                        Poll::Ready(Some(Err(e))) => {
                            return self.fail(io::Error::other(e.into()));
                        }
                        Poll::Ready(Some(Ok(frame))) => match frame.into_data() {
                            Ok(mut data) => {
                                let input = data.copy_to_bytes(data.remaining());
                                match self.compress_chunk(&input) {
                                    Ok(Some(data)) => {
                                        return Poll::Ready(Some(Ok(Frame::data(data))));
                                    }
                                    Ok(None) => {}
                                    Err(e) => return self.fail(e),
                                }
                            }
                            Err(frame) => {
                                if let Ok(trailers) = frame.into_trailers() {
                                    // Buffer trailers and finish compression first
                                    self.pending_trailers = Some(trailers);
                                    self.state = CompressState::Finishing;
                                }
                            }
                        },
                    }
                }
            }
        }
    }

    /// Compresses a chunk of input data, returning any output that is ready.
    fn compress_chunk(&mut self, input: &[u8]) -> io::Result<Option<Bytes>> {
        if input.is_empty() {
            return Ok(None);
        }
        let mut output = mem::take(&mut self.output);
        let encoded = self.encoder().and_then(|e| e.encode(input, &mut output));
        self.output = output;
        encoded?;
        self.unflushed = true;

        if self.always_flush {
            return self.flush_encoder();
        }
        Ok(self.take_output())
    }

    fn flush_encoder(&mut self) -> io::Result<Option<Bytes>> {
        let mut output = mem::take(&mut self.output);
        let flushed = self.encoder().and_then(|e| e.flush(&mut output));
        self.output = output;
        flushed?;
        self.unflushed = false;
        Ok(self.take_output())
    }
}

impl<B> CompressionBody<B> {
    /// Creates a compressed body whose first data chunk has already been read.
    pub(crate) fn compressed(
        inner: Pin<Box<B>>,
        first: Bytes,
        encoder: PooledEncoder,
        always_flush: bool,
    ) -> Self {
        Self::Compressed {
            inner,
            state: CompressedBody::new(encoder, first, always_flush),
        }
    }

    /// Creates a passthrough body without compression.
    pub fn passthrough(inner: B) -> Self {
        Self::Passthrough {
            inner: Box::pin(inner),
            replay: Replay::Nothing,
        }
    }

    /// Creates a passthrough body that first hands out what was already consumed.
    pub(crate) fn replay(inner: Pin<Box<B>>, replay: Replay) -> Self {
        Self::Passthrough { inner, replay }
    }
}

impl<B> Body for CompressionBody<B>
where
    B: Body,
    B::Data: Buf,
    B::Error: Into<BoxError>,
{
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            CompressionBody::Passthrough { inner, replay } => {
                match mem::take(replay) {
                    Replay::Frame(frame) => return Poll::Ready(Some(Ok(frame))),
                    Replay::Error(e) => {
                        *replay = Replay::End;
                        return Poll::Ready(Some(Err(e)));
                    }
                    Replay::End => {
                        *replay = Replay::End;
                        return Poll::Ready(None);
                    }
                    Replay::Nothing => {}
                }

                match inner.as_mut().poll_frame(cx) {
                    Poll::Pending => Poll::Pending,
                    Poll::Ready(None) => Poll::Ready(None),
                    Poll::Ready(Some(Ok(frame))) => Poll::Ready(Some(Ok(
                        frame.map_data(|mut data| data.copy_to_bytes(data.remaining())),
                    ))),
                    Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(io::Error::other(e.into())))),
                }
            }
            CompressionBody::Compressed { inner, state } => state.poll_compressed(cx, inner),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            CompressionBody::Passthrough { inner, replay } => match replay {
                Replay::Nothing => inner.is_end_stream(),
                Replay::End => true,
                Replay::Frame(_) | Replay::Error(_) => false,
            },
            CompressionBody::Compressed { state, .. } => state.state() == CompressState::Done,
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            CompressionBody::Passthrough {
                inner,
                replay: Replay::Nothing,
            } => inner.size_hint(),
            CompressionBody::Passthrough {
                replay: Replay::End,
                ..
            } => SizeHint::with_exact(0),
            // Compressed size is unknown
            _ => SizeHint::default(),
        }
    }
}
