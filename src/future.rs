use crate::body::{CompressionBody, Replay};
use crate::pool::PooledEncoder;
use crate::sniff::sniff;
use bytes::{Buf, Bytes};
use http::response::Parts;
use http::{Response, StatusCode, header};
use http_body::Body;
use pin_project_lite::pin_project;
use std::future::Future;
use std::io;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pin_project! {
    /// Future for compression service responses.
    ///
    /// Resolves once the inner response is available and, when an encoder was
    /// negotiated, once its body has produced its first non-empty data frame.
    /// Only then is `Content-Encoding` committed; a body that ends, fails, or
    /// yields only trailers first is passed through unencoded.
    pub struct ResponseFuture<F, B> {
        #[pin]
        inner: F,
        encoder: Option<PooledEncoder>,
        state: State<B>,
    }
}

enum State<B> {
    Waiting,
    Peeking {
        parts: Parts,
        body: Pin<Box<B>>,
        encoder: PooledEncoder,
    },
    Done,
}

impl<F, B> ResponseFuture<F, B> {
    pub(crate) fn new(inner: F, encoder: Option<PooledEncoder>) -> Self {
        Self {
            inner,
            encoder,
            state: State::Waiting,
        }
    }
}

impl<F, B, E> Future for ResponseFuture<F, B>
where
    F: Future<Output = Result<Response<B>, E>>,
    B: Body,
    B::Error: Into<BoxError>,
{
    type Output = Result<Response<CompressionBody<B>>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();

        loop {
            match mem::replace(this.state, State::Done) {
                State::Waiting => {
                    let response = match this.inner.as_mut().poll(cx) {
                        Poll::Pending => {
                            *this.state = State::Waiting;
                            return Poll::Pending;
                        }
                        Poll::Ready(Err(e)) => {
                            if let Some(encoder) = this.encoder.take() {
                                release(encoder, "handler failed");
                            }
                            return Poll::Ready(Err(e));
                        }
                        Poll::Ready(Ok(response)) => response,
                    };

                    let (mut parts, body) = response.into_parts();
                    add_vary_accept_encoding(&mut parts.headers);

                    let Some(encoder) = this.encoder.take() else {
                        return Poll::Ready(Ok(Response::from_parts(
                            parts,
                            CompressionBody::passthrough(body),
                        )));
                    };
                    if !is_encodable(&parts) || body.is_end_stream() {
                        release(encoder, "response not encodable");
                        return Poll::Ready(Ok(Response::from_parts(
                            parts,
                            CompressionBody::passthrough(body),
                        )));
                    }

                    *this.state = State::Peeking {
                        parts,
                        body: Box::pin(body),
                        encoder,
                    };
                }

                State::Peeking {
                    mut parts,
                    mut body,
                    encoder,
                } => {
                    let replay = match body.as_mut().poll_frame(cx) {
                        Poll::Pending => {
                            *this.state = State::Peeking {
                                parts,
                                body,
                                encoder,
                            };
                            return Poll::Pending;
                        }
                        Poll::Ready(None) => Replay::End,
                        Poll::Ready(Some(Err(e))) => Replay::Error(io::Error::other(e.into())),
                        Poll::Ready(Some(Ok(frame))) => match frame.into_data() {
                            Ok(mut data) if data.has_remaining() => {
                                let first = data.copy_to_bytes(data.remaining());
                                let always_flush = commit(&mut parts, &encoder, &first);
                                return Poll::Ready(Ok(Response::from_parts(
                                    parts,
                                    CompressionBody::compressed(body, first, encoder, always_flush),
                                )));
                            }
                            Ok(_) => {
                                *this.state = State::Peeking {
                                    parts,
                                    body,
                                    encoder,
                                };
                                continue;
                            }
                            Err(frame) => Replay::Frame(
                                frame.map_data(|mut data| data.copy_to_bytes(data.remaining())),
                            ),
                        },
                    };

                    release(encoder, "no body written");
                    return Poll::Ready(Ok(Response::from_parts(
                        parts,
                        CompressionBody::replay(body, replay),
                    )));
                }

                State::Done => panic!("ResponseFuture polled after completion"),
            }
        }
    }
}

/// Returns the encoder to its pool without touching the response head.
fn release(encoder: PooledEncoder, reason: &'static str) {
    tracing::debug!(
        codec = encoder.codec().content_encoding(),
        reason,
        "content encoding rolled back"
    );
}

/// Stages the encoded representation onto the response head.
///
/// Returns whether every chunk should be flushed through immediately.
fn commit(parts: &mut Parts, encoder: &PooledEncoder, first: &Bytes) -> bool {
    let codec = encoder.codec();
    let headers = &mut parts.headers;

    if !headers.contains_key(header::CONTENT_TYPE) {
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static(sniff(first)),
        );
    }

    // Check for x-accel-buffering: no header or streaming content types
    let always_flush = headers
        .get("x-accel-buffering")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("no"))
        || is_streaming_content_type(headers);

    headers.insert(
        header::CONTENT_ENCODING,
        header::HeaderValue::from_static(codec.content_encoding()),
    );

    // Remove Content-Length since compressed size is unknown
    headers.remove(header::CONTENT_LENGTH);

    // Remove Accept-Ranges since we can't support ranges on compressed content
    headers.remove(header::ACCEPT_RANGES);

    tracing::debug!(codec = codec.content_encoding(), "content encoding committed");
    always_flush
}

/// Whether the response may be given a content coding at all.
fn is_encodable(parts: &Parts) -> bool {
    let status = parts.status;
    !(status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
        || parts.headers.contains_key(header::CONTENT_ENCODING)
        || parts.headers.contains_key(header::CONTENT_RANGE))
}

/// Adds Accept-Encoding to the Vary header if not already present.
fn add_vary_accept_encoding(headers: &mut header::HeaderMap) {
    // Check all Vary headers to see if Accept-Encoding is already present
    for vary in headers.get_all(header::VARY) {
        if let Ok(vary_str) = vary.to_str() {
            let covered = vary_str.split(',').any(|v| {
                let v = v.trim();
                v.eq_ignore_ascii_case("*") || v.eq_ignore_ascii_case("accept-encoding")
            });
            if covered {
                return;
            }
        }
    }

    headers.append(
        header::VARY,
        header::HeaderValue::from_static("accept-encoding"),
    );
}

/// Checks if the content type requires always flushing (e.g., streaming).
fn is_streaming_content_type(headers: &header::HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| {
            ct.starts_with("text/event-stream") || ct.starts_with("application/grpc-web")
        })
}
