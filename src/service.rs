use crate::codec::Codec;
use crate::future::ResponseFuture;
use crate::pool::CodecPool;
use http::{Method, Request};
use std::task::{Context, Poll};
use tower::Service;

/// Request extension recording the outcome of content negotiation.
///
/// Inserted by [`CompressionService`] before the inner service runs, so a
/// handler can report whether its response will be encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated(pub Option<Codec>);

/// A Tower service that compresses HTTP response bodies with one codec.
#[derive(Debug, Clone)]
pub struct CompressionService<S> {
    inner: S,
    codec: Codec,
    pool: CodecPool,
}

impl<S> CompressionService<S> {
    /// Creates a new compression service wrapping the given inner service.
    pub fn new(inner: S, codec: Codec, pool: CodecPool) -> Self {
        Self { inner, codec, pool }
    }

    /// Returns a reference to the inner service.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Consumes this service, returning the inner service.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for CompressionService<S>
where
    S: Service<Request<ReqBody>, Response = http::Response<ResBody>>,
    ResBody: http_body::Body,
    ResBody::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Response = http::Response<crate::body::CompressionBody<ResBody>>;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future, ResBody>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let accepted = req.method() != Method::HEAD
            && req
                .headers()
                .get(http::header::ACCEPT_ENCODING)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| self.codec.accepted_by(v));

        let encoder = accepted.then(|| self.pool.acquire(self.codec));
        req.extensions_mut()
            .insert(Negotiated(accepted.then_some(self.codec)));

        // The request goes through untouched otherwise, including any
        // upgrade handle stored in its extensions.
        let inner = self.inner.call(req);

        ResponseFuture::new(inner, encoder)
    }
}
