use crate::codec::Codec;
use crate::pool::CodecPool;
use crate::service::CompressionService;
use tower::Layer;

/// A Tower layer that compresses HTTP response bodies with one codec.
///
/// Wrapped services always get `Vary: accept-encoding` on their responses.
/// Encoding is engaged only for requests whose `Accept-Encoding` admits the
/// layer's codec, and is committed only once the response body produces data.
#[derive(Debug, Clone)]
pub struct CompressionLayer {
    codec: Codec,
    pool: CodecPool,
}

impl CompressionLayer {
    /// Creates a layer encoding with `codec`, drawing encoders from `pool`.
    pub fn new(codec: Codec, pool: CodecPool) -> Self {
        Self { codec, pool }
    }

    /// Shorthand for a gzip layer.
    pub fn gzip(pool: CodecPool) -> Self {
        Self::new(Codec::Gzip, pool)
    }

    /// Shorthand for a deflate layer.
    pub fn deflate(pool: CodecPool) -> Self {
        Self::new(Codec::Deflate, pool)
    }
}

impl<S> Layer<S> for CompressionLayer {
    type Service = CompressionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CompressionService::new(inner, self.codec, self.pool.clone())
    }
}
