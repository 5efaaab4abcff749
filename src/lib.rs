//! HTTP request inspection and response synthesis service.
//!
//! The service echoes what it receives and synthesizes controlled responses
//! (delayed, dripped, byte-ranged, compressed, or with a randomly chosen
//! status) for exercising HTTP clients and proxies.
//!
//! # Compression
//!
//! [`CompressionLayer`] is a Tower layer that encodes response bodies with one
//! codec drawn from a shared [`CodecPool`]:
//!
//! ```ignore
//! use httpprobe::{CodecPool, CompressionLayer};
//! use tower::ServiceBuilder;
//!
//! let pool = CodecPool::new(-1)?;
//! let service = ServiceBuilder::new()
//!     .layer(CompressionLayer::gzip(pool))
//!     .service(my_service);
//! ```
//!
//! The layer will **not** encode a response when:
//! - The request's `Accept-Encoding` does not admit the layer's codec, or the
//!   request is `HEAD`
//! - The status is informational, `204 No Content` or `304 Not Modified`
//! - `Content-Encoding` or `Content-Range` is already set
//! - The body ends, errors, or yields only trailers before any data
//!
//! The encoding is committed only when the body produces its first data
//! frame. Until then nothing is sent, so an empty or failed body goes out
//! without a `Content-Encoding` header.
//!
//! When encoding is committed:
//! - `Content-Encoding` is set to the codec used
//! - `Content-Type` is sniffed from the first bytes if absent
//! - `Content-Length` and `Accept-Ranges` are removed
//!
//! `Vary: accept-encoding` is added to every response either way. Output is
//! flushed whenever the handler's body stalls, and after every frame for
//! `text/event-stream`, `application/grpc-web` and `X-Accel-Buffering: no`.

mod body;
mod codec;
mod config;
mod drip;
mod error;
mod future;
mod layer;
mod pacing;
mod payload;
mod pool;
mod range;
mod select;
mod server;
mod service;
mod sniff;

pub use body::{CompressionBody, Replay};
pub use codec::Codec;
pub use config::Config;
pub use drip::{DripLimits, DripPlan};
pub use error::{Error, Result};
pub use future::ResponseFuture;
pub use layer::CompressionLayer;
pub use pacing::{Schedule, paced};
pub use payload::{alphabet_span, random_bytes};
pub use pool::{CodecPool, PooledEncoder};
pub use range::ByteRange;
pub use select::{StatusChoice, StatusSelector, WeightedOutcome, choose};
pub use server::{AppState, PrettyJson, RequestInfo, app, run};
pub use service::{CompressionService, Negotiated};
pub use sniff::sniff;
