//! Reusable encoder instances shared across requests.

use crate::codec::{Codec, Encoder, compression_level};
use flate2::Compression;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Default number of idle encoders kept per codec.
pub const DEFAULT_MAX_IDLE: usize = 64;

/// A pool of idle encoders keyed by codec.
///
/// Cloning is cheap and every clone shares the same idle lists. Encoders are
/// handed out as [`PooledEncoder`] guards which go back to the pool when
/// dropped, so a request that errors or is cancelled still returns its
/// encoder. Idle lists are capped at `max_idle`; surplus encoders are freed.
#[derive(Clone)]
pub struct CodecPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    level: Compression,
    max_idle: usize,
    idle: Mutex<HashMap<Codec, Vec<Encoder>>>,
}

impl CodecPool {
    /// Creates a pool producing encoders at `level` (`-1` for the codec default).
    ///
    /// An invalid level is rejected here, once, instead of on every request.
    pub fn new(level: i32) -> crate::Result<Self> {
        Self::with_max_idle(level, DEFAULT_MAX_IDLE)
    }

    /// Creates a pool that keeps at most `max_idle` idle encoders per codec.
    pub fn with_max_idle(level: i32, max_idle: usize) -> crate::Result<Self> {
        let level = compression_level(level)?;
        Ok(Self {
            inner: Arc::new(PoolInner {
                level,
                max_idle,
                idle: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Takes an idle encoder for `codec`, or builds a new one.
    pub fn acquire(&self, codec: Codec) -> PooledEncoder {
        let reused = self.inner.lock().get_mut(&codec).and_then(Vec::pop);
        let encoder = reused.unwrap_or_else(|| {
            tracing::trace!(codec = codec.content_encoding(), "allocating encoder");
            Encoder::new(codec, self.inner.level)
        });
        PooledEncoder {
            encoder: Some(encoder),
            pool: Arc::clone(&self.inner),
        }
    }

    /// Number of idle encoders currently held for `codec`.
    pub fn idle(&self, codec: Codec) -> usize {
        self.inner.lock().get(&codec).map_or(0, Vec::len)
    }
}

impl fmt::Debug for CodecPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecPool")
            .field("level", &self.inner.level.level())
            .field("max_idle", &self.inner.max_idle)
            .finish_non_exhaustive()
    }
}

impl PoolInner {
    fn lock(&self) -> MutexGuard<'_, HashMap<Codec, Vec<Encoder>>> {
        // Encoders are reset before they are stored, so a poisoned list is still usable.
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, mut encoder: Encoder) {
        encoder.reset();
        let mut idle = self.lock();
        let list = idle.entry(encoder.codec()).or_default();
        if list.len() < self.max_idle {
            list.push(encoder);
        }
    }
}

/// An encoder checked out of a [`CodecPool`]; returned to it on drop.
pub struct PooledEncoder {
    encoder: Option<Encoder>,
    pool: Arc<PoolInner>,
}

impl Deref for PooledEncoder {
    type Target = Encoder;

    fn deref(&self) -> &Encoder {
        self.encoder.as_ref().expect("encoder present until drop")
    }
}

impl DerefMut for PooledEncoder {
    fn deref_mut(&mut self) -> &mut Encoder {
        self.encoder.as_mut().expect("encoder present until drop")
    }
}

impl Drop for PooledEncoder {
    fn drop(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.pool.release(encoder);
        }
    }
}

impl fmt::Debug for PooledEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledEncoder")
            .field("codec", &self.encoder.as_ref().map(Encoder::codec))
            .finish()
    }
}
