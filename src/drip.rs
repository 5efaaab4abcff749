//! Planning for drip delivery: a fixed-size body spread over a time window.

use crate::pacing::Schedule;
use crate::{Error, Result};
use http::StatusCode;
use std::time::Duration;

/// Granularity of the drip schedule.
pub const TICK: Duration = Duration::from_millis(100);

/// Upper bounds applied to drip requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DripLimits {
    pub max_bytes: usize,
    pub max_duration_secs: f64,
    pub max_delay_secs: f64,
}

impl Default for DripLimits {
    fn default() -> Self {
        Self {
            max_bytes: 10 << 20,
            max_duration_secs: 60.0,
            max_delay_secs: 10.0,
        }
    }
}

/// A clamped drip request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DripPlan {
    pub num_bytes: usize,
    pub duration: Duration,
    pub delay: Duration,
    pub status: StatusCode,
}

impl DripPlan {
    /// Builds a plan from raw request values, clamping each into range.
    ///
    /// `duration` is clamped to `[0.1, max]` seconds, `delay` to `[0, max]`
    /// seconds and `num_bytes` to `[0, max]`. Non-finite times and invalid
    /// status codes are rejected.
    pub fn new(
        duration_secs: f64,
        num_bytes: i64,
        code: u16,
        delay_secs: f64,
        limits: &DripLimits,
    ) -> Result<Self> {
        if !duration_secs.is_finite() || !delay_secs.is_finite() {
            return Err(Error::BadRequest("duration and delay must be finite".into()));
        }
        let status = StatusCode::from_u16(code).map_err(|_| Error::InvalidStatusCode)?;

        let duration_secs = duration_secs.clamp(0.1, limits.max_duration_secs.max(0.1));
        let delay_secs = delay_secs.clamp(0.0, limits.max_delay_secs.max(0.0));
        let num_bytes = num_bytes.clamp(0, limits.max_bytes as i64) as usize;

        Ok(Self {
            num_bytes,
            duration: Duration::from_millis((duration_secs * 1000.0).round() as u64),
            delay: Duration::from_millis((delay_secs * 1000.0).round() as u64),
            status,
        })
    }

    /// Number of 100 ms ticks in the window, at least one.
    pub fn chunk_count(&self) -> usize {
        ((self.duration.as_millis() / TICK.as_millis()) as usize).max(1)
    }

    /// Bytes written per tick.
    pub fn chunk_size(&self) -> usize {
        let count = self.chunk_count();
        if count > 1 {
            self.num_bytes.div_ceil(count)
        } else {
            self.num_bytes
        }
    }

    /// The delivery schedule for the body.
    ///
    /// When the body is too small to fill every tick, single bytes are spaced
    /// evenly over the whole window instead, the last one landing at its end.
    pub fn schedule(&self) -> Schedule {
        let chunk_size = self.chunk_size();
        if chunk_size == 1 {
            let pause = self.duration / self.num_bytes as u32;
            Schedule {
                chunk_size: 1,
                lead: pause,
                pause,
            }
        } else {
            Schedule {
                chunk_size,
                lead: Duration::ZERO,
                pause: TICK,
            }
        }
    }
}
