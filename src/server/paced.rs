//! Time-paced endpoints: `/drip` and `/range/{n}`.

use super::AppState;
use crate::drip::DripPlan;
use crate::pacing::{Schedule, paced};
use crate::payload::{alphabet_span, filler};
use crate::range::ByteRange;
use crate::{Error, Result};
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use http::{HeaderMap, HeaderValue, StatusCode, header};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_RANGE_CHUNK: usize = 10 * 1024;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub(super) struct DripQuery {
    duration: f64,
    numbytes: i64,
    code: i64,
    delay: f64,
}

impl Default for DripQuery {
    fn default() -> Self {
        Self {
            duration: 2.0,
            numbytes: 10,
            code: 200,
            delay: 2.0,
        }
    }
}

pub(super) async fn drip(
    State(state): State<AppState>,
    Query(query): Query<DripQuery>,
) -> Result<Response> {
    let code = u16::try_from(query.code).map_err(|_| Error::InvalidStatusCode)?;
    let plan = DripPlan::new(
        query.duration,
        query.numbytes,
        code,
        query.delay,
        &state.config.drip_limits(),
    )?;
    let schedule = plan.schedule();
    tracing::debug!(
        num_bytes = plan.num_bytes,
        duration_ms = plan.duration.as_millis() as u64,
        delay_ms = plan.delay.as_millis() as u64,
        chunk_size = schedule.chunk_size,
        "drip planned"
    );

    if !plan.delay.is_zero() {
        tokio::time::sleep(plan.delay).await;
    }

    let response = Response::builder()
        .status(plan.status)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, plan.num_bytes)
        .body(Body::from_stream(paced(filler(plan.num_bytes), schedule)))?;
    Ok(response)
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RangeQuery {
    chunk_size: Option<usize>,
    duration: Option<f64>,
}

pub(super) async fn range(
    State(state): State<AppState>,
    Path(n): Path<String>,
    Query(query): Query<RangeQuery>,
    headers: HeaderMap,
) -> Result<Response> {
    let max = state.config.max_byte_count;
    let total = match n.parse::<i64>() {
        Ok(n) if n > 0 && n as u64 <= max as u64 => n as usize,
        Ok(_) => return Err(Error::ByteCountOutOfRange { max }),
        Err(_) => return Err(Error::BadRequest("invalid number of bytes".into())),
    };

    let requested = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    let range = ByteRange::resolve(requested, total)?;
    tracing::debug!(
        start = range.start,
        end = range.end,
        total,
        "resolved byte range"
    );

    let chunk_size = query.chunk_size.unwrap_or(DEFAULT_RANGE_CHUNK).max(1);
    let schedule = range_schedule(
        chunk_size,
        range.len(),
        query.duration,
        state.config.max_drip_duration_secs,
    )?;

    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::ETAG, format!("range{total}"))
        .header(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"))
        .header(header::CONTENT_LENGTH, range.len());
    builder = if range.is_full() {
        builder.status(StatusCode::OK)
    } else {
        builder
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_RANGE, range.content_range())
    };

    let payload = alphabet_span(range.start, range.end);
    Ok(builder.body(Body::from_stream(paced(payload, schedule)))?)
}

/// Chunks of `chunk_size`, spread evenly over `duration` seconds when given.
fn range_schedule(
    chunk_size: usize,
    len: usize,
    duration: Option<f64>,
    max_duration_secs: f64,
) -> Result<Schedule> {
    let mut schedule = Schedule::immediate(chunk_size);
    let Some(secs) = duration else {
        return Ok(schedule);
    };
    if !secs.is_finite() {
        return Err(Error::BadRequest("duration must be finite".into()));
    }
    let window = Duration::from_secs_f64(secs.clamp(0.0, max_duration_secs.max(0.0)));
    let chunks = schedule.chunks_for(len).max(1) as u32;
    schedule.pause = window / chunks;
    schedule.lead = schedule.pause;
    Ok(schedule)
}
