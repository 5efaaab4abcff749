//! Synthesized payloads, delays and status codes.

use super::AppState;
use super::extract::{PrettyJson, RequestInfo, Submission};
use crate::pacing::{Schedule, paced};
use crate::payload::random_bytes;
use crate::select::StatusChoice;
use crate::{Error, Result};
use axum::body::Body;
use axum::extract::{Path, Query, Request, State};
use axum::response::{Html, IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use bytes::Bytes;
use futures_util::stream;
use http::{StatusCode, header};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt::Write;
use std::time::Duration;
use uuid::Uuid;

const DEFAULT_STREAM_CHUNK: usize = 10 * 1024;
const MAX_LINKS: i64 = 200;

#[derive(Serialize)]
pub(super) struct UuidResponse {
    uuid: Uuid,
}

pub(super) async fn uuid() -> PrettyJson<UuidResponse> {
    PrettyJson(UuidResponse {
        uuid: Uuid::new_v4(),
    })
}

/// Echo of a delayed request; unlike the submission endpoints it carries no
/// parsed `json` field.
#[derive(Serialize)]
pub(super) struct DelayResponse {
    args: Map<String, Value>,
    data: String,
    files: Map<String, Value>,
    form: Map<String, Value>,
    headers: BTreeMap<String, String>,
    origin: String,
    url: String,
}

pub(super) async fn delay(
    State(state): State<AppState>,
    Path(delay): Path<String>,
    info: RequestInfo,
    request: Request,
) -> Result<PrettyJson<DelayResponse>> {
    let secs = delay
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| Error::BadRequest("invalid number of delay".into()))?;
    let secs = secs.min(state.config.max_delay_secs);

    tokio::time::sleep(Duration::from_secs_f64(secs)).await;
    let submission = Submission::read(request).await?;
    Ok(PrettyJson(DelayResponse {
        args: info.args,
        data: submission.data,
        files: submission.files,
        form: submission.form,
        headers: info.headers,
        origin: info.origin,
        url: info.url,
    }))
}

pub(super) async fn base64(Path(value): Path<String>) -> Result<Response> {
    let value = value.trim();
    let decoded = STANDARD
        .decode(value)
        .or_else(|_| URL_SAFE.decode(value))
        .map_err(|_| {
            Error::BadRequest("Incorrect Base64 data try: RUNIT0JJTiBpcyBhd2Vzb21l".into())
        })?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        decoded,
    )
        .into_response())
}

/// Parses a non-negative count and truncates it to `max`.
fn byte_count(raw: &str, max: usize) -> Result<usize> {
    let n: i64 = raw
        .parse()
        .map_err(|_| Error::BadRequest("invalid number of bytes".into()))?;
    if n < 0 {
        return Err(Error::BadRequest("invalid number of bytes".into()));
    }
    Ok((n as u64).min(max as u64) as usize)
}

#[derive(Debug, Deserialize)]
pub(super) struct BytesQuery {
    seed: Option<u64>,
    chunk_size: Option<usize>,
}

pub(super) async fn bytes(
    State(state): State<AppState>,
    Path(n): Path<String>,
    Query(query): Query<BytesQuery>,
) -> Result<Response> {
    let n = byte_count(&n, state.config.max_byte_count)?;
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        random_bytes(n, query.seed),
    )
        .into_response())
}

pub(super) async fn stream_bytes(
    State(state): State<AppState>,
    Path(n): Path<String>,
    Query(query): Query<BytesQuery>,
) -> Result<Response> {
    let n = byte_count(&n, state.config.max_byte_count)?;
    let chunk_size = query.chunk_size.unwrap_or(DEFAULT_STREAM_CHUNK).max(1);
    let body = paced(random_bytes(n, query.seed), Schedule::immediate(chunk_size));
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        Body::from_stream(body),
    )
        .into_response())
}

#[derive(Serialize)]
struct StreamLine<'a> {
    args: &'a Map<String, Value>,
    headers: &'a BTreeMap<String, String>,
    origin: &'a str,
    url: &'a str,
    id: usize,
}

pub(super) async fn stream(
    State(state): State<AppState>,
    Path(n): Path<String>,
    info: RequestInfo,
) -> Result<Response> {
    let n: i64 = n
        .parse()
        .map_err(|_| Error::BadRequest("invalid number of JSON objects".into()))?;
    if n < 0 {
        return Err(Error::BadRequest("invalid number of JSON objects".into()));
    }
    let n = (n as u64).min(state.config.max_stream_lines as u64) as usize;

    let mut lines = Vec::with_capacity(n);
    for id in 0..n {
        let line = StreamLine {
            args: &info.args,
            headers: &info.headers,
            origin: &info.origin,
            url: &info.url,
            id,
        };
        let mut encoded = serde_json::to_vec(&line).map_err(|e| Error::Io(e.into()))?;
        encoded.push(b'\n');
        lines.push(Ok::<_, Infallible>(Bytes::from(encoded)));
    }

    Ok((
        [(header::CONTENT_TYPE, "application/json")],
        Body::from_stream(stream::iter(lines)),
    )
        .into_response())
}

/// A page of `n` numbered links to sibling pages; entry `offset` is plain
/// text. `n` is clamped to `1..=200`.
pub(super) async fn links(Path((n, offset)): Path<(i64, i64)>) -> Html<String> {
    Html(links_page(n.clamp(1, MAX_LINKS), offset))
}

fn links_page(n: i64, offset: i64) -> String {
    let mut page = String::from("<html><head><title>Links</title></head><body>");
    for i in 0..n {
        if i == offset {
            let _ = write!(page, "{i} ");
        } else {
            let _ = write!(page, "<a href='/links/{n}/{i}'>{i}</a> ");
        }
    }
    page.push_str("</body></html>");
    page
}

pub(super) async fn status(
    State(state): State<AppState>,
    Path(codes): Path<String>,
) -> Result<StatusCode> {
    let choice = StatusChoice::parse(&codes)?;
    let status = state.selector.select(&choice)?;
    tracing::debug!(codes = %codes, status = status.as_u16(), "selected status");
    Ok(status)
}
