//! What handlers learn about the request, and how they answer in JSON.

use crate::{Error, Result};
use axum::Form;
use axum::extract::{ConnectInfo, FromRequest, FromRequestParts, Query, Request};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::request::Parts;
use http::{HeaderMap, Method, header};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::net::SocketAddr;

/// The parts of a request every inspection response echoes back.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub method: Method,
    /// Query parameters; repeated keys collect into an array.
    pub args: Map<String, Value>,
    /// Canonical header names mapped to their first value.
    pub headers: BTreeMap<String, String>,
    /// Client address, honoring `X-Forwarded-For` and `X-Real-IP`.
    pub origin: String,
    pub url: String,
}

impl<S: Send + Sync> FromRequestParts<S> for RequestInfo {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let args = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
            .map(|Query(pairs)| fold_pairs(pairs))
            .unwrap_or_default();
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(Self {
            method: parts.method.clone(),
            args,
            headers: first_values(&parts.headers),
            origin: origin(&parts.headers, peer),
            url: url(parts),
        })
    }
}

/// Groups `key=value` pairs; a key seen once maps to a string, a repeated key
/// to an array of strings.
pub(crate) fn fold_pairs(pairs: Vec<(String, String)>) -> Map<String, Value> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in pairs {
        grouped.entry(key).or_default().push(value);
    }
    grouped
        .into_iter()
        .map(|(key, mut values)| {
            let value = if values.len() == 1 {
                Value::String(values.remove(0))
            } else {
                Value::from(values)
            };
            (key, value)
        })
        .collect()
}

fn first_values(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (name, value) in headers {
        out.entry(canonical_name(name.as_str()))
            .or_insert_with(|| String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    out
}

/// `x-forwarded-for` becomes `X-Forwarded-For`.
fn canonical_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn origin(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or(real_ip)
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_default()
}

fn url(parts: &Parts) -> String {
    let host = parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| parts.uri.authority().map(|a| a.to_string()))
        .unwrap_or_default();
    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    format!("http://{host}{path}")
}

/// A request body as the submission endpoints report it.
#[derive(Debug, Default)]
pub(crate) struct Submission {
    /// Raw body text; empty when the body was a form.
    pub data: String,
    pub files: Map<String, Value>,
    pub form: Map<String, Value>,
    /// The body parsed as JSON, or `null`.
    pub json: Value,
}

impl Submission {
    pub(crate) async fn read(request: Request) -> Result<Self> {
        let is_form = request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

        if is_form {
            let Form(pairs) = Form::<Vec<(String, String)>>::from_request(request, &())
                .await
                .map_err(|e| Error::BadRequest(e.body_text()))?;
            return Ok(Self {
                form: fold_pairs(pairs),
                ..Self::default()
            });
        }

        let body = Bytes::from_request(request, &())
            .await
            .map_err(|e| Error::BadRequest(e.body_text()))?;
        Ok(Self {
            json: serde_json::from_slice(&body).unwrap_or(Value::Null),
            data: String::from_utf8_lossy(&body).into_owned(),
            ..Self::default()
        })
    }
}

/// JSON response pretty-printed with a two-space indent.
#[derive(Debug, Clone)]
pub struct PrettyJson<T>(pub T);

impl<T: Serialize> IntoResponse for PrettyJson<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec_pretty(&self.0) {
            Ok(mut body) => {
                body.push(b'\n');
                ([(header::CONTENT_TYPE, "application/json")], body).into_response()
            }
            Err(e) => Error::Io(e.into()).into_response(),
        }
    }
}
