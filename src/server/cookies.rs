//! Cookie listing, setting and deletion.

use super::extract::PrettyJson;
use axum::extract::{Path, Query};
use axum::response::IntoResponse;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use cookie::time::Duration;
use http::{StatusCode, header};
use serde::Serialize;
use std::collections::BTreeMap;

const COOKIES_PATH: &str = "/cookies";

#[derive(Serialize)]
pub(super) struct CookiesResponse {
    cookies: BTreeMap<String, String>,
}

pub(super) async fn list(jar: CookieJar) -> PrettyJson<CookiesResponse> {
    let cookies = jar
        .iter()
        .map(|c| (c.name().to_owned(), c.value().to_owned()))
        .collect();
    PrettyJson(CookiesResponse { cookies })
}

/// 302 back to the cookie list, carrying the jar's `Set-Cookie` headers.
fn found(jar: CookieJar) -> impl IntoResponse {
    (StatusCode::FOUND, jar, [(header::LOCATION, COOKIES_PATH)])
}

fn site_wide(name: String, value: String) -> Cookie<'static> {
    Cookie::build((name, value)).path("/").build()
}

/// Sets one cookie per query key; a repeated key keeps its first value.
pub(super) async fn set_from_query(
    jar: CookieJar,
    Query(pairs): Query<Vec<(String, String)>>,
) -> impl IntoResponse {
    let mut first = BTreeMap::new();
    for (name, value) in pairs {
        first.entry(name).or_insert(value);
    }
    let jar = first
        .into_iter()
        .fold(jar, |jar, (name, value)| jar.add(site_wide(name, value)));
    found(jar)
}

pub(super) async fn set_from_path(
    jar: CookieJar,
    Path((name, value)): Path<(String, String)>,
) -> impl IntoResponse {
    found(jar.add(site_wide(name, value)))
}

/// Expires every request cookie named in the query string. Names the client
/// did not send are ignored.
pub(super) async fn delete(
    jar: CookieJar,
    Query(pairs): Query<Vec<(String, String)>>,
) -> impl IntoResponse {
    let expired: Vec<Cookie<'static>> = pairs
        .iter()
        .filter_map(|(name, _)| jar.get(name))
        .map(|c| {
            let mut cookie = site_wide(c.name().to_owned(), c.value().to_owned());
            cookie.set_max_age(Duration::ZERO);
            cookie
        })
        .collect();

    tracing::debug!(count = expired.len(), "expiring cookies");
    let jar = expired.into_iter().fold(jar, CookieJar::add);
    found(jar)
}
