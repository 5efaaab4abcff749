//! `/gzip` and `/deflate`: JSON bodies served through the compression layer.

use super::extract::{PrettyJson, RequestInfo};
use crate::codec::Codec;
use crate::service::Negotiated;
use axum::Extension;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Serialize)]
pub(super) struct Encoded {
    origin: String,
    headers: BTreeMap<String, String>,
    method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    gzipped: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deflated: Option<bool>,
}

impl Encoded {
    fn new(info: RequestInfo) -> Self {
        Self {
            origin: info.origin,
            headers: info.headers,
            method: info.method.to_string(),
            gzipped: None,
            deflated: None,
        }
    }
}

pub(super) async fn gzipped(
    Extension(Negotiated(codec)): Extension<Negotiated>,
    info: RequestInfo,
) -> PrettyJson<Encoded> {
    PrettyJson(Encoded {
        gzipped: Some(codec == Some(Codec::Gzip)),
        ..Encoded::new(info)
    })
}

pub(super) async fn deflated(
    Extension(Negotiated(codec)): Extension<Negotiated>,
    info: RequestInfo,
) -> PrettyJson<Encoded> {
    PrettyJson(Encoded {
        deflated: Some(codec == Some(Codec::Deflate)),
        ..Encoded::new(info)
    })
}
