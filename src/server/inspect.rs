//! Request inspection endpoints.

use super::extract::{PrettyJson, RequestInfo, Submission};
use crate::Result;
use axum::extract::Request;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Serialize)]
pub(super) struct GetResponse {
    args: Map<String, Value>,
    headers: BTreeMap<String, String>,
    origin: String,
    url: String,
}

/// Body shared by every endpoint that echoes a submitted request.
#[derive(Serialize)]
pub(super) struct SubmittedResponse {
    args: Map<String, Value>,
    data: String,
    files: Map<String, Value>,
    form: Map<String, Value>,
    headers: BTreeMap<String, String>,
    json: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    method: Option<String>,
    origin: String,
    url: String,
}

impl SubmittedResponse {
    pub(super) async fn read(info: RequestInfo, request: Request, with_method: bool) -> Result<Self> {
        let submission = Submission::read(request).await?;
        Ok(Self {
            args: info.args,
            data: submission.data,
            files: submission.files,
            form: submission.form,
            headers: info.headers,
            json: submission.json,
            method: with_method.then(|| info.method.to_string()),
            origin: info.origin,
            url: info.url,
        })
    }
}

pub(super) async fn get(info: RequestInfo) -> PrettyJson<GetResponse> {
    PrettyJson(GetResponse {
        args: info.args,
        headers: info.headers,
        origin: info.origin,
        url: info.url,
    })
}

pub(super) async fn submitted(
    info: RequestInfo,
    request: Request,
) -> Result<PrettyJson<SubmittedResponse>> {
    SubmittedResponse::read(info, request, false).await.map(PrettyJson)
}

pub(super) async fn anything(
    info: RequestInfo,
    request: Request,
) -> Result<PrettyJson<SubmittedResponse>> {
    SubmittedResponse::read(info, request, true).await.map(PrettyJson)
}

#[derive(Serialize)]
pub(super) struct Origin {
    origin: String,
}

pub(super) async fn ip(info: RequestInfo) -> PrettyJson<Origin> {
    PrettyJson(Origin {
        origin: info.origin,
    })
}

#[derive(Serialize)]
pub(super) struct Headers {
    headers: BTreeMap<String, String>,
}

pub(super) async fn headers(info: RequestInfo) -> PrettyJson<Headers> {
    PrettyJson(Headers {
        headers: info.headers,
    })
}

#[derive(Serialize)]
pub(super) struct UserAgent {
    #[serde(rename = "user-agent")]
    user_agent: String,
}

pub(super) async fn user_agent(info: RequestInfo) -> PrettyJson<UserAgent> {
    PrettyJson(UserAgent {
        user_agent: info.headers.get("User-Agent").cloned().unwrap_or_default(),
    })
}
