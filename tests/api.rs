use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use flate2::read::{GzDecoder, ZlibDecoder};
use http_body_util::BodyExt;
use httpprobe::{AppState, Config, StatusSelector, alphabet_span, app};
use serde_json::Value;
use std::io::Read;
use std::time::Duration;
use tower::ServiceExt;

fn state() -> AppState {
    AppState::new(Config::default())
        .unwrap()
        .with_selector(StatusSelector::seeded(7))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn gunzip(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    GzDecoder::new(data).read_to_end(&mut out).unwrap();
    out
}

fn inflate(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    ZlibDecoder::new(data).read_to_end(&mut out).unwrap();
    out
}

// --- compression ---

#[tokio::test]
async fn gzip_is_applied_when_accepted() {
    let req = Request::builder()
        .uri("/gzip")
        .header(header::ACCEPT_ENCODING, "deflate, gzip;q=0.8")
        .body(Body::empty())
        .unwrap();
    let resp = app(state()).oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_ENCODING], "gzip");
    assert_eq!(resp.headers()[header::VARY], "accept-encoding");
    assert!(!resp.headers().contains_key(header::CONTENT_LENGTH));
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/json");

    let json: Value = serde_json::from_slice(&gunzip(&body_bytes(resp).await)).unwrap();
    assert_eq!(json["gzipped"], true);
    assert_eq!(json["method"], "GET");
    assert_eq!(json["headers"]["Accept-Encoding"], "deflate, gzip;q=0.8");
}

#[tokio::test]
async fn gzip_is_skipped_when_not_accepted() {
    for accept in [None, Some("deflate"), Some("gzip;q=0")] {
        let mut req = Request::builder().uri("/gzip");
        if let Some(accept) = accept {
            req = req.header(header::ACCEPT_ENCODING, accept);
        }
        let resp = app(state())
            .oneshot(req.body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(!resp.headers().contains_key(header::CONTENT_ENCODING), "{accept:?}");
        assert_eq!(resp.headers()[header::VARY], "accept-encoding");
        let json: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert_eq!(json["gzipped"], false);
    }
}

#[tokio::test]
async fn deflate_round_trip() {
    let req = Request::builder()
        .method("POST")
        .uri("/deflate")
        .header(header::ACCEPT_ENCODING, "deflate")
        .body(Body::empty())
        .unwrap();
    let resp = app(state()).oneshot(req).await.unwrap();

    assert_eq!(resp.headers()[header::CONTENT_ENCODING], "deflate");
    let json: Value = serde_json::from_slice(&inflate(&body_bytes(resp).await)).unwrap();
    assert_eq!(json["deflated"], true);
    assert_eq!(json["method"], "POST");
    assert!(json.get("gzipped").is_none());
}

#[tokio::test]
async fn head_request_is_not_encoded() {
    let req = Request::builder()
        .method("HEAD")
        .uri("/gzip")
        .header(header::ACCEPT_ENCODING, "gzip")
        .body(Body::empty())
        .unwrap();
    let resp = app(state()).oneshot(req).await.unwrap();
    assert!(!resp.headers().contains_key(header::CONTENT_ENCODING));
}

// --- status ---

#[tokio::test]
async fn status_single_code() {
    let resp = app(state()).oneshot(get("/status/418")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
    assert!(body_bytes(resp).await.is_empty());
}

#[tokio::test]
async fn status_any_method() {
    let req = Request::builder()
        .method("DELETE")
        .uri("/status/503")
        .body(Body::empty())
        .unwrap();
    let resp = app(state()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn status_zero_weight_is_never_drawn() {
    let app = app(state());
    for _ in 0..50 {
        let resp = app
            .clone()
            .oneshot(get("/status/201,500:0"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
    }
}

#[tokio::test]
async fn status_weighted_draws_every_positive_code() {
    let app = app(state());
    let mut seen = std::collections::HashSet::new();
    for _ in 0..200 {
        let resp = app
            .clone()
            .oneshot(get("/status/200:1,404:1,500:1"))
            .await
            .unwrap();
        seen.insert(resp.status().as_u16());
    }
    assert_eq!(seen, [200, 404, 500].into_iter().collect());
}

#[tokio::test]
async fn status_rejects_bad_input() {
    for uri in ["/status/abc", "/status/200,abc", "/status/200:x,500", "/status/200:0,500:0"] {
        let resp = app(state()).oneshot(get(uri)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
    let resp = app(state()).oneshot(get("/status/abc")).await.unwrap();
    assert_eq!(body_bytes(resp).await, "Invalid status code");
}

#[tokio::test]
async fn status_accepts_percent_encoded_comma() {
    let app = app(state());
    for _ in 0..20 {
        let resp = app.clone().oneshot(get("/status/200%2C500")).await.unwrap();
        assert!(
            matches!(resp.status().as_u16(), 200 | 500),
            "{}",
            resp.status()
        );
    }
}

#[tokio::test]
async fn status_rejects_overflowing_weight_total() {
    let resp = app(state())
        .oneshot(get("/status/200:1e308,500:1e308"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- range ---

fn range_request(uri: &str, range: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::RANGE, range)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn range_partial_content() {
    for chunk_size in [1, 1000, 10000] {
        let uri = format!("/range/10000?chunk_size={chunk_size}");
        let resp = app(state())
            .oneshot(range_request(&uri, "bytes=500-1999"))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(resp.headers()[header::CONTENT_RANGE], "bytes 500-1999/10000");
        assert_eq!(resp.headers()[header::CONTENT_LENGTH], "1500");
        assert_eq!(resp.headers()[header::ETAG], "range10000");
        assert_eq!(resp.headers()[header::ACCEPT_RANGES], "bytes");
        assert_eq!(body_bytes(resp).await, alphabet_span(500, 1999));
    }
}

#[tokio::test]
async fn range_covering_everything_is_200() {
    let resp = app(state())
        .oneshot(range_request("/range/10000", "bytes=0-9999"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(!resp.headers().contains_key(header::CONTENT_RANGE));
    assert_eq!(body_bytes(resp).await.len(), 10000);

    let resp = app(state()).oneshot(get("/range/26")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_bytes(resp).await, "abcdefghijklmnopqrstuvwxyz");
}

#[tokio::test]
async fn range_suffix() {
    let resp = app(state())
        .oneshot(range_request("/range/10000", "bytes=-500"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(resp.headers()[header::CONTENT_RANGE], "bytes 9500-9999/10000");
    assert_eq!(body_bytes(resp).await.len(), 500);
}

#[tokio::test]
async fn range_unsatisfiable() {
    for range in ["bytes=100-1", "bytes=100-10000", "bytes=0-1,5-6"] {
        let resp = app(state())
            .oneshot(range_request("/range/10000", range))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE, "{range}");
        assert_eq!(resp.headers()[header::CONTENT_RANGE], "bytes */10000");
    }
}

#[tokio::test]
async fn range_size_limit() {
    let resp = app(state()).oneshot(get("/range/102401")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app(state()).oneshot(get("/range/0")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app(state()).oneshot(get("/range/102400")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn range_spread_over_duration() {
    let start = tokio::time::Instant::now();
    let resp = app(state())
        .oneshot(get("/range/100?chunk_size=10&duration=1"))
        .await
        .unwrap();
    assert_eq!(body_bytes(resp).await.len(), 100);
    let elapsed = start.elapsed();
    assert!(
        elapsed >= Duration::from_millis(990) && elapsed < Duration::from_millis(1100),
        "{elapsed:?}"
    );
}

// --- drip ---

#[tokio::test(start_paused = true)]
async fn drip_spreads_bytes_over_duration() {
    let start = tokio::time::Instant::now();
    let resp = app(state())
        .oneshot(get("/drip?numbytes=10&duration=2&delay=0"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_LENGTH], "10");
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/octet-stream");
    assert_eq!(body_bytes(resp).await, "**********");

    let elapsed = start.elapsed();
    assert!(
        elapsed >= Duration::from_millis(1900) && elapsed <= Duration::from_millis(2500),
        "{elapsed:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn drip_waits_for_delay_before_responding() {
    let start = tokio::time::Instant::now();
    let resp = app(state())
        .oneshot(get("/drip?numbytes=5&duration=0.1&delay=1&code=201"))
        .await
        .unwrap();
    assert!(start.elapsed() >= Duration::from_secs(1));
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(body_bytes(resp).await.len(), 5);
}

#[tokio::test]
async fn drip_rejects_invalid_code() {
    let resp = app(state())
        .oneshot(get("/drip?code=1000&delay=0"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- dynamic data ---

#[tokio::test]
async fn stream_bytes_is_seeded() {
    let uri = "/stream-bytes/5000?seed=1234&chunk_size=100";
    let first = app(state()).oneshot(get(uri)).await.unwrap();
    assert!(!first.headers().contains_key(header::CONTENT_LENGTH));
    let first = body_bytes(first).await;
    let second = body_bytes(app(state()).oneshot(get(uri)).await.unwrap()).await;

    assert_eq!(first.len(), 5000);
    assert_eq!(first, second);

    let other = app(state())
        .oneshot(get("/stream-bytes/5000?seed=4321"))
        .await
        .unwrap();
    assert_ne!(body_bytes(other).await, first);
}

#[tokio::test]
async fn bytes_are_truncated_to_limit() {
    let resp = app(state()).oneshot(get("/bytes/200000?seed=1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_bytes(resp).await.len(), 100 * 1024);

    let resp = app(state()).oneshot(get("/bytes/-1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stream_emits_json_lines() {
    let resp = app(state()).oneshot(get("/stream/3")).await.unwrap();
    let body = body_bytes(resp).await;
    let lines: Vec<Value> = body
        .split(|&b| b == b'\n')
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_slice(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[2]["id"], 2);
}

#[tokio::test]
async fn base64_decodes_both_alphabets() {
    let resp = app(state()).oneshot(get("/base64/aGVsbG8=")).await.unwrap();
    assert_eq!(body_bytes(resp).await, "hello");

    let resp = app(state()).oneshot(get("/base64/-_8=")).await.unwrap();
    assert_eq!(body_bytes(resp).await.as_ref(), &[0xfb, 0xff]);

    let resp = app(state()).oneshot(get("/base64/!!!")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test(start_paused = true)]
async fn delay_is_capped() {
    let start = tokio::time::Instant::now();
    let resp = app(state()).oneshot(get("/delay/30")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(10) && elapsed < Duration::from_secs(11));

    let resp = app(state()).oneshot(get("/delay/-1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test(start_paused = true)]
async fn delay_echoes_request_without_json() {
    let req = Request::builder()
        .method("POST")
        .uri("/delay/0?a=1")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"k":"v"}"#))
        .unwrap();
    let resp = app(state()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        ["args", "data", "files", "form", "headers", "origin", "url"]
    );
    assert_eq!(json["args"]["a"], "1");
    assert_eq!(json["data"], r#"{"k":"v"}"#);
}

#[tokio::test]
async fn links_page_marks_offset() {
    let resp = app(state()).oneshot(get("/links/100/50")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(
        resp.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );
    let page = String::from_utf8(body_bytes(resp).await.to_vec()).unwrap();
    assert!(page.contains("<a href='/links/100/99'>99</a>"));
    assert!(page.contains(" 50 "));
    assert!(!page.contains("/links/100/50'"));

    let resp = app(state()).oneshot(get("/links/1000/0")).await.unwrap();
    let page = String::from_utf8(body_bytes(resp).await.to_vec()).unwrap();
    assert!(page.contains("/links/200/199'"));
    assert!(!page.contains("/links/200/200'"));
}

#[tokio::test]
async fn uuid_is_v4() {
    let resp = app(state()).oneshot(get("/uuid")).await.unwrap();
    let json: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    let uuid = uuid::Uuid::parse_str(json["uuid"].as_str().unwrap()).unwrap();
    assert_eq!(uuid.get_version_num(), 4);
}

// --- cookies ---

fn with_cookie(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

fn set_cookies(resp: &axum::response::Response) -> Vec<String> {
    let mut values: Vec<String> = resp
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_owned())
        .collect();
    values.sort();
    values
}

fn assert_redirects_to_list(resp: &axum::response::Response) {
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(resp.headers()[header::LOCATION], "/cookies");
}

#[tokio::test]
async fn cookies_are_listed() {
    let resp = app(state())
        .oneshot(with_cookie("/cookies", "hello=world; flavor=oat"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"cookies": {"flavor": "oat", "hello": "world"}})
    );

    let resp = app(state()).oneshot(get("/cookies")).await.unwrap();
    let json: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(json, serde_json::json!({"cookies": {}}));
}

#[tokio::test]
async fn cookies_set_from_query() {
    let resp = app(state())
        .oneshot(get("/cookies/set?hello=world&flavor=oat&hello=again"))
        .await
        .unwrap();
    assert_redirects_to_list(&resp);
    assert_eq!(
        set_cookies(&resp),
        ["flavor=oat; Path=/", "hello=world; Path=/"]
    );
}

#[tokio::test]
async fn cookies_set_from_path() {
    let resp = app(state())
        .oneshot(get("/cookies/set/hello/world"))
        .await
        .unwrap();
    assert_redirects_to_list(&resp);
    assert_eq!(set_cookies(&resp), ["hello=world; Path=/"]);
}

#[tokio::test]
async fn cookies_delete_expires_only_sent_cookies() {
    let resp = app(state())
        .oneshot(with_cookie(
            "/cookies/delete?hello=&missing=",
            "hello=world; flavor=oat",
        ))
        .await
        .unwrap();
    assert_redirects_to_list(&resp);
    assert_eq!(set_cookies(&resp), ["hello=world; Path=/; Max-Age=0"]);
}

// --- inspection ---

#[tokio::test]
async fn get_echoes_request() {
    let req = Request::builder()
        .uri("/get?a=1&b=2&b=3")
        .header(header::HOST, "probe.test")
        .header("x-forwarded-for", "198.51.100.4")
        .body(Body::empty())
        .unwrap();
    let resp = app(state()).oneshot(req).await.unwrap();
    let body = body_bytes(resp).await;
    assert!(body.starts_with(b"{\n  \""), "pretty printed");

    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["args"]["a"], "1");
    assert_eq!(json["args"]["b"], serde_json::json!(["2", "3"]));
    assert_eq!(json["origin"], "198.51.100.4");
    assert_eq!(json["url"], "http://probe.test/get?a=1&b=2&b=3");
}

#[tokio::test]
async fn post_reports_json_and_form() {
    let req = Request::builder()
        .method("POST")
        .uri("/post")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"hello":"world"}"#))
        .unwrap();
    let resp = app(state()).oneshot(req).await.unwrap();
    let json: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(json["json"]["hello"], "world");
    assert_eq!(json["data"], r#"{"hello":"world"}"#);
    assert!(json.get("method").is_none());

    let req = Request::builder()
        .method("PUT")
        .uri("/anything/deep/path")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("name=probe"))
        .unwrap();
    let resp = app(state()).oneshot(req).await.unwrap();
    let json: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(json["form"]["name"], "probe");
    assert_eq!(json["data"], "");
    assert_eq!(json["method"], "PUT");
}

#[tokio::test]
async fn method_routes_are_strict() {
    let resp = app(state()).oneshot(get("/post")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn user_agent_and_headers() {
    let req = Request::builder()
        .uri("/user-agent")
        .header(header::USER_AGENT, "probe/1.0")
        .body(Body::empty())
        .unwrap();
    let resp = app(state()).oneshot(req).await.unwrap();
    let json: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(json["user-agent"], "probe/1.0");

    let req = Request::builder()
        .uri("/headers")
        .header("x-probe", "yes")
        .body(Body::empty())
        .unwrap();
    let resp = app(state()).oneshot(req).await.unwrap();
    let json: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(json["headers"]["X-Probe"], "yes");
}
