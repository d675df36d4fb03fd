//! Tests for the HTTP controller, transports and helpers.

use super::methods::expand_home;
use super::*;
use async_trait::async_trait;
use futures_util::FutureExt;
use httpmock::MockServer;
use httpmock::Method::{GET, POST};
use serde::Deserialize;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

/// Transport answering every request with `{"ok": true}` and counting closes.
struct CountingTransport {
    requests: AtomicUsize,
    closes: AtomicUsize,
}

impl CountingTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            requests: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        })
    }

    fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for CountingTransport {
    async fn handle_request(&self, request: &HttpRequest, _stream: bool) -> Result<HttpResponse> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(HttpResponse::buffered(
            StatusCode::OK,
            request.url.clone(),
            b"{\"ok\": true}".to_vec(),
        ))
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

fn counting_config(transport: &Arc<CountingTransport>) -> ControllerConfig {
    ControllerConfig::new()
        .with_url("https://example.test/status")
        .with_transport(transport.clone())
}

fn entered(config: ControllerConfig) -> HttpController {
    let mut http = HttpController::new(config);
    http.enter().unwrap();
    http
}

#[derive(Debug, Deserialize, PartialEq)]
struct Item {
    id: u32,
    name: String,
}

// ==================== Scope tests ====================

#[tokio::test]
async fn test_scope_closes_once_on_success() {
    let transport = CountingTransport::new();

    let value: serde_json::Value = HttpController::scope(counting_config(&transport), |http| {
        async move {
            let request = http.new_request("get", "", RequestOptions::new())?;
            let response = http.send_request(&request, false, None).await?;
            http.decode_res_content(&response)
        }
        .boxed()
    })
    .await
    .unwrap();

    assert_eq!(value, serde_json::json!({"ok": true}));
    assert_eq!(transport.requests.load(Ordering::SeqCst), 1);
    assert_eq!(transport.closes(), 1);
}

#[tokio::test]
async fn test_scope_closes_once_on_error() {
    let transport = CountingTransport::new();

    let result: Result<()> = HttpController::scope(counting_config(&transport), |_http| {
        async move { Err(HttpError::Validation("boom".into())) }.boxed()
    })
    .await;

    assert!(matches!(result, Err(HttpError::Validation(msg)) if msg == "boom"));
    assert_eq!(transport.closes(), 1);
}

#[tokio::test]
async fn test_scope_closes_once_on_panic() {
    let transport = CountingTransport::new();
    let config = counting_config(&transport);
    let fail = true;

    let outcome = AssertUnwindSafe(HttpController::scope(config, move |_http| {
        async move {
            if fail {
                panic!("scope body panicked");
            }
            Ok(())
        }
        .boxed()
    }))
    .catch_unwind()
    .await;

    assert!(outcome.is_err());
    assert_eq!(transport.closes(), 1);
}

#[tokio::test]
async fn test_exit_closes_exactly_once() {
    let transport = CountingTransport::new();
    let mut http = entered(counting_config(&transport));
    assert!(http.is_open());

    http.exit(None).await;
    http.exit(Some(&HttpError::NotEntered)).await;

    assert!(!http.is_open());
    assert_eq!(transport.closes(), 1);
    assert!(matches!(http.client(), Err(HttpError::NotEntered)));
}

#[tokio::test]
async fn test_enter_rejects_bad_config() {
    for config in [
        ControllerConfig::new().with_timeout(0.0),
        ControllerConfig::new().with_timeout(-1.0),
        ControllerConfig::new().with_timeout(f64::NAN),
        ControllerConfig::new().with_timeout(1e20),
        ControllerConfig::new().with_url("not a url"),
        ControllerConfig::new().with_limits(Limits {
            max_connections: Some(0),
            ..Limits::default()
        }),
    ] {
        let mut http = HttpController::new(config);
        assert!(matches!(http.enter(), Err(HttpError::Validation(_))));
        assert!(!http.is_open());
    }
}

// ==================== Request building tests ====================

#[tokio::test]
async fn test_new_request_requires_open_client() {
    let http = HttpController::new(ControllerConfig::new());
    let result = http.new_request("GET", "https://example.test", RequestOptions::new());
    assert!(matches!(result, Err(HttpError::NotEntered)));
}

#[tokio::test]
async fn test_new_request_validates_inputs() {
    let transport = CountingTransport::new();
    let http = entered(ControllerConfig::new().with_transport(transport.clone()));

    let cases = [
        http.new_request("", "https://example.test", RequestOptions::new()),
        http.new_request("GE T", "https://example.test", RequestOptions::new()),
        http.new_request("GET", "", RequestOptions::new()),
        http.new_request("GET", "/relative", RequestOptions::new()),
        http.new_request("GET", "https://example.test", RequestOptions::new().timeout(0.0)),
        http.new_request("GET", "https://example.test", RequestOptions::new().timeout(-5.0)),
        http.new_request(
            "GET",
            "https://example.test",
            RequestOptions::new().timeout(f64::INFINITY),
        ),
        http.new_request("GET", "https://example.test", RequestOptions::new().timeout(1e20)),
        http.new_request(
            "GET",
            "https://example.test",
            RequestOptions::new().header("bad header", "x"),
        ),
    ];

    for (i, result) in cases.into_iter().enumerate() {
        assert!(
            matches!(result, Err(HttpError::Validation(_))),
            "case {i} should fail validation"
        );
    }
}

#[tokio::test]
async fn test_new_request_uppercases_method_and_applies_timeout() {
    let transport = CountingTransport::new();
    let http = entered(counting_config(&transport).with_timeout(15.0));

    let request = http.new_request("patch", "", RequestOptions::new()).unwrap();
    assert_eq!(request.method, Method::PATCH);
    assert_eq!(request.url.as_str(), "https://example.test/status");
    assert_eq!(request.timeout, Some(Duration::from_secs(15)));

    let request = http
        .new_request("get", "", RequestOptions::new().timeout(2.5))
        .unwrap();
    assert_eq!(request.timeout, Some(Duration::from_millis(2500)));
}

#[tokio::test]
async fn test_new_request_resolves_urls() {
    let transport = CountingTransport::new();
    let http = entered(
        ControllerConfig::new()
            .with_base_url("https://api.test/v1")
            .with_transport(transport.clone()),
    );

    let request = http.new_request("GET", "/items", RequestOptions::new()).unwrap();
    assert_eq!(request.url.as_str(), "https://api.test/v1/items");

    let request = http.new_request("GET", "items/7", RequestOptions::new()).unwrap();
    assert_eq!(request.url.as_str(), "https://api.test/v1/items/7");

    let request = http
        .new_request("GET", "https://other.test/x", RequestOptions::new())
        .unwrap();
    assert_eq!(request.url.as_str(), "https://other.test/x");

    let parsed = url::Url::parse("https://parsed.test/y").unwrap();
    let request = http.new_request("GET", &parsed, RequestOptions::new()).unwrap();
    assert_eq!(request.url, parsed);
}

#[tokio::test]
async fn test_new_request_merges_defaults() {
    let transport = CountingTransport::new();
    let http = entered(
        counting_config(&transport)
            .with_header("X-App", "kit")
            .with_header("Accept", "application/json")
            .with_param("a", "1")
            .with_cookie("session", "abc")
            .with_cookie("lang", "ru"),
    );

    let options = RequestOptions::new()
        .header("X-App", "override")
        .param("b", "2")
        .cookie("lang", "en")
        .json(serde_json::json!({"name": "widget"}));
    let request = http.new_request("post", "", options).unwrap();

    assert_eq!(request.url.query(), Some("a=1&b=2"));
    assert_eq!(request.headers["x-app"], "override");
    assert_eq!(request.headers["accept"], "application/json");
    assert_eq!(request.headers["cookie"], "session=abc; lang=en");
    assert_eq!(request.headers["content-type"], "application/json");
    assert_eq!(
        serde_json::from_slice::<serde_json::Value>(request.body.as_deref().unwrap()).unwrap(),
        serde_json::json!({"name": "widget"})
    );
}

#[test]
fn test_auth_header_values() {
    let basic = Auth::basic("user", "pass").header_value().unwrap();
    assert_eq!(basic, "Basic dXNlcjpwYXNz");
    assert!(basic.is_sensitive());

    let bearer = Auth::bearer("tok").header_value().unwrap();
    assert_eq!(bearer, "Bearer tok");

    assert!(!format!("{:?}", Auth::basic("user", "pass")).contains("pass"));
}

// ==================== Network tests ====================

#[tokio::test]
async fn test_send_request_and_decode_json() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/items/1")
                .query_param("verbose", "true")
                .header("x-app", "kit");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({"id": 1, "name": "widget"}));
        })
        .await;

    let http = entered(
        ControllerConfig::new()
            .with_base_url(server.base_url())
            .with_header("X-App", "kit")
            .with_param("verbose", "true"),
    );
    let request = http.new_request("get", "/items/1", RequestOptions::new()).unwrap();
    let response = http.send_request(&request, false, None).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.reason_phrase(), "OK");
    assert!(!response.from_cache());
    let item: Item = http.decode_res_content(&response).unwrap();
    assert_eq!(item, Item { id: 1, name: "widget".into() });
    mock.assert_async().await;
}

#[tokio::test]
async fn test_auth_default_and_request_override() {
    let server = MockServer::start_async().await;
    let basic = server
        .mock_async(|when, then| {
            when.method(GET).path("/basic").header("authorization", "Basic dXNlcjpwYXNz");
            then.status(200).body("{}");
        })
        .await;
    let bearer = server
        .mock_async(|when, then| {
            when.method(GET).path("/bearer").header("authorization", "Bearer tok");
            then.status(200).body("{}");
        })
        .await;

    let http = entered(ControllerConfig::new().with_auth(Auth::basic("user", "pass")));

    let request = http
        .new_request("GET", server.url("/basic"), RequestOptions::new())
        .unwrap();
    http.send_request(&request, false, None).await.unwrap();

    let request = http
        .new_request("GET", server.url("/bearer"), RequestOptions::new())
        .unwrap();
    http.send_request(&request, false, Some(&Auth::bearer("tok")))
        .await
        .unwrap();

    basic.assert_async().await;
    bearer.assert_async().await;
}

#[tokio::test]
async fn test_redirects_not_followed_by_default() {
    let server = MockServer::start_async().await;
    let old = server
        .mock_async(|when, then| {
            when.method(GET).path("/old");
            then.status(302).header("Location", "/new");
        })
        .await;

    let http = entered(ControllerConfig::new());
    let request = http
        .new_request("GET", server.url("/old"), RequestOptions::new())
        .unwrap();
    let response = http.send_request(&request, false, None).await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()["location"], "/new");
    old.assert_async().await;
}

#[tokio::test]
async fn test_redirects_followed_when_enabled() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/old");
            then.status(301).header("Location", "/new");
        })
        .await;
    let new = server
        .mock_async(|when, then| {
            when.method(GET).path("/new");
            then.status(200).body("{\"moved\": true}");
        })
        .await;

    let http = entered(ControllerConfig::new().with_follow_redirects(true));
    let request = http
        .new_request("GET", server.url("/old"), RequestOptions::new())
        .unwrap();
    let response = http.send_request(&request, false, None).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.url().path(), "/new");
    new.assert_async().await;
}

#[tokio::test]
async fn test_see_other_turns_post_into_get() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/submit");
            then.status(303).header("Location", "/done");
        })
        .await;
    let done = server
        .mock_async(|when, then| {
            when.method(GET).path("/done");
            then.status(200).body("{}");
        })
        .await;

    let http = entered(ControllerConfig::new().with_follow_redirects(true));
    let options = RequestOptions::new().json(serde_json::json!({"a": 1}));
    let request = http.new_request("POST", server.url("/submit"), options).unwrap();
    let response = http.send_request(&request, false, None).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    done.assert_async().await;
}

#[tokio::test]
async fn test_temporary_redirect_keeps_method_and_body() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/a");
            then.status(307).header("Location", "/b");
        })
        .await;
    let b = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/b")
                .json_body(serde_json::json!({"a": 1}));
            then.status(201).body("{}");
        })
        .await;

    let http = entered(ControllerConfig::new().with_follow_redirects(true));
    let options = RequestOptions::new().json(serde_json::json!({"a": 1}));
    let request = http.new_request("POST", server.url("/a"), options).unwrap();
    let response = http.send_request(&request, false, None).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    b.assert_async().await;
}

#[tokio::test]
async fn test_too_many_redirects() {
    let server = MockServer::start_async().await;
    let looping = server
        .mock_async(|when, then| {
            when.method(GET).path("/loop");
            then.status(302).header("Location", "/loop");
        })
        .await;

    let http = entered(
        ControllerConfig::new()
            .with_follow_redirects(true)
            .with_max_redirects(2),
    );
    let request = http
        .new_request("GET", server.url("/loop"), RequestOptions::new())
        .unwrap();
    let result = http.send_request(&request, false, None).await;

    assert!(matches!(result, Err(HttpError::TooManyRedirects { max: 2 })));
    looping.assert_hits_async(3).await;
}

#[tokio::test]
async fn test_connect_error_is_typed_and_try_send_yields_none() {
    let http = entered(ControllerConfig::new().with_retries(1).with_timeout(5.0));
    let request = http
        .new_request("GET", "http://127.0.0.1:1/", RequestOptions::new())
        .unwrap();

    let result = http.send_request(&request, false, None).await;
    assert!(matches!(result, Err(HttpError::Connect { .. })));

    let result = http.try_send_request(&request, false, None).await.unwrap();
    assert!(result.is_none());
}

// ==================== Decoding tests ====================

async fn fetch(server: &MockServer, path: &str, config: ControllerConfig) -> HttpResponse {
    let http = entered(config);
    let request = http
        .new_request("GET", server.url(path), RequestOptions::new())
        .unwrap();
    http.send_request(&request, false, None).await.unwrap()
}

#[tokio::test]
async fn test_decode_empty_content_is_validation_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.path("/empty");
            then.status(204);
        })
        .await;

    let response = fetch(&server, "/empty", ControllerConfig::new()).await;
    let http = HttpController::new(ControllerConfig::new());
    let result = http.decode_res_content::<serde_json::Value>(&response);
    assert!(matches!(result, Err(HttpError::Validation(_))));
}

#[tokio::test]
async fn test_decode_latin1_body() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.path("/latin1");
            then.status(200)
                .header("Content-Type", "application/json; charset=iso-8859-1")
                .body(b"{\"id\": 2, \"name\": \"caf\xe9 cr\xe8me br\xfbl\xe9e\"}".to_vec());
        })
        .await;

    let response = fetch(&server, "/latin1", ControllerConfig::new()).await;
    let http = HttpController::new(ControllerConfig::new());
    let item: Item = http.decode_res_content(&response).unwrap();
    assert_eq!(item.name, "caf\u{e9} cr\u{e8}me br\u{fb}l\u{e9}e");
    assert!(response.text().unwrap().contains("cr\u{e8}me"));
}

#[tokio::test]
async fn test_decode_invalid_json_is_parse_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.path("/html");
            then.status(200).body("<html>nope</html>");
        })
        .await;

    let response = fetch(&server, "/html", ControllerConfig::new()).await;
    let http = HttpController::new(ControllerConfig::new());
    let result = http.decode_res_content::<serde_json::Value>(&response);
    assert!(matches!(result, Err(HttpError::Parse(_))));
}

#[tokio::test]
async fn test_text_uses_fixed_default_encoding() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.path("/plain");
            then.status(200).body(b"caf\xe9".to_vec());
        })
        .await;

    let config = ControllerConfig::new()
        .with_default_encoding(DefaultEncoding::Fixed(encoding_rs::WINDOWS_1252));
    let response = fetch(&server, "/plain", config).await;
    assert_eq!(response.encoding(), None);
    assert_eq!(response.text().unwrap(), "caf\u{e9}");
}

#[tokio::test]
async fn test_streaming_response_must_be_read() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.path("/stream");
            then.status(200).body("{\"id\": 3, \"name\": \"streamed\"}");
        })
        .await;

    let http = entered(ControllerConfig::new());
    let request = http
        .new_request("GET", server.url("/stream"), RequestOptions::new())
        .unwrap();
    let mut response = http.send_request(&request, true, None).await.unwrap();

    assert!(response.is_streaming());
    assert!(matches!(response.content(), Err(HttpError::ResponseNotRead)));

    response.read().await.unwrap();
    let item: Item = http.decode_res_content(&response).unwrap();
    assert_eq!(item.id, 3);
}

// ==================== Cache transport tests ====================

fn cached_controller(dir: &TempDir, ttl: Option<Duration>) -> HttpController {
    let transport = get_cache_transport(dir.path(), ttl, true, 0, None).unwrap();
    entered(ControllerConfig::new().with_transport(Arc::new(transport)))
}

async fn get(http: &HttpController, url: String) -> HttpResponse {
    let request = http.new_request("GET", url, RequestOptions::new()).unwrap();
    http.send_request(&request, false, None).await.unwrap()
}

#[tokio::test]
async fn test_cache_serves_repeated_get() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/cached");
            then.status(200)
                .header("Content-Type", "application/json")
                .body("{\"id\": 4, \"name\": \"cached\"}");
        })
        .await;

    let http = cached_controller(&dir, None);
    let first = get(&http, server.url("/cached")).await;
    let second = get(&http, server.url("/cached")).await;

    assert!(!first.from_cache());
    assert!(second.from_cache());
    assert_eq!(second.content().unwrap(), first.content().unwrap());
    assert_eq!(second.headers()["content-type"], "application/json");
    let item: Item = http.decode_res_content(&second).unwrap();
    assert_eq!(item.name, "cached");
    mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_cache_entry_expires_after_ttl() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/ttl");
            then.status(200).body("{}");
        })
        .await;

    let http = cached_controller(&dir, Some(Duration::ZERO));
    get(&http, server.url("/ttl")).await;
    let second = get(&http, server.url("/ttl")).await;

    assert!(!second.from_cache());
    mock.assert_hits_async(2).await;
}

#[tokio::test]
async fn test_cache_skips_post_no_store_and_errors() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    let post = server
        .mock_async(|when, then| {
            when.method(POST).path("/post");
            then.status(200).body("{}");
        })
        .await;
    let no_store = server
        .mock_async(|when, then| {
            when.method(GET).path("/no-store");
            then.status(200)
                .header("Cache-Control", "private, no-store")
                .body("{}");
        })
        .await;
    let missing = server
        .mock_async(|when, then| {
            when.method(GET).path("/missing");
            then.status(404);
        })
        .await;

    let http = cached_controller(&dir, None);
    for _ in 0..2 {
        let request = http
            .new_request("POST", server.url("/post"), RequestOptions::new())
            .unwrap();
        let response = http.send_request(&request, false, None).await.unwrap();
        assert!(!response.from_cache());

        assert!(!get(&http, server.url("/no-store")).await.from_cache());
        assert!(!get(&http, server.url("/missing")).await.from_cache());
    }

    post.assert_hits_async(2).await;
    no_store.assert_hits_async(2).await;
    missing.assert_hits_async(2).await;
}

#[tokio::test]
async fn test_cache_transport_closes_inner() {
    let inner = CountingTransport::new();
    let dir = TempDir::new().unwrap();
    let cache = CacheTransport::new(inner.clone(), FileStorage::new(dir.path(), None));

    let mut http = entered(ControllerConfig::new().with_transport(Arc::new(cache)));
    http.exit(None).await;
    assert_eq!(inner.closes(), 1);
}

#[test]
fn test_cache_transport_client_cert_errors() {
    let dir = TempDir::new().unwrap();
    let cert = dir.path().join("client.pem");

    let missing = get_cache_transport(dir.path(), None, true, 0, Some(ClientCert::new(&cert)));
    assert!(matches!(missing, Err(HttpError::Io(_))));

    std::fs::write(&cert, "not a certificate").unwrap();
    let invalid = get_cache_transport(
        dir.path(),
        None,
        true,
        0,
        Some(ClientCert::new(&cert).with_key(&cert)),
    );
    assert!(matches!(invalid, Err(HttpError::ClientBuild { .. })));
}

fn assert_send<T: Send>(_: &T) {}

#[tokio::test]
async fn test_file_storage_round_trip_is_send() {
    let dir = TempDir::new().unwrap();
    let storage = FileStorage::new(dir.path(), None);
    let url = url::Url::parse("https://api.test/items/1").unwrap();
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert("content-type", "application/json".parse().unwrap());

    let store = storage.store("item-1", StatusCode::OK, &url, &headers, b"{\"id\": 1}");
    assert_send(&store);
    store.await.unwrap();

    let load = storage.load("item-1");
    assert_send(&load);
    let response = load.await.unwrap().unwrap();
    assert!(response.from_cache());
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.url(), &url);
    assert_eq!(response.headers()["content-type"], "application/json");
    assert_eq!(response.content().unwrap(), b"{\"id\": 1}");

    assert!(storage.load("item-2").await.unwrap().is_none());
}

// ==================== Helper tests ====================

#[test]
fn test_build_request_defaults_to_json_content_type() {
    let request = build_request(
        "post",
        "https://example.test/upload",
        None,
        &[("q".to_string(), "1".to_string())],
        Some(RequestData::Json(serde_json::json!({"k": "v"}))),
    )
    .unwrap();

    assert_eq!(request.method, Method::POST);
    assert_eq!(request.url.as_str(), "https://example.test/upload?q=1");
    assert_eq!(request.headers["content-type"], "application/json");
    assert_eq!(request.body.as_deref(), Some(&b"{\"k\":\"v\"}"[..]));
}

#[test]
fn test_build_request_with_explicit_headers_and_text() {
    let headers = [("Content-Type".to_string(), "text/plain".to_string())];
    let request = build_request(
        "PUT",
        "https://example.test/note",
        Some(&headers),
        &[],
        Some(RequestData::Text("hello".into())),
    )
    .unwrap();

    assert_eq!(request.headers["content-type"], "text/plain");
    assert_eq!(request.body.as_deref(), Some(&b"hello"[..]));

    assert!(matches!(
        build_request("GET", "not a url", None, &[], None),
        Err(HttpError::Validation(_))
    ));
}

#[tokio::test]
async fn test_save_bytes_creates_missing_dirs() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("nested").join("out");

    let path = save_bytes(b"payload", &target, "file.bin").await.unwrap();

    assert_eq!(path, target.join("file.bin"));
    assert_eq!(std::fs::read(&path).unwrap(), b"payload");
}

#[tokio::test]
async fn test_save_bytes_rejects_empty_input() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        save_bytes(b"", dir.path(), "file.bin").await,
        Err(HttpError::Validation(_))
    ));
    assert!(matches!(
        save_bytes(b"x", dir.path(), " ").await,
        Err(HttpError::Validation(_))
    ));
}

#[test]
fn test_expand_home() {
    let plain = Path::new("/tmp/out");
    assert_eq!(expand_home(plain), plain);

    if let Some(home) = dirs::home_dir() {
        assert_eq!(expand_home(Path::new("~/downloads")), home.join("downloads"));
    }
}
