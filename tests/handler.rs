use async_trait::async_trait;
use bytes::Bytes;
use edgeroute::config::{Bindings, Settings};
use edgeroute::runtime::{Clock, Fetch, FetchError, Runtime, UpstreamRequest, UpstreamResponse};
use edgeroute::server::RequestHandler;
use edgeroute::server::response::HttpBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::header::{HeaderName, HeaderValue};
use hyper::{HeaderMap, Request, Response, StatusCode};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

const CONFIG_URL: &str = "https://config.test/redirects.json";

/// Serves the rule document plus scripted upstream responses keyed by URL
#[derive(Default)]
struct FakeUpstream {
    config: Mutex<Option<(u16, String)>>,
    routes: Mutex<HashMap<String, (u16, Vec<(&'static str, &'static str)>, String)>>,
    requests: Mutex<Vec<UpstreamRequest>>,
}

impl FakeUpstream {
    fn with_config(document: &str) -> Arc<Self> {
        let upstream = Self::default();
        *upstream.config.lock().unwrap() = Some((200, document.to_string()));
        Arc::new(upstream)
    }

    fn route(
        &self,
        url: &str,
        status: u16,
        headers: Vec<(&'static str, &'static str)>,
        body: &str,
    ) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), (status, headers, body.to_string()));
    }

    fn requests_to(&self, url: &str) -> Vec<UpstreamRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url == url)
            .cloned()
            .collect()
    }

    fn config_fetches(&self) -> usize {
        self.requests_to(CONFIG_URL).len()
    }
}

#[async_trait]
impl Fetch for FakeUpstream {
    async fn fetch(&self, request: UpstreamRequest) -> Result<UpstreamResponse, FetchError> {
        self.requests.lock().unwrap().push(request.clone());

        if request.url == CONFIG_URL {
            return match self.config.lock().unwrap().clone() {
                Some((status, body)) => Ok(reply(status, vec![], body)),
                None => Err(FetchError::Transport("config host unreachable".into())),
            };
        }

        match self.routes.lock().unwrap().get(&request.url).cloned() {
            Some((status, headers, body)) => Ok(reply(status, headers, body)),
            None => Err(FetchError::Transport(format!("no route to {}", request.url))),
        }
    }
}

fn reply(status: u16, headers: Vec<(&'static str, &'static str)>, body: String) -> UpstreamResponse {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        map.append(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
    UpstreamResponse {
        status: StatusCode::from_u16(status).unwrap(),
        headers: map,
        body: Bytes::from(body),
    }
}

struct ManualClock(AtomicU64);

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

fn handler_with(upstream: Arc<FakeUpstream>, bindings: &[(&str, &str)]) -> RequestHandler {
    let mut map: HashMap<String, String> = bindings
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    map.insert("REDIRECTS_CONFIG_URL".to_string(), CONFIG_URL.to_string());

    let runtime = Runtime::new(upstream).with_clock(Arc::new(ManualClock(AtomicU64::new(0))));
    RequestHandler::new(&Settings::default(), runtime).with_bindings(Bindings::isolated(map))
}

fn handler(upstream: Arc<FakeUpstream>) -> RequestHandler {
    handler_with(upstream, &[])
}

fn get(uri: &str) -> Request<Empty<Bytes>> {
    Request::builder()
        .uri(uri)
        .header("host", "i0c.cc")
        .header("x-forwarded-proto", "https")
        .body(Empty::new())
        .unwrap()
}

async fn text(response: Response<HttpBody>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_prefix_redirect_with_query() {
    let upstream = FakeUpstream::with_config(r#"{"Slots": {"/old": "https://new.example"}}"#);
    let response = handler(upstream).handle(get("/old/page?x=1")).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()["location"], "https://new.example/page?x=1");
    assert_eq!(
        response.headers()["strict-transport-security"],
        "max-age=63072000; includeSubDomains"
    );
}

#[tokio::test]
async fn test_configured_status_and_template() {
    let upstream = FakeUpstream::with_config(
        r#"{"Slots": {"/blog/:slug": {"type": "exact", "target": "https://x/$1", "status": 301}}}"#,
    );
    let response = handler(upstream).handle(get("/blog/hello-world")).await;

    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(response.headers()["location"], "https://x/hello-world");
}

#[tokio::test]
async fn test_existing_target_query_wins() {
    let upstream = FakeUpstream::with_config(r#"{"Slots": {"/q": "https://x/?x=1"}}"#);
    let response = handler(upstream).handle(get("/q?y=2")).await;

    assert_eq!(response.headers()["location"], "https://x/?x=1");
}

#[tokio::test]
async fn test_missing_slots_is_unavailable() {
    let upstream = FakeUpstream::with_config(r#"{"routes": {}}"#);
    let response = handler(upstream).handle(get("/anything")).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers()["content-type"], "text/plain; charset=utf-8");
    assert_eq!(text(response).await, "503 No Slots configured");
}

#[tokio::test]
async fn test_unreachable_config_is_unavailable() {
    let upstream = Arc::new(FakeUpstream::default());
    let response = handler(upstream).handle(get("/x")).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_unmatched_path_is_not_found_page() {
    let upstream = FakeUpstream::with_config(r#"{"Slots": {"/a": "https://a"}}"#);
    let response = handler(upstream).handle(get("/b")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["cache-control"], "public, max-age=60");
    assert!(text(response).await.contains("404 Not Found"));
}

#[tokio::test]
async fn test_canonical_redirect_comes_first() {
    let upstream = FakeUpstream::with_config(r#"{"Slots": {"/": "https://root"}}"#);
    let request = Request::builder()
        .uri("/Some//Path?a=1")
        .header("host", "www.i0c.cc")
        .header("x-forwarded-proto", "http")
        .body(Empty::<Bytes>::new())
        .unwrap();

    let fake = upstream.clone();
    let response = handler(upstream).handle(request).await;

    assert_eq!(response.status(), StatusCode::PERMANENT_REDIRECT);
    assert_eq!(response.headers()["location"], "https://i0c.cc/Some//Path?a=1");
    assert_eq!(fake.config_fetches(), 0);
}

#[tokio::test]
async fn test_favicon_skips_config() {
    let upstream = FakeUpstream::with_config(r#"{"Slots": {}}"#);
    let fake = upstream.clone();
    let response = handler(upstream).handle(get("/favicon.ico")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/x-icon");
    assert_eq!(fake.config_fetches(), 0);
}

#[tokio::test]
async fn test_config_is_cached_between_requests() {
    let upstream = FakeUpstream::with_config(r#"{"Slots": {"/a": "https://a"}}"#);
    let fake = upstream.clone();
    let handler = handler(upstream);

    handler.handle(get("/a")).await;
    handler.handle(get("/a/b")).await;

    assert_eq!(fake.config_fetches(), 1);
}

#[tokio::test]
async fn test_robots_and_sitemap() {
    let upstream = FakeUpstream::with_config(
        r#"{"Slots": {"/docs": "https://docs", "/u/:id": "https://u/$1"}}"#,
    );
    let handler = handler_with(upstream, &[("ROBOTS_POLICY", "allow")]);

    let robots = handler.handle(get("/robots.txt")).await;
    assert_eq!(
        text(robots).await,
        "User-agent: *\nAllow: /\nSitemap: https://i0c.cc/sitemap.xml\n"
    );

    let sitemap = text(handler.handle(get("/sitemap.xml")).await).await;
    assert!(sitemap.contains("<loc>https://i0c.cc/docs</loc>"));
    assert!(!sitemap.contains("/u/"));
}

#[tokio::test]
async fn test_robots_denied_by_default() {
    let upstream = FakeUpstream::with_config(r#"{"Slots": {"/": "https://root"}}"#);
    let robots = handler(upstream).handle(get("/robots.txt")).await;

    assert_eq!(text(robots).await, "User-agent: *\nDisallow: /\n");
}

#[tokio::test]
async fn test_proxy_under_mount_rewrites_response() {
    let upstream = FakeUpstream::with_config(
        r#"{"Slots": {"/app/*": {"type": "proxy", "target": "https://upstream.test/$1"}}}"#,
    );
    upstream.route(
        "https://upstream.test/dashboard",
        200,
        vec![
            ("content-type", "text/html"),
            ("x-frame-options", "SAMEORIGIN"),
            ("set-cookie", "session=1; Domain=upstream.test; Path=/"),
        ],
        r##"<link href="/main.css"><a href="#top">top</a>"##,
    );
    let fake = upstream.clone();

    let response = handler(upstream).handle(get("/app/dashboard")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-frame-options").is_none());
    assert_eq!(response.headers()["set-cookie"], "session=1; Path=/");
    assert_eq!(response.headers()["x-proxy-redirects-followed"], "0");
    assert_eq!(
        text(response).await,
        r##"<link href="/app/main.css"><a href="#top">top</a>"##
    );

    let forwarded = fake.requests_to("https://upstream.test/dashboard");
    assert_eq!(forwarded[0].headers["x-forwarded-host"], "i0c.cc");
    assert_eq!(forwarded[0].headers["accept-encoding"], "identity");
}

#[tokio::test]
async fn test_proxy_soft_failure_falls_through() {
    let upstream = FakeUpstream::with_config(
        r#"{"Slots": {"/svc": [
            {"type": "proxy", "target": "https://primary.test/"},
            {"type": "proxy", "target": "https://secondary.test/"}
        ]}}"#,
    );
    upstream.route("https://primary.test/", 404, vec![], "missing");
    upstream.route("https://secondary.test/", 200, vec![], "from secondary");

    let response = handler(upstream).handle(get("/svc")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "from secondary");
}

#[tokio::test]
async fn test_last_soft_failure_is_returned() {
    let upstream = FakeUpstream::with_config(
        r#"{"Slots": {"/svc": {"type": "proxy", "target": "https://down.test/"}}}"#,
    );
    upstream.route("https://down.test/", 503, vec![], "maintenance");

    let response = handler(upstream).handle(get("/svc")).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers()["x-upstream-status"], "503");
    assert_eq!(text(response).await, "maintenance");
}

#[tokio::test]
async fn test_proxy_soft_failure_then_redirect_rule() {
    let upstream = FakeUpstream::with_config(
        r#"{"Slots": {"/svc": [
            {"type": "proxy", "target": "https://flaky.test/"},
            "https://fallback.example"
        ]}}"#,
    );

    let response = handler(upstream).handle(get("/svc")).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()["location"], "https://fallback.example");
}

#[tokio::test]
async fn test_post_body_is_forwarded() {
    let upstream = FakeUpstream::with_config(
        r#"{"Slots": {"/api/*": {"type": "proxy", "target": "https://api.test/$1"}}}"#,
    );
    upstream.route("https://api.test/submit", 201, vec![], "created");
    let fake = upstream.clone();

    let request = Request::builder()
        .method("POST")
        .uri("/api/submit")
        .header("host", "i0c.cc")
        .header("x-forwarded-proto", "https")
        .body(Full::new(Bytes::from_static(b"payload")))
        .unwrap();
    let response = handler(upstream).handle(request).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let forwarded = fake.requests_to("https://api.test/submit");
    assert_eq!(forwarded[0].body.as_deref(), Some(&b"payload"[..]));
}

#[tokio::test]
async fn test_framework_asset_follows_referer_mount() {
    let upstream = FakeUpstream::with_config(
        r#"{"Slots": {
            "/app/*": {"type": "proxy", "target": "https://next.test/$1"},
            "/": "https://home.example"
        }}"#,
    );
    upstream.route(
        "https://next.test/_next/static/chunk.js",
        200,
        vec![("content-type", "application/javascript")],
        "chunk",
    );

    let request = Request::builder()
        .uri("/_next/static/chunk.js")
        .header("host", "i0c.cc")
        .header("x-forwarded-proto", "https")
        .header("referer", "https://i0c.cc/app/dashboard")
        .body(Empty::<Bytes>::new())
        .unwrap();
    let response = handler(upstream).handle(request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "chunk");
}

#[tokio::test]
async fn test_percent_encoded_path_is_decoded() {
    let upstream = FakeUpstream::with_config(r#"{"Slots": {"/hello world": "https://x/spaced"}}"#);
    let response = handler(upstream).handle(get("/hello%20world")).await;

    assert_eq!(response.headers()["location"], "https://x/spaced");
}

#[tokio::test]
async fn test_decoded_non_ascii_path_is_reencoded_in_location() {
    let upstream = FakeUpstream::with_config(r#"{"Slots": {"/old": "/new"}}"#);
    let response = handler(upstream).handle(get("/old/caf%C3%A9")).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()["location"], "/new/caf%C3%A9");
}
