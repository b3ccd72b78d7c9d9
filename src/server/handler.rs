use super::response::{HttpBody, text_response, with_body};
use crate::assets::{favicon_response, robots_allowed, robots_txt, sitemap_xml};
use crate::config::{Bindings, RedirectsSource, Settings, resolve_config_url};
use crate::error::RouteError;
use crate::metrics::RequestTimer;
use crate::middleware::CanonicalHostMiddleware;
use crate::proxy::{InboundRequest, ProxyHandler};
use crate::router::path::{normalize_path, safe_decode};
use crate::router::{RouteType, Router, mount_prefix};
use crate::runtime::Runtime;
use crate::store::ConfigStore;
use futures::FutureExt;
use http_body_util::BodyExt;
use hyper::body::Body;
use hyper::header::HOST;
use hyper::http::request::Parts;
use hyper::{Method, Request, Response, StatusCode};
use std::fmt::Display;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error};

type Routed = Result<(Response<HttpBody>, &'static str), RouteError>;

/// Answers one inbound request: canonical-host enforcement, built-in
/// assets, rule document loading, matching and dispatch.
pub struct RequestHandler {
    store: ConfigStore,
    runtime: Runtime,
    bindings: Bindings,
    source: RedirectsSource,
    config_url: String,
    proxy: ProxyHandler,
    canonical: CanonicalHostMiddleware,
}

impl RequestHandler {
    pub fn new(settings: &Settings, runtime: Runtime) -> Self {
        Self {
            store: ConfigStore::new(settings.redirects.cache_ttl.as_std())
                .with_fetch_timeout(settings.upstream.timeout.as_std()),
            runtime,
            bindings: settings.bindings(),
            source: settings.redirects.clone(),
            config_url: settings.config_url(),
            proxy: ProxyHandler::new(&settings.upstream),
            canonical: CanonicalHostMiddleware::new(&settings.canonical),
        }
    }

    /// Replace the binding lookup, e.g. to isolate it from the process environment
    pub fn with_bindings(mut self, bindings: Bindings) -> Self {
        self.config_url = resolve_config_url(&bindings, &self.source);
        self.bindings = bindings;
        self
    }

    pub fn config_url(&self) -> &str {
        &self.config_url
    }

    /// Never fails: errors and panics are turned into bare status responses
    pub async fn handle<B>(&self, req: Request<B>) -> Response<HttpBody>
    where
        B: Body + Send,
        B::Data: Send,
        B::Error: Display,
    {
        let timer = RequestTimer::new();
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let (response, outcome) = match AssertUnwindSafe(self.route(req)).catch_unwind().await {
            Ok(Ok(routed)) => routed,
            Ok(Err(e)) => {
                let outcome = match &e {
                    RouteError::ConfigUnavailable => "no_slots",
                    RouteError::NoMatch(_) => "not_found",
                    _ => "error",
                };
                if e.status().is_server_error() {
                    error!("{} {} failed: {}", method, path, e);
                } else {
                    debug!("{} {}: {}", method, path, e);
                }
                (e.into_response(), outcome)
            }
            Err(_) => {
                error!("Handler panicked on {} {}", method, path);
                (
                    text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
                    "error",
                )
            }
        };

        debug!("{} {} -> {} ({})", method, path, response.status(), outcome);
        timer.finish(outcome, response.status().as_u16());
        response
    }

    async fn route<B>(&self, req: Request<B>) -> Routed
    where
        B: Body + Send,
        B::Data: Send,
        B::Error: Display,
    {
        let path = normalize_path(req.uri().path());

        if let Some(response) = self.canonical.redirect_for(&req) {
            return Ok((response, "canonical"));
        }

        if path == "/favicon.ico" {
            return Ok((favicon_response(), "favicon"));
        }

        let router = self
            .store
            .load(&self.config_url, &self.runtime)
            .await
            .as_ref()
            .and_then(Router::from_config)
            .ok_or(RouteError::ConfigUnavailable)?;

        let origin = request_origin(&req);
        match path.as_str() {
            "/robots.txt" => {
                let body = robots_txt(&origin, robots_allowed(&self.bindings));
                return Ok((
                    with_body(StatusCode::OK, "text/plain; charset=utf-8", body),
                    "robots",
                ));
            }
            "/sitemap.xml" => {
                let body = sitemap_xml(&origin, &router);
                return Ok((
                    with_body(StatusCode::OK, "application/xml; charset=utf-8", body),
                    "sitemap",
                ));
            }
            _ => {}
        }

        let (parts, body) = req.into_parts();
        let decoded = safe_decode(&path);
        let referer = parts
            .headers
            .get("referer")
            .or_else(|| parts.headers.get("referrer"))
            .and_then(|h| h.to_str().ok());
        let effective = router.effective_path(&decoded, referer);
        let query = parts.uri.query();

        let candidates: Vec<_> = router.candidates(&effective, query).collect();
        let inbound = if candidates
            .iter()
            .any(|c| c.matcher.rule.route_type == RouteType::Proxy)
        {
            Some(buffer_inbound(&parts, body, &origin).await?)
        } else {
            None
        };

        let mut soft_failure = None;
        for candidate in candidates {
            let rule = &candidate.matcher.rule;
            debug!(
                "Matched {} rule '{}' -> {}",
                rule.route_type, candidate.matcher.base, candidate.target
            );

            if rule.route_type != RouteType::Proxy {
                return Ok((self.proxy.redirect(&candidate.target, rule.status)?, "redirect"));
            }

            let Some(inbound) = inbound.as_ref() else {
                continue;
            };
            let response = self
                .proxy
                .forward(
                    inbound,
                    &candidate.target,
                    mount_prefix(candidate.matcher),
                    self.runtime.fetcher.as_ref(),
                )
                .await;

            let status = response.status();
            if status == StatusCode::NOT_FOUND || status.is_server_error() {
                debug!("Proxy candidate {} answered {}, trying next", candidate.target, status);
                soft_failure = Some(response);
                continue;
            }
            return Ok((response, "proxy"));
        }

        match soft_failure {
            Some(response) => Ok((response, "proxy")),
            None => Err(RouteError::NoMatch(effective)),
        }
    }
}

/// Scheme and host the client addressed, e.g. `https://example.com:8443`
fn request_origin<B>(req: &Request<B>) -> String {
    let scheme = CanonicalHostMiddleware::request_scheme(req);
    let host = request_host(req.headers(), req.uri()).unwrap_or_default();
    format!("{}://{}", scheme, host)
}

fn request_host<'a>(headers: &'a hyper::HeaderMap, uri: &'a hyper::Uri) -> Option<&'a str> {
    headers
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()))
}

/// Capture what the proxy needs from the client request. The body is only
/// read for methods that carry one.
async fn buffer_inbound<B>(parts: &Parts, body: B, origin: &str) -> Result<InboundRequest, RouteError>
where
    B: Body + Send,
    B::Data: Send,
    B::Error: Display,
{
    let body = match parts.method {
        Method::GET | Method::HEAD => None,
        _ => Some(
            body.collect()
                .await
                .map_err(|e| RouteError::Internal(format!("Failed to read request body: {}", e)))?
                .to_bytes(),
        ),
    };

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    Ok(InboundRequest {
        method: parts.method.clone(),
        headers: parts.headers.clone(),
        body,
        host: request_host(&parts.headers, &parts.uri).map(str::to_string),
        href: format!("{}{}", origin, path_and_query),
    })
}
