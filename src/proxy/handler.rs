use super::rewrite::{rewrite_html, rewrite_location, strip_cookie_domain};
use crate::config::UpstreamConfig;
use crate::error::RouteError;
use crate::metrics::Metrics;
use crate::middleware::SecurityHeadersMiddleware;
use crate::runtime::{Fetch, FetchError, UpstreamRequest, UpstreamResponse};
use crate::server::response::{HttpBody, empty_body, full_body};
use bytes::Bytes;
use hyper::header::{
    ACCEPT_ENCODING, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, HOST, HeaderMap, HeaderName,
    HeaderValue, LOCATION, ORIGIN, PROXY_AUTHENTICATE, PROXY_AUTHORIZATION, REFERER, SET_COOKIE,
    TE, TRAILER, TRANSFER_ENCODING, UPGRADE,
};
use hyper::{Method, Response, StatusCode};
use percent_encoding::{CONTROLS, utf8_percent_encode};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, warn};
use url::Url;

fn hop_by_hop_headers() -> &'static [HeaderName] {
    static HEADERS: &[HeaderName] = &[
        CONNECTION,
        TRANSFER_ENCODING,
        UPGRADE,
        PROXY_AUTHENTICATE,
        PROXY_AUTHORIZATION,
        TE,
        TRAILER,
    ];
    HEADERS
}

/// Edge-platform headers that must not reach the upstream
const PLATFORM_HEADERS: &[&str] = &["cf-connecting-ip", "cf-ipcountry", "cf-ray", "cf-visitor"];

/// The client request as the proxy needs it: headers plus a buffered body
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub headers: HeaderMap,
    /// Only buffered for methods that carry one
    pub body: Option<Bytes>,
    /// `Host` header as received, port included
    pub host: Option<String>,
    /// Full URL the client asked for
    pub href: String,
}

/// Produces the response for a matched rule: a plain redirect, or a proxied
/// upstream response.
pub struct ProxyHandler {
    timeout: Duration,
    max_redirects: u32,
    security_headers: SecurityHeadersMiddleware,
}

impl ProxyHandler {
    pub fn new(config: &UpstreamConfig) -> Self {
        Self {
            timeout: config.timeout.as_std(),
            max_redirects: config.max_redirects,
            security_headers: SecurityHeadersMiddleware::new(),
        }
    }

    /// Redirect the client to `target`
    pub fn redirect(&self, target: &str, status: u16) -> Result<Response<HttpBody>, RouteError> {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::FOUND);
        let location = location_value(target)
            .ok_or_else(|| RouteError::Internal(format!("Unusable redirect target {}", target)))?;

        let mut response = Response::new(empty_body());
        *response.status_mut() = status;
        response.headers_mut().insert(LOCATION, location);
        self.security_headers.apply_response(response.headers_mut());
        Ok(response)
    }

    /// Proxy `inbound` to `target`, following upstream redirects, under the
    /// configured deadline. Transport failures and expiry are answered with
    /// 502 and 504 rather than surfaced as errors.
    pub async fn forward(
        &self,
        inbound: &InboundRequest,
        target: &str,
        mount: Option<&str>,
        fetcher: &dyn Fetch,
    ) -> Response<HttpBody> {
        let start = Instant::now();

        match timeout(self.timeout, self.follow(inbound, target, mount, fetcher)).await {
            Ok(Ok(response)) => {
                debug!(
                    "Upstream response: {} in {:?} from {}",
                    response.status(),
                    start.elapsed(),
                    target
                );
                response
            }
            Ok(Err(e)) => {
                error!("Proxy to {} failed in {:?}: {}", target, start.elapsed(), e);
                e.into_response()
            }
            Err(_) => {
                warn!(
                    "Proxy timeout after {:?} (limit: {:?}): {}",
                    start.elapsed(),
                    self.timeout,
                    target
                );
                RouteError::UpstreamExhausted(self.timeout).into_response()
            }
        }
    }

    async fn follow(
        &self,
        inbound: &InboundRequest,
        target: &str,
        mount: Option<&str>,
        fetcher: &dyn Fetch,
    ) -> Result<Response<HttpBody>, RouteError> {
        let origin_target = Url::parse(target).map_err(|e| RouteError::UpstreamFailure {
            target: target.to_string(),
            source: FetchError::InvalidUrl(e.to_string()),
        })?;

        let mut current = origin_target.clone();
        let mut method = inbound.method.clone();
        let mut followed = 0;

        loop {
            let request = build_forward_request(inbound, &method, &current, mount);
            let response =
                fetcher
                    .fetch(request)
                    .await
                    .map_err(|source| RouteError::UpstreamFailure {
                        target: current.to_string(),
                        source,
                    })?;
            Metrics::record_upstream_request(response.status.as_u16());

            if response.status.is_redirection() && followed < self.max_redirects {
                let next = response
                    .headers
                    .get(LOCATION)
                    .and_then(|h| h.to_str().ok())
                    .and_then(|location| current.join(location).ok());

                if let Some(next) = next {
                    if matches!(response.status.as_u16(), 301..=303) {
                        method = Method::GET;
                    }
                    debug!("Following upstream {} to {}", response.status, next);
                    current = next;
                    followed += 1;
                    continue;
                }
            }

            Metrics::record_redirects_followed(followed);
            return Ok(self.finish(response, inbound, &current, &origin_target, followed, mount));
        }
    }

    /// Sanitize the final upstream response and rewrite it for this host
    fn finish(
        &self,
        upstream: UpstreamResponse,
        inbound: &InboundRequest,
        current: &Url,
        origin_target: &Url,
        followed: u32,
        mount: Option<&str>,
    ) -> Response<HttpBody> {
        let UpstreamResponse {
            status,
            mut headers,
            body,
        } = upstream;

        for header in hop_by_hop_headers() {
            headers.remove(header);
        }

        let upstream_location = headers
            .get(LOCATION)
            .map(|h| String::from_utf8_lossy(h.as_bytes()).into_owned());

        headers.insert(
            HeaderName::from_static("x-upstream-status"),
            HeaderValue::from(status.as_u16()),
        );
        headers.insert(
            HeaderName::from_static("x-upstream-location"),
            upstream_location
                .as_deref()
                .and_then(|l| HeaderValue::from_str(l).ok())
                .unwrap_or_else(|| HeaderValue::from_static("")),
        );
        headers.insert(
            HeaderName::from_static("x-proxy-redirects-followed"),
            HeaderValue::from(followed),
        );

        self.security_headers.apply_response(&mut headers);

        let cookies: Vec<String> = headers
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| strip_cookie_domain(&String::from_utf8_lossy(v.as_bytes())))
            .collect();
        if !cookies.is_empty() {
            headers.remove(SET_COOKIE);
            for cookie in cookies {
                if let Ok(value) = HeaderValue::from_str(&cookie) {
                    headers.append(SET_COOKIE, value);
                }
            }
        }

        if let Some(location) = upstream_location {
            let rewritten = rewrite_location(
                &location,
                current,
                origin_target,
                inbound.host.as_deref(),
                &inbound.href,
                mount,
            );
            match location_value(&rewritten) {
                Some(value) => {
                    headers.insert(LOCATION, value);
                }
                None => warn!("Dropping unusable upstream Location {}", rewritten),
            }
        }

        let is_html = headers
            .get(CONTENT_TYPE)
            .and_then(|h| h.to_str().ok())
            .is_some_and(|ct| ct.contains("text/html"));

        let body = match mount {
            Some(mount) if is_html => {
                headers.remove(CONTENT_LENGTH);
                full_body(rewrite_html(&String::from_utf8_lossy(&body), mount))
            }
            _ => full_body(body),
        };

        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

/// Outbound request for one hop to `current`
fn build_forward_request(
    inbound: &InboundRequest,
    method: &Method,
    current: &Url,
    mount: Option<&str>,
) -> UpstreamRequest {
    let mut headers = inbound.headers.clone();

    headers.remove(HOST);
    for header in hop_by_hop_headers() {
        headers.remove(header);
    }
    headers.remove("keep-alive");
    headers.remove(CONTENT_LENGTH);
    for name in PLATFORM_HEADERS {
        headers.remove(*name);
    }

    let forwarded_host = inbound
        .host
        .as_deref()
        .and_then(|h| HeaderValue::from_str(h).ok())
        .unwrap_or_else(|| HeaderValue::from_static(""));
    headers.insert(HeaderName::from_static("x-forwarded-host"), forwarded_host);
    headers.insert(
        HeaderName::from_static("x-forwarded-proto"),
        HeaderValue::from_static("https"),
    );

    if let Ok(origin) = HeaderValue::from_str(&current.origin().ascii_serialization()) {
        headers.insert(ORIGIN, origin);
    }
    if let Ok(referer) = HeaderValue::from_str(current.as_str()) {
        headers.insert(REFERER, referer);
    }

    // Bodies rewritten below the mount must arrive uncompressed
    if mount.is_some() {
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
    }

    let body = match *method {
        Method::GET | Method::HEAD => None,
        _ => inbound.body.clone(),
    };

    UpstreamRequest {
        method: method.clone(),
        url: current.to_string(),
        headers,
        body,
    }
}

/// `Location` value for `target`. Non-ASCII targets are percent-encoded
/// first: absolute ones through URL serialization, relative ones byte-wise.
fn location_value(target: &str) -> Option<HeaderValue> {
    if target.is_ascii() {
        return HeaderValue::from_str(target).ok();
    }
    let encoded = match Url::parse(target) {
        Ok(url) => url.to_string(),
        Err(_) => utf8_percent_encode(target, CONTROLS).to_string(),
    };
    HeaderValue::from_str(&encoded).ok()
}
