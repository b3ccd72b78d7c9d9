use crate::config::CanonicalConfig;
use crate::server::response::{HttpBody, empty_response};
use hyper::header::{HOST, HeaderValue, LOCATION};
use hyper::{Request, Response, StatusCode};

/// Redirects every request that is not on the canonical origin: plain HTTP
/// goes to HTTPS and a leading `www.` is dropped from the host.
pub struct CanonicalHostMiddleware {
    enforce_https: bool,
    strip_www: bool,
}

impl CanonicalHostMiddleware {
    pub fn new(config: &CanonicalConfig) -> Self {
        Self {
            enforce_https: config.enforce_https,
            strip_www: config.strip_www,
        }
    }

    /// Scheme the client used. Behind a TLS-terminating edge the
    /// `X-Forwarded-Proto` header is authoritative.
    pub fn request_scheme<B>(req: &Request<B>) -> String {
        req.headers()
            .get("x-forwarded-proto")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.split(',').next())
            .map(|h| h.trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .or_else(|| req.uri().scheme_str().map(str::to_ascii_lowercase))
            .unwrap_or_else(|| "http".to_string())
    }

    #[inline]
    pub fn should_redirect(&self, scheme: &str, hostname: &str) -> bool {
        (self.enforce_https && scheme != "https")
            || (self.strip_www && hostname.starts_with("www."))
    }

    /// Permanent redirect to the canonical origin, or `None` if the request
    /// is already there
    pub fn redirect_for<B>(&self, req: &Request<B>) -> Option<Response<HttpBody>> {
        let scheme = Self::request_scheme(req);
        let hostname = request_hostname(req)?;
        if !self.should_redirect(&scheme, hostname) {
            return None;
        }

        let hostname = if self.strip_www {
            hostname.strip_prefix("www.").unwrap_or(hostname)
        } else {
            hostname
        };
        let target_scheme = if self.enforce_https { "https" } else { scheme.as_str() };

        let query = req
            .uri()
            .query()
            .filter(|q| !q.is_empty())
            .map(|q| format!("?{}", q))
            .unwrap_or_default();
        let location = format!(
            "{}://{}{}{}",
            target_scheme,
            hostname,
            req.uri().path(),
            query
        );

        let mut response = empty_response(StatusCode::PERMANENT_REDIRECT);
        if let Ok(location_value) = HeaderValue::from_str(&location) {
            response.headers_mut().insert(LOCATION, location_value);
        }
        Some(response)
    }
}

/// Host the client addressed, without port
pub fn request_hostname<B>(req: &Request<B>) -> Option<&str> {
    let host = req
        .headers()
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| req.uri().host())?;
    Some(strip_port(host)).filter(|h| !h.is_empty())
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    host.split(':').next().unwrap_or(host)
}
