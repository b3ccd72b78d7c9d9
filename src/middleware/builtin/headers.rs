use hyper::HeaderMap;
use hyper::header::{
    CONTENT_SECURITY_POLICY, CONTENT_SECURITY_POLICY_REPORT_ONLY, HeaderName, HeaderValue,
    STRICT_TRANSPORT_SECURITY, X_FRAME_OPTIONS,
};

/// Two years, subdomains included
pub const HSTS_HEADER_VALUE: &str = "max-age=63072000; includeSubDomains";

/// Response header policy applied to everything this service answers with
/// on behalf of a rule: upstream framing/CSP policies are dropped and HSTS
/// is always set.
pub struct SecurityHeadersMiddleware {
    response_headers: Vec<(HeaderName, HeaderValue)>,
    remove_response: Vec<HeaderName>,
}

impl SecurityHeadersMiddleware {
    pub fn new() -> Self {
        Self {
            response_headers: vec![(
                STRICT_TRANSPORT_SECURITY,
                HeaderValue::from_static(HSTS_HEADER_VALUE),
            )],
            remove_response: vec![
                CONTENT_SECURITY_POLICY,
                CONTENT_SECURITY_POLICY_REPORT_ONLY,
                X_FRAME_OPTIONS,
            ],
        }
    }

    /// Modify response headers
    #[inline]
    pub fn apply_response(&self, headers: &mut HeaderMap) {
        // Remove headers first
        for name in &self.remove_response {
            headers.remove(name);
        }

        for (name, value) in &self.response_headers {
            headers.insert(name.clone(), value.clone());
        }
    }
}

impl Default for SecurityHeadersMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_policies_removed() {
        let middleware = SecurityHeadersMiddleware::new();
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_SECURITY_POLICY, HeaderValue::from_static("default-src 'none'"));
        headers.insert(
            CONTENT_SECURITY_POLICY_REPORT_ONLY,
            HeaderValue::from_static("default-src 'self'"),
        );
        headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
        headers.insert("x-custom", HeaderValue::from_static("kept"));

        middleware.apply_response(&mut headers);

        assert!(headers.get(CONTENT_SECURITY_POLICY).is_none());
        assert!(headers.get(CONTENT_SECURITY_POLICY_REPORT_ONLY).is_none());
        assert!(headers.get(X_FRAME_OPTIONS).is_none());
        assert_eq!(headers.get("x-custom").unwrap(), "kept");
    }

    #[test]
    fn test_hsts_overrides_upstream_value() {
        let middleware = SecurityHeadersMiddleware::new();
        let mut headers = HeaderMap::new();
        headers.insert(STRICT_TRANSPORT_SECURITY, HeaderValue::from_static("max-age=0"));

        middleware.apply_response(&mut headers);

        assert_eq!(headers.get(STRICT_TRANSPORT_SECURITY).unwrap(), HSTS_HEADER_VALUE);
        assert_eq!(headers.get_all(STRICT_TRANSPORT_SECURITY).iter().count(), 1);
    }
}
