mod seo;

pub use seo::{escape_xml, robots_allowed, robots_txt, sitemap_xml};

use crate::server::response::{HttpBody, empty_response, with_body};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hyper::header::{CACHE_CONTROL, HeaderValue};
use hyper::{Response, StatusCode};
use std::sync::OnceLock;
use tracing::error;

pub const NOT_FOUND_HTML: &str = include_str!("not_found.html");

/// Favicon as a base64 string, optionally in data-URL form
const FAVICON_BASE64: &str = include_str!("favicon.b64");

/// Decoded favicon bytes; empty if no icon is bundled or it fails to decode
pub fn favicon_bytes() -> &'static [u8] {
    static ICON: OnceLock<Vec<u8>> = OnceLock::new();
    ICON.get_or_init(|| decode_icon(FAVICON_BASE64))
}

fn decode_icon(encoded: &str) -> Vec<u8> {
    let payload = match encoded.split_once(',') {
        Some((_, data)) => data,
        None => encoded,
    };
    let payload = payload.trim();
    if payload.is_empty() {
        return Vec::new();
    }
    STANDARD.decode(payload).unwrap_or_else(|e| {
        error!("Bundled favicon is not valid base64: {}", e);
        Vec::new()
    })
}

pub fn favicon_response() -> Response<HttpBody> {
    let icon = favicon_bytes();
    if icon.is_empty() {
        return empty_response(StatusCode::NO_CONTENT);
    }

    let mut response = with_body(StatusCode::OK, "image/x-icon", icon);
    response.headers_mut().insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=86400"),
    );
    response
}

pub fn not_found_response() -> Response<HttpBody> {
    let mut response = with_body(
        StatusCode::NOT_FOUND,
        "text/html; charset=utf-8",
        NOT_FOUND_HTML,
    );
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("public, max-age=60"));
    response
}
