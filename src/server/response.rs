use bytes::Bytes;
use http_body_util::{BodyExt, Empty, Full, combinators::BoxBody};
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::{Response, StatusCode};

/// Body type of every response the server produces
pub type HttpBody = BoxBody<Bytes, hyper::Error>;

#[inline]
pub fn full_body<T: Into<Bytes>>(content: T) -> HttpBody {
    Full::new(content.into())
        .map_err(|never| match never {})
        .boxed()
}

#[inline]
pub fn empty_body() -> HttpBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed()
}

/// Response with `status`, a body and a fixed content type
pub fn with_body<T: Into<Bytes>>(
    status: StatusCode,
    content_type: &'static str,
    content: T,
) -> Response<HttpBody> {
    let mut response = Response::new(full_body(content));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

pub fn text_response<T: Into<Bytes>>(status: StatusCode, message: T) -> Response<HttpBody> {
    with_body(status, "text/plain; charset=utf-8", message)
}

pub fn empty_response(status: StatusCode) -> Response<HttpBody> {
    let mut response = Response::new(empty_body());
    *response.status_mut() = status;
    response
}
