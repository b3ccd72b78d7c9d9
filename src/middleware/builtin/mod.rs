mod canonical;
mod headers;

pub use canonical::{CanonicalHostMiddleware, request_hostname};
pub use headers::{HSTS_HEADER_VALUE, SecurityHeadersMiddleware};
