pub mod builtin;

pub use builtin::{
    CanonicalHostMiddleware, HSTS_HEADER_VALUE, SecurityHeadersMiddleware, request_hostname,
};
