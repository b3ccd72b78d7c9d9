use crate::assets::not_found_response;
use crate::runtime::FetchError;
use crate::server::response::{HttpBody, text_response};
use hyper::{Response, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Failures of the request pipeline, each answered with a fixed status
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("No rule slots configured")]
    ConfigUnavailable,

    #[error("No rule matched {0}")]
    NoMatch(String),

    #[error("Upstream fetch failed for {target}: {source}")]
    UpstreamFailure {
        target: String,
        #[source]
        source: FetchError,
    },

    #[error("Upstream did not complete within {0:?}")]
    UpstreamExhausted(Duration),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RouteError {
    pub fn status(&self) -> StatusCode {
        match self {
            RouteError::ConfigUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            RouteError::NoMatch(_) => StatusCode::NOT_FOUND,
            RouteError::UpstreamFailure { .. } => StatusCode::BAD_GATEWAY,
            RouteError::UpstreamExhausted(_) => StatusCode::GATEWAY_TIMEOUT,
            RouteError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing response. Internal details never leave the process.
    pub fn into_response(self) -> Response<HttpBody> {
        let status = self.status();
        match self {
            RouteError::ConfigUnavailable => text_response(status, "503 No Slots configured"),
            RouteError::NoMatch(_) => not_found_response(),
            RouteError::UpstreamFailure { .. } => {
                text_response(status, "Bad Gateway: Upstream fetch failed.")
            }
            RouteError::UpstreamExhausted(_) => text_response(status, "Gateway Timeout"),
            RouteError::Internal(_) => text_response(status, "Internal Server Error"),
        }
    }
}
