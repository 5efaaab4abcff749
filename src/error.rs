use axum::response::{IntoResponse, Response};
use http::{HeaderValue, StatusCode, header};
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced by the service.
///
/// Startup faults (`InvalidCompressionLevel`, `Config`) are surfaced once by the
/// binary. Everything else is a per-request condition and converts into an
/// HTTP response through [`IntoResponse`].
#[derive(Debug, Error)]
pub enum Error {
    /// The configured compression level is outside `-1..=9`.
    #[error("invalid compression level {0}; expected -1 or 0..=9")]
    InvalidCompressionLevel(i32),

    /// A configuration file could not be read or failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A status code token is not a number or not a valid HTTP status.
    #[error("Invalid status code")]
    InvalidStatusCode,

    /// A weight token is not a finite, non-negative number.
    #[error("Invalid weight {0:?}")]
    InvalidWeight(String),

    /// Every weight in the list is zero.
    #[error("weights must sum to a positive value")]
    ZeroTotalWeight,

    /// `/range/{n}` was asked for a payload outside `1..=max`.
    #[error("number of bytes must be in the range (0, {max}]")]
    ByteCountOutOfRange { max: usize },

    /// The `Range` header cannot be satisfied against a payload of `length` bytes.
    #[error("requested range not satisfiable")]
    RangeNotSatisfiable { length: usize },

    /// Any other malformed client input.
    #[error("{0}")]
    BadRequest(String),

    /// Reading a file or producing a response body failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A response could not be assembled.
    #[error("failed to build response: {0}")]
    Http(#[from] http::Error),
}

impl Error {
    /// HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::InvalidStatusCode
            | Error::InvalidWeight(_)
            | Error::ZeroTotalWeight
            | Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::ByteCountOutOfRange { .. } => StatusCode::NOT_FOUND,
            Error::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            Error::InvalidCompressionLevel(_)
            | Error::Config(_)
            | Error::Io(_)
            | Error::Http(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "rejected request");
        }

        let mut response = (status, self.to_string()).into_response();
        if let Error::RangeNotSatisfiable { length } = self {
            let headers = response.headers_mut();
            if let Ok(value) = HeaderValue::from_str(&format!("bytes */{length}")) {
                headers.insert(header::CONTENT_RANGE, value);
            }
            if let Ok(value) = HeaderValue::from_str(&format!("range{length}")) {
                headers.insert(header::ETAG, value);
            }
        }
        response
    }
}
