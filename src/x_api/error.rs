//! Error type for the X API client.
//!
//! [`ApiError`] covers the failure shapes the client can surface: a rate
//! limit (HTTP 429), any other non-success status, a body that does not
//! match the expected shape, and the underlying network error.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP 429. `retry_after` is derived from the rate-limit reset header.
    #[error("rate limited, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// Any other non-success status, with the head of the response body.
    #[error("API error (status {status}): {message}")]
    Status { status: u16, message: String },

    /// A success status whose body could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// DNS, connect, TLS or timeout failures from `reqwest`.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}
