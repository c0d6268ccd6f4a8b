//! Error types for parity runs

use parity_compare::PaginationError;
use parity_ctid::CtidError;
use parity_stream::StreamError;
use std::time::Duration;
use thiserror::Error;

/// Result type for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors that stop a parity check from producing a comparison
///
/// Servers disagreeing is not an error; it is recorded in the run report.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The HTTP request itself failed
    #[error("request to {server} failed: {source}")]
    Http {
        server: String,
        #[source]
        source: reqwest::Error,
    },

    /// The response carried no `result` object
    #[error("{server} returned no result for {method}")]
    MissingResult { server: String, method: String },

    /// A field the check depends on was absent
    #[error("{server} response lacks '{field}'")]
    MissingField { server: String, field: String },

    /// The response was an error the check cannot proceed past
    #[error("{server} returned '{error}' for {method}")]
    Rpc {
        server: String,
        method: String,
        error: String,
    },

    /// A server never became healthy
    #[error("{server} did not become healthy within {timeout:?}")]
    Unhealthy { server: String, timeout: Duration },

    /// Invalid configuration value
    #[error("invalid configuration value for '{key}': {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error(transparent)]
    Pagination(#[from] PaginationError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Ctid(#[from] CtidError),
}
