//! Error types shared by the client, the local store and the flows.

use std::io;

use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single HTTP request. None of these are retried.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The base URL, path and query could not be assembled into a URL.
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The string that failed to parse.
        url: String,
        /// Parser message.
        reason: String,
    },
    /// The request never produced a response (unreachable host, timeout, TLS).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The server answered outside the 2xx range.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Status code returned by the server.
        status: StatusCode,
        /// Response body, possibly empty.
        body: String,
    },
    /// The server answered 2xx without a body.
    #[error("response body was empty")]
    EmptyBody,
    /// The body was not the JSON shape we expected.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failure of a local store operation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite rejected the statement or the commit.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// The genre blob could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The database file or its directory could not be prepared.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Failure surfaced by a flow to its caller.
///
/// Network failures never show up here: every flow falls back to the local
/// store instead.
#[derive(Error, Debug)]
pub enum FlowError {
    /// The local store failed while serving a fallback or a flag change.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result alias for HTTP client calls.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
/// Result alias for local store calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
/// Result alias for flow operations.
pub type FlowResult<T> = std::result::Result<T, FlowError>;
