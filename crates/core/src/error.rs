//! Unified error types for raphael-sw.
//!
//! Every variant renders with a stable code prefix so hosts can match on
//! `Error::code` without parsing messages.

use tokio_rusqlite::rusqlite;

/// Unified error types for the request interceptor.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input (e.g., an event line that does not parse).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Stored entry could not be encoded or decoded.
    #[error("CACHE_ERROR: corrupt entry: {0}")]
    CorruptEntry(String),

    /// The network fetch failed outright (offline, DNS, connection reset).
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// A manifest asset answered with a non-success status.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// A navigation failed and the offline document is not cached.
    #[error("OFFLINE_FALLBACK_MISSING: {0}")]
    OfflineFallbackMissing(String),

    /// The host rejected a capability call (notification, claim, skip-waiting).
    #[error("HOST_ERROR: {0}")]
    Host(String),
}

impl Error {
    /// Stable machine-readable code, matching the display prefix.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::Database(_) | Error::MigrationFailed(_) | Error::CorruptEntry(_) => "CACHE_ERROR",
            Error::Network(_) => "NETWORK_ERROR",
            Error::HttpError(_) => "HTTP_ERROR",
            Error::OfflineFallbackMissing(_) => "OFFLINE_FALLBACK_MISSING",
            Error::Host(_) => "HOST_ERROR",
        }
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::CorruptEntry(err.to_string())
    }
}
