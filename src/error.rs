//! Error types for the crossbook crate.
//!
//! In-pipeline problems (unparseable frames, invalid levels, stale deltas)
//! never surface as errors; they are skipped and at most logged. The types
//! here cover the edges of the pipeline: connecting to a venue, talking to
//! its REST API for support checks, and configuration.

use std::fmt;

/// The main error type for this crate
#[derive(Debug)]
pub enum Error {
    /// WebSocket error (handshake, I/O, protocol)
    WebSocket(tokio_tungstenite::tungstenite::Error),

    /// HTTP request failed (venue product-listing fetch)
    Http(reqwest::Error),

    /// JSON serialization/deserialization error
    Json(serde_json::Error),

    /// Invalid configuration (bad endpoint, bad option)
    Config(String),

    /// WebSocket connection closed by the remote peer
    ConnectionClosed,

    /// Operation timed out
    Timeout,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::WebSocket(e) => write!(f, "WebSocket error: {}", e),
            Error::Http(e) => write!(f, "HTTP error: {}", e),
            Error::Json(e) => write!(f, "JSON error: {}", e),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::ConnectionClosed => write!(f, "WebSocket connection closed"),
            Error::Timeout => write!(f, "Operation timed out"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::WebSocket(e) => Some(e),
            Error::Http(e) => Some(e),
            Error::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Http(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}
