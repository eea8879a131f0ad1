//! Error types for WatchRoom
//!
//! This module defines custom error types used throughout the application.
//! We use thiserror for the library error type and anyhow for
//! application-level error handling in the binary.

use thiserror::Error;

/// Main error type for WatchRoom
#[derive(Error, Debug)]
pub enum WatchRoomError {
    /// HTTP request failures
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// WebSocket push channel errors
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Non-success HTTP status returned by the room service
    #[error("Bad status {status}: {body}")]
    Status { status: u16, body: String },

    /// Malformed payloads on the wire
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Media widget errors
    #[error("Widget error: {0}")]
    Widget(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File error: {0}")]
    FileIO(#[from] std::io::Error),

    /// Invalid input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No live push connection
    #[error("ws connection is closed")]
    NotConnected,

    /// An operation did not finish in time
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Generic error for unexpected situations
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for WatchRoomError {
    fn from(err: serde_json::Error) -> Self {
        WatchRoomError::Protocol(format!("JSON error: {}", err))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for WatchRoomError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        WatchRoomError::WebSocket(err.to_string())
    }
}

impl From<url::ParseError> for WatchRoomError {
    fn from(err: url::ParseError) -> Self {
        WatchRoomError::Config(format!("Invalid URL: {}", err))
    }
}

impl WatchRoomError {
    /// Create a widget error from string
    pub fn widget_error<S: Into<String>>(msg: S) -> Self {
        WatchRoomError::Widget(msg.into())
    }
}

/// Convenience type alias for Results in WatchRoom
pub type Result<T> = std::result::Result<T, WatchRoomError>;

/// Extension trait for converting other errors to WatchRoomError
pub trait IntoRoomError<T> {
    /// Convert this error into a widget error with the given context
    fn widget_err(self, context: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> IntoRoomError<T> for std::result::Result<T, E> {
    fn widget_err(self, context: &str) -> Result<T> {
        self.map_err(|e| WatchRoomError::Widget(format!("{}: {}", context, e)))
    }
}
