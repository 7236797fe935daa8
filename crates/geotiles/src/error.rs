//! Error types for the geotiles crate.

use std::fmt;

/// Result type for geotiles operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while fetching or interpreting a tileset.
#[derive(Debug)]
pub enum Error {
    /// HTTP request failed before a response arrived.
    Http {
        /// The URL that failed.
        url: String,
        /// The error message.
        message: String,
    },
    /// HTTP response had a non-success status code.
    HttpStatus {
        /// The URL that returned the error.
        url: String,
        /// The HTTP status code.
        status: u16,
    },
    /// The manifest was not valid tileset JSON.
    Json {
        /// Context for where the error occurred.
        context: &'static str,
        /// The error message.
        message: String,
    },
    /// A binary tile payload ended before the data its header describes.
    BufferTooSmall {
        /// Context for where the error occurred.
        context: &'static str,
        /// Bytes the header requires.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },
    /// The manifest parsed, but its contents are unusable.
    InvalidData {
        /// Context for where the error occurred.
        context: &'static str,
        /// Description of what was invalid.
        detail: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http { url, message } => {
                write!(f, "http request to {url} failed: {message}")
            }
            Error::HttpStatus { url, status } => {
                write!(f, "http request to {url} returned status {status}")
            }
            Error::Json { context, message } => {
                write!(f, "failed to parse {context}: {message}")
            }
            Error::BufferTooSmall {
                context,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "{context} too small: expected {expected} bytes, got {actual}"
                )
            }
            Error::InvalidData { context, detail } => {
                write!(f, "invalid {context}: {detail}")
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json {
            context: "tileset json",
            message: e.to_string(),
        }
    }
}
