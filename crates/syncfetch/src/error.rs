//! Error types for the fetch bridge.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid header, MIME token, URL, method, or body shape.
    Validation,
    /// A body was read twice.
    BodyConsumed,
    /// Malformed MIME type string or JSON body.
    Parse,
    /// The worker misbehaved: no output, non-JSON output, or timeout.
    Protocol,
    /// The worker reported a network or HTTP failure.
    Transport,
    /// Unreadable or invalid bridge configuration.
    Config,
}

/// Errors that can occur while building, sending, or reading a fetch.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid header name: {0:?}")]
    InvalidHeaderName(String),

    #[error("invalid value {value:?} for header {name:?}")]
    InvalidHeaderValue { name: String, value: String },

    #[error("{0}")]
    InvalidHeaderInit(&'static str),

    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("{0:?} is not a valid HTTP method")]
    InvalidMethod(String),

    #[error("{0:?} HTTP method is unsupported")]
    ForbiddenMethod(String),

    #[error("request with {0} method cannot have body")]
    BodyNotAllowed(String),

    #[error("sync fetch does not support bodies of type: {0}")]
    UnsupportedBody(&'static str),

    #[error("body view {offset}..{end} is out of bounds for a buffer of {len} bytes")]
    InvalidBodyView { offset: usize, end: usize, len: usize },

    #[error("invalid status code: {0}")]
    InvalidStatus(u16),

    #[error("invalid MIME {what} {value:?}: {reason}")]
    InvalidMime {
        what: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("could not parse MIME type string {0:?}")]
    MimeParse(String),

    #[error("body used already for: {url}")]
    BodyUsed { url: String },

    #[error("invalid json response body at {url} reason: {reason}")]
    InvalidJson { url: String, reason: String },

    #[error("worker protocol violation: {0}")]
    Protocol(String),

    #[error("worker timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to run worker {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidHeaderName(_)
            | Error::InvalidHeaderValue { .. }
            | Error::InvalidHeaderInit(_)
            | Error::InvalidUrl { .. }
            | Error::InvalidMethod(_)
            | Error::ForbiddenMethod(_)
            | Error::BodyNotAllowed(_)
            | Error::UnsupportedBody(_)
            | Error::InvalidBodyView { .. }
            | Error::InvalidStatus(_)
            | Error::InvalidMime { .. } => ErrorKind::Validation,
            Error::BodyUsed { .. } => ErrorKind::BodyConsumed,
            Error::MimeParse(_) | Error::InvalidJson { .. } => ErrorKind::Parse,
            Error::Protocol(_) | Error::Timeout(_) | Error::Spawn { .. } => ErrorKind::Protocol,
            Error::Transport(_) => ErrorKind::Transport,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }

    /// The reconstructed worker error, if this is a transport failure.
    pub fn as_transport(&self) -> Option<&TransportError> {
        match self {
            Error::Transport(err) => Some(err),
            _ => None,
        }
    }
}

/// Which error family a [`TransportError`] was reconstructed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorName {
    TypeError,
    FetchError,
}

impl TransportErrorName {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportErrorName::TypeError => "TypeError",
            TransportErrorName::FetchError => "FetchError",
        }
    }

    /// `"TypeError"` maps to itself; every other name is a fetch error.
    pub fn from_wire(name: &str) -> Self {
        if name == "TypeError" {
            TransportErrorName::TypeError
        } else {
            TransportErrorName::FetchError
        }
    }
}

impl fmt::Display for TransportErrorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure raised inside the worker (or recorded against a body) and
/// carried across the process boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name}: {message}")]
pub struct TransportError {
    pub name: TransportErrorName,
    pub message: String,
    /// Fetch error type, e.g. `system`, `max-redirect`, `request-timeout`.
    pub error_type: Option<String>,
    /// System error code, e.g. `ECONNREFUSED`.
    pub code: Option<String>,
}

impl TransportError {
    pub fn type_error(message: impl Into<String>) -> Self {
        Self {
            name: TransportErrorName::TypeError,
            message: message.into(),
            error_type: None,
            code: None,
        }
    }

    pub fn fetch_error(message: impl Into<String>, error_type: impl Into<String>) -> Self {
        Self {
            name: TransportErrorName::FetchError,
            message: message.into(),
            error_type: Some(error_type.into()),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_classified() {
        assert_eq!(
            Error::InvalidHeaderName("a b".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            Error::BodyUsed { url: "u".into() }.kind(),
            ErrorKind::BodyConsumed
        );
        assert_eq!(Error::MimeParse("x".into()).kind(), ErrorKind::Parse);
        assert_eq!(
            Error::Timeout(Duration::from_secs(1)).kind(),
            ErrorKind::Protocol
        );
        assert_eq!(
            Error::from(TransportError::type_error("bad")).kind(),
            ErrorKind::Transport
        );
        assert_eq!(Error::Config("x".into()).kind(), ErrorKind::Config);
    }

    #[test]
    fn body_used_message_names_url() {
        let err = Error::BodyUsed {
            url: "https://example.com/a.png".into(),
        };
        assert_eq!(
            err.to_string(),
            "body used already for: https://example.com/a.png"
        );
    }

    #[test]
    fn transport_error_display() {
        let err = TransportError::fetch_error("HTTP 404", "http-status");
        assert_eq!(err.to_string(), "FetchError: HTTP 404");
        let err = TransportError::type_error("Invalid URL");
        assert_eq!(err.to_string(), "TypeError: Invalid URL");
    }

    #[test]
    fn wire_names_default_to_fetch_error() {
        assert_eq!(
            TransportErrorName::from_wire("TypeError"),
            TransportErrorName::TypeError
        );
        assert_eq!(
            TransportErrorName::from_wire("AbortError"),
            TransportErrorName::FetchError
        );
    }

    #[test]
    fn with_code_sets_code() {
        let err = TransportError::fetch_error("refused", "system").with_code("ECONNREFUSED");
        assert_eq!(err.code.as_deref(), Some("ECONNREFUSED"));
        assert_eq!(err.error_type.as_deref(), Some("system"));
    }
}
