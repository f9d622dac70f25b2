//! Error taxonomy for the verb functions.
//!
//! # Design
//! Only two failures are classified: a response whose status is not exactly
//! 200 (`HttpError`) and a 200 response whose body looked like JSON but did
//! not parse (`HttpParseError`). Connection-level faults are carried through
//! untouched in `TransportError`. Callers branch on `Error` to tell the three
//! apart. Header argument errors are separate because they surface
//! synchronously from `Http::header`, never from a request.

use thiserror::Error;

/// Message used when a non-200 response carries no body.
pub const DEFAULT_MESSAGE: &str = "Failed while making Http request.";

/// Status used when none was supplied.
pub const DEFAULT_STATUS: u16 = 500;

/// The server answered with a status other than 200.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HttpError {
    pub status: u16,
    pub message: String,
    pub status_text: Option<String>,
}

impl HttpError {
    /// Build an error, falling back to `DEFAULT_STATUS` and `DEFAULT_MESSAGE`
    /// for missing (or empty) values.
    pub fn new(status: Option<u16>, message: Option<&str>, status_text: Option<&str>) -> Self {
        let message = match message {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => DEFAULT_MESSAGE.to_string(),
        };
        Self {
            status: status.unwrap_or(DEFAULT_STATUS),
            message,
            status_text: status_text.map(str::to_string),
        }
    }
}

impl Default for HttpError {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}

/// A JSON-shaped 200 body failed to parse.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HttpParseError {
    pub message: String,
    pub response_text: String,
    #[source]
    pub parse_error: serde_json::Error,
}

impl HttpParseError {
    pub fn new(response_text: &str, parse_error: serde_json::Error) -> Self {
        Self {
            message: format!("Failed to parse: \"{response_text}\""),
            response_text: response_text.to_string(),
            parse_error,
        }
    }
}

/// Faults raised below the HTTP layer. Never classified, only forwarded.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),

    #[error("url has no host: {0}")]
    MissingHost(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid dns name: {0}")]
    InvalidDnsName(String),

    /// The request could not be expressed as HTTP, e.g. a header value
    /// containing a line break.
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] http::Error),

    /// The HTTP/1.1 exchange failed, including malformed response framing.
    #[error("http error: {0}")]
    Hyper(#[from] hyper::Error),

    #[error("failed reading response body: {0}")]
    Body(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The response body is larger than the configured limit.
    #[error("response body exceeds {0} bytes")]
    BodyTooLarge(u64),

    /// The host request object reported a failure.
    #[error("request object error: {0}")]
    Host(#[from] ureq::Error),

    /// The request object was dropped without ever completing.
    #[error("request abandoned before completion")]
    Abandoned,
}

/// Every way a verb call can fail.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Status(#[from] HttpError),

    #[error(transparent)]
    Parse(#[from] HttpParseError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl Error {
    /// The HTTP status, when the server answered with a non-200.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Status(e) => Some(e.status),
            _ => None,
        }
    }

    pub fn is_status(&self) -> bool {
        matches!(self, Error::Status(_))
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, Error::Parse(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

/// Invalid arguments to `Http::header`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("A key for the HTTP header is required.")]
    MissingKey,

    #[error("A value for the '{key}' HTTP header is required.")]
    MissingValue { key: String },
}
