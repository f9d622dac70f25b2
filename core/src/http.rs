//! HTTP request and response types as plain data.
//!
//! # Design
//! A `Request` is fully prepared before it reaches a transport: the body is
//! already serialized and the wire headers it implies are already set, so
//! every transport sends the same bytes for the same call. A `RawResponse`
//! is what a transport hands back; `Response` is the normalized shape every
//! verb resolves to.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_LENGTH: &str = "Content-Length";
pub const JSON_CONTENT_TYPE: &str = "application/json;charset=UTF-8";

/// Header name to value. Keys are kept exactly as supplied.
pub type Headers = BTreeMap<String, String>;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    /// Only POST and PUT carry a body.
    pub fn accepts_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request described as plain data, ready for a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    pub body: Option<String>,
}

impl Request {
    /// Serialize `body` and derive the wire headers it implies.
    ///
    /// Objects and arrays become JSON text and always set the JSON content
    /// type, replacing any caller value. Strings go out verbatim; numbers and
    /// booleans as their literal text. `Null` is treated as no body. Any body
    /// sets `Content-Length` to its byte length. GET and DELETE drop the body.
    pub fn prepare(method: Method, url: &str, body: Option<Value>, headers: &Headers) -> Self {
        let mut headers = headers.clone();
        let body = body.filter(|_| method.accepts_body()).and_then(|value| match value {
            Value::Null => None,
            Value::String(text) => Some(text),
            Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
            Value::Object(_) | Value::Array(_) => {
                headers.insert(CONTENT_TYPE.to_string(), JSON_CONTENT_TYPE.to_string());
                Some(value.to_string())
            }
        });
        if let Some(text) = &body {
            headers.insert(CONTENT_LENGTH.to_string(), text.len().to_string());
        }
        Self {
            method,
            url: url.to_string(),
            headers,
            body,
        }
    }
}

/// What a transport observed once the whole response body was read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: Option<String>,
    pub body: String,
    /// Empty when the transport cannot see response headers.
    pub headers: Headers,
}

/// The single success shape returned by every verb.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub data: Value,
    pub headers: Headers,
}
