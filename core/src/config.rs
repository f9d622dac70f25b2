//! Client configuration.
//!
//! Loaded from JSON or built in code. `headers` seed the root [`crate::Http`]
//! and go through the same validation as [`crate::Http::header`].
//! `max_body_bytes` caps how much of a response body either transport will
//! read; a larger body fails with `TransportError::BodyTooLarge`.

use serde::Deserialize;

use crate::http::Headers;

/// 10 MiB.
pub const DEFAULT_MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

pub fn default_user_agent() -> String {
    format!("rest-core/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub user_agent: String,
    pub headers: Headers,
    pub max_body_bytes: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            headers: Headers::new(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl ClientConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
