//! The bound verb API and its chainable headers.
//!
//! # Design
//! `Http` pairs a shared transport with its own header map. `header()` never
//! touches `self`: it copies the map, adds one entry and returns a new
//! `Http`. Siblings derived from the same parent therefore never see each
//! other's headers, and any `Http` can be reused across concurrent requests.
//! Each verb prepares a `Request` from the current headers, hands it to the
//! transport, and runs the raw outcome through the completion handler.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::Instrument;

use crate::completion::handle_complete;
use crate::config::ClientConfig;
use crate::error::{Error, HeaderError};
use crate::http::{Headers, Method, Request, Response};
use crate::transport::{HostTransport, SocketTransport, Transport};

#[derive(Clone)]
pub struct Http {
    transport: Arc<dyn Transport>,
    headers: Headers,
}

impl Http {
    /// A root API with no headers.
    pub fn new<T: Transport + 'static>(transport: T) -> Self {
        Self::from_shared(Arc::new(transport))
    }

    pub fn from_shared(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            headers: Headers::new(),
        }
    }

    /// Root API over [`SocketTransport`].
    pub fn socket() -> Self {
        Self::new(SocketTransport::new())
    }

    /// Root API over [`HostTransport`] with its default request object.
    pub fn host() -> Self {
        Self::new(HostTransport::new())
    }

    /// Root API seeded with `config.headers`, each checked like `header()`.
    pub fn with_config<T: Transport + 'static>(
        transport: T,
        config: &ClientConfig,
    ) -> Result<Self, HeaderError> {
        config
            .headers
            .iter()
            .try_fold(Self::new(transport), |api, (key, value)| {
                api.header(key.as_str(), value.as_str())
            })
    }

    /// Snapshot of the headers every verb on this value sends.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Derive a new API carrying one more header. `self` is left untouched.
    ///
    /// Both arguments accept `&str` or `Option<&str>`; `None` is rejected
    /// before any request can be made.
    pub fn header<'a>(
        &self,
        key: impl Into<Option<&'a str>>,
        value: impl Into<Option<&'a str>>,
    ) -> Result<Self, HeaderError> {
        let key = key.into().ok_or(HeaderError::MissingKey)?;
        let value = value.into().ok_or_else(|| HeaderError::MissingValue {
            key: key.to_string(),
        })?;

        let mut headers = self.headers.clone();
        headers.insert(key.to_string(), value.to_string());
        Ok(Self {
            transport: Arc::clone(&self.transport),
            headers,
        })
    }

    pub async fn get(&self, url: &str) -> Result<Response, Error> {
        self.send(Method::Get, url, None).await
    }

    /// Objects and arrays are sent as JSON; other values as their text.
    pub async fn post(&self, url: &str, body: Option<Value>) -> Result<Response, Error> {
        self.send(Method::Post, url, body).await
    }

    pub async fn put(&self, url: &str, body: Option<Value>) -> Result<Response, Error> {
        self.send(Method::Put, url, body).await
    }

    pub async fn delete(&self, url: &str) -> Result<Response, Error> {
        self.send(Method::Delete, url, None).await
    }

    async fn send(&self, method: Method, url: &str, body: Option<Value>) -> Result<Response, Error> {
        let span = tracing::debug_span!("http", %method, url);
        let request = Request::prepare(method, url, body, &self.headers);

        async {
            tracing::debug!(headers = request.headers.len(), "sending request");
            let raw = self.transport.send(request).await.map_err(|e| {
                tracing::warn!(error = %e, "transport fault");
                e
            })?;
            tracing::debug!(status = raw.status, bytes = raw.body.len(), "response complete");
            handle_complete(raw)
        }
        .instrument(span)
        .await
    }
}

impl fmt::Debug for Http {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Http")
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}
