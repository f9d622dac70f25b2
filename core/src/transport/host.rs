//! Transport over a host-supplied request object.
//!
//! # Design
//! Some environments hand out a request object instead of a socket: you open
//! it, set headers, send a body, and get called back once it is done. The
//! object comes from a swappable factory so tests can substitute a fake.
//! The callback is a `FnOnce` bridged to a oneshot channel, which makes
//! "completes at most once" a property of the types. Request objects never
//! expose response headers, so those are always empty. `Content-Length` is
//! left for the object to compute.
//!
//! Redirects are not followed: a 3xx is handed to the completion handler
//! like any other non-200, matching the socket transport.

use std::sync::Arc;
use std::thread;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::Transport;
use crate::config::{ClientConfig, DEFAULT_MAX_BODY_BYTES};
use crate::error::TransportError;
use crate::http::{Headers, Method, RawResponse, Request, CONTENT_LENGTH};

/// The done state of a request object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completed {
    pub status: u16,
    pub status_text: Option<String>,
    pub response_text: String,
}

/// Called once when the request object finishes.
pub type Completion = Box<dyn FnOnce(Result<Completed, TransportError>) + Send>;

/// A host request object, driven as open, headers, send.
pub trait RequestObject: Send {
    fn open(&mut self, method: Method, url: &str);

    fn set_request_header(&mut self, name: &str, value: &str);

    /// Start the request. `on_complete` must run after the whole response
    /// body has arrived, or with the transport fault.
    fn send(self: Box<Self>, body: Option<String>, on_complete: Completion);
}

pub type RequestFactory = Arc<dyn Fn() -> Box<dyn RequestObject> + Send + Sync>;

pub struct HostTransport {
    factory: RequestFactory,
}

impl HostTransport {
    /// Backed by [`UreqRequest`].
    pub fn new() -> Self {
        Self::with_config(&ClientConfig::default())
    }

    pub fn with_config(config: &ClientConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(0)
            .max_redirects_will_error(false)
            .build()
            .new_agent();
        let user_agent = config.user_agent.clone();
        let max_body_bytes = config.max_body_bytes;
        Self::with_factory(move || {
            Box::new(UreqRequest::new(agent.clone(), &user_agent).max_body_bytes(max_body_bytes))
                as Box<dyn RequestObject>
        })
    }

    /// Swap in a different request object, e.g. a fake for tests.
    pub fn with_factory<F>(factory: F) -> Self
    where
        F: Fn() -> Box<dyn RequestObject> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
        }
    }
}

impl Default for HostTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HostTransport {
    async fn send(&self, request: Request) -> Result<RawResponse, TransportError> {
        let mut object = (self.factory)();
        object.open(request.method, &request.url);
        for (name, value) in &request.headers {
            if !name.eq_ignore_ascii_case(CONTENT_LENGTH) {
                object.set_request_header(name, value);
            }
        }

        let (tx, rx) = oneshot::channel();
        object.send(
            request.body,
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );

        let completed = rx.await.map_err(|_| TransportError::Abandoned)??;
        Ok(RawResponse {
            status: completed.status,
            status_text: completed.status_text,
            body: completed.response_text,
            headers: Headers::new(),
        })
    }
}

/// Request object backed by a blocking `ureq::Agent` on its own thread.
///
/// The agent must not treat 4xx/5xx as errors and must not follow
/// redirects; status interpretation belongs to the completion handler.
pub struct UreqRequest {
    agent: ureq::Agent,
    user_agent: String,
    max_body_bytes: u64,
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
}

impl UreqRequest {
    pub fn new(agent: ureq::Agent, user_agent: &str) -> Self {
        Self {
            agent,
            user_agent: user_agent.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            method: Method::Get,
            url: String::new(),
            headers: Vec::new(),
        }
    }

    /// Cap on the response body, in bytes.
    pub fn max_body_bytes(mut self, limit: u64) -> Self {
        self.max_body_bytes = limit;
        self
    }

    fn with_headers<B>(&self, mut builder: ureq::RequestBuilder<B>) -> ureq::RequestBuilder<B> {
        if !self
            .headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("User-Agent"))
        {
            builder = builder.header("User-Agent", self.user_agent.as_str());
        }
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
    }

    fn execute(&self, body: Option<String>) -> Result<Completed, TransportError> {
        let url = &self.url;
        let mut response = match (self.method, body) {
            (Method::Get, _) => self.with_headers(self.agent.get(url)).call(),
            (Method::Delete, _) => self.with_headers(self.agent.delete(url)).call(),
            (Method::Post, Some(body)) => self.with_headers(self.agent.post(url)).send(body.as_bytes()),
            (Method::Post, None) => self.with_headers(self.agent.post(url)).send_empty(),
            (Method::Put, Some(body)) => self.with_headers(self.agent.put(url)).send(body.as_bytes()),
            (Method::Put, None) => self.with_headers(self.agent.put(url)).send_empty(),
        }?;

        let status = response.status();
        let response_text = response
            .body_mut()
            .with_config()
            .limit(self.max_body_bytes)
            .read_to_string()
            .map_err(|e| match e {
                ureq::Error::BodyExceedsLimit(limit) => TransportError::BodyTooLarge(limit),
                other => TransportError::Host(other),
            })?;
        Ok(Completed {
            status: status.as_u16(),
            status_text: status.canonical_reason().map(str::to_string),
            response_text,
        })
    }
}

impl RequestObject for UreqRequest {
    fn open(&mut self, method: Method, url: &str) {
        self.method = method;
        self.url = url.to_string();
        self.headers.clear();
    }

    fn set_request_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn send(self: Box<Self>, body: Option<String>, on_complete: Completion) {
        let spawned = thread::Builder::new()
            .name("ureq-request".to_string())
            .spawn(move || on_complete(self.execute(body)));
        if let Err(e) = spawned {
            // The completion went down with the closure; the caller sees Abandoned.
            tracing::warn!(error = %e, "failed to spawn request thread");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Default, Clone)]
    struct Seen {
        method: Option<Method>,
        url: String,
        headers: Vec<(String, String)>,
        body: Option<String>,
    }

    enum Script {
        Reply(Completed),
        Fail,
        Drop,
    }

    struct FakeRequest {
        seen: Arc<Mutex<Seen>>,
        script: Arc<Mutex<Option<Script>>>,
    }

    impl RequestObject for FakeRequest {
        fn open(&mut self, method: Method, url: &str) {
            let mut seen = self.seen.lock().unwrap();
            seen.method = Some(method);
            seen.url = url.to_string();
        }

        fn set_request_header(&mut self, name: &str, value: &str) {
            self.seen
                .lock()
                .unwrap()
                .headers
                .push((name.to_string(), value.to_string()));
        }

        fn send(self: Box<Self>, body: Option<String>, on_complete: Completion) {
            self.seen.lock().unwrap().body = body;
            match self.script.lock().unwrap().take() {
                Some(Script::Reply(completed)) => on_complete(Ok(completed)),
                Some(Script::Fail) => on_complete(Err(TransportError::MissingHost("x".to_string()))),
                Some(Script::Drop) | None => drop(on_complete),
            }
        }
    }

    fn fake(script: Script) -> (HostTransport, Arc<Mutex<Seen>>) {
        let seen = Arc::new(Mutex::new(Seen::default()));
        let script = Arc::new(Mutex::new(Some(script)));
        let log = seen.clone();
        let transport = HostTransport::with_factory(move || {
            Box::new(FakeRequest {
                seen: log.clone(),
                script: script.clone(),
            }) as Box<dyn RequestObject>
        });
        (transport, seen)
    }

    fn reply(status: u16, text: &str) -> Script {
        Script::Reply(Completed {
            status,
            status_text: Some("OK".to_string()),
            response_text: text.to_string(),
        })
    }

    #[tokio::test]
    async fn drives_request_object_and_returns_raw_response() {
        let (transport, seen) = fake(reply(200, "hello"));
        let mut headers = Headers::new();
        headers.insert("post-key".to_string(), "my-post".to_string());
        let request = Request::prepare(
            Method::Post,
            "http://domain.com/user",
            Some(serde_json::json!({ "data": 123 })),
            &headers,
        );

        let raw = transport.send(request).await.unwrap();
        assert_eq!(raw.status, 200);
        assert_eq!(raw.body, "hello");
        assert!(raw.headers.is_empty());

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.method, Some(Method::Post));
        assert_eq!(seen.url, "http://domain.com/user");
        assert_eq!(seen.body.as_deref(), Some(r#"{"data":123}"#));
        assert!(seen
            .headers
            .contains(&("post-key".to_string(), "my-post".to_string())));
        assert!(seen.headers.contains(&(
            "Content-Type".to_string(),
            "application/json;charset=UTF-8".to_string()
        )));
    }

    #[tokio::test]
    async fn content_length_is_not_forwarded() {
        let (transport, seen) = fake(reply(200, ""));
        let request = Request::prepare(
            Method::Put,
            "http://domain.com/user",
            Some(serde_json::json!(999)),
            &Headers::new(),
        );
        transport.send(request).await.unwrap();

        let seen = seen.lock().unwrap().clone();
        assert!(seen.headers.iter().all(|(name, _)| name != CONTENT_LENGTH));
        assert_eq!(seen.body.as_deref(), Some("999"));
    }

    #[tokio::test]
    async fn transport_fault_passes_through() {
        let (transport, _) = fake(Script::Fail);
        let request = Request::prepare(Method::Get, "http://domain.com/user", None, &Headers::new());
        let err = transport.send(request).await.unwrap_err();
        assert!(matches!(err, TransportError::MissingHost(_)));
    }

    #[tokio::test]
    async fn dropped_completion_is_abandoned() {
        let (transport, _) = fake(Script::Drop);
        let request = Request::prepare(Method::Delete, "http://domain.com/user", None, &Headers::new());
        let err = transport.send(request).await.unwrap_err();
        assert!(matches!(err, TransportError::Abandoned));
    }

    #[tokio::test]
    async fn non_200_is_not_interpreted_here() {
        let (transport, _) = fake(reply(404, "not found"));
        let request = Request::prepare(Method::Get, "http://domain.com/user", None, &Headers::new());
        let raw = transport.send(request).await.unwrap();
        assert_eq!(raw.status, 404);
        assert_eq!(raw.body, "not found");
    }
}
