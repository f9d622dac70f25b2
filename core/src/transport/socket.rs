//! Socket-level HTTP/1.1 transport.
//!
//! # Design
//! The URL scheme picks the channel: `https` runs over rustls with the
//! webpki root set, anything unschemed or `http` over plain TCP. On top of
//! either stream, hyper's HTTP/1.1 client connection does the framing. Each
//! request gets its own connection. The body is always read to the end,
//! up to `max_body_bytes`, before returning, whatever the status.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use bytes::Bytes;
use http::header;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use url::{Host, Url};

use super::Transport;
use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::http::{Headers, RawResponse, Request};

static TLS_CONFIG: OnceLock<Arc<rustls::ClientConfig>> = OnceLock::new();

fn tls_config() -> Arc<rustls::ClientConfig> {
    TLS_CONFIG
        .get_or_init(|| {
            let mut store = rustls::RootCertStore::empty();
            store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

            Arc::new(
                rustls::ClientConfig::builder()
                    .with_root_certificates(store)
                    .with_no_client_auth(),
            )
        })
        .clone()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Plain,
    Tls,
}

/// Where a request goes, resolved from its URL.
#[derive(Debug)]
struct Target {
    channel: Channel,
    host: String,
    port: u16,
    /// Value for the `Host` header.
    authority: String,
    /// Origin-form request target: path plus query.
    path: String,
}

impl Target {
    /// A URL without a scheme is treated as `http://`.
    fn parse(raw: &str) -> Result<Self, TransportError> {
        let url = match Url::parse(raw) {
            Ok(url) if !url.cannot_be_a_base() => url,
            Ok(_) | Err(url::ParseError::RelativeUrlWithoutBase) => {
                Url::parse(&format!("http://{raw}"))?
            }
            Err(e) => return Err(e.into()),
        };

        let channel = match url.scheme() {
            "http" => Channel::Plain,
            "https" => Channel::Tls,
            other => return Err(TransportError::UnsupportedScheme(other.to_string())),
        };

        let host = match url.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            None => return Err(TransportError::MissingHost(raw.to_string())),
        };
        let port = url
            .port_or_known_default()
            .ok_or_else(|| TransportError::MissingHost(raw.to_string()))?;

        let host_str = url.host_str().unwrap_or(&host);
        let authority = match url.port() {
            Some(port) => format!("{host_str}:{port}"),
            None => host_str.to_string(),
        };

        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }

        Ok(Self {
            channel,
            host,
            port,
            authority,
            path,
        })
    }
}

/// Talks HTTP/1.1 directly over a TCP (or TLS) socket.
#[derive(Debug, Clone)]
pub struct SocketTransport {
    user_agent: String,
    max_body_bytes: u64,
}

impl SocketTransport {
    pub fn new() -> Self {
        Self::with_config(&ClientConfig::default())
    }

    pub fn with_config(config: &ClientConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_body_bytes: config.max_body_bytes,
        }
    }
}

impl Default for SocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for SocketTransport {
    async fn send(&self, request: Request) -> Result<RawResponse, TransportError> {
        let target = Target::parse(&request.url)?;
        let wire = build_request(&target, &self.user_agent, &request)?;

        let socket = TcpStream::connect((target.host.as_str(), target.port)).await?;
        tracing::debug!(channel = ?target.channel, host = %target.host, port = target.port, "connected");

        match target.channel {
            Channel::Plain => exchange(TokioIo::new(socket), wire, self.max_body_bytes).await,
            Channel::Tls => {
                let server_name = rustls::pki_types::ServerName::try_from(target.host.clone())
                    .map_err(|_| TransportError::InvalidDnsName(target.host.clone()))?;
                let stream = TlsConnector::from(tls_config())
                    .connect(server_name, socket)
                    .await?;
                exchange(TokioIo::new(stream), wire, self.max_body_bytes).await
            }
        }
    }
}

/// Turn a prepared request into an `http::Request`. Header names and values
/// are validated here, so a value carrying a line break never reaches the wire.
fn build_request(
    target: &Target,
    user_agent: &str,
    request: &Request,
) -> Result<http::Request<Full<Bytes>>, TransportError> {
    let supplied = |name: &str| request.headers.keys().any(|k| k.eq_ignore_ascii_case(name));

    let mut builder = http::Request::builder()
        .method(request.method.as_str())
        .uri(target.path.as_str());
    if !supplied("Host") {
        builder = builder.header(header::HOST, target.authority.as_str());
    }
    if !supplied("User-Agent") {
        builder = builder.header(header::USER_AGENT, user_agent);
    }
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let body = request.body.clone().map(Bytes::from).unwrap_or_default();
    Ok(builder.body(Full::new(body))?)
}

/// Run one request over an established stream and drain the response.
async fn exchange<I>(
    io: I,
    request: http::Request<Full<Bytes>>,
    max_body_bytes: u64,
) -> Result<RawResponse, TransportError>
where
    I: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
{
    let (mut sender, connection) = http1::handshake(io).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::debug!(error = %e, "connection closed with error");
        }
    });

    let response = sender.send_request(request).await?;
    let (parts, body) = response.into_parts();

    let declared = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|length| length > max_body_bytes) {
        return Err(TransportError::BodyTooLarge(max_body_bytes));
    }

    let limit = usize::try_from(max_body_bytes).unwrap_or(usize::MAX);
    let body = Limited::new(body, limit)
        .collect()
        .await
        .map_err(|e| {
            if e.is::<LengthLimitError>() {
                TransportError::BodyTooLarge(max_body_bytes)
            } else {
                TransportError::Body(e)
            }
        })?
        .to_bytes();

    let mut headers = Headers::new();
    for (name, value) in &parts.headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        headers
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.to_string());
    }

    let status_text = parts
        .extensions
        .get::<hyper::ext::ReasonPhrase>()
        .map(|reason| String::from_utf8_lossy(reason.as_bytes()).into_owned())
        .or_else(|| parts.status.canonical_reason().map(str::to_string));

    Ok(RawResponse {
        status: parts.status.as_u16(),
        status_text,
        body: String::from_utf8_lossy(&body).into_owned(),
        headers,
    })
}
