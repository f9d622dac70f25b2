//! Transports perform the literal network operation.
//!
//! # Design
//! A transport receives a fully prepared [`Request`] and returns the
//! [`RawResponse`] once the entire body has been read, or a
//! [`TransportError`] for faults below HTTP. Status codes are never
//! interpreted here; that is the completion handler's job.

pub mod host;
pub mod socket;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::http::{RawResponse, Request};

pub use host::{HostTransport, RequestObject, UreqRequest};
pub use socket::SocketTransport;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<RawResponse, TransportError>;
}
