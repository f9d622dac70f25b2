//! Transport-agnostic HTTP verbs with one result shape and one error taxonomy.
//!
//! # Overview
//! `get`, `post`, `put` and `delete` resolve to a [`Response`] of
//! `{ data, headers }` whichever [`Transport`] carries them. Non-200
//! responses fail with [`HttpError`]; JSON-shaped bodies that do not parse
//! fail with [`HttpParseError`]; everything below HTTP passes through as
//! [`TransportError`].
//!
//! # Design
//! - Transports only move bytes. Classification and body coercion live in
//!   [`completion::handle_complete`], shared by every transport.
//! - [`Http`] is an immutable value: `header()` returns a new one, so
//!   configurations can be shared freely.
//! - Two transports ship: [`SocketTransport`] speaks HTTP/1.1 over TCP or
//!   TLS, [`HostTransport`] drives a host-supplied request object.

pub mod client;
pub mod completion;
pub mod config;
pub mod error;
pub mod http;
pub mod transport;

pub use client::Http;
pub use config::ClientConfig;
pub use error::{Error, HeaderError, HttpError, HttpParseError, TransportError};
pub use crate::http::{Headers, Method, RawResponse, Request, Response};
pub use transport::{HostTransport, RequestObject, SocketTransport, Transport, UreqRequest};
