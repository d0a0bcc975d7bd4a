//! Protocol listeners.
//!
//! A wire protocol plugs into the generic [`crate::worker::Worker`] by
//! implementing [`Protocol`]. The worker drives the lifecycle, the protocol
//! decides how an exchange is read from and written to the connection.
//!
//! # Components
//!
//! - [`Protocol`]: the per-connection allocate / deallocate contract
//! - [`Ajp13Protocol`]: the AJP13 implementation
//! - [`ConnectionListener`]: accepts sockets and hands them to the [`crate::pool::ObjectPool`]

mod ajp13;
mod connection_listener;

pub use ajp13::key_size;
pub use ajp13::Ajp13Protocol;
pub use connection_listener::ConnectionListener;

use async_trait::async_trait;

use crate::connection::Connection;
use crate::pool::Pooled;
use crate::protocol::{AjpError, Request, Response, SendError};

/// What one call to [`Protocol::allocate`] produced
#[derive(Debug)]
pub enum Allocation {
    /// A populated request and the response bound to it
    Exchange { request: Pooled<Request>, response: Pooled<Response> },
    /// A packet that is not a request, the connection stays usable
    Skip,
    /// The keep-alive period ended or the peer went away, the connection should close
    NoRequest,
}

#[async_trait]
pub trait Protocol: Send + Sync {
    /// Reads the next exchange from `conn`.
    ///
    /// `first` tells whether this is the first request on the connection,
    /// which decides the read timeout. Pooled objects are returned before any
    /// error is propagated.
    async fn allocate(&self, conn: &mut Connection, first: bool) -> Result<Allocation, AjpError>;

    /// Returns whatever is present to the pool, `None` is a no-op
    fn deallocate(&self, request: Option<Pooled<Request>>, response: Option<Pooled<Response>>);

    /// The request target parsed during allocation
    fn resolve_request_target(&self, request: &mut Request) -> Option<String>;

    /// Whether another exchange may be attempted on `conn`
    async fn await_next_request(&self, conn: &mut Connection) -> bool;

    /// Completes the response on the wire, `reuse` tells the peer whether the connection stays open
    async fn finish(&self, conn: &mut Connection, response: &mut Response, reuse: bool) -> Result<(), SendError>;

    /// Closes the connection
    async fn release(&self, conn: Connection);
}
