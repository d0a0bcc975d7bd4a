//! An asynchronous AJP13 connector
//!
//! This crate is the protocol front end of an application server: it accepts
//! the connections a reverse proxy (Apache `mod_jk`, `mod_proxy_ajp`, ...)
//! opens, speaks the AJP13 binary protocol on them and hands every exchange to
//! a [`handler::Dispatcher`] as a pooled request / response pair.
//!
//! # Features
//!
//! - AJP13 packet framing and the full FORWARD_REQUEST layout
//! - Request bodies pulled in bounded chunks through GET_BODY_CHUNK
//! - Streaming responses, the body never has to be held in memory
//! - Keep-alive connections with separate connect and idle timeouts
//! - CPING / CPONG liveness probes
//! - Pooled requests and responses, reset before every reuse
//! - Bounded worker count for backpressure
//! - Cooperative shutdown of the accept loop
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use micro_ajp::config::ListenerConfig;
//! use micro_ajp::handler::{BoxError, Dispatcher, ResponseWriter};
//! use micro_ajp::listener::{Ajp13Protocol, ConnectionListener};
//! use micro_ajp::pool::ObjectPool;
//! use micro_ajp::protocol::Request;
//!
//! #[derive(Debug)]
//! struct Hello;
//!
//! #[async_trait]
//! impl Dispatcher for Hello {
//!     async fn dispatch(&self, _target: &str, _request: &mut Request, response: &mut ResponseWriter<'_>) -> Result<(), BoxError> {
//!         response.write(b"Hello World!\r\n").await?;
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ListenerConfig::default();
//!     let pool = Arc::new(ObjectPool::new(&config));
//!     let protocol = Arc::new(Ajp13Protocol::new(&config, Arc::clone(&pool)));
//!
//!     let mut listener = ConnectionListener::new(config, pool, protocol, Arc::new(Hello));
//!     listener.start().expect("bind AJP13 port");
//!     listener.join().await;
//! }
//! ```
//!
//! # Architecture
//!
//! The crate is organized into several key modules:
//!
//! - [`codec`]: packet framing and message encoding/decoding, no I/O
//! - [`connection`]: a socket read packet by packet plus a buffered packet writer
//! - [`protocol`]: messages, pooled request / response types and errors
//! - [`listener`]: the [`listener::Protocol`] contract, its AJP13 implementation and the accept loop
//! - [`pool`]: slab pools with in-use tracking and the worker slots
//! - [`worker`]: the per-connection exchange loop
//! - [`handler`]: the dispatcher seam and the streaming response writer
//! - [`config`]: listener settings
//!
//! # Core Components
//!
//! ## Exchange Lifecycle
//!
//! A [`listener::ConnectionListener`] accepts a socket and gives it to
//! [`pool::ObjectPool::handle_request`], which takes a worker slot and spawns
//! a [`worker::Worker`]. The worker loops:
//!
//! - `allocate` borrows a request and a response and reads one packet
//! - the dispatcher runs against the populated request
//! - `finish` commits the response and sends END_RESPONSE
//! - `deallocate` returns both objects to the pool
//!
//! until the peer closes, the keep-alive timeout expires or an error occurs.
//!
//! ## Error Handling
//!
//! - [`protocol::AjpError`]: Top-level error type
//! - [`protocol::ParseError`]: framing and request errors, fatal for the connection
//! - [`protocol::SendError`]: response encoding and writing errors
//! - [`protocol::PoolError`]: no pooled object or worker available in time
//!
//! # Limitations
//!
//! - AJP13 only, the HTTP listener is not part of this crate
//! - Request bodies are fully received before dispatch, bounded by `max_body_size`
//! - No TLS, the web server terminates it and forwards the details as attributes

pub mod codec;
pub mod config;
pub mod connection;
pub mod handler;
pub mod listener;
pub mod pool;
pub mod protocol;
pub mod worker;

mod utils;
pub(crate) use utils::ensure;
