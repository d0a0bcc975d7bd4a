//! AJP13 connection handling module
//!
//! This module owns the socket side of the protocol: framing reads into
//! packets, buffering container packets until they are flushed, and the
//! GET_BODY_CHUNK negotiation that pulls a request body from the web server.
//!
//! # Components
//!
//! - [`Connection`]: one accepted socket:
//!   - Reads one packet at a time, bounded by a read timeout
//!   - Holds the local and peer addresses
//!   - Owned by a single worker, exchanges on it never overlap
//!
//! - [`OutputStream`]: buffered writer for container packets
//!
//! - [`read_body`]: the GET_BODY_CHUNK loop

mod ajp_connection;
mod body;
mod output;

pub use ajp_connection::BoxedReader;
pub use ajp_connection::BoxedWriter;
pub use ajp_connection::Connection;
pub use body::read_body;
pub use body::MAX_BODY_CHUNK_REQUEST;
pub use output::OutputStream;
