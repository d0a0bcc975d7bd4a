use std::io;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AjpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },

    #[error("pool error: {source}")]
    PoolError {
        #[from]
        source: PoolError,
    },
}

impl AjpError {
    /// Returns true if the underlying failure is a read timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, AjpError::RequestError { source: ParseError::Timeout { .. } })
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("protocol violation: {reason}")]
    ProtocolViolation { reason: String },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("short packet: expected {expected} bytes, received {received}")]
    ShortPacket { expected: usize, received: usize },

    #[error("read timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("request body of {declared} bytes exceeds the limit {limit}")]
    BodyTooLarge { declared: u64, limit: u64 },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn protocol_violation<S: ToString>(str: S) -> Self {
        Self::ProtocolViolation { reason: str.to_string() }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn short_packet(expected: usize, received: usize) -> Self {
        Self::ShortPacket { expected, received }
    }

    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout { timeout }
    }

    pub fn body_too_large(declared: u64, limit: u64) -> Self {
        Self::BodyTooLarge { declared, limit }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("packet payload of {size} bytes exceeds the limit {max_size}")]
    TooLargePacket { size: usize, max_size: usize },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn too_large_packet(size: usize, max_size: usize) -> Self {
        Self::TooLargePacket { size, max_size }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("pool exhausted, all {capacity} instances are in use")]
    Exhausted { capacity: usize },

    #[error("pool closed")]
    Closed,
}

impl PoolError {
    pub fn exhausted(capacity: usize) -> Self {
        Self::Exhausted { capacity }
    }
}
