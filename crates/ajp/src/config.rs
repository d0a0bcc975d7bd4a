//! Listener configuration.
//!
//! Every field has a default, so a loader only supplies what it wants to
//! change. Durations are stored as milliseconds to stay friendly to plain
//! config formats. Values are checked by [`ListenerConfig::validate`] before a
//! listener starts.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{DEFAULT_MAX_PACKET_SIZE, HEADER_LEN, MAX_PAYLOAD_LEN};

/// The AJP13 port mod_jk and mod_proxy_ajp connect to by default
pub const DEFAULT_PORT: u16 = 8009;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Port to listen on, `None` disables the listener.
    pub listen_port: Option<u16>,

    /// Address to bind, all interfaces when absent.
    pub listen_address: Option<IpAddr>,

    /// Pending connections the OS queues before refusing new ones.
    pub backlog: u32,

    /// How often the accept loop wakes up to observe a shutdown request.
    pub accept_timeout_ms: u64,

    /// Read timeout for the first request on a connection and for body chunks.
    pub connection_timeout_ms: u64,

    /// Idle time allowed between two requests on one connection.
    pub keep_alive_timeout_ms: u64,

    /// Largest packet, header included, in either direction.
    pub max_packet_size: usize,

    /// Largest request body the listener accepts.
    pub max_body_size: u64,

    /// Requests and responses that may be lent out at once.
    pub pool_capacity: usize,

    /// Connections served concurrently.
    pub max_workers: usize,

    /// How long to wait for a pooled object or a worker, zero fails fast.
    pub acquire_timeout_ms: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            listen_port: Some(DEFAULT_PORT),
            listen_address: None,
            backlog: 1000,
            accept_timeout_ms: 5_000,
            connection_timeout_ms: 60_000,
            keep_alive_timeout_ms: 60_000,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            max_body_size: 16 * 1024 * 1024,
            pool_capacity: 256,
            max_workers: 256,
            acquire_timeout_ms: 5_000,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("max_packet_size {size} must be between {min} and {max}")]
    PacketSize { size: usize, min: usize, max: usize },
}

/// Smallest packet able to carry a body chunk with at least one byte
const MIN_PACKET_SIZE: usize = HEADER_LEN + 1 + 2 + 1 + 1;

impl ListenerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listen_port(mut self, port: Option<u16>) -> Self {
        self.listen_port = port;
        self
    }

    pub fn listen_address(mut self, address: IpAddr) -> Self {
        self.listen_address = Some(address);
        self
    }

    pub fn backlog(mut self, backlog: u32) -> Self {
        self.backlog = backlog;
        self
    }

    pub fn accept_timeout(mut self, timeout: Duration) -> Self {
        self.accept_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn keep_alive_timeout(mut self, timeout: Duration) -> Self {
        self.keep_alive_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn max_packet_size(mut self, size: usize) -> Self {
        self.max_packet_size = size;
        self
    }

    pub fn max_body_size(mut self, size: u64) -> Self {
        self.max_body_size = size;
        self
    }

    pub fn pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout_ms = duration_ms(timeout);
        self
    }

    /// The address to bind, `None` when the listener is disabled
    pub fn bind_addr(&self) -> Option<SocketAddr> {
        let port = self.listen_port?;
        let ip = self.listen_address.unwrap_or(IpAddr::from([0, 0, 0, 0]));
        Some(SocketAddr::new(ip, port))
    }

    pub fn accept_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.accept_timeout_ms)
    }

    pub fn connection_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn keep_alive_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.keep_alive_timeout_ms)
    }

    pub fn acquire_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_zero = [
            ("accept_timeout_ms", self.accept_timeout_ms == 0),
            ("connection_timeout_ms", self.connection_timeout_ms == 0),
            ("keep_alive_timeout_ms", self.keep_alive_timeout_ms == 0),
            ("backlog", self.backlog == 0),
            ("pool_capacity", self.pool_capacity == 0),
            ("max_workers", self.max_workers == 0),
        ];
        if let Some((field, _)) = non_zero.iter().find(|(_, zero)| *zero) {
            return Err(ConfigError::Zero { field: *field });
        }

        let max = MAX_PAYLOAD_LEN + HEADER_LEN;
        if !(MIN_PACKET_SIZE..=max).contains(&self.max_packet_size) {
            return Err(ConfigError::PacketSize { size: self.max_packet_size, min: MIN_PACKET_SIZE, max });
        }

        Ok(())
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
