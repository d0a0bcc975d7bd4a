use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::FramedRead;
use tracing::trace;

use crate::codec::{Packet, PacketCodec};
use crate::connection::OutputStream;
use crate::protocol::{ParseError, SendError};

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// One socket accepted from a web server.
///
/// The read half is framed into packets, the write half is buffered by an
/// [`OutputStream`]. A connection is owned by a single worker for its whole
/// life, so every exchange on it is strictly sequential.
pub struct Connection {
    framed_read: FramedRead<BoxedReader, PacketCodec>,
    output: OutputStream<BoxedWriter>,
    local_addr: Option<SocketAddr>,
    peer_addr: Option<SocketAddr>,
    read_timeout: Option<Duration>,
}

impl Connection {
    pub fn new<R, W>(reader: R, writer: W, max_packet_size: usize) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let reader: BoxedReader = Box::new(reader);
        let writer: BoxedWriter = Box::new(writer);
        Self {
            framed_read: FramedRead::with_capacity(reader, PacketCodec::with_max_packet_size(max_packet_size), max_packet_size),
            output: OutputStream::with_capacity(writer, max_packet_size, max_packet_size),
            local_addr: None,
            peer_addr: None,
            read_timeout: None,
        }
    }

    pub fn from_tcp(stream: TcpStream, max_packet_size: usize) -> Self {
        let local_addr = stream.local_addr().ok();
        let peer_addr = stream.peer_addr().ok();
        let (reader, writer) = stream.into_split();
        Self::new(reader, writer, max_packet_size).with_addrs(local_addr, peer_addr)
    }

    pub fn with_addrs(mut self, local_addr: Option<SocketAddr>, peer_addr: Option<SocketAddr>) -> Self {
        self.local_addr = local_addr;
        self.peer_addr = peer_addr;
        self
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    /// Bounds every following [`Connection::read_packet`], `None` waits forever
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.read_timeout = timeout;
    }

    /// Reads exactly one packet.
    ///
    /// Returns `Ok(None)` when the peer closed the connection between packets
    /// and `ParseError::Timeout` when no packet completed within the read timeout.
    pub async fn read_packet(&mut self) -> Result<Option<Packet>, ParseError> {
        let next = match self.read_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.framed_read.next())
                .await
                .map_err(|_elapsed| ParseError::timeout(timeout))?,
            None => self.framed_read.next().await,
        };

        let packet = next.transpose()?;
        if let Some(packet) = &packet {
            trace!(length = packet.payload().len(), prefix = ?packet.prefix_code(), "read packet");
        }
        Ok(packet)
    }

    #[inline]
    pub fn output(&mut self) -> &mut OutputStream<BoxedWriter> {
        &mut self.output
    }

    /// Closes the read half, then shuts the write half down and drops it
    pub async fn close(self) -> Result<(), SendError> {
        let Self { framed_read, mut output, .. } = self;
        drop(framed_read);
        let result = output.shutdown().await;
        drop(output);
        result
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("local_addr", &self.local_addr)
            .field("peer_addr", &self.peer_addr)
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}
