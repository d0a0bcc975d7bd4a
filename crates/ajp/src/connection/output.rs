use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Encoder;

use crate::codec::ResponseEncoder;
use crate::protocol::{OutboundMessage, Response, SendError};

/// Buffered writer for container packets.
///
/// Messages are encoded into an in-memory buffer and only reach the socket on
/// [`OutputStream::flush`], so a response head and its first body chunk go out
/// in one write.
#[derive(Debug)]
pub struct OutputStream<W> {
    writer: W,
    buffer: BytesMut,
    encoder: ResponseEncoder,
}

impl<W> OutputStream<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn with_capacity(writer: W, buffer_size: usize, max_packet_size: usize) -> Self {
        Self {
            writer,
            buffer: BytesMut::with_capacity(buffer_size),
            encoder: ResponseEncoder::with_max_packet_size(max_packet_size),
        }
    }

    #[inline]
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    #[inline]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub fn max_packet_size(&self) -> usize {
        self.encoder.max_packet_size()
    }

    #[inline]
    pub fn write(&mut self, item: OutboundMessage<'_>) -> Result<(), SendError> {
        self.encoder.encode(item, &mut self.buffer)
    }

    /// Encodes the status line and headers once, later calls do nothing
    pub fn commit(&mut self, response: &mut Response) -> Result<(), SendError> {
        if response.is_committed() {
            return Ok(());
        }

        self.write(OutboundMessage::SendHeaders {
            status: response.status(),
            reason: response.reason(),
            headers: response.headers(),
        })?;
        response.set_committed();
        Ok(())
    }

    #[inline]
    pub async fn flush(&mut self) -> Result<(), SendError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        self.writer.write_all(self.buffer.as_ref()).await?;
        self.buffer.clear();
        Ok(self.writer.flush().await?)
    }

    /// Flushes what is buffered and shuts the write half down
    pub async fn shutdown(&mut self) -> Result<(), SendError> {
        let flushed = self.flush().await;
        let shutdown = self.writer.shutdown().await.map_err(SendError::io);
        flushed.and(shutdown)
    }
}

#[cfg(test)]
mod tests {
    use http::{HeaderValue, StatusCode};
    use tokio::io::AsyncReadExt;

    use super::*;
    use crate::codec::DEFAULT_MAX_PACKET_SIZE;

    #[tokio::test]
    async fn nothing_is_written_before_flush() {
        let (client, mut server) = tokio::io::duplex(1024);
        let mut output = OutputStream::with_capacity(client, 64, DEFAULT_MAX_PACKET_SIZE);

        output.write(OutboundMessage::CPong).unwrap();
        assert_eq!(output.buffered_len(), 5);

        output.flush().await.unwrap();
        assert_eq!(output.buffered_len(), 0);

        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0x41, 0x42, 0x00, 0x01, 0x09]);
    }

    #[tokio::test]
    async fn commit_sends_headers_once() {
        let (client, mut server) = tokio::io::duplex(1024);
        let mut output = OutputStream::with_capacity(client, 64, DEFAULT_MAX_PACKET_SIZE);

        let mut response = Response::default();
        response.set_status(StatusCode::NO_CONTENT);
        response.insert_header(http::header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));

        output.commit(&mut response).unwrap();
        let len = output.buffered_len();
        output.commit(&mut response).unwrap();

        assert!(response.is_committed());
        assert_eq!(output.buffered_len(), len);

        output.shutdown().await.unwrap();
        let mut buf = Vec::new();
        server.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf.len(), len);
        assert_eq!(&buf[4..7], &[0x04, 0x00, 0xCC]);
    }
}
