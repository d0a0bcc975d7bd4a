//! The seam between the protocol layer and the application.
//!
//! A [`Dispatcher`] receives a fully populated request, body included, and
//! answers through a [`ResponseWriter`]. The writer streams: the status line
//! and headers are committed on the first body write and every body write is
//! packetized as it comes, so a response never has to be held in memory.

use std::error::Error;
use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use http_body::Body;
use http_body_util::BodyExt;

use crate::connection::{BoxedWriter, OutputStream};
use crate::protocol::{OutboundMessage, Request, Response, SendError};

pub type BoxError = Box<dyn Error + Send + Sync>;

#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Handles one exchange.
    ///
    /// `target` is the request target resolved by the protocol adapter. An
    /// error turns into a 500 response when nothing was committed yet,
    /// otherwise the connection is closed.
    async fn dispatch(&self, target: &str, request: &mut Request, response: &mut ResponseWriter<'_>) -> Result<(), BoxError>;
}

#[async_trait]
impl<D: Dispatcher + ?Sized> Dispatcher for std::sync::Arc<D> {
    async fn dispatch(&self, target: &str, request: &mut Request, response: &mut ResponseWriter<'_>) -> Result<(), BoxError> {
        (**self).dispatch(target, request, response).await
    }
}

pub struct ResponseWriter<'a> {
    response: &'a mut Response,
    output: &'a mut OutputStream<BoxedWriter>,
}

impl<'a> ResponseWriter<'a> {
    pub(crate) fn new(response: &'a mut Response, output: &'a mut OutputStream<BoxedWriter>) -> Self {
        Self { response, output }
    }

    pub fn response(&self) -> &Response {
        self.response
    }

    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    /// Has no effect on the wire once the response is committed
    pub fn set_status(&mut self, status: StatusCode) {
        self.response.set_status(status);
    }

    pub fn set_reason(&mut self, reason: impl Into<String>) {
        self.response.set_reason(reason);
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        self.response.headers_mut()
    }

    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.response.insert_header(name, value);
    }

    pub fn is_committed(&self) -> bool {
        self.response.is_committed()
    }

    /// Sends the status line and headers, they can't change afterwards
    pub fn commit(&mut self) -> Result<(), SendError> {
        self.output.commit(self.response)
    }

    pub async fn write(&mut self, data: &[u8]) -> Result<(), SendError> {
        self.commit()?;
        if data.is_empty() {
            return Ok(());
        }

        self.output.write(OutboundMessage::SendBodyChunk(data))?;
        self.response.add_written(data.len());

        if self.output.buffered_len() >= self.output.max_packet_size() {
            self.output.flush().await?;
        }
        Ok(())
    }

    /// Streams every data frame of `body`, trailers are not part of the protocol and are dropped
    pub async fn write_body<B>(&mut self, mut body: B) -> Result<(), SendError>
    where
        B: Body<Data = Bytes> + Send + Unpin,
        B::Error: fmt::Display,
    {
        while let Some(frame) = body.frame().await {
            let frame = frame.map_err(|e| SendError::invalid_body(format!("resolve response body error: {e}")))?;
            if let Ok(data) = frame.into_data() {
                self.write(&data).await?;
            }
        }
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<(), SendError> {
        self.commit()?;
        self.output.flush().await
    }
}

impl fmt::Debug for ResponseWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseWriter").field("response", &self.response).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::Full;
    use tokio::io::AsyncReadExt;

    use super::*;
    use crate::codec::DEFAULT_MAX_PACKET_SIZE;

    fn output(writer: tokio::io::DuplexStream, max_packet_size: usize) -> OutputStream<BoxedWriter> {
        OutputStream::with_capacity(Box::new(writer), 64, max_packet_size)
    }

    #[tokio::test]
    async fn first_write_commits_headers() {
        let (client, mut server) = tokio::io::duplex(1024);
        let mut output = output(client, DEFAULT_MAX_PACKET_SIZE);
        let mut response = Response::default();

        let mut writer = ResponseWriter::new(&mut response, &mut output);
        writer.set_status(StatusCode::ACCEPTED);
        writer.write(b"ok").await.unwrap();
        writer.set_status(StatusCode::NOT_FOUND);
        writer.flush().await.unwrap();
        drop(writer);

        assert!(response.is_committed());
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.bytes_written(), 2);

        let mut buf = vec![0u8; 4 + 1 + 2 + 2 + 8 + 1 + 2];
        server.read_exact(&mut buf).await.unwrap();
        // the committed status is 202 even though it changed later
        assert_eq!(&buf[4..7], &[0x04, 0x00, 0xCA]);
    }

    #[tokio::test]
    async fn large_writes_are_flushed_as_they_come() {
        let (client, mut server) = tokio::io::duplex(64 * 1024);
        let mut output = output(client, 64);
        let mut response = Response::default();

        let mut writer = ResponseWriter::new(&mut response, &mut output);
        writer.write(&[b'x'; 200]).await.unwrap();
        drop(writer);

        assert_eq!(output.buffered_len(), 0);
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf[..2], b"AB");
    }

    #[tokio::test]
    async fn write_body_streams_frames() {
        let (client, _server) = tokio::io::duplex(1024);
        let mut output = output(client, DEFAULT_MAX_PACKET_SIZE);
        let mut response = Response::default();

        let mut writer = ResponseWriter::new(&mut response, &mut output);
        writer.write_body(Full::new(Bytes::from_static(b"hello"))).await.unwrap();
        drop(writer);

        assert_eq!(response.bytes_written(), 5);
    }
}
