//! The GET_BODY_CHUNK exchange.
//!
//! The container asks for at most one packet worth of body at a time and the
//! web server answers each request with exactly one chunk packet. Any
//! deviation leaves the stream in an unknown state, so every failure here is
//! fatal for the connection.

use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::codec::{decode_body_chunk, max_chunk_len};
use crate::connection::Connection;
use crate::ensure;
use crate::protocol::{AjpError, OutboundMessage, ParseError};

/// Largest size asked for in one GET_BODY_CHUNK, whatever the packet size
pub const MAX_BODY_CHUNK_REQUEST: usize = 8184;

/// Pulls exactly `content_length` body bytes from the web server
pub async fn read_body(conn: &mut Connection, content_length: u64) -> Result<Bytes, AjpError> {
    let total = usize::try_from(content_length)
        .map_err(|_e| ParseError::invalid_header(format!("content-length {content_length} is too large")))?;
    let max_request = max_chunk_len(conn.output().max_packet_size()).min(MAX_BODY_CHUNK_REQUEST);

    let mut body = BytesMut::with_capacity(total);
    while body.len() < total {
        let remaining = total - body.len();
        let requested = remaining.min(max_request) as u16;

        conn.output().write(OutboundMessage::GetBodyChunk(requested))?;
        conn.output().flush().await?;

        let packet = match conn.read_packet().await {
            Ok(Some(packet)) => packet,
            Ok(None) => return Err(ParseError::short_packet(remaining, 0).into()),
            Err(ParseError::ProtocolViolation { reason }) => return Err(ParseError::invalid_header(reason).into()),
            Err(e) => return Err(e.into()),
        };

        let chunk = decode_body_chunk(packet)?;
        ensure!(!chunk.is_empty(), ParseError::short_packet(remaining, 0).into());
        ensure!(
            chunk.len() <= remaining,
            ParseError::invalid_header(format!("body chunk of {} bytes exceeds the {remaining} bytes left", chunk.len())).into()
        );

        body.extend_from_slice(&chunk);
        debug!(read = body.len(), content_length, "read request body chunk");
    }

    Ok(body.freeze())
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::codec::{RequestEncoder, DEFAULT_MAX_PACKET_SIZE};

    fn duplex_connection() -> (Connection, tokio::io::DuplexStream) {
        let (local, remote) = tokio::io::duplex(64 * 1024);
        let (reader, writer) = tokio::io::split(local);
        (Connection::new(reader, writer, DEFAULT_MAX_PACKET_SIZE), remote)
    }

    async fn chunks(remote: &mut tokio::io::DuplexStream, chunks: &[&[u8]]) {
        let mut buf = BytesMut::new();
        for chunk in chunks {
            RequestEncoder::new().encode_body_chunk(chunk, &mut buf).unwrap();
        }
        remote.write_all(&buf).await.unwrap();
    }

    async fn read_get_body_chunk(remote: &mut tokio::io::DuplexStream) -> u16 {
        let mut buf = [0u8; 7];
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf[..5], &[0x41, 0x42, 0x00, 0x03, 0x06]);
        u16::from_be_bytes([buf[5], buf[6]])
    }

    #[tokio::test]
    async fn body_in_two_chunks() {
        let (mut conn, mut remote) = duplex_connection();
        chunks(&mut remote, &[b"hello ", b"ajp!"]).await;

        let body = read_body(&mut conn, 10).await.unwrap();
        assert_eq!(&body[..], b"hello ajp!");

        assert_eq!(read_get_body_chunk(&mut remote).await, 10);
        assert_eq!(read_get_body_chunk(&mut remote).await, 4);
    }

    #[tokio::test]
    async fn request_is_capped_at_one_packet() {
        let (mut conn, mut remote) = duplex_connection();
        let first = vec![b'a'; 8184];
        chunks(&mut remote, &[&first, b"bb"]).await;

        let body = read_body(&mut conn, 8186).await.unwrap();
        assert_eq!(body.len(), 8186);

        assert_eq!(read_get_body_chunk(&mut remote).await, 8184);
        assert_eq!(read_get_body_chunk(&mut remote).await, 2);
    }

    #[tokio::test]
    async fn large_packets_keep_the_request_cap() {
        let (local, mut remote) = tokio::io::duplex(64 * 1024);
        let (reader, writer) = tokio::io::split(local);
        let mut conn = Connection::new(reader, writer, 16 * 1024);

        let first = vec![b'a'; MAX_BODY_CHUNK_REQUEST];
        let second = vec![b'b'; 10_000 - MAX_BODY_CHUNK_REQUEST];
        chunks(&mut remote, &[&first, &second]).await;

        let body = read_body(&mut conn, 10_000).await.unwrap();
        assert_eq!(body.len(), 10_000);

        assert_eq!(read_get_body_chunk(&mut remote).await, 8184);
        assert_eq!(read_get_body_chunk(&mut remote).await, 1816);
    }

    #[tokio::test]
    async fn short_final_chunk() {
        let (mut conn, mut remote) = duplex_connection();
        // the last chunk declares 4 bytes but carries 3
        remote.write_all(&[0x12, 0x34, 0x00, 0x08, 0x00, 0x06, b'h', b'e', b'l', b'l', b'o', b' ']).await.unwrap();
        remote.write_all(&[0x12, 0x34, 0x00, 0x05, 0x00, 0x04, b'a', b'j', b'p']).await.unwrap();

        let err = read_body(&mut conn, 10).await.unwrap_err();
        assert!(matches!(err, AjpError::RequestError { source: ParseError::ShortPacket { expected: 4, received: 3 } }));
    }

    #[tokio::test]
    async fn empty_chunk_before_the_end() {
        let (mut conn, mut remote) = duplex_connection();
        chunks(&mut remote, &[b"abc", b""]).await;

        let err = read_body(&mut conn, 10).await.unwrap_err();
        assert!(matches!(err, AjpError::RequestError { source: ParseError::ShortPacket { expected: 7, received: 0 } }));
    }

    #[tokio::test]
    async fn too_many_bytes() {
        let (mut conn, mut remote) = duplex_connection();
        chunks(&mut remote, &[b"0123456789AB"]).await;

        let err = read_body(&mut conn, 10).await.unwrap_err();
        assert!(matches!(err, AjpError::RequestError { source: ParseError::InvalidHeader { .. } }));
    }

    #[tokio::test]
    async fn wrong_magic() {
        let (mut conn, mut remote) = duplex_connection();
        remote.write_all(b"AB\x00\x03\x00\x01a").await.unwrap();

        let err = read_body(&mut conn, 1).await.unwrap_err();
        assert!(matches!(err, AjpError::RequestError { source: ParseError::InvalidHeader { .. } }));

        let (mut conn, mut remote) = duplex_connection();
        remote.write_all(b"XY\x00\x03\x00\x01a").await.unwrap();

        let err = read_body(&mut conn, 1).await.unwrap_err();
        assert!(matches!(err, AjpError::RequestError { source: ParseError::InvalidHeader { .. } }));
    }

    #[tokio::test]
    async fn peer_closes_mid_body() {
        let (mut conn, mut remote) = duplex_connection();
        chunks(&mut remote, &[b"abc"]).await;
        remote.shutdown().await.unwrap();

        let err = read_body(&mut conn, 10).await.unwrap_err();
        assert!(matches!(err, AjpError::RequestError { source: ParseError::ShortPacket { expected: 7, received: 0 } }));
    }
}
