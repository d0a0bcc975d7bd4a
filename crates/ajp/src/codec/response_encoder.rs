use bytes::{BufMut, BytesMut};
use http::HeaderMap;
use tokio_util::codec::Encoder;
use tracing::trace;

use crate::codec::body::ChunkEncoder;
use crate::codec::header::response_header_code;
use crate::codec::packet::{write_frame, DEFAULT_MAX_PACKET_SIZE};
use crate::codec::wire::{prefix, put_bool, put_bytes, put_string};
use crate::protocol::{OutboundMessage, SendError};

/// Encodes the packets the container sends to the web server.
///
/// Every message becomes one packet except `SendBodyChunk`, which is split
/// into as many packets as the configured packet size requires.
#[derive(Debug, Clone)]
pub struct ResponseEncoder {
    max_packet_size: usize,
    chunk_encoder: ChunkEncoder,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_max_packet_size(max_packet_size: usize) -> Self {
        Self { max_packet_size, chunk_encoder: ChunkEncoder::new(max_packet_size) }
    }

    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }
}

impl Default for ResponseEncoder {
    fn default() -> Self {
        Self::with_max_packet_size(DEFAULT_MAX_PACKET_SIZE)
    }
}

impl Encoder<OutboundMessage<'_>> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: OutboundMessage<'_>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            OutboundMessage::SendHeaders { status, reason, headers } => {
                trace!(status = status.as_u16(), header_count = headers.len(), "encode send headers");
                write_frame(dst, self.max_packet_size, |dst| {
                    dst.put_u8(prefix::SEND_HEADERS);
                    dst.put_u16(status.as_u16());
                    put_string(dst, reason);
                    encode_headers(headers, dst);
                })
            }

            OutboundMessage::SendBodyChunk(data) => self.chunk_encoder.encode(data, dst),

            OutboundMessage::EndResponse { reuse } => write_frame(dst, self.max_packet_size, |dst| {
                dst.put_u8(prefix::END_RESPONSE);
                put_bool(dst, reuse);
            }),

            OutboundMessage::GetBodyChunk(requested) => write_frame(dst, self.max_packet_size, |dst| {
                dst.put_u8(prefix::GET_BODY_CHUNK);
                dst.put_u16(requested);
            }),

            OutboundMessage::CPong => write_frame(dst, self.max_packet_size, |dst| dst.put_u8(prefix::CPONG)),
        }
    }
}

fn encode_headers(headers: &HeaderMap, dst: &mut BytesMut) {
    // HeaderMap::len counts every value, repeated names included
    dst.put_u16(headers.len() as u16);
    for (name, value) in headers {
        match response_header_code(name) {
            Some(code) => dst.put_u16(code),
            None => put_bytes(dst, Some(name.as_str().as_bytes())),
        }
        put_bytes(dst, Some(value.as_bytes()));
    }
}

#[cfg(test)]
mod tests {
    use http::{HeaderValue, StatusCode};

    use super::*;

    fn encode(message: OutboundMessage<'_>) -> BytesMut {
        let mut dst = BytesMut::new();
        ResponseEncoder::new().encode(message, &mut dst).unwrap();
        dst
    }

    #[test]
    fn get_body_chunk() {
        let dst = encode(OutboundMessage::GetBodyChunk(8184));
        assert_eq!(&dst[..], &[0x41, 0x42, 0x00, 0x03, 0x06, 0x1F, 0xF8]);
    }

    #[test]
    fn end_response() {
        assert_eq!(&encode(OutboundMessage::EndResponse { reuse: true })[..], &[0x41, 0x42, 0x00, 0x02, 0x05, 0x01]);
        assert_eq!(&encode(OutboundMessage::EndResponse { reuse: false })[..], &[0x41, 0x42, 0x00, 0x02, 0x05, 0x00]);
    }

    #[test]
    fn cpong() {
        assert_eq!(&encode(OutboundMessage::CPong)[..], &[0x41, 0x42, 0x00, 0x01, 0x09]);
    }

    #[test]
    fn send_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        headers.insert("x-node", HeaderValue::from_static("a"));

        let dst = encode(OutboundMessage::SendHeaders { status: StatusCode::OK, reason: Some("OK"), headers: &headers });

        let mut expected = BytesMut::new();
        expected.put_u8(prefix::SEND_HEADERS);
        expected.put_u16(200);
        put_string(&mut expected, Some("OK"));
        expected.put_u16(2);
        expected.put_u16(0xA001);
        put_string(&mut expected, Some("text/plain"));
        put_string(&mut expected, Some("x-node"));
        put_string(&mut expected, Some("a"));

        assert_eq!(&dst[..2], b"AB");
        assert_eq!(u16::from_be_bytes([dst[2], dst[3]]) as usize, expected.len());
        assert_eq!(&dst[4..], &expected[..]);
    }

    #[test]
    fn repeated_header_is_sent_twice() {
        let mut headers = HeaderMap::new();
        headers.append(http::header::SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(http::header::SET_COOKIE, HeaderValue::from_static("b=2"));

        let dst = encode(OutboundMessage::SendHeaders { status: StatusCode::OK, reason: None, headers: &headers });

        // prefix, status, null reason, then the header count
        assert_eq!(&dst[4..11], &[prefix::SEND_HEADERS, 0x00, 0xC8, 0xFF, 0xFF, 0x00, 0x02]);
    }

    #[test]
    fn oversized_headers_are_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert("x-big", HeaderValue::from_str(&"v".repeat(64)).unwrap());

        let mut dst = BytesMut::new();
        let err = ResponseEncoder::with_max_packet_size(32)
            .encode(OutboundMessage::SendHeaders { status: StatusCode::OK, reason: None, headers: &headers }, &mut dst)
            .unwrap_err();

        assert!(matches!(err, SendError::TooLargePacket { .. }));
        assert!(dst.is_empty());
    }

    #[test]
    fn body_is_split() {
        let mut dst = BytesMut::new();
        ResponseEncoder::with_max_packet_size(16).encode(OutboundMessage::SendBodyChunk(b"0123456789"), &mut dst).unwrap();
        assert_eq!(dst.len(), 16 + 10);
    }
}
