//! Decoder for the web server's answer to GET_BODY_CHUNK.
//!
//! The answer is a web server packet whose payload is a `u16` chunk length
//! followed by that many body bytes. An empty packet means the web server has
//! no more body to send.

use bytes::Bytes;

use crate::codec::packet::{Direction, Packet};
use crate::ensure;
use crate::protocol::ParseError;

const CHUNK_LEN_FIELD: usize = 2;

/// Extracts the body bytes of a chunk packet, an empty result means end of body
pub fn decode_body_chunk(packet: Packet) -> Result<Bytes, ParseError> {
    ensure!(
        packet.direction() == Direction::ServerToContainer,
        ParseError::invalid_header("body chunk must be sent by the web server")
    );

    let mut payload = packet.into_payload();
    if payload.is_empty() {
        return Ok(Bytes::new());
    }

    ensure!(payload.len() >= CHUNK_LEN_FIELD, ParseError::short_packet(CHUNK_LEN_FIELD, payload.len()));
    let declared = u16::from_be_bytes([payload[0], payload[1]]) as usize;
    let received = payload.len() - CHUNK_LEN_FIELD;
    ensure!(received >= declared, ParseError::short_packet(declared, received));

    let _ = payload.split_to(CHUNK_LEN_FIELD);
    payload.truncate(declared);
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_chunk() {
        let packet = Packet::new(Direction::ServerToContainer, Bytes::from_static(b"\x00\x04abcd"));
        assert_eq!(&decode_body_chunk(packet).unwrap()[..], b"abcd");
    }

    #[test]
    fn empty_packet_ends_body() {
        let packet = Packet::new(Direction::ServerToContainer, Bytes::new());
        assert!(decode_body_chunk(packet).unwrap().is_empty());
    }

    #[test]
    fn fewer_bytes_than_declared() {
        let packet = Packet::new(Direction::ServerToContainer, Bytes::from_static(b"\x00\x06abcd"));
        let err = decode_body_chunk(packet).unwrap_err();

        assert!(matches!(err, ParseError::ShortPacket { expected: 6, received: 4 }));
    }

    #[test]
    fn trailing_padding_is_dropped() {
        let packet = Packet::new(Direction::ServerToContainer, Bytes::from_static(b"\x00\x02ab\x00"));
        assert_eq!(&decode_body_chunk(packet).unwrap()[..], b"ab");
    }

    #[test]
    fn container_magic_is_invalid() {
        let packet = Packet::new(Direction::ContainerToServer, Bytes::from_static(b"\x00\x01a"));
        assert!(matches!(decode_body_chunk(packet), Err(ParseError::InvalidHeader { .. })));
    }
}
