//! AJP13 packet framing.
//!
//! Every packet is `[magic:2][length:2][payload:length]`. The magic tells the
//! direction: packets sent by the web server start with `0x12 0x34`, packets sent
//! by the container start with `"AB"`. This module only transforms bytes, it
//! never touches a socket.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::ensure;
use crate::protocol::{ParseError, SendError};

/// Size of the `[magic][length]` prefix
pub const HEADER_LEN: usize = 4;

/// Largest payload a 16 bit length field can describe
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Default packet size used by mod_jk and mod_proxy_ajp
pub const DEFAULT_MAX_PACKET_SIZE: usize = 8 * 1024;

const SERVER_MAGIC: [u8; 2] = [0x12, 0x34];
const CONTAINER_MAGIC: [u8; 2] = [0x41, 0x42];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    /// Web server to container, magic `0x12 0x34`
    ServerToContainer,
    /// Container to web server, magic `"AB"`
    ContainerToServer,
}

impl Direction {
    pub fn magic(self) -> [u8; 2] {
        match self {
            Direction::ServerToContainer => SERVER_MAGIC,
            Direction::ContainerToServer => CONTAINER_MAGIC,
        }
    }

    pub fn from_magic(magic: [u8; 2]) -> Option<Self> {
        match magic {
            SERVER_MAGIC => Some(Direction::ServerToContainer),
            CONTAINER_MAGIC => Some(Direction::ContainerToServer),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PacketHeader {
    pub direction: Direction,
    pub length: u16,
}

impl PacketHeader {
    /// Decodes the 4 byte packet prefix.
    ///
    /// Returns `Ok(None)` when fewer than 4 bytes are available and
    /// `ParseError::ProtocolViolation` when the magic is unknown.
    pub fn decode(src: &[u8]) -> Result<Option<Self>, ParseError> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let magic = [src[0], src[1]];
        let direction = Direction::from_magic(magic)
            .ok_or_else(|| ParseError::protocol_violation(format!("unknown packet magic {:#04x} {:#04x}", magic[0], magic[1])))?;
        let length = u16::from_be_bytes([src[2], src[3]]);

        Ok(Some(Self { direction, length }))
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_slice(&self.direction.magic());
        dst.put_u16(self.length);
    }

    #[inline]
    pub fn frame_len(&self) -> usize {
        HEADER_LEN + self.length as usize
    }
}

/// One framed unit of the wire protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    direction: Direction,
    payload: Bytes,
}

impl Packet {
    pub fn new(direction: Direction, payload: impl Into<Bytes>) -> Self {
        Self { direction, payload: payload.into() }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// An empty packet carries no payload, the peer uses it as an idle ping
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// The payload type code, `None` for an empty packet
    pub fn prefix_code(&self) -> Option<u8> {
        self.payload.first().copied()
    }

    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), SendError> {
        let length = self.payload.len();
        ensure!(length <= MAX_PAYLOAD_LEN, SendError::too_large_packet(length, MAX_PAYLOAD_LEN));

        dst.reserve(HEADER_LEN + length);
        PacketHeader { direction: self.direction, length: length as u16 }.encode(dst);
        dst.put_slice(&self.payload);
        Ok(())
    }
}

/// Writes a container packet whose payload is produced by `f`, patching the
/// length field afterwards.
pub(crate) fn write_frame<F>(dst: &mut BytesMut, max_packet_size: usize, f: F) -> Result<(), SendError>
where
    F: FnOnce(&mut BytesMut),
{
    let start = dst.len();
    dst.put_slice(&CONTAINER_MAGIC);
    dst.put_u16(0);
    f(dst);

    let length = dst.len() - start - HEADER_LEN;
    let max_payload = max_packet_size.min(MAX_PAYLOAD_LEN + HEADER_LEN).saturating_sub(HEADER_LEN);
    if length > max_payload {
        dst.truncate(start);
        return Err(SendError::too_large_packet(length, max_payload));
    }

    dst[start + 2..start + HEADER_LEN].copy_from_slice(&(length as u16).to_be_bytes());
    Ok(())
}

/// Frames packets for a [`tokio_util::codec::FramedRead`] / `FramedWrite`
#[derive(Debug, Clone)]
pub struct PacketCodec {
    max_payload_len: usize,
}

impl PacketCodec {
    pub fn new() -> Self {
        Default::default()
    }

    /// Limits the accepted payload to `max_packet_size - 4` bytes
    pub fn with_max_packet_size(max_packet_size: usize) -> Self {
        let max_payload_len = max_packet_size.saturating_sub(HEADER_LEN).min(MAX_PAYLOAD_LEN);
        Self { max_payload_len }
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self { max_payload_len: MAX_PAYLOAD_LEN }
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(header) = PacketHeader::decode(src)? else {
            return Ok(None);
        };

        let length = header.length as usize;
        ensure!(
            length <= self.max_payload_len,
            ParseError::protocol_violation(format!("packet length {length} exceeds the limit {}", self.max_payload_len))
        );

        let frame_len = header.frame_len();
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let payload = src.split_to(length).freeze();
        trace!(direction = ?header.direction, length, "decoded packet");
        Ok(Some(Packet { direction: header.direction, payload }))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(packet) => Ok(Some(packet)),
            None if buf.is_empty() => Ok(None),
            None => {
                let expected = match PacketHeader::decode(buf)? {
                    Some(header) => header.frame_len(),
                    None => HEADER_LEN,
                };
                Err(ParseError::short_packet(expected, buf.len()))
            }
        }
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = SendError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        ensure!(item.payload.len() <= self.max_payload_len, SendError::too_large_packet(item.payload.len(), self.max_payload_len));
        item.encode(dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_header() {
        let header = PacketHeader::decode(&[0x12, 0x34, 0x01, 0x02]).unwrap().unwrap();

        assert_eq!(header.direction, Direction::ServerToContainer);
        assert_eq!(header.length, 0x0102);
        assert_eq!(header.frame_len(), 0x0106);

        let header = PacketHeader::decode(b"AB\x00\x03").unwrap().unwrap();
        assert_eq!(header.direction, Direction::ContainerToServer);
    }

    #[test]
    fn decode_header_needs_four_bytes() {
        assert_eq!(PacketHeader::decode(&[0x12, 0x34, 0x00]).unwrap(), None);
    }

    #[test]
    fn unknown_magic_is_violation() {
        let err = PacketHeader::decode(b"GET / HTTP/1.1").unwrap_err();
        assert!(matches!(err, ParseError::ProtocolViolation { .. }));
    }

    #[test]
    fn round_trip() {
        let mut codec = PacketCodec::new();
        let packets = [
            Packet::new(Direction::ServerToContainer, Bytes::from_static(b"\x02\x02")),
            Packet::new(Direction::ContainerToServer, Bytes::from_static(b"\x05\x01")),
            Packet::new(Direction::ServerToContainer, Bytes::new()),
        ];

        let mut buf = BytesMut::new();
        for packet in &packets {
            codec.encode(packet.clone(), &mut buf).unwrap();
        }

        for packet in &packets {
            assert_eq!(codec.decode(&mut buf).unwrap().as_ref(), Some(packet));
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_frame_waits_for_more() {
        let mut codec = PacketCodec::new();
        let mut buf = BytesMut::from(&[0x12, 0x34, 0x00, 0x04, 0x0A][..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(buf.len(), 5);

        buf.extend_from_slice(&[1, 2, 3]);
        let packet = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&packet.payload()[..], &[0x0A, 1, 2, 3]);
        assert_eq!(packet.prefix_code(), Some(0x0A));
    }

    #[test]
    fn eof_inside_frame_is_short_packet() {
        let mut codec = PacketCodec::new();
        let mut buf = BytesMut::from(&[0x12, 0x34, 0x00, 0x0A, 1, 2][..]);

        let err = codec.decode_eof(&mut buf).unwrap_err();
        assert!(matches!(err, ParseError::ShortPacket { expected: 14, received: 6 }));
    }

    #[test]
    fn oversized_frame_is_violation() {
        let mut codec = PacketCodec::with_max_packet_size(DEFAULT_MAX_PACKET_SIZE);
        let mut buf = BytesMut::from(&[0x12, 0x34, 0xFF, 0x00][..]);

        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, ParseError::ProtocolViolation { .. }));
    }

    #[test]
    fn write_frame_patches_length() {
        let mut buf = BytesMut::new();
        write_frame(&mut buf, DEFAULT_MAX_PACKET_SIZE, |dst| {
            dst.put_u8(0x06);
            dst.put_u16(0x1FF8);
        })
        .unwrap();

        assert_eq!(&buf[..], &[0x41, 0x42, 0x00, 0x03, 0x06, 0x1F, 0xF8]);
    }

    #[test]
    fn write_frame_rejects_oversized_payload() {
        let mut buf = BytesMut::from(&b"keep"[..]);
        let err = write_frame(&mut buf, 16, |dst| dst.put_slice(&[0u8; 13])).unwrap_err();

        assert!(matches!(err, SendError::TooLargePacket { size: 13, max_size: 12 }));
        assert_eq!(&buf[..], b"keep");
    }

    #[test]
    fn packet_size_below_header_rejects_instead_of_panicking() {
        let mut buf = BytesMut::new();
        let err = write_frame(&mut buf, 2, |dst| dst.put_u8(0x09)).unwrap_err();

        assert!(matches!(err, SendError::TooLargePacket { size: 1, max_size: 0 }));
        assert!(buf.is_empty());
    }
}
