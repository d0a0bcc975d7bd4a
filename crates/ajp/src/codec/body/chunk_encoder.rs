use bytes::{BufMut, BytesMut};

use crate::codec::packet::{write_frame, HEADER_LEN};
use crate::codec::wire::prefix;
use crate::protocol::SendError;

/// prefix code, chunk length and the trailing terminator
const CHUNK_OVERHEAD: usize = 1 + 2 + 1;

/// Largest body slice that fits one SEND_BODY_CHUNK packet
pub fn max_chunk_len(max_packet_size: usize) -> usize {
    max_packet_size.saturating_sub(HEADER_LEN + CHUNK_OVERHEAD).min(u16::MAX as usize)
}

/// Splits `data` into as many SEND_BODY_CHUNK packets as the packet size requires
#[derive(Debug, Clone, Copy)]
pub struct ChunkEncoder {
    max_packet_size: usize,
    max_chunk_len: usize,
}

impl ChunkEncoder {
    pub fn new(max_packet_size: usize) -> Self {
        Self { max_packet_size, max_chunk_len: max_chunk_len(max_packet_size).max(1) }
    }

    pub fn encode(&self, data: &[u8], dst: &mut BytesMut) -> Result<(), SendError> {
        dst.reserve(data.len() + data.len().div_ceil(self.max_chunk_len) * (HEADER_LEN + CHUNK_OVERHEAD));
        for chunk in data.chunks(self.max_chunk_len) {
            write_frame(dst, self.max_packet_size, |dst| {
                dst.put_u8(prefix::SEND_BODY_CHUNK);
                dst.put_u16(chunk.len() as u16);
                dst.put_slice(chunk);
                dst.put_u8(0);
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::packet::DEFAULT_MAX_PACKET_SIZE;

    #[test]
    fn default_chunk_size() {
        assert_eq!(max_chunk_len(DEFAULT_MAX_PACKET_SIZE), 8184);
    }

    #[test]
    fn single_chunk() {
        let mut dst = BytesMut::new();
        ChunkEncoder::new(DEFAULT_MAX_PACKET_SIZE).encode(b"hi", &mut dst).unwrap();

        assert_eq!(&dst[..], b"AB\x00\x06\x03\x00\x02hi\x00");
    }

    #[test]
    fn split_into_packets() {
        let max_packet_size = 16;
        let encoder = ChunkEncoder::new(max_packet_size);
        let mut dst = BytesMut::new();
        encoder.encode(b"0123456789", &mut dst).unwrap();

        // 8 bytes per chunk: one full packet and one with the remaining 2 bytes
        assert_eq!(&dst[..16], b"AB\x00\x0C\x03\x00\x0801234567\x00");
        assert_eq!(&dst[16..], b"AB\x00\x06\x03\x00\x0289\x00");
    }

    #[test]
    fn empty_data_writes_nothing() {
        let mut dst = BytesMut::new();
        ChunkEncoder::new(DEFAULT_MAX_PACKET_SIZE).encode(b"", &mut dst).unwrap();
        assert!(dst.is_empty());
    }
}
