//! Primitive AJP13 field encodings.
//!
//! Every multi-byte integer on the wire is an unsigned big-endian `u16`. Strings are
//! a `u16` length, that many bytes, and a trailing `0x00`; a length of `0xFFFF`
//! encodes a null string. The protocol never negotiates a charset, all text is
//! treated as ISO-8859-1.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::ensure;
use crate::protocol::ParseError;

/// Payload type codes, the first byte of every non-empty payload
pub mod prefix {
    // web server -> container
    pub const FORWARD_REQUEST: u8 = 0x02;
    pub const SHUTDOWN: u8 = 0x07;
    pub const CPING: u8 = 0x0A;

    // container -> web server
    pub const SEND_BODY_CHUNK: u8 = 0x03;
    pub const SEND_HEADERS: u8 = 0x04;
    pub const END_RESPONSE: u8 = 0x05;
    pub const GET_BODY_CHUNK: u8 = 0x06;
    pub const CPONG: u8 = 0x09;
}

/// Length marker of a null string
pub const NULL_STRING: u16 = 0xFFFF;

/// Cursor over a packet payload, every read is bounds checked.
#[derive(Debug)]
pub struct PayloadReader {
    buf: Bytes,
}

impl PayloadReader {
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn need(&self, n: usize, field: &str) -> Result<(), ParseError> {
        ensure!(
            self.buf.remaining() >= n,
            ParseError::invalid_header(format!(
                "truncated {field}: need {n} bytes, {} left in packet",
                self.buf.remaining()
            ))
        );
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, ParseError> {
        self.need(1, "byte")?;
        Ok(self.buf.get_u8())
    }

    pub fn peek_u8(&self) -> Result<u8, ParseError> {
        self.need(1, "byte")?;
        Ok(self.buf[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ParseError> {
        self.need(2, "integer")?;
        Ok(self.buf.get_u16())
    }

    pub fn peek_u16(&self) -> Result<u16, ParseError> {
        self.need(2, "integer")?;
        Ok(u16::from_be_bytes([self.buf[0], self.buf[1]]))
    }

    pub fn read_bool(&mut self) -> Result<bool, ParseError> {
        Ok(self.read_u8()? != 0)
    }

    /// Reads a string field as raw bytes, `None` for the null string.
    pub fn read_bytes(&mut self) -> Result<Option<Bytes>, ParseError> {
        let len = self.read_u16()?;
        if len == NULL_STRING {
            return Ok(None);
        }

        let len = len as usize;
        // the terminator is not counted by the length field
        self.need(len + 1, "string")?;
        let bytes = self.buf.split_to(len);
        self.buf.advance(1);
        Ok(Some(bytes))
    }

    pub fn read_string(&mut self) -> Result<Option<String>, ParseError> {
        Ok(self.read_bytes()?.map(|bytes| latin1_to_string(&bytes)))
    }
}

pub fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Characters outside ISO-8859-1 are replaced by `?`
pub fn string_to_latin1(str: &str) -> Vec<u8> {
    str.chars().map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?')).collect()
}

pub fn put_bytes(dst: &mut BytesMut, bytes: Option<&[u8]>) {
    match bytes {
        Some(bytes) => {
            dst.put_u16(bytes.len() as u16);
            dst.put_slice(bytes);
            dst.put_u8(0);
        }
        None => dst.put_u16(NULL_STRING),
    }
}

pub fn put_string(dst: &mut BytesMut, str: Option<&str>) {
    match str {
        Some(str) => put_bytes(dst, Some(&string_to_latin1(str))),
        None => put_bytes(dst, None),
    }
}

pub fn put_bool(dst: &mut BytesMut, value: bool) {
    dst.put_u8(u8::from(value));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_string_and_terminator() {
        let mut reader = PayloadReader::new(Bytes::from_static(b"\x00\x04/abc\x00\x00\x50"));

        assert_eq!(reader.read_string().unwrap().as_deref(), Some("/abc"));
        assert_eq!(reader.read_u16().unwrap(), 80);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn null_string() {
        let mut reader = PayloadReader::new(Bytes::from_static(b"\xFF\xFF\x01"));

        assert_eq!(reader.read_string().unwrap(), None);
        assert!(reader.read_bool().unwrap());
    }

    #[test]
    fn truncated_string_is_invalid_header() {
        let mut reader = PayloadReader::new(Bytes::from_static(b"\x00\x09abc"));

        let err = reader.read_string().unwrap_err();
        assert!(matches!(err, ParseError::InvalidHeader { .. }));
    }

    #[test]
    fn latin1_is_byte_per_char() {
        let bytes = [b'c', b'a', b'f', 0xE9];
        let str = latin1_to_string(&bytes);

        assert_eq!(str, "café");
        assert_eq!(string_to_latin1(&str), bytes);
        assert_eq!(string_to_latin1("a€"), b"a?");
    }

    #[test]
    fn put_string_layout() {
        let mut dst = BytesMut::new();
        put_string(&mut dst, Some("ok"));
        put_string(&mut dst, None);

        assert_eq!(&dst[..], b"\x00\x02ok\x00\xFF\xFF");
    }
}
