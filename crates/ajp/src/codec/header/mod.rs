//! Coded header names.
//!
//! Common header names travel as a two byte code `0xA0xx` instead of a string.
//! Requests and responses use different tables.

mod header_decoder;
mod header_encoder;
mod method;

pub use header_decoder::{decode_request_header_name, request_header_code};
pub use header_encoder::{decode_response_header_name, response_header_code};
pub use method::{decode_method, method_code, STORED_METHOD};

/// High byte shared by every coded header name
pub const CODED_HEADER_MARKER: u8 = 0xA0;

#[inline]
pub(crate) fn is_coded(value: u16) -> bool {
    (value >> 8) as u8 == CODED_HEADER_MARKER
}
