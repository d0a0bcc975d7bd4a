use http::header::{
    ACCEPT, ACCEPT_CHARSET, ACCEPT_ENCODING, ACCEPT_LANGUAGE, AUTHORIZATION, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE,
    COOKIE, HOST, PRAGMA, REFERER, USER_AGENT,
};
use http::HeaderName;

use super::CODED_HEADER_MARKER;
use crate::protocol::ParseError;

const COOKIE2: HeaderName = HeaderName::from_static("cookie2");

/// Request header names indexed by `code - 1`
static REQUEST_HEADERS: [HeaderName; 14] = [
    ACCEPT,
    ACCEPT_CHARSET,
    ACCEPT_ENCODING,
    ACCEPT_LANGUAGE,
    AUTHORIZATION,
    CONNECTION,
    CONTENT_TYPE,
    CONTENT_LENGTH,
    COOKIE,
    COOKIE2,
    HOST,
    PRAGMA,
    REFERER,
    USER_AGENT,
];

/// Maps a `0xA0xx` request header code to its name
pub fn decode_request_header_name(code: u16) -> Result<HeaderName, ParseError> {
    let index = (code & 0x00FF) as usize;
    if (code >> 8) as u8 != CODED_HEADER_MARKER || index == 0 || index > REQUEST_HEADERS.len() {
        return Err(ParseError::invalid_header(format!("unknown request header code {code:#06x}")));
    }
    Ok(REQUEST_HEADERS[index - 1].clone())
}

/// The code of a request header name, if the protocol defines one
pub fn request_header_code(name: &HeaderName) -> Option<u16> {
    REQUEST_HEADERS
        .iter()
        .position(|known| known == name)
        .map(|index| (u16::from(CODED_HEADER_MARKER) << 8) | (index as u16 + 1))
}
