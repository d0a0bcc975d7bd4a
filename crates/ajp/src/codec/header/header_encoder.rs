use http::header::{
    CONTENT_LANGUAGE, CONTENT_LENGTH, CONTENT_TYPE, DATE, LAST_MODIFIED, LOCATION, SET_COOKIE, WWW_AUTHENTICATE,
};
use http::HeaderName;

use super::CODED_HEADER_MARKER;
use crate::protocol::ParseError;

const SET_COOKIE2: HeaderName = HeaderName::from_static("set-cookie2");
const SERVLET_ENGINE: HeaderName = HeaderName::from_static("servlet-engine");
const STATUS: HeaderName = HeaderName::from_static("status");

/// Response header names indexed by `code - 1`
static RESPONSE_HEADERS: [HeaderName; 11] = [
    CONTENT_TYPE,
    CONTENT_LANGUAGE,
    CONTENT_LENGTH,
    DATE,
    LAST_MODIFIED,
    LOCATION,
    SET_COOKIE,
    SET_COOKIE2,
    SERVLET_ENGINE,
    STATUS,
    WWW_AUTHENTICATE,
];

/// The code of a response header name, if the protocol defines one
pub fn response_header_code(name: &HeaderName) -> Option<u16> {
    RESPONSE_HEADERS
        .iter()
        .position(|known| known == name)
        .map(|index| (u16::from(CODED_HEADER_MARKER) << 8) | (index as u16 + 1))
}

/// Maps a `0xA0xx` response header code to its name
pub fn decode_response_header_name(code: u16) -> Result<HeaderName, ParseError> {
    let index = (code & 0x00FF) as usize;
    if (code >> 8) as u8 != CODED_HEADER_MARKER || index == 0 || index > RESPONSE_HEADERS.len() {
        return Err(ParseError::invalid_header(format!("unknown response header code {code:#06x}")));
    }
    Ok(RESPONSE_HEADERS[index - 1].clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coded_names() {
        assert_eq!(response_header_code(&CONTENT_TYPE), Some(0xA001));
        assert_eq!(response_header_code(&CONTENT_LENGTH), Some(0xA003));
        assert_eq!(response_header_code(&WWW_AUTHENTICATE), Some(0xA00B));
        assert_eq!(response_header_code(&HeaderName::from_static("x-powered-by")), None);
    }

    #[test]
    fn decode_codes() {
        assert_eq!(decode_response_header_name(0xA007).unwrap(), SET_COOKIE);
        assert!(decode_response_header_name(0xA00C).is_err());
    }
}
