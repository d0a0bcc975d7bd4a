use http::Method;

use crate::protocol::ParseError;

/// Method code telling that the method name travels in the `stored_method` attribute
pub const STORED_METHOD: u8 = 0xFF;

/// Method names indexed by `code - 1`
const METHODS: [&str; 27] = [
    "OPTIONS",
    "GET",
    "HEAD",
    "POST",
    "PUT",
    "DELETE",
    "TRACE",
    "PROPFIND",
    "PROPPATCH",
    "MKCOL",
    "COPY",
    "MOVE",
    "LOCK",
    "UNLOCK",
    "ACL",
    "REPORT",
    "VERSION-CONTROL",
    "CHECKIN",
    "CHECKOUT",
    "UNCHECKOUT",
    "SEARCH",
    "MKWORKSPACE",
    "UPDATE",
    "LABEL",
    "MERGE",
    "BASELINE-CONTROL",
    "MKACTIVITY",
];

/// Decodes a method code, `Ok(None)` for [`STORED_METHOD`]
pub fn decode_method(code: u8) -> Result<Option<Method>, ParseError> {
    if code == STORED_METHOD {
        return Ok(None);
    }

    let name = (code as usize)
        .checked_sub(1)
        .and_then(|index| METHODS.get(index))
        .ok_or_else(|| ParseError::invalid_header(format!("unknown method code {code}")))?;

    Method::from_bytes(name.as_bytes()).map(Some).map_err(ParseError::invalid_header)
}

/// The code of a method, [`STORED_METHOD`] when the protocol has none
pub fn method_code(method: &Method) -> u8 {
    METHODS
        .iter()
        .position(|name| *name == method.as_str())
        .map_or(STORED_METHOD, |index| index as u8 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_methods() {
        assert_eq!(decode_method(2).unwrap(), Some(Method::GET));
        assert_eq!(decode_method(4).unwrap(), Some(Method::POST));
        assert_eq!(decode_method(8).unwrap().unwrap().as_str(), "PROPFIND");
        assert_eq!(decode_method(STORED_METHOD).unwrap(), None);
    }

    #[test]
    fn unknown_method_code() {
        assert!(decode_method(0).is_err());
        assert!(decode_method(28).is_err());
    }

    #[test]
    fn codes() {
        assert_eq!(method_code(&Method::OPTIONS), 1);
        assert_eq!(method_code(&Method::DELETE), 6);
        assert_eq!(method_code(&Method::PATCH), STORED_METHOD);
    }
}
