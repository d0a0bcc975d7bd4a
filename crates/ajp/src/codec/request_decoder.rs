//! Decoder for packets sent by the web server.
//!
//! A FORWARD_REQUEST payload is laid out as:
//!
//! ```text
//! 0x02 method:u8 protocol:str uri:str remote_addr:str remote_host:str
//!      server_name:str server_port:u16 is_ssl:bool
//!      num_headers:u16 (name:(0xA0xx | str) value:str)*
//!      (attribute_code:u8 value)* 0xFF
//! ```
//!
//! Unknown attribute codes do not abort decoding, the protocol grows new
//! attributes over time and a container must keep working with newer proxies.

use http::{HeaderName, HeaderValue, Method};
use tracing::{debug, trace};

use crate::codec::header::{decode_method, decode_request_header_name, is_coded};
use crate::codec::packet::{Direction, Packet};
use crate::codec::wire::{latin1_to_string, prefix, PayloadReader};
use crate::ensure;
use crate::protocol::{attribute_code, Attribute, InboundExchange, InboundMessage, ParseError};

/// Decodes web server packets into [`InboundMessage`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestDecoder;

impl RequestDecoder {
    pub fn new() -> Self {
        Self
    }

    pub fn decode(&self, packet: Packet) -> Result<InboundMessage, ParseError> {
        ensure!(
            packet.direction() == Direction::ServerToContainer,
            ParseError::invalid_header("expect a web server packet but receive a container packet")
        );

        if packet.is_empty() {
            return Ok(InboundMessage::Empty);
        }

        let mut reader = PayloadReader::new(packet.into_payload());
        match reader.read_u8()? {
            prefix::FORWARD_REQUEST => decode_forward_request(&mut reader).map(|exchange| InboundMessage::ForwardRequest(Box::new(exchange))),
            prefix::CPING => Ok(InboundMessage::CPing),
            prefix::SHUTDOWN => Ok(InboundMessage::Shutdown),
            code => Err(ParseError::invalid_header(format!("unknown packet type {code:#04x}"))),
        }
    }
}

fn decode_forward_request(reader: &mut PayloadReader) -> Result<InboundExchange, ParseError> {
    let method = decode_method(reader.read_u8()?)?;
    let protocol = required(reader, "protocol")?;
    let uri = required(reader, "uri")?;
    let remote_addr = reader.read_string()?.unwrap_or_default();
    let remote_host = reader.read_string()?;
    let server_name = reader.read_string()?.unwrap_or_default();
    let server_port = reader.read_u16()?;
    let is_ssl = reader.read_bool()?;

    let header_count = reader.read_u16()? as usize;
    let mut headers = Vec::with_capacity(header_count);
    for _ in 0..header_count {
        headers.push(decode_header(reader)?);
    }

    let attributes = decode_attributes(reader)?;

    // 0xFF method code means the name travels as an attribute
    let method = match method {
        Some(method) => method,
        None => stored_method(&attributes)?,
    };

    trace!(%method, uri = %uri, header_count, attribute_count = attributes.len(), "decoded forward request");
    Ok(InboundExchange {
        method,
        protocol,
        uri,
        remote_addr,
        remote_host,
        server_name,
        server_port,
        is_ssl,
        headers,
        attributes,
    })
}

fn required(reader: &mut PayloadReader, field: &str) -> Result<String, ParseError> {
    reader.read_string()?.ok_or_else(|| ParseError::invalid_header(format!("missing {field}")))
}

fn decode_header(reader: &mut PayloadReader) -> Result<(HeaderName, HeaderValue), ParseError> {
    let marker = reader.peek_u16()?;
    let name = if is_coded(marker) {
        reader.read_u16()?;
        decode_request_header_name(marker)?
    } else {
        let bytes = reader.read_bytes()?.ok_or_else(|| ParseError::invalid_header("null header name"))?;
        HeaderName::from_bytes(&bytes)
            .map_err(|_e| ParseError::invalid_header(format!("invalid header name {:?}", latin1_to_string(&bytes))))?
    };

    let value = match reader.read_bytes()? {
        Some(bytes) => HeaderValue::from_maybe_shared(bytes)
            .map_err(|_e| ParseError::invalid_header(format!("invalid value for header {name}")))?,
        None => HeaderValue::from_static(""),
    };

    Ok((name, value))
}

fn decode_attributes(reader: &mut PayloadReader) -> Result<Vec<Attribute>, ParseError> {
    use attribute_code::*;

    let mut attributes = Vec::new();
    loop {
        let code = reader.read_u8()?;
        let attribute = match code {
            ARE_DONE => return Ok(attributes),
            CONTEXT => Attribute::Context(text(reader)?),
            SERVLET_PATH => Attribute::ServletPath(text(reader)?),
            REMOTE_USER => Attribute::RemoteUser(text(reader)?),
            AUTH_TYPE => Attribute::AuthType(text(reader)?),
            QUERY_STRING => Attribute::QueryString(text(reader)?),
            ROUTE => Attribute::Route(text(reader)?),
            SSL_CERT => Attribute::SslCert(text(reader)?),
            SSL_CIPHER => Attribute::SslCipher(text(reader)?),
            SSL_SESSION => Attribute::SslSession(text(reader)?),
            REQ_ATTRIBUTE => {
                let name = text(reader)?;
                let value = text(reader)?;
                Attribute::Named { name, value }
            }
            SSL_KEY_SIZE => Attribute::SslKeySize(reader.read_u16()?),
            SECRET => Attribute::Secret(text(reader)?),
            STORED_METHOD => Attribute::StoredMethod(text(reader)?),
            code => {
                let value = reader.read_string()?;
                debug!(code, value = ?value, "unknown request attribute ignored");
                Attribute::Unknown { code, value }
            }
        };
        attributes.push(attribute);
    }
}

fn text(reader: &mut PayloadReader) -> Result<String, ParseError> {
    Ok(reader.read_string()?.unwrap_or_default())
}

fn stored_method(attributes: &[Attribute]) -> Result<Method, ParseError> {
    let name = attributes
        .iter()
        .find_map(|attribute| match attribute {
            Attribute::StoredMethod(name) => Some(name),
            _ => None,
        })
        .ok_or_else(|| ParseError::invalid_header("method code 0xFF without a stored method attribute"))?;

    Method::from_bytes(name.as_bytes()).map_err(ParseError::invalid_header)
}
