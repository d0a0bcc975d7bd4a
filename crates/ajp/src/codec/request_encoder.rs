//! Encoder for the packets a web server sends.
//!
//! The container never sends these itself. The encoder exists so tests,
//! benchmarks and proxy-side tools can produce byte-exact FORWARD_REQUEST and
//! body chunk packets.

use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::Encoder;

use crate::codec::header::{method_code, request_header_code, STORED_METHOD};
use crate::codec::packet::{Direction, Packet, MAX_PAYLOAD_LEN};
use crate::codec::wire::{prefix, put_bool, put_bytes, put_string};
use crate::ensure;
use crate::protocol::{attribute_code, Attribute, InboundExchange, SendError};

#[derive(Debug, Default, Clone, Copy)]
pub struct RequestEncoder;

impl RequestEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Writes the answer to a GET_BODY_CHUNK, an empty `data` ends the body
    pub fn encode_body_chunk(&self, data: &[u8], dst: &mut BytesMut) -> Result<(), SendError> {
        if data.is_empty() {
            return Packet::new(Direction::ServerToContainer, Bytes::new()).encode(dst);
        }

        ensure!(data.len() + 2 <= MAX_PAYLOAD_LEN, SendError::too_large_packet(data.len() + 2, MAX_PAYLOAD_LEN));
        let mut payload = BytesMut::with_capacity(data.len() + 2);
        payload.put_u16(data.len() as u16);
        payload.put_slice(data);
        Packet::new(Direction::ServerToContainer, payload.freeze()).encode(dst)
    }

    pub fn encode_cping(&self, dst: &mut BytesMut) -> Result<(), SendError> {
        Packet::new(Direction::ServerToContainer, &[prefix::CPING][..]).encode(dst)
    }

    pub fn encode_shutdown(&self, dst: &mut BytesMut) -> Result<(), SendError> {
        Packet::new(Direction::ServerToContainer, &[prefix::SHUTDOWN][..]).encode(dst)
    }
}

impl Encoder<&InboundExchange> for RequestEncoder {
    type Error = SendError;

    fn encode(&mut self, item: &InboundExchange, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut payload = BytesMut::with_capacity(256);
        payload.put_u8(prefix::FORWARD_REQUEST);

        let code = method_code(&item.method);
        payload.put_u8(code);
        put_string(&mut payload, Some(&item.protocol));
        put_string(&mut payload, Some(&item.uri));
        put_string(&mut payload, Some(&item.remote_addr));
        put_string(&mut payload, item.remote_host.as_deref());
        put_string(&mut payload, Some(&item.server_name));
        payload.put_u16(item.server_port);
        put_bool(&mut payload, item.is_ssl);

        payload.put_u16(item.headers.len() as u16);
        for (name, value) in &item.headers {
            match request_header_code(name) {
                Some(code) => payload.put_u16(code),
                None => put_bytes(&mut payload, Some(name.as_str().as_bytes())),
            }
            put_bytes(&mut payload, Some(value.as_bytes()));
        }

        for attribute in &item.attributes {
            encode_attribute(attribute, &mut payload);
        }
        let has_stored_method = item.attributes.iter().any(|attribute| matches!(attribute, Attribute::StoredMethod(_)));
        if code == STORED_METHOD && !has_stored_method {
            encode_attribute(&Attribute::StoredMethod(item.method.as_str().to_string()), &mut payload);
        }
        payload.put_u8(attribute_code::ARE_DONE);

        Packet::new(Direction::ServerToContainer, payload.freeze()).encode(dst)
    }
}

fn encode_attribute(attribute: &Attribute, dst: &mut BytesMut) {
    match attribute {
        Attribute::Named { name, value } => {
            dst.put_u8(attribute_code::REQ_ATTRIBUTE);
            put_string(dst, Some(name));
            put_string(dst, Some(value));
        }
        Attribute::SslKeySize(size) => {
            dst.put_u8(attribute_code::SSL_KEY_SIZE);
            dst.put_u16(*size);
        }
        Attribute::Unknown { code, value } => {
            dst.put_u8(*code);
            put_string(dst, value.as_deref());
        }
        Attribute::Context(value)
        | Attribute::ServletPath(value)
        | Attribute::RemoteUser(value)
        | Attribute::AuthType(value)
        | Attribute::QueryString(value)
        | Attribute::Route(value)
        | Attribute::SslCert(value)
        | Attribute::SslCipher(value)
        | Attribute::SslSession(value)
        | Attribute::Secret(value)
        | Attribute::StoredMethod(value) => {
            dst.put_u8(attribute.code());
            put_string(dst, Some(value));
        }
    }
}

#[cfg(test)]
mod tests {
    use http::{HeaderValue, Method};
    use tokio_util::codec::Decoder;

    use super::*;
    use crate::codec::{PacketCodec, RequestDecoder};
    use crate::protocol::InboundMessage;

    fn decode(dst: &mut BytesMut) -> InboundMessage {
        let packet = PacketCodec::new().decode(dst).unwrap().unwrap();
        RequestDecoder::new().decode(packet).unwrap()
    }

    #[test]
    fn forward_request_is_decodable() {
        let mut exchange = InboundExchange::new(Method::POST, "/upload");
        exchange.remote_host = Some("client.example.org".to_string());
        exchange.is_ssl = true;
        exchange.headers.push((http::header::CONTENT_LENGTH, HeaderValue::from_static("10")));
        exchange.headers.push((http::header::HeaderName::from_static("x-trace"), HeaderValue::from_static("t1")));
        exchange.attributes.push(Attribute::QueryString("a=1".to_string()));
        exchange.attributes.push(Attribute::SslKeySize(256));
        exchange.attributes.push(Attribute::Named { name: "k".to_string(), value: "v".to_string() });

        let mut dst = BytesMut::new();
        RequestEncoder::new().encode(&exchange, &mut dst).unwrap();

        assert_eq!(&dst[..2], &[0x12, 0x34]);
        assert_eq!(decode(&mut dst), InboundMessage::ForwardRequest(Box::new(exchange)));
    }

    #[test]
    fn extension_method_travels_as_attribute() {
        let method = Method::from_bytes(b"PURGE").unwrap();
        let exchange = InboundExchange::new(method.clone(), "/cache");

        let mut dst = BytesMut::new();
        RequestEncoder::new().encode(&exchange, &mut dst).unwrap();

        let InboundMessage::ForwardRequest(decoded) = decode(&mut dst) else {
            panic!("expect forward request");
        };
        assert_eq!(decoded.method, method);
        assert_eq!(decoded.attributes, vec![Attribute::StoredMethod("PURGE".to_string())]);
    }

    #[test]
    fn body_chunk_layout() {
        let mut dst = BytesMut::new();
        let encoder = RequestEncoder::new();
        encoder.encode_body_chunk(b"abc", &mut dst).unwrap();
        encoder.encode_body_chunk(b"", &mut dst).unwrap();

        assert_eq!(&dst[..], &[0x12, 0x34, 0x00, 0x05, 0x00, 0x03, b'a', b'b', b'c', 0x12, 0x34, 0x00, 0x00]);
    }

    #[test]
    fn control_packets() {
        let mut dst = BytesMut::new();
        RequestEncoder::new().encode_cping(&mut dst).unwrap();
        assert_eq!(decode(&mut dst), InboundMessage::CPing);

        RequestEncoder::new().encode_shutdown(&mut dst).unwrap();
        assert_eq!(decode(&mut dst), InboundMessage::Shutdown);
    }
}
