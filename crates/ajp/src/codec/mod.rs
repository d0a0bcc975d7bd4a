//! AJP13 codec module for encoding and decoding protocol packets
//!
//! This module only transforms bytes. Reading from and writing to the socket
//! is done by [`crate::connection`], which drives these codecs.
//!
//! # Architecture
//!
//! The codec module is organized into several components:
//!
//! - Framing:
//!   - [`PacketCodec`]: splits a byte stream into [`Packet`]s, validating magic and length
//!   - [`wire`]: integers, booleans and length-prefixed Latin-1 strings
//!
//! - Web server to container:
//!   - [`RequestDecoder`]: decodes FORWARD_REQUEST, CPING and SHUTDOWN packets
//!   - [`decode_body_chunk`]: extracts the bytes of a body chunk answer
//!   - Method and header name codes via the `header` module
//!
//! - Container to web server:
//!   - [`ResponseEncoder`]: SEND_HEADERS, SEND_BODY_CHUNK, END_RESPONSE, GET_BODY_CHUNK and CPONG
//!
//! - Test and tooling support:
//!   - [`RequestEncoder`]: produces the packets a web server would send
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use http::Method;
//! use micro_ajp::codec::{PacketCodec, RequestDecoder, RequestEncoder};
//! use micro_ajp::protocol::{InboundExchange, InboundMessage};
//! use tokio_util::codec::{Decoder, Encoder};
//!
//! let exchange = InboundExchange::new(Method::GET, "/status");
//!
//! let mut buf = BytesMut::new();
//! RequestEncoder::new().encode(&exchange, &mut buf).unwrap();
//!
//! let packet = PacketCodec::new().decode(&mut buf).unwrap().unwrap();
//! let message = RequestDecoder::new().decode(packet).unwrap();
//! assert_eq!(message, InboundMessage::ForwardRequest(Box::new(exchange)));
//! ```

mod body;
mod header;
mod packet;
mod request_decoder;
mod request_encoder;
mod response_encoder;
pub mod wire;

pub use body::{decode_body_chunk, max_chunk_len, ChunkEncoder};
pub use header::{
    decode_method, decode_request_header_name, decode_response_header_name, method_code, request_header_code,
    response_header_code, CODED_HEADER_MARKER, STORED_METHOD,
};
pub use packet::{Direction, Packet, PacketCodec, PacketHeader, DEFAULT_MAX_PACKET_SIZE, HEADER_LEN, MAX_PAYLOAD_LEN};
pub use request_decoder::RequestDecoder;
pub use request_encoder::RequestEncoder;
pub use response_encoder::ResponseEncoder;
