//! Core AJP13 protocol abstractions.
//!
//! # Architecture
//!
//! - **Message Handling** ([`message`]): decoded inbound packets and outbound packet kinds
//!   - [`InboundExchange`]: the content of a FORWARD_REQUEST packet
//!   - [`Attribute`]: one entry of its attribute trailer
//!   - [`InboundMessage`] / [`OutboundMessage`]: what each direction may send
//!
//! - **Pooled Objects** ([`request`], [`response`]): mutable, reusable per-exchange state
//!   - [`Request`]: populated by the protocol adapter, read by the dispatcher
//!   - [`Response`]: status and headers until they are committed
//!
//! - **Body** ([`body`]): [`body::ReqBody`], the negotiated request body
//!
//! - **Error Handling** ([`error`]):
//!   - [`AjpError`]: Top-level error type
//!   - [`ParseError`]: inbound framing and parsing errors
//!   - [`SendError`]: outbound encoding and writing errors
//!   - [`PoolError`]: object pool backpressure

mod message;
pub use message::attribute_code;
pub use message::Attribute;
pub use message::InboundExchange;
pub use message::InboundMessage;
pub use message::OutboundMessage;

mod request;
pub use request::Principal;
pub use request::Request;
pub use request::SslInfo;
pub use request::X509Certificate;

mod response;
pub use response::Response;

mod error;
pub use error::AjpError;
pub use error::ParseError;
pub use error::PoolError;
pub use error::SendError;

pub mod body;
