use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};

use crate::protocol::ParseError;

/// A FORWARD_REQUEST packet decoded field by field.
///
/// It lives only between packet decoding and the moment its content is copied
/// into a pooled [`crate::protocol::Request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundExchange {
    pub method: Method,
    pub protocol: String,
    pub uri: String,
    pub remote_addr: String,
    pub remote_host: Option<String>,
    pub server_name: String,
    pub server_port: u16,
    pub is_ssl: bool,
    /// Headers in arrival order, repeated names are kept
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub attributes: Vec<Attribute>,
}

impl InboundExchange {
    /// A request with no headers and no attributes
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            protocol: "HTTP/1.1".to_string(),
            uri: uri.into(),
            remote_addr: "127.0.0.1".to_string(),
            remote_host: None,
            server_name: "localhost".to_string(),
            server_port: 80,
            is_ssl: false,
            headers: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            map.append(name.clone(), value.clone());
        }
        map
    }

    /// The declared body length, `None` when the header is absent
    pub fn content_length(&self) -> Result<Option<u64>, ParseError> {
        let Some((_, value)) = self.headers.iter().find(|(name, _)| *name == http::header::CONTENT_LENGTH) else {
            return Ok(None);
        };

        let length = value
            .to_str()
            .ok()
            .and_then(|str| str.trim().parse::<u64>().ok())
            .ok_or_else(|| ParseError::invalid_header(format!("invalid content-length {value:?}")))?;
        Ok(Some(length))
    }

    pub fn query_string(&self) -> Option<&str> {
        self.attributes.iter().find_map(|attribute| match attribute {
            Attribute::QueryString(query) => Some(query.as_str()),
            _ => None,
        })
    }
}

/// Attribute codes of the FORWARD_REQUEST trailer
pub mod attribute_code {
    pub const CONTEXT: u8 = 0x01;
    pub const SERVLET_PATH: u8 = 0x02;
    pub const REMOTE_USER: u8 = 0x03;
    pub const AUTH_TYPE: u8 = 0x04;
    pub const QUERY_STRING: u8 = 0x05;
    pub const ROUTE: u8 = 0x06;
    pub const SSL_CERT: u8 = 0x07;
    pub const SSL_CIPHER: u8 = 0x08;
    pub const SSL_SESSION: u8 = 0x09;
    pub const REQ_ATTRIBUTE: u8 = 0x0A;
    pub const SSL_KEY_SIZE: u8 = 0x0B;
    pub const SECRET: u8 = 0x0C;
    pub const STORED_METHOD: u8 = 0x0D;
    pub const ARE_DONE: u8 = 0xFF;
}

/// One entry of the attribute trailer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    Context(String),
    ServletPath(String),
    RemoteUser(String),
    AuthType(String),
    QueryString(String),
    Route(String),
    /// PEM encoded client certificate
    SslCert(String),
    SslCipher(String),
    SslSession(String),
    SslKeySize(u16),
    Secret(String),
    StoredMethod(String),
    /// A `req_attribute` name/value pair forwarded by the web server
    Named { name: String, value: String },
    /// A code this implementation does not know, kept with its string value
    Unknown { code: u8, value: Option<String> },
}

impl Attribute {
    pub fn code(&self) -> u8 {
        use attribute_code::*;

        match self {
            Attribute::Context(_) => CONTEXT,
            Attribute::ServletPath(_) => SERVLET_PATH,
            Attribute::RemoteUser(_) => REMOTE_USER,
            Attribute::AuthType(_) => AUTH_TYPE,
            Attribute::QueryString(_) => QUERY_STRING,
            Attribute::Route(_) => ROUTE,
            Attribute::SslCert(_) => SSL_CERT,
            Attribute::SslCipher(_) => SSL_CIPHER,
            Attribute::SslSession(_) => SSL_SESSION,
            Attribute::Named { .. } => REQ_ATTRIBUTE,
            Attribute::SslKeySize(_) => SSL_KEY_SIZE,
            Attribute::Secret(_) => SECRET,
            Attribute::StoredMethod(_) => STORED_METHOD,
            Attribute::Unknown { code, .. } => *code,
        }
    }
}

/// A decoded packet sent by the web server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    ForwardRequest(Box<InboundExchange>),
    /// Liveness probe, answered with a CPONG
    CPing,
    Shutdown,
    /// A zero length packet, nothing to do this cycle
    Empty,
}

/// A packet the container sends to the web server
#[derive(Debug)]
pub enum OutboundMessage<'a> {
    SendHeaders { status: StatusCode, reason: Option<&'a str>, headers: &'a HeaderMap },
    SendBodyChunk(&'a [u8]),
    EndResponse { reuse: bool },
    GetBodyChunk(u16),
    CPong,
}
