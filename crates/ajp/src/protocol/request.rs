//! The pooled request.
//!
//! A [`Request`] is borrowed from the object pool by one worker for one exchange
//! and filled by the protocol adapter. Releasing it back to the pool resets every
//! field, so nothing leaks from one exchange into the next.

use std::collections::HashMap;

use bytes::Bytes;
use http::{HeaderMap, Method};
use x509_parser::error::X509Error;
use x509_parser::nom;
use x509_parser::parse_x509_certificate;

use crate::pool::Recycle;
use crate::protocol::body::ReqBody;

/// An authenticated user as asserted by the web server, never carries credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    username: String,
    auth_type: Option<String>,
}

impl Principal {
    pub fn new(username: impl Into<String>, auth_type: Option<String>) -> Self {
        Self { username: username.into(), auth_type }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn auth_type(&self) -> Option<&str> {
        self.auth_type.as_deref()
    }
}

/// A DER encoded X.509 certificate presented by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X509Certificate(Bytes);

impl X509Certificate {
    /// Keeps `der` only when it parses as one X.509 certificate
    pub fn from_der(der: impl Into<Bytes>) -> Result<Self, X509Error> {
        let der = der.into();
        parse_x509_certificate(&der).map(|_| ()).map_err(|e| match e {
            nom::Err::Error(e) | nom::Err::Failure(e) => e,
            nom::Err::Incomplete(_) => X509Error::InvalidCertificate,
        })?;
        Ok(Self(der))
    }

    pub fn der(&self) -> &[u8] {
        &self.0
    }

    /// The subject distinguished name, such as `CN=www.example.org`
    pub fn subject(&self) -> String {
        parse_x509_certificate(&self.0).map(|(_, certificate)| certificate.subject().to_string()).unwrap_or_default()
    }
}

/// TLS details the web server terminated on our behalf
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SslInfo {
    pub cipher_suite: Option<String>,
    pub key_size: Option<u16>,
    pub session_id: Option<String>,
    pub certificates: Vec<X509Certificate>,
}

impl SslInfo {
    pub fn is_empty(&self) -> bool {
        *self == SslInfo::default()
    }
}

#[derive(Debug, Default)]
pub struct Request {
    method: Method,
    protocol: String,
    uri: String,
    query_string: Option<String>,
    scheme: String,
    secure: bool,
    server_name: String,
    server_port: u16,
    local_addr: String,
    local_port: u16,
    remote_addr: String,
    remote_name: String,
    headers: HeaderMap,
    content_length: Option<u64>,
    body: ReqBody,
    remote_user: Option<Principal>,
    ssl: SslInfo,
    attributes: HashMap<String, String>,
    target_stash: Option<String>,
}

impl Request {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// The protocol string as sent by the web server, e.g. `HTTP/1.1`
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn set_protocol(&mut self, protocol: impl Into<String>) {
        self.protocol = protocol.into();
    }

    /// The request path without the query string
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn set_uri(&mut self, uri: impl Into<String>) {
        self.uri = uri.into();
    }

    pub fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    pub fn set_query_string(&mut self, query_string: Option<String>) {
        self.query_string = query_string;
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn set_scheme(&mut self, scheme: impl Into<String>) {
        self.scheme = scheme.into();
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn set_secure(&mut self, secure: bool) {
        self.secure = secure;
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    pub fn set_server(&mut self, name: impl Into<String>, port: u16) {
        self.server_name = name.into();
        self.server_port = port;
    }

    pub fn local_addr(&self) -> &str {
        &self.local_addr
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    pub fn set_local(&mut self, addr: impl Into<String>, port: u16) {
        self.local_addr = addr.into();
        self.local_port = port;
    }

    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    /// The remote host name, falls back to the address when the web server did not resolve it
    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }

    pub fn set_remote(&mut self, addr: impl Into<String>, name: impl Into<String>) {
        self.remote_addr = addr.into();
        self.remote_name = name.into();
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn set_content_length(&mut self, content_length: Option<u64>) {
        self.content_length = content_length;
    }

    pub fn body(&self) -> &ReqBody {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut ReqBody {
        &mut self.body
    }

    pub fn set_body(&mut self, body: ReqBody) {
        self.body = body;
    }

    pub fn remote_user(&self) -> Option<&Principal> {
        self.remote_user.as_ref()
    }

    pub fn set_remote_user(&mut self, principal: Option<Principal>) {
        self.remote_user = principal;
    }

    pub fn ssl(&self) -> &SslInfo {
        &self.ssl
    }

    pub fn ssl_mut(&mut self) -> &mut SslInfo {
        &mut self.ssl
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        self.attributes.remove(name)
    }

    /// Keeps the request target until the protocol adapter hands it to the worker
    pub(crate) fn stash_target(&mut self, target: String) {
        self.target_stash = Some(target);
    }

    pub(crate) fn take_target(&mut self) -> Option<String> {
        self.target_stash.take()
    }

    /// True when the client asked for the connection to stay open
    pub fn wants_keep_alive(&self) -> bool {
        let connection = self.headers.get(http::header::CONNECTION).and_then(|value| value.to_str().ok());
        match connection {
            Some(value) if value.eq_ignore_ascii_case("close") => false,
            Some(value) if value.eq_ignore_ascii_case("keep-alive") => true,
            _ => self.protocol.eq_ignore_ascii_case("HTTP/1.1"),
        }
    }
}

impl Recycle for Request {
    fn recycle(&mut self) {
        // the header map and attribute table keep their allocations
        let mut headers = std::mem::take(&mut self.headers);
        let mut attributes = std::mem::take(&mut self.attributes);
        headers.clear();
        attributes.clear();

        *self = Self { headers, attributes, ..Default::default() };
    }
}
