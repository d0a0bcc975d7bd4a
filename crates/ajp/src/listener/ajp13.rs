//! The AJP13 protocol adapter.
//!
//! Allocation reads one packet. A FORWARD_REQUEST fills the pooled request:
//! socket details, headers, the URI line and the attribute trailer, then the
//! body is pulled with GET_BODY_CHUNK. CPING is answered right away, SHUTDOWN
//! and empty packets are ignored. None of those three is a request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, trace};

use crate::codec::wire::string_to_latin1;
use crate::codec::RequestDecoder;
use crate::config::ListenerConfig;
use crate::connection::{read_body, Connection};
use crate::ensure;
use crate::listener::{Allocation, Protocol};
use crate::pool::{ObjectPool, Pooled};
use crate::protocol::body::ReqBody;
use crate::protocol::{
    AjpError, Attribute, InboundExchange, InboundMessage, OutboundMessage, ParseError, Principal, Request, Response,
    SendError, X509Certificate,
};

/// Key sizes of the cipher families, matched as `_WITH_<family>_` inside the suite name
const KEY_SIZES: [(&str, u16); 8] = [
    ("_WITH_NULL_", 0),
    ("_WITH_IDEA_CBC_", 128),
    ("_WITH_RC2_CBC_40_", 40),
    ("_WITH_RC4_40_", 40),
    ("_WITH_RC4_128_", 128),
    ("_WITH_DES40_CBC_", 40),
    ("_WITH_DES_CBC_", 56),
    ("_WITH_3DES_EDE_CBC_", 168),
];

/// The key size implied by a cipher suite name, `None` for unknown families
pub fn key_size(cipher_suite: &str) -> Option<u16> {
    KEY_SIZES.iter().find(|(family, _)| cipher_suite.contains(family)).map(|(_, size)| *size)
}

#[derive(Debug)]
pub struct Ajp13Protocol {
    pool: Arc<ObjectPool>,
    decoder: RequestDecoder,
    connection_timeout: Duration,
    keep_alive_timeout: Duration,
    max_body_size: u64,
}

impl Ajp13Protocol {
    pub fn new(config: &ListenerConfig, pool: Arc<ObjectPool>) -> Self {
        Self {
            pool,
            decoder: RequestDecoder::new(),
            connection_timeout: config.connection_timeout_duration(),
            keep_alive_timeout: config.keep_alive_timeout_duration(),
            max_body_size: config.max_body_size,
        }
    }

    pub fn pool(&self) -> &Arc<ObjectPool> {
        &self.pool
    }

    /// Acts on one packet, `Ok(true)` when it carried a request
    async fn process_packet(
        &self,
        conn: &mut Connection,
        message: InboundMessage,
        request: &mut Request,
        response: &mut Response,
    ) -> Result<bool, AjpError> {
        match message {
            InboundMessage::ForwardRequest(exchange) => {
                self.forward_request(conn, *exchange, request, response).await?;
                Ok(true)
            }
            InboundMessage::CPing => {
                trace!("answer cping");
                conn.output().write(OutboundMessage::CPong)?;
                conn.output().flush().await?;
                Ok(false)
            }
            InboundMessage::Shutdown => {
                info!(peer = ?conn.peer_addr(), "shutdown packet received and ignored");
                Ok(false)
            }
            InboundMessage::Empty => Ok(false),
        }
    }

    async fn forward_request(
        &self,
        conn: &mut Connection,
        exchange: InboundExchange,
        request: &mut Request,
        response: &mut Response,
    ) -> Result<(), AjpError> {
        let content_length = exchange.content_length()?;
        apply_socket_info(&exchange, request);

        let InboundExchange { method, protocol, uri, headers, attributes, .. } = exchange;
        let request_headers = request.headers_mut();
        request_headers.reserve(headers.len());
        for (name, value) in headers {
            request_headers.append(name, value);
        }
        request.set_content_length(content_length);

        request.set_method(method);
        request.set_protocol(protocol);
        response.extract_keep_alive(request);
        apply_attributes(attributes, request);
        request.set_uri(uri.clone());
        request.stash_target(uri);

        debug!(method = %request.method(), uri = request.uri(), ?content_length, "forward request");

        if let Some(length) = content_length.filter(|length| *length > 0) {
            ensure!(length <= self.max_body_size, ParseError::body_too_large(length, self.max_body_size).into());
            let body = read_body(conn, length).await?;
            request.set_body(ReqBody::new(body));
        }
        Ok(())
    }
}

#[async_trait]
impl Protocol for Ajp13Protocol {
    async fn allocate(&self, conn: &mut Connection, first: bool) -> Result<Allocation, AjpError> {
        let mut request = self.pool.acquire_request().await?;
        let mut response = match self.pool.acquire_response().await {
            Ok(response) => response,
            Err(e) => {
                self.deallocate(Some(request), None);
                return Err(e.into());
            }
        };
        response.bind(request.slot());

        conn.set_read_timeout(Some(if first { self.connection_timeout } else { self.keep_alive_timeout }));
        let read = conn.read_packet().await;
        // body chunks are read under the connection timeout
        conn.set_read_timeout(Some(self.connection_timeout));

        let packet = match read {
            Ok(Some(packet)) => packet,
            Ok(None) => {
                self.deallocate(Some(request), Some(response));
                debug!(peer = ?conn.peer_addr(), "peer closed the connection");
                return Ok(Allocation::NoRequest);
            }
            Err(ParseError::Timeout { timeout }) if !first => {
                self.deallocate(Some(request), Some(response));
                debug!(peer = ?conn.peer_addr(), ?timeout, "keep-alive timeout");
                return Ok(Allocation::NoRequest);
            }
            Err(e) => {
                self.deallocate(Some(request), Some(response));
                return Err(e.into());
            }
        };

        let processed = match self.decoder.decode(packet) {
            Ok(message) => self.process_packet(conn, message, &mut request, &mut response).await,
            Err(e) => Err(e.into()),
        };

        match processed {
            Ok(true) => Ok(Allocation::Exchange { request, response }),
            Ok(false) => {
                self.deallocate(Some(request), Some(response));
                Ok(Allocation::Skip)
            }
            Err(e) => {
                self.deallocate(Some(request), Some(response));
                Err(e)
            }
        }
    }

    fn deallocate(&self, request: Option<Pooled<Request>>, response: Option<Pooled<Response>>) {
        if let Some(request) = request {
            self.pool.release_request(request);
        }
        if let Some(response) = response {
            self.pool.release_response(response);
        }
    }

    fn resolve_request_target(&self, request: &mut Request) -> Option<String> {
        request.take_target()
    }

    async fn await_next_request(&self, _conn: &mut Connection) -> bool {
        // the keep-alive decision is made by the next allocate
        true
    }

    async fn finish(&self, conn: &mut Connection, response: &mut Response, reuse: bool) -> Result<(), SendError> {
        let output = conn.output();
        output.commit(response)?;
        output.write(OutboundMessage::EndResponse { reuse })?;
        output.flush().await
    }

    async fn release(&self, conn: Connection) {
        let peer = conn.peer_addr();
        if let Err(e) = conn.close().await {
            debug!(?peer, cause = %e, "close connection failed");
        }
        trace!(?peer, "connection released");
    }
}

fn apply_socket_info(exchange: &InboundExchange, request: &mut Request) {
    request.set_server(exchange.server_name.as_str(), exchange.server_port);
    request.set_local(exchange.server_name.as_str(), exchange.server_port);

    let remote_name = match exchange.remote_host.as_deref() {
        Some(host) if !host.is_empty() => host,
        _ => exchange.remote_addr.as_str(),
    };
    request.set_remote(exchange.remote_addr.as_str(), remote_name);

    request.set_scheme(if exchange.is_ssl { "https" } else { "http" });
    request.set_secure(exchange.is_ssl);
}

fn apply_attributes(attributes: Vec<Attribute>, request: &mut Request) {
    let mut remote_user = None;
    let mut auth_type = None;
    let mut declared_key_size = None;

    for attribute in attributes {
        match attribute {
            Attribute::QueryString(query) => request.set_query_string(Some(query)),
            Attribute::SslCert(pem) => {
                match parse_certificate(&pem) {
                    Some(certificate) => request.ssl_mut().certificates.push(certificate),
                    None => debug!(certificate = %pem, "skipping invalid SSL certificate"),
                }
                request.set_secure(true);
            }
            Attribute::SslCipher(cipher) => {
                let ssl = request.ssl_mut();
                ssl.key_size = key_size(&cipher);
                ssl.cipher_suite = Some(cipher);
                request.set_secure(true);
            }
            Attribute::SslSession(session) => {
                request.ssl_mut().session_id = Some(session);
                request.set_secure(true);
            }
            Attribute::SslKeySize(size) => declared_key_size = Some(size),
            Attribute::RemoteUser(user) => remote_user = Some(user),
            Attribute::AuthType(auth) => auth_type = Some(auth),
            Attribute::Named { name, value } => request.set_attribute(name, value),
            Attribute::Route(route) => request.set_attribute("route", route),
            Attribute::Context(context) => request.set_attribute("context", context),
            Attribute::ServletPath(path) => request.set_attribute("servlet_path", path),
            Attribute::Secret(_) => trace!("secret attribute received"),
            Attribute::StoredMethod(_) => {}
            Attribute::Unknown { code, value } => debug!(code, ?value, "unknown request attribute ignored"),
        }
    }

    // the web server's own measurement wins over the table
    if declared_key_size.is_some() {
        request.ssl_mut().key_size = declared_key_size;
    }
    if let Some(username) = remote_user {
        request.set_remote_user(Some(Principal::new(username, auth_type)));
    }
}

/// Reads the `ssl_cert` attribute, PEM armored or raw DER sent as Latin-1 text
fn parse_certificate(text: &str) -> Option<X509Certificate> {
    let bytes = string_to_latin1(text);
    let der = if text.contains("-----BEGIN") {
        let mut reader = bytes.as_slice();
        match rustls_pemfile::certs(&mut reader).next() {
            Some(Ok(der)) => der.as_ref().to_vec(),
            Some(Err(e)) => {
                debug!(cause = %e, "certificate is not valid PEM");
                return None;
            }
            None => {
                debug!("no certificate inside the PEM armor");
                return None;
            }
        }
    } else {
        bytes
    };

    match X509Certificate::from_der(der) {
        Ok(certificate) => Some(certificate),
        Err(e) => {
            debug!(cause = %e, "certificate is not valid X.509");
            None
        }
    }
}
