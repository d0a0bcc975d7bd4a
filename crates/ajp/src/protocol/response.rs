//! The pooled response.
//!
//! Holds the status line and headers until they are committed to the wire. The
//! body is never buffered here, it streams straight to the connection through a
//! [`crate::handler::ResponseWriter`].

use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};

use crate::pool::Recycle;
use crate::protocol::Request;

#[derive(Debug, Default)]
pub struct Response {
    status: StatusCode,
    reason: Option<String>,
    protocol: String,
    headers: HeaderMap,
    keep_alive: bool,
    committed: bool,
    bytes_written: u64,
    bound_request: Option<usize>,
}

impl Response {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// The reason phrase sent with the status, defaults to the canonical one
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref().or_else(|| self.status.canonical_reason())
    }

    pub fn set_reason(&mut self, reason: impl Into<String>) {
        self.reason = Some(reason.into());
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn set_protocol(&mut self, protocol: impl Into<String>) {
        self.protocol = protocol.into();
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Drops status, reason and headers so an error page can replace them
    pub fn reset_head(&mut self, status: StatusCode) {
        self.status = status;
        self.reason = None;
        self.headers.clear();
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Takes the protocol and the keep-alive wish of the request this response answers
    pub fn extract_keep_alive(&mut self, request: &Request) {
        self.protocol = request.protocol().to_string();
        self.keep_alive = request.wants_keep_alive();
    }

    /// True once the status line and headers went to the wire, they can no longer change
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub(crate) fn set_committed(&mut self) {
        self.committed = true;
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub(crate) fn add_written(&mut self, len: usize) {
        self.bytes_written += len as u64;
    }

    /// The pool slot of the request this response is bound to
    pub fn bound_request(&self) -> Option<usize> {
        self.bound_request
    }

    pub(crate) fn bind(&mut self, request_slot: usize) {
        self.bound_request = Some(request_slot);
    }
}

impl Recycle for Response {
    fn recycle(&mut self) {
        let mut headers = std::mem::take(&mut self.headers);
        headers.clear();

        *self = Self { headers, ..Default::default() };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_defaults_to_canonical() {
        let mut response = Response::default();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.reason(), Some("OK"));

        response.set_status(StatusCode::NOT_FOUND);
        assert_eq!(response.reason(), Some("Not Found"));

        response.set_reason("Gone Fishing");
        assert_eq!(response.reason(), Some("Gone Fishing"));
    }

    #[test]
    fn reset_head_keeps_binding() {
        let mut response = Response::default();
        response.bind(1);
        response.set_reason("Fine");
        response.insert_header(http::header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));

        response.reset_head(StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(response.reason(), Some("Internal Server Error"));
        assert!(response.headers().is_empty());
        assert_eq!(response.bound_request(), Some(1));
    }

    #[test]
    fn recycle_resets_every_field() {
        let mut request = Request::default();
        request.set_protocol("HTTP/1.1");

        let mut response = Response::default();
        response.set_status(StatusCode::CREATED);
        response.set_reason("Made");
        response.extract_keep_alive(&request);
        response.insert_header(http::header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        response.set_committed();
        response.add_written(12);
        response.bind(3);

        response.recycle();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.reason(), Some("OK"));
        assert_eq!(response.protocol(), "");
        assert!(response.headers().is_empty());
        assert!(!response.keep_alive());
        assert!(!response.is_committed());
        assert_eq!(response.bytes_written(), 0);
        assert_eq!(response.bound_request(), None);
    }
}
