//! Request body handling.
//!
//! AJP13 never pushes a request body unsolicited: the container asks for it with
//! GET_BODY_CHUNK packets while the request is being allocated, so once the
//! request reaches the dispatcher the body is complete. [`ReqBody`] exposes the
//! received bytes through the standard `http_body::Body` interface, and through a
//! blocking reader for code that prefers `std::io::Read`.

mod req_body;

pub use req_body::ReqBody;
