//! Request and response body packets.
//!
//! The web server never pushes the request body on its own. The container asks
//! for each slice with GET_BODY_CHUNK and the answer is decoded by
//! [`decode_body_chunk`]. Response bytes go the other way as SEND_BODY_CHUNK
//! packets produced by [`ChunkEncoder`].
//!
//! # Components
//!
//! - [`decode_body_chunk`]: extracts body bytes from a web server packet
//! - [`ChunkEncoder`]: splits response bytes into packets of the configured size
//! - [`max_chunk_len`]: the largest slice one packet can carry

mod chunk_decoder;
mod chunk_encoder;

pub use chunk_decoder::decode_body_chunk;
pub use chunk_encoder::max_chunk_len;
pub use chunk_encoder::ChunkEncoder;
