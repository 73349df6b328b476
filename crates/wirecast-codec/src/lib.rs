//! # wirecast-codec
//!
//! The outbound message pipeline for the wirecast framing protocol.
//!
//! - [`compress`]: the pluggable [`Compressor`](compress::Compressor)
//!   capability with a deflate default
//! - [`envelope`]: builds `serialize(properties) || SPLITTER || payload`
//!   and compresses the whole; plus the receive-side decode symmetry
//! - [`chunk`]: slices a compressed envelope into fixed-size frames,
//!   flagging exactly one terminal end-of-message frame

#![deny(unsafe_code)]

pub mod chunk;
pub mod compress;
pub mod envelope;

pub use chunk::{Chunks, chunk_count, chunks};
pub use compress::{Compressor, DeflateCompressor, NoopCompressor};
pub use envelope::{decode_envelope, encode_envelope, encode_text_context};
