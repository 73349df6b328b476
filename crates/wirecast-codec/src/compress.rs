//! Pluggable stream compression.
//!
//! The framing contract only requires symmetry: whatever compressed the
//! envelope on the send side must be reversible by the matching
//! decompressor on the receive side. [`DeflateCompressor`] (zlib) is the
//! default; [`NoopCompressor`] is an identity implementation for tests
//! and diagnostics.

use std::io::Write;

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::{ZlibDecoder, ZlibEncoder};

use wirecast_core::errors::CodecError;

/// Capability to compress and decompress an envelope as a whole.
///
/// A failed compression is fatal for the encode that requested it and
/// propagates to the caller; this layer never retries.
#[async_trait]
pub trait Compressor: Send + Sync {
    /// Compress the full input buffer.
    async fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Recover the exact original bytes from [`Compressor::compress`]
    /// output.
    async fn decompress(&self, input: &[u8]) -> Result<Vec<u8>, CodecError>;
}

/// Deflate (zlib) compressor.
#[derive(Clone, Debug)]
pub struct DeflateCompressor {
    level: Compression,
}

impl DeflateCompressor {
    /// Create a compressor at the default compression level.
    #[must_use]
    pub fn new() -> Self {
        Self {
            level: Compression::default(),
        }
    }

    /// Create a compressor with an explicit level (0-9).
    #[must_use]
    pub fn with_level(level: u32) -> Self {
        Self {
            level: Compression::new(level),
        }
    }
}

impl Default for DeflateCompressor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Compressor for DeflateCompressor {
    async fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut encoder = ZlibEncoder::new(Vec::new(), self.level);
        encoder.write_all(input).map_err(CodecError::Compress)?;
        encoder.finish().map_err(CodecError::Compress)
    }

    async fn decompress(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut decoder = ZlibDecoder::new(Vec::new());
        decoder.write_all(input).map_err(CodecError::Decompress)?;
        decoder.finish().map_err(CodecError::Decompress)
    }
}

/// Identity compressor: output equals input in both directions.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopCompressor;

#[async_trait]
impl Compressor for NoopCompressor {
    async fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(input.to_vec())
    }

    async fn decompress(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(input.to_vec())
    }
}
