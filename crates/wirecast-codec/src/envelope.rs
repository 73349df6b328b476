//! Wire envelope construction and its receive-side inverse.
//!
//! Binary wire form: `compress( utf8(serialize(properties)) || SPLITTER
//! || payload )`. Text messages are a single UTF-8 JSON segment with no
//! compression and no chunking.

use wirecast_core::constants::SPLITTER;
use wirecast_core::errors::{CodecError, Result};
use wirecast_core::message::{MessageContext, PropertyMap};

use crate::compress::Compressor;

/// Build the compressed binary envelope for a payload.
///
/// Serializes `properties` to JSON, joins it to `payload` with the
/// splitter byte, and compresses the whole. Side-effect free; a
/// compressor failure is fatal for this encode.
pub async fn encode_envelope(
    payload: &[u8],
    properties: &PropertyMap,
    compressor: &dyn Compressor,
) -> std::result::Result<Vec<u8>, CodecError> {
    let props = serde_json::to_string(properties)?;
    let mut raw = Vec::with_capacity(props.len() + SPLITTER.len() + payload.len());
    raw.extend_from_slice(props.as_bytes());
    raw.extend_from_slice(SPLITTER);
    raw.extend_from_slice(payload);
    compressor.compress(&raw).await
}

/// Recover `(properties, payload)` from a compressed envelope.
///
/// The inverse of [`encode_envelope`], used by the receive side after
/// chunk reassembly. Splits at the first occurrence of the splitter
/// byte; the property segment before it must be a JSON object.
pub async fn decode_envelope(
    envelope: &[u8],
    compressor: &dyn Compressor,
) -> std::result::Result<(PropertyMap, Vec<u8>), CodecError> {
    let raw = compressor.decompress(envelope).await?;
    let at = raw
        .windows(SPLITTER.len())
        .position(|window| window == SPLITTER)
        .ok_or(CodecError::MissingSplitter)?;
    let properties: PropertyMap =
        serde_json::from_slice(&raw[..at]).map_err(CodecError::InvalidProperties)?;
    let payload = raw[at + SPLITTER.len()..].to_vec();
    Ok((properties, payload))
}

/// Serialize a message context to its single text segment.
///
/// Fails with `InvalidArgument` when `context.value` is null; the text
/// path has no compression and no chunking.
pub fn encode_text_context(context: &MessageContext) -> Result<String> {
    context.validate()?;
    let json = serde_json::to_string(context).map_err(CodecError::Serialize)?;
    Ok(json)
}
