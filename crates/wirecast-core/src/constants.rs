//! Fixed protocol constants shared by sender and receiver.

/// Byte marker separating serialized properties from the payload inside
/// an envelope.
///
/// ASCII `0x1E` (record separator). JSON string encoding always escapes
/// control bytes below `0x20` (as a `\u00XX` escape), so this byte can
/// never appear unescaped inside the serialized property map that
/// precedes it.
pub const SPLITTER: &[u8] = &[0x1E];

/// Default fixed chunk size in bytes for binary transfer.
///
/// A compressed envelope is sliced into frames of this size; the final
/// frame is shorter and carries the end-of-message flag.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;
