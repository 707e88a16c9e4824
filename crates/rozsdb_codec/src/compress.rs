//! Zstandard frame compression.
//!
//! Every document blob is a single zstd frame. Frames written by
//! [`compress`] record their decompressed size in the frame header, so
//! readers never need an out-of-band length.

use crate::error::{CodecError, CodecResult};

/// Compression level used for document frames.
pub const COMPRESSION_LEVEL: i32 = 3;

/// Compresses `data` into a single zstd frame.
pub fn compress(data: &[u8]) -> CodecResult<Vec<u8>> {
    zstd::bulk::compress(data, COMPRESSION_LEVEL).map_err(|e| CodecError::compression(e.to_string()))
}

/// Decompresses a zstd frame produced by [`compress`].
///
/// # Errors
///
/// An empty or corrupt frame is an error. Callers must not treat a corrupt
/// document as absent.
pub fn decompress(frame: &[u8]) -> CodecResult<Vec<u8>> {
    if frame.is_empty() {
        return Err(CodecError::decompression("empty frame"));
    }
    zstd::stream::decode_all(frame).map_err(|e| CodecError::decompression(e.to_string()))
}

/// Decompresses a frame and returns its contents as a UTF-8 string.
pub fn decompress_str(frame: &[u8]) -> CodecResult<String> {
    let bytes = decompress(frame)?;
    String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)
}
