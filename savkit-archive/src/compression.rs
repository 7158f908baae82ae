//! zlib adapter used for entry payloads.

use std::io::{Read, Write};

use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use tracing::trace;

/// Level used when writing payloads. The game writes its saves at the best zlib level, so
/// recompressed entries stay in the same size class as the originals.
pub const COMPRESSION_LEVEL: u32 = 9;

/// Inflates a zlib stream that should hold `expected_len` bytes.
///
/// Output stops one byte past `expected_len`, so an oversized stream comes back longer than
/// expected without being inflated in full. Checking the length is up to the caller, which knows
/// which entry the data belongs to.
pub fn decompress(compressed: &[u8], expected_len: usize) -> std::io::Result<Vec<u8>> {
    let limit = expected_len as u64 + 1;
    let mut decoder = ZlibDecoder::new(compressed).take(limit);
    // The declared length comes straight from the file; don't trust it with a huge allocation.
    let mut decompressed = Vec::with_capacity(expected_len.min(compressed.len().saturating_mul(64)));
    decoder.read_to_end(&mut decompressed)?;
    trace!(
        compressed_len = compressed.len(),
        decompressed_len = decompressed.len(),
        "Decompressed zlib stream"
    );
    Ok(decompressed)
}

/// Deflates `plain` into a zlib stream at [`COMPRESSION_LEVEL`].
pub fn compress(plain: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(
        Vec::with_capacity(plain.len() / 2 + 16),
        Compression::new(COMPRESSION_LEVEL),
    );
    encoder.write_all(plain)?;
    let compressed = encoder.finish()?;
    trace!(
        plain_len = plain.len(),
        compressed_len = compressed.len(),
        "Compressed payload"
    );
    Ok(compressed)
}
