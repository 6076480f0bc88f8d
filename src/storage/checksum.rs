//! CRC32 checksums for log frames
//!
//! Every frame carries a CRC32 (IEEE) over all of its preceding bytes, and
//! every commit header carries one over its body length. A mismatch is
//! corruption; it is never skipped.

use crc32fast::Hasher;

/// Computes a CRC32 checksum over the provided data.
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Verifies that the computed checksum matches the expected checksum.
pub fn verify_checksum(data: &[u8], expected: u32) -> bool {
    compute_checksum(data) == expected
}
