use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of a byte slice, returning a lowercase hex string.
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// The first `len` hex characters of the SHA-256 of `data`.
///
/// Used for identifiers that must be stable across runs but short enough to
/// embed in generated target names. `len` is clamped to the full digest width.
pub fn short_digest(data: &[u8], len: usize) -> String {
    let mut hex = sha256_bytes(data);
    hex.truncate(len.min(hex.len()));
    hex
}
