use sha2::{Digest, Sha256};

/// Compute SHA-256 of an in-memory byte slice.
pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Encode a raw 32-byte hash as a lowercase hex string (64 chars).
pub fn to_hex(hash: &[u8; 32]) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

/// First 12 hex chars of the SHA-256, used to tag log spans per image.
pub fn short_digest(data: &[u8]) -> String {
    let mut hex = to_hex(&sha256_bytes(data));
    hex.truncate(12);
    hex
}
