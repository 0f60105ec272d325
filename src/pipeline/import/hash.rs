use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of a string.
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// First `len` hex characters of [`content_hash`].
pub fn short_hash(text: &str, len: usize) -> String {
    let mut hash = content_hash(text);
    hash.truncate(len);
    hash
}
