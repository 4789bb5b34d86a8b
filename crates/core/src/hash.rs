//! Hashing utilities for WKD, avatars and style IDs.

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Hex-encoded MD5.
pub fn md5_hex(data: &[u8]) -> String {
    let mut h = Md5::new();
    h.update(data);
    hex::encode(h.finalize())
}

/// Hex-encoded SHA-256.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(data);
    hex::encode(h.finalize())
}

/// The Web Key Directory local-part hash: `zbase32(sha1(lowercase(local)))`.
pub fn wkd_hash(local: &str) -> String {
    wkd_hash_exact(&local.to_lowercase())
}

/// WKD hash without case folding, for the advanced-method URL which hashes
/// the local part as published.
pub fn wkd_hash_exact(local: &str) -> String {
    let mut h = Sha1::new();
    h.update(local.as_bytes());
    zbase32::encode_full_bytes(&h.finalize())
}

/// Split `local@domain` and hash the local part for WKD lookup.
///
/// Returns `(hash, domain)`, both lowercased.
pub fn wkd_hash_address(address: &str) -> (String, String) {
    let address = address.to_lowercase();
    let (local, domain) = address.split_once('@').unwrap_or((address.as_str(), ""));
    (wkd_hash(local), domain.to_string())
}

/// True when the string is a pure hex token (candidate fingerprint).
pub fn is_fingerprint(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}
