//! Content identity helpers for typdex (made by FontLab https://www.fontlab.com/)

use sha2::{Digest, Sha256};

/// Digest a file's exact byte content.
///
/// Returns the lowercase hex SHA-256 digest together with the byte length.
/// The digest drives both change detection and cross-file deduplication, so
/// it must depend on nothing but the bytes themselves.
pub fn identify(bytes: &[u8]) -> (String, u64) {
    let digest = hex::encode(Sha256::digest(bytes));
    (digest, bytes.len() as u64)
}

/// Derive the stable public key a file is served under.
///
/// The key is a short hash prefix joined to the sanitized filename, which
/// keeps it collision-free per (content, filename) pair and safe to embed in
/// URLs and paths without exposing where the file really lives.
pub fn url_key_for(content_hash: &str, filename: &str) -> String {
    let prefix: String = content_hash.chars().take(12).collect();
    format!("{prefix}-{}", sanitize_filename(filename))
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
