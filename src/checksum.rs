//! Content hashing and checksum field parsing

use crate::archive::{CHECKSUM_HEX_LEN, SHA256_ALGORITHM};
use crate::error::FormatError;
use sha2::{Digest, Sha256};

/// Something that can digest entry content.
///
/// The decoder treats "a hasher is configured" as one input of the commit
/// policy, so a decoder built without one can still extract unverified
/// archives.
pub trait ContentHasher {
    /// Algorithm name as it appears in the `Checksum:` namespace
    fn algorithm(&self) -> &str;

    /// Lowercase hex digest of `data`
    fn hex_digest(&self, data: &[u8]) -> String;
}

/// SHA-256, the only algorithm the wire format names
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl ContentHasher for Sha256Hasher {
    fn algorithm(&self) -> &str {
        SHA256_ALGORITHM
    }

    fn hex_digest(&self, data: &[u8]) -> String {
        sha256_hex(data)
    }
}

/// Lowercase hex SHA-256 of `data`
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Parse the value following `Checksum: `.
///
/// Accepts `SHA256:<hex>` or a bare `<hex>`. An empty value yields `None`
/// and is treated as an absent checksum by the caller.
pub fn parse_checksum_value(value: &str) -> Result<Option<String>, FormatError> {
    let value = value.trim();

    let digest = match value.split_once(':') {
        Some((algorithm, digest)) => {
            if !algorithm.trim().eq_ignore_ascii_case(SHA256_ALGORITHM) {
                return Err(FormatError::UnsupportedChecksumAlgorithm {
                    algorithm: algorithm.trim().to_string(),
                });
            }
            digest.trim()
        }
        None => value,
    };

    if digest.is_empty() {
        return Ok(None);
    }

    if digest.len() != CHECKSUM_HEX_LEN || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(FormatError::MalformedChecksum {
            value: digest.to_string(),
        });
    }

    Ok(Some(digest.to_ascii_lowercase()))
}
