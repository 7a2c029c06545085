// gatewarden-core/src/core/hashing.rs
// ============================================================================
// Module: Hashing
// Description: SHA-256 digesting over canonical byte encodings (C1).
// Purpose: Give every artifact and context payload a deterministic,
//          collision-resistant, lowercase-hex identity.
// Dependencies: sha2::{Digest, Sha256}, crate::core::canon
// ============================================================================

//! ## Overview
//! `HashContext(empty)` returns `SHA256("{}")` — this falls out naturally
//! from `canon::Value::Object` rendering an empty map as the two bytes
//! `{}`, so no special case is needed here.

use serde::Serialize;
use sha2::Digest as _;
use sha2::Sha256;

use crate::core::canon::CanonError;
use crate::core::canon::canonical_bytes;

/// Digest algorithms this crate can compute.
///
/// # Invariants
/// - Currently a singleton enum; kept as an enum (rather than a bare
///   constant) so a future algorithm can be added without breaking the
///   public API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// SHA-256, the only supported algorithm.
    Sha256,
}

/// The algorithm used when a caller does not specify one.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

/// A computed digest, rendered as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashDigest {
    algorithm: HashAlgorithm,
    hex: String,
}

impl HashDigest {
    /// Computes a digest of `bytes` under `algorithm`.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm, bytes: &[u8]) -> Self {
        let hex = match algorithm {
            HashAlgorithm::Sha256 => {
                let digest = Sha256::digest(bytes);
                hex_lower(&digest)
            }
        };
        Self { algorithm, hex }
    }

    /// The algorithm that produced this digest.
    #[must_use]
    pub const fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// The digest rendered as lowercase hex.
    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.hex
    }
}

impl std::fmt::Display for HashDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.hex)
    }
}

fn hex_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        use std::fmt::Write as _;
        // Infallible: writing to a String never fails.
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Errors raised while hashing a canonical payload.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// The value could not be canonicalized (e.g. a non-finite float).
    #[error("canonicalization failed: {0}")]
    Canonicalization(#[from] CanonError),
    /// The canonical byte encoding exceeded a caller-supplied size limit.
    #[error("canonical payload of {actual} bytes exceeds limit of {limit} bytes")]
    SizeLimitExceeded {
        /// The configured maximum.
        limit: usize,
        /// The actual encoded size.
        actual: usize,
    },
}

/// Renders `value` to canonical bytes.
pub fn canonical_json_bytes<T>(value: &T) -> Result<Vec<u8>, HashError>
where
    T: Serialize,
{
    Ok(canonical_bytes(value)?)
}

/// Hashes raw bytes directly (no canonicalization).
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> HashDigest {
    HashDigest::new(DEFAULT_HASH_ALGORITHM, bytes)
}

/// Canonicalizes then hashes `value`.
pub fn hash_canonical_json<T>(value: &T) -> Result<HashDigest, HashError>
where
    T: Serialize,
{
    let bytes = canonical_json_bytes(value)?;
    Ok(hash_bytes(&bytes))
}

/// Canonicalizes then hashes `value`, rejecting payloads larger than
/// `limit` bytes before digesting them.
pub fn hash_canonical_json_with_limit<T>(value: &T, limit: usize) -> Result<HashDigest, HashError>
where
    T: Serialize,
{
    let bytes = canonical_json_bytes(value)?;
    if bytes.len() > limit {
        return Err(HashError::SizeLimitExceeded {
            limit,
            actual: bytes.len(),
        });
    }
    Ok(hash_bytes(&bytes))
}
