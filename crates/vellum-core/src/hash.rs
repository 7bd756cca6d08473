//! Content hashing using SHA-256.
//!
//! One hash function serves all three object namespaces (contents, blobs,
//! commits); the namespaces are kept apart by the store's partition
//! directories, never by the hash itself.

use std::fmt::Write;

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of arbitrary bytes, returned as a lowercase
/// hex string.
pub fn hash_bytes(data: impl AsRef<[u8]>) -> String {
    let digest = Sha256::digest(data.as_ref());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        // Writing to a String cannot fail.
        let _ = write!(out, "{byte:02x}");
    }
    out
}
