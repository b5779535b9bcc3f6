//! Content hashing.

use sha2::{Digest, Sha256};

use lockbox_common::types::DIGEST_LENGTH;
use lockbox_common::ContentHash;

/// Compute the content hash of a payload: SHA-256 over `payload ‖ description`.
///
/// Independent of upload time, so resubmitting identical content always
/// yields the same hash.
pub fn content_hash(payload: &[u8], description: &str) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    hasher.update(description.as_bytes());

    let mut digest = [0u8; DIGEST_LENGTH];
    digest.copy_from_slice(&hasher.finalize());
    ContentHash::from_digest(&digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        // SHA-256("abc"), split across payload and description
        let hash = content_hash(b"ab", "c");
        assert_eq!(hash.as_str(), "ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0");
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(content_hash(b"payload", "desc"), content_hash(b"payload", "desc"));
    }

    #[test]
    fn test_inputs_change_hash() {
        let base = content_hash(b"payload", "desc");
        assert_ne!(base, content_hash(b"payload!", "desc"));
        assert_ne!(base, content_hash(b"payload", "desc!"));
    }
}
