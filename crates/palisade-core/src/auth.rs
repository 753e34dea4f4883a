//! Credential hashing for profile-level authorization.
//!
//! Profiles that declare an authorization token store only its SHA-256
//! digest. Callers supply the plaintext credential per call; the gateway
//! hashes it and compares against the stored digest.

use sha2::{Digest, Sha256};

/// Hashes a credential using SHA-256.
/// Returns the hex-encoded digest suitable for storage in a profile.
#[must_use]
pub fn hash_credential(credential: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(credential.as_bytes());
    hex::encode(hasher.finalize())
}

/// Checks a supplied plaintext credential against a stored digest.
/// A missing credential never matches.
#[must_use]
pub fn credential_matches(expected_digest: &str, supplied: Option<&str>) -> bool {
    match supplied {
        Some(credential) => hash_credential(credential) == expected_digest,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_credential() {
        let digest = hash_credential("letmein");

        // SHA-256 always produces 64 hex characters
        assert_eq!(digest.len(), 64);

        // Same credential should produce same digest
        assert_eq!(digest, hash_credential("letmein"));
    }

    #[test]
    fn test_hash_credential_different_inputs() {
        assert_ne!(hash_credential("letmein"), hash_credential("letmeout"));
    }

    #[test]
    fn test_credential_matches() {
        let digest = hash_credential("letmein");

        assert!(credential_matches(&digest, Some("letmein")));
        assert!(!credential_matches(&digest, Some("wrong")));
        assert!(!credential_matches(&digest, None));
    }
}
