//! Content digests
//!
//! A [`Digest`] is the 32-byte SHA-256 hash of a byte sequence and is the
//! identity of every stored blob: digest equality implies byte equality.
//! Path names are hashed with the same primitive so that ref lookups and
//! content lookups share one key type.

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;

/// 32-byte content digest (SHA-256)
///
/// Used as the identity of both blobs and path names. The all-zero digest
/// is reserved: hidden-marker refs point at [`Digest::ZERO`] and no real
/// content is ever stored under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest([u8; 32]);

impl Digest {
    /// The all-zero digest, reserved for hidden-marker refs
    pub const ZERO: Digest = Digest([0u8; 32]);

    /// Compute the digest of a byte sequence
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Digest(hasher.finalize().into())
    }

    /// Create a digest from raw bytes
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Digest(bytes)
    }

    /// Get the raw bytes of this digest
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether this is the reserved all-zero digest
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// First byte of the digest, used as the bucket key in the 256-bucket
    /// content and ref indices
    pub const fn bucket(&self) -> u8 {
        self.0[0]
    }

    /// Short hex prefix for log output
    pub fn short(&self) -> String {
        self.0[..4].iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_equality_implies_byte_equality() {
        let a = Digest::of(b"hello");
        let b = Digest::of(b"hello");
        let c = Digest::of(b"world");
        assert_eq!(a, b, "same bytes must hash to the same digest");
        assert_ne!(a, c, "different bytes must hash differently");
    }

    #[test]
    fn test_digest_known_vector() {
        // SHA-256 of the empty string
        let d = Digest::of(b"");
        assert_eq!(
            d.to_string(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_digest_zero_sentinel() {
        assert!(Digest::ZERO.is_zero());
        assert!(!Digest::of(b"x").is_zero());
    }

    #[test]
    fn test_digest_bucket_is_first_byte() {
        let d = Digest::of(b"bucket test");
        assert_eq!(d.bucket(), d.as_bytes()[0]);
    }

    #[test]
    fn test_digest_roundtrip_through_bytes() {
        let d = Digest::of(b"roundtrip");
        let restored = Digest::from_bytes(*d.as_bytes());
        assert_eq!(d, restored);
    }

    #[test]
    fn test_digest_display_is_64_hex_chars() {
        let s = Digest::of(b"display").to_string();
        assert_eq!(s.len(), 64);
        assert!(s.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_digest_short_prefix() {
        let d = Digest::of(b"short");
        let s = d.short();
        assert_eq!(s.len(), 8);
        assert!(d.to_string().starts_with(&s));
    }

    #[test]
    fn test_digest_serde_roundtrip() {
        let d = Digest::of(b"serde");
        let json = serde_json::to_string(&d).unwrap();
        let restored: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(d, restored);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn digest_is_deterministic(bytes in any::<Vec<u8>>()) {
                prop_assert_eq!(Digest::of(&bytes), Digest::of(&bytes));
            }

            #[test]
            fn distinct_bytes_hash_apart(a in any::<Vec<u8>>(), b in any::<Vec<u8>>()) {
                prop_assume!(a != b);
                prop_assert_ne!(Digest::of(&a), Digest::of(&b));
            }
        }
    }
}
