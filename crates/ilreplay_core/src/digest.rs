//! Fingerprints of reconstructed IR.
//!
//! Uses BLAKE3 over the postcard encoding, so two replays that rebuilt the
//! same operation sequence produce the same digest on every platform.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A BLAKE3 digest (256 bits / 32 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digest([u8; 32]);

impl Digest {
    /// The number of bytes in a digest
    pub const LEN: usize = 32;

    /// Compute BLAKE3 digest of data
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Digest of the canonical encoding of a value
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be encoded
    pub fn of<T: Serialize>(value: &T) -> Result<Self, DigestError> {
        let bytes = postcard::to_allocvec(value).map_err(|_| DigestError::Encoding)?;
        Ok(Self::compute(&bytes))
    }

    /// Create from bytes
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get as bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short form for summaries
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }

    /// Parse from hex string
    ///
    /// # Errors
    ///
    /// Returns error if hex is invalid or not 32 bytes
    pub fn from_hex(hex: &str) -> Result<Self, DigestError> {
        let bytes = hex::decode(hex).map_err(|_| DigestError::InvalidHex)?;
        if bytes.len() != Self::LEN {
            return Err(DigestError::InvalidLength(bytes.len()));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Digest-related errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DigestError {
    /// Invalid hex encoding
    #[error("Invalid hex encoding")]
    InvalidHex,
    /// Invalid length (not 32 bytes)
    #[error("Invalid digest length: {0} (expected 32)")]
    InvalidLength(usize),
    /// Value could not be canonically encoded
    #[error("Value could not be encoded")]
    Encoding,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Serialize)]
    struct Sample {
        name: String,
        ops: Vec<u32>,
    }

    #[test]
    fn test_compute_deterministic() {
        let d1 = Digest::compute(b"B2 S16 V15 V11 V13");
        let d2 = Digest::compute(b"B2 S16 V15 V11 V13");
        assert_eq!(d1, d2);
        assert_ne!(d1, Digest::compute(b"B2 S16 V15 V13 V11"));
    }

    #[test]
    fn test_of_value() {
        let a = Sample {
            name: "fib".to_string(),
            ops: vec![1, 2, 3],
        };
        let b = Sample {
            name: "fib".to_string(),
            ops: vec![1, 2, 3],
        };
        assert_eq!(Digest::of(&a).unwrap(), Digest::of(&b).unwrap());
    }

    #[test]
    fn test_hex_roundtrip() {
        let d = Digest::compute(b"replay");
        let parsed = Digest::from_hex(&d.to_hex()).unwrap();
        assert_eq!(d, parsed);
        assert_eq!(d.short().len(), 12);
    }

    #[test]
    fn test_from_hex_errors() {
        assert_eq!(Digest::from_hex("zz"), Err(DigestError::InvalidHex));
        assert_eq!(Digest::from_hex("abcd"), Err(DigestError::InvalidLength(2)));
    }

    #[test]
    fn test_serde_json() {
        let d = Digest::compute(b"x");
        let json = serde_json::to_string(&d).unwrap();
        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(d, back);
    }

    proptest! {
        #[test]
        fn prop_distinct_inputs_distinct_digests(a: Vec<u8>, b: Vec<u8>) {
            prop_assume!(a != b);
            prop_assert_ne!(Digest::compute(&a), Digest::compute(&b));
        }
    }
}
