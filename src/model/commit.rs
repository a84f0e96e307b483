use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A commit identifier, held as the 20 raw bytes of a SHA-1 hash.
///
/// Ordering is byte-wise, which matches the lexicographic order of the
/// lowercase hex form.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct CommitId([u8; 20]);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommitIdError {
    #[error("commit hash must be {expected} characters, got {got}")]
    InvalidLength { got: usize, expected: usize },
    #[error("commit hash is not valid hex: {0}")]
    InvalidHex(String),
    #[error("raw commit id must be {expected} bytes, got {got}")]
    InvalidByteLength { got: usize, expected: usize },
}

impl CommitId {
    pub const HEX_LEN: usize = 40;

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CommitIdError> {
        let raw: [u8; 20] = bytes.try_into().map_err(|_| CommitIdError::InvalidByteLength {
            got: bytes.len(),
            expected: 20,
        })?;
        Ok(Self(raw))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First eight hex characters, for log lines
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(8);
        hex
    }
}

impl FromStr for CommitId {
    type Err = CommitIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != Self::HEX_LEN {
            return Err(CommitIdError::InvalidLength { got: s.len(), expected: Self::HEX_LEN });
        }
        let mut raw = [0u8; 20];
        hex::decode_to_slice(s, &mut raw).map_err(|e| CommitIdError::InvalidHex(e.to_string()))?;
        Ok(Self(raw))
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommitId({})", self.to_hex())
    }
}

impl Serialize for CommitId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for CommitId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip() {
        let hex = "0123456789abcdef0123456789abcdef01234567";
        let id: CommitId = hex.parse().unwrap();
        assert_eq!(id.to_hex(), hex);
        assert_eq!(id.short(), "01234567");
    }

    #[test]
    fn test_rejects_wrong_length() {
        let err = "abc".parse::<CommitId>().unwrap_err();
        assert_eq!(err, CommitIdError::InvalidLength { got: 3, expected: 40 });
    }

    #[test]
    fn test_rejects_non_hex() {
        let bad = "z".repeat(40);
        assert!(matches!(bad.parse::<CommitId>(), Err(CommitIdError::InvalidHex(_))));
    }

    #[test]
    fn test_ordering_matches_hex_order() {
        let a: CommitId = format!("{:040}", 9).parse().unwrap();
        let b: CommitId = format!("{:040}", 10).parse().unwrap();
        assert!(a < b);
        assert!(a.to_hex() < b.to_hex());
    }

    #[test]
    fn test_serde_as_hex_string() {
        let id: CommitId = "ff".repeat(20).parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", "ff".repeat(20)));
        let back: CommitId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
