//! Core identifier types.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// Prefix of every textual soul.
pub const SOUL_PREFIX: char = 'λ';

/// Number of digest bytes kept in a soul (8 hex characters).
pub const SOUL_BYTES: usize = 4;

/// Prefix of every content identifier.
pub const CID_PREFIX: &str = "sha256:";

/// Content-derived semantic identifier of a canonical expression, e.g. `λ1a2b3c4d`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SoulId(String);

impl SoulId {
    /// Build a soul from a digest, truncated to the project's identifier convention.
    pub fn from_digest(digest: &[u8]) -> Self {
        let take = digest.len().min(SOUL_BYTES);
        Self(format!("{}{}", SOUL_PREFIX, hex::encode(&digest[..take])))
    }

    /// Parse and validate a textual soul.
    pub fn parse(s: &str) -> Result<Self> {
        let hex_part = s
            .strip_prefix(SOUL_PREFIX)
            .ok_or_else(|| Error::Parse(format!("soul {:?} is missing the λ prefix", s)))?;
        let valid = hex_part.len() == SOUL_BYTES * 2
            && hex_part.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        if !valid {
            return Err(Error::Parse(format!(
                "soul {:?} must be λ followed by {} lowercase hex characters",
                s,
                SOUL_BYTES * 2
            )));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SoulId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content identifier: the SHA-256 of stored bytes, `sha256:<64 hex>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cid(String);

impl Cid {
    /// Compute the identifier of `bytes`. Deterministic, no salt.
    pub fn of(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        Self(format!("{}{}", CID_PREFIX, hex::encode(digest)))
    }

    pub fn parse(s: &str) -> Result<Self> {
        let hex_part = s
            .strip_prefix(CID_PREFIX)
            .ok_or_else(|| Error::Parse(format!("cid {:?} is missing the {} prefix", s, CID_PREFIX)))?;
        if hex_part.len() != 64 || hex::decode(hex_part).is_err() {
            return Err(Error::Parse(format!("cid {:?} must carry 64 hex characters", s)));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Check that `bytes` hash to this identifier.
    pub fn verify(&self, bytes: &[u8]) -> Result<()> {
        let actual = Cid::of(bytes);
        if &actual != self {
            return Err(Error::Integrity {
                cid: self.0.clone(),
                actual: actual.0,
            });
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an attestation record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttestationId(pub Uuid);

impl AttestationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AttestationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AttestationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soul_from_digest() {
        let soul = SoulId::from_digest(&[0xde, 0xad, 0xbe, 0xef, 0x01, 0x02]);
        assert_eq!(soul.as_str(), "λdeadbeef");
        assert_eq!(SoulId::parse("λdeadbeef").unwrap(), soul);
    }

    #[test]
    fn test_soul_parse_rejects_bad_input() {
        assert!(SoulId::parse("deadbeef").is_err());
        assert!(SoulId::parse("λdeadbee").is_err());
        assert!(SoulId::parse("λDEADBEEF").is_err());
        assert!(SoulId::parse("λdeadbeefff").is_err());
    }

    #[test]
    fn test_cid_is_deterministic() {
        let a = Cid::of(b"hello");
        let b = Cid::of(b"hello");
        assert_eq!(a, b);
        assert_eq!(
            a.as_str(),
            "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_ne!(a, Cid::of(b"hello!"));
    }

    #[test]
    fn test_cid_verify() {
        let cid = Cid::of(b"payload");
        assert!(cid.verify(b"payload").is_ok());
        let err = cid.verify(b"tampered").unwrap_err();
        assert!(matches!(err, Error::Integrity { .. }));
    }

    #[test]
    fn test_cid_parse() {
        let cid = Cid::of(b"x");
        assert_eq!(Cid::parse(cid.as_str()).unwrap(), cid);
        assert!(Cid::parse("sha256:abc").is_err());
        assert!(Cid::parse("b3:00").is_err());
    }
}
