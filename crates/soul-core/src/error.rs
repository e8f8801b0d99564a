//! Error types for normalization, storage and registry operations.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Stored bytes no longer hash to the key they were stored under.
    #[error("Integrity violation: object {cid} hashes to {actual}")]
    Integrity { cid: String, actual: String },

    /// Two different canonical forms hash to the same soul.
    #[error("Soul collision on {soul}: registered as {existing}, submitted as {cid}")]
    SoulCollision {
        soul: String,
        existing: String,
        cid: String,
    },

    #[error("Unknown object: {0}")]
    UnknownObject(String),

    #[error("Unknown soul: {0}")]
    UnknownSoul(String),

    #[error("Unknown organism: {0}")]
    UnknownOrganism(String),

    #[error("Invalid confidence {0}: must lie in (0, 1]")]
    InvalidConfidence(f64),

    #[error("Self-loop equivalence on {0}")]
    SelfLoop(String),

    #[error("Provisional soul {0}: canonicalization limits reached")]
    ProvisionalSoul(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Returns true for errors that indicate corrupted storage rather than bad input.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Integrity { .. } | Error::SoulCollision { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::UnknownSoul("λdeadbeef".to_string());
        assert_eq!(err.to_string(), "Unknown soul: λdeadbeef");

        let err = Error::InvalidConfidence(1.5);
        assert!(err.to_string().contains("1.5"));
    }

    #[test]
    fn test_integrity_is_fatal() {
        let err = Error::Integrity {
            cid: "sha256:00".to_string(),
            actual: "sha256:11".to_string(),
        };
        assert!(err.is_fatal());
        assert!(!Error::NotFound("x".to_string()).is_fatal());

        let err = Error::SoulCollision {
            soul: "λ00000000".to_string(),
            existing: "sha256:00".to_string(),
            cid: "sha256:11".to_string(),
        };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("sha256:11"));
    }
}
