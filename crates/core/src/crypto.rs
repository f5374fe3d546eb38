//! Content addressing and account identity
//!
//! Role identifiers, category keys, and store keys are all SHA-256 digests of
//! stable human-readable labels, so they can be referenced before the thing
//! they name first exists on the ledger.

use std::fmt;

use ring::digest;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for crypto operations
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Invalid hex input
    #[error("Invalid hex: {0}")]
    InvalidHex(String),
}

/// Result type for crypto operations
pub type CryptoResult<T> = Result<T, CryptoError>;

/// A SHA-256 digest used as a content-addressed key
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash(pub Vec<u8>);

impl Hash {
    /// Create a new Hash from bytes
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Get the bytes of the hash
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert hash to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Create a hash from a hex string
    pub fn from_hex(hex_str: &str) -> CryptoResult<Self> {
        let bytes =
            hex::decode(hex_str).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Calculate SHA-256 hash of data
pub fn sha256(data: &[u8]) -> Hash {
    let digest = digest::digest(&digest::SHA256, data);
    Hash(digest.as_ref().to_vec())
}

/// Derive a content-addressed key from a stable label
///
/// Used for role identifiers (`"TREASURER_MINT"`), category keys
/// (`"FOOD_BEVERAGE"`), reason codes, and per-store identifiers.
pub fn label_key(label: &str) -> Hash {
    sha256(label.as_bytes())
}

/// A stable ledger account address
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    /// Create an address from its string form
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The null address; never a valid mint or transfer target
    pub fn null() -> Self {
        Self(String::new())
    }

    /// Whether this is the null address
    pub fn is_null(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the string form of the address
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
