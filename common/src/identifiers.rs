//! Identifier types for tokens and units of work.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::CommonError;

/// Ticker of the chain's native token.
pub const NATIVE_TICKER: &str = "EGLD";

/// Length of the random hex suffix on issued token identifiers.
const SUFFIX_LEN: usize = 6;

/// Identifier of a fungible token type.
///
/// Either the native token (`EGLD`) or an issued token in the form
/// `TICKER-abcdef`, where the ticker is 3 to 10 upper-case alphanumerics and
/// the suffix is six lower-case hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(String);

impl TokenId {
    /// Create a token identifier without validating it.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create a token identifier, rejecting malformed input.
    pub fn parse(id: impl Into<String>) -> Result<Self, CommonError> {
        let token = Self(id.into());
        if token.is_valid() {
            Ok(token)
        } else {
            Err(CommonError::InvalidTokenId(token.0))
        }
    }

    /// The native token.
    pub fn native() -> Self {
        Self(NATIVE_TICKER.to_string())
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if this is the native token.
    pub fn is_native(&self) -> bool {
        self.0 == NATIVE_TICKER
    }

    /// Ticker part of the identifier (everything before the dash).
    pub fn ticker(&self) -> &str {
        self.0.split_once('-').map_or(self.0.as_str(), |(ticker, _)| ticker)
    }

    /// Validate the identifier format.
    pub fn is_valid(&self) -> bool {
        if self.is_native() {
            return true;
        }

        let Some((ticker, suffix)) = self.0.split_once('-') else {
            return false;
        };

        (3..=10).contains(&ticker.len())
            && ticker
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
            && suffix.len() == SUFFIX_LEN
            && suffix
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TokenId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TokenId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier for one unit of work (a single call the ledger lives in).
/// Uses UUID v7 so ids sort by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkId(Uuid);

impl WorkId {
    /// Create a new unit-of-work ID.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for WorkId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_id_validation() {
        assert!(TokenId::new("WEGLD-bd4d79").is_valid());
        assert!(TokenId::new("USDC-c76f1f").is_valid());
        assert!(TokenId::native().is_valid());

        assert!(!TokenId::new("").is_valid());
        assert!(!TokenId::new("WEGLD").is_valid());
        assert!(!TokenId::new("we-bd4d79").is_valid());
        assert!(!TokenId::new("WEGLD-BD4D79").is_valid());
        assert!(!TokenId::new("WEGLD-bd4d7").is_valid());
        assert!(!TokenId::new("TOOLONGTICKER-bd4d79").is_valid());
    }

    #[test]
    fn test_token_id_parse() {
        assert!(TokenId::parse("MEX-455c57").is_ok());

        let err = TokenId::parse("mex").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TOKEN_ID");
    }

    #[test]
    fn test_ticker() {
        assert_eq!(TokenId::new("WEGLD-bd4d79").ticker(), "WEGLD");
        assert_eq!(TokenId::native().ticker(), "EGLD");
    }

    #[test]
    fn test_token_id_serializes_as_string() {
        let token = TokenId::new("WEGLD-bd4d79");
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, "\"WEGLD-bd4d79\"");
    }

    #[test]
    fn test_work_id_roundtrip() {
        let id = WorkId::new();
        let parsed = WorkId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }
}
