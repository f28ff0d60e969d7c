//! Error types for shared value parsing.

use thiserror::Error;

/// Errors raised while constructing shared value types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// Amount is not a non-negative integer.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Token identifier is malformed.
    #[error("Invalid token identifier: {0}")]
    InvalidTokenId(String),

    /// Ratio is negative, too large or too precise.
    #[error("Invalid ratio: {0}")]
    InvalidRatio(String),
}

impl CommonError {
    /// Get error code for reports.
    pub fn error_code(&self) -> &'static str {
        match self {
            CommonError::InvalidAmount(_) => "INVALID_AMOUNT",
            CommonError::InvalidTokenId(_) => "INVALID_TOKEN_ID",
            CommonError::InvalidRatio(_) => "INVALID_RATIO",
        }
    }
}
