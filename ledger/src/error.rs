//! Ledger error types.

use thiserror::Error;
use tokenvault_common::{Amount, TokenId};

/// Errors that can occur while mutating a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError<A = TokenId> {
    /// Withdrawal asked for more than the ledger holds.
    #[error("Insufficient balance for {asset}: requested {requested}, available {available}")]
    InsufficientBalance {
        asset: A,
        requested: Amount,
        available: Amount,
    },
}

impl<A> LedgerError<A> {
    /// Get error code for reports.
    pub fn error_code(&self) -> &'static str {
        match self {
            LedgerError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
        }
    }

    /// Asset the error refers to.
    pub fn asset(&self) -> &A {
        match self {
            LedgerError::InsufficientBalance { asset, .. } => asset,
        }
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T, A = TokenId> = Result<T, LedgerError<A>>;
