//! Data description of ledger mutations.

use serde::{Deserialize, Serialize};
use std::fmt;

use tokenvault_common::{Amount, Ratio, Rounding, TokenId};

/// Kind of ledger operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Credit.
    Deposit,
    /// Exact debit.
    Withdraw,
    /// Proportional debit.
    WithdrawPercentage,
    /// Drain one token.
    WithdrawAll,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Deposit => "deposit",
            OperationKind::Withdraw => "withdraw",
            OperationKind::WithdrawPercentage => "withdraw_percentage",
            OperationKind::WithdrawAll => "withdraw_all",
        };
        f.write_str(name)
    }
}

/// One ledger mutation, as read from a scenario or generated by a test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation<A = TokenId> {
    /// Credit `amount` of `token`.
    Deposit { token: A, amount: Amount },
    /// Debit exactly `amount` of `token`.
    Withdraw { token: A, amount: Amount },
    /// Debit a share of the current balance.
    WithdrawPercentage {
        token: A,
        ratio: Ratio,
        #[serde(default)]
        rounding: Rounding,
    },
    /// Debit the whole balance.
    WithdrawAll { token: A },
}

impl<A> Operation<A> {
    /// Token the operation touches.
    pub fn token(&self) -> &A {
        match self {
            Operation::Deposit { token, .. }
            | Operation::Withdraw { token, .. }
            | Operation::WithdrawPercentage { token, .. }
            | Operation::WithdrawAll { token } => token,
        }
    }

    /// Get the operation kind.
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Deposit { .. } => OperationKind::Deposit,
            Operation::Withdraw { .. } => OperationKind::Withdraw,
            Operation::WithdrawPercentage { .. } => OperationKind::WithdrawPercentage,
            Operation::WithdrawAll { .. } => OperationKind::WithdrawAll,
        }
    }

    /// Check if the operation adds to the ledger.
    pub fn is_credit(&self) -> bool {
        matches!(self, Operation::Deposit { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_json_format() {
        let json = r#"[
            {"op": "deposit", "token": "WEGLD-bd4d79", "amount": "1000"},
            {"op": "withdraw_percentage", "token": "WEGLD-bd4d79", "ratio": 30000},
            {"op": "withdraw_all", "token": "WEGLD-bd4d79"}
        ]"#;

        let ops: Vec<Operation> = serde_json::from_str(json).unwrap();

        assert_eq!(ops.len(), 3);
        assert_eq!(
            ops[0],
            Operation::Deposit {
                token: TokenId::new("WEGLD-bd4d79"),
                amount: Amount::from(1000u32),
            }
        );
        assert_eq!(
            ops[1],
            Operation::WithdrawPercentage {
                token: TokenId::new("WEGLD-bd4d79"),
                ratio: Ratio::percent(3),
                rounding: Rounding::Down,
            }
        );
        assert_eq!(ops[2].kind(), OperationKind::WithdrawAll);
    }

    #[test]
    fn test_rejects_malformed_amount() {
        let json = r#"{"op": "withdraw", "token": "MEX-455c57", "amount": "-3"}"#;
        assert!(serde_json::from_str::<Operation>(json).is_err());
    }

    #[test]
    fn test_accessors() {
        let op = Operation::Withdraw {
            token: TokenId::new("MEX-455c57"),
            amount: Amount::from(3u32),
        };

        assert_eq!(op.token().as_str(), "MEX-455c57");
        assert!(!op.is_credit());
        assert_eq!(op.kind().to_string(), "withdraw");
    }
}
