//! Settlement output types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use crate::{Amount, TokenId};

/// One outbound transfer produced by settling a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Payment<A = TokenId> {
    /// Token being transferred.
    pub token: A,
    /// Quantity transferred.
    pub amount: Amount,
}

impl<A> Payment<A> {
    /// Create a new payment.
    pub fn new(token: A, amount: impl Into<Amount>) -> Self {
        Self {
            token,
            amount: amount.into(),
        }
    }
}

impl<A> From<(A, Amount)> for Payment<A> {
    fn from((token, amount): (A, Amount)) -> Self {
        Self { token, amount }
    }
}

impl<A: fmt::Display> fmt::Display for Payment<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.token)
    }
}

/// Sum payments per token.
pub fn totals_by_token<'a, A, I>(payments: I) -> HashMap<A, Amount>
where
    A: Clone + Eq + Hash + 'a,
    I: IntoIterator<Item = &'a Payment<A>>,
{
    let mut totals: HashMap<A, Amount> = HashMap::new();

    for payment in payments {
        *totals.entry(payment.token.clone()).or_default() += &payment.amount;
    }

    totals
}
