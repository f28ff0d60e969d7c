//! Per-call audit trail of ledger movements.

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use tokenvault_common::{Amount, TokenId};

use crate::error::LedgerResult;
use crate::ledger::TokenLedger;
use crate::operation::Operation;

/// Type of journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// Tokens entered the ledger.
    Credit,
    /// Tokens left the ledger.
    Debit,
}

/// A single movement recorded against a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry<A = TokenId> {
    /// Position in the journal, starting at zero.
    pub sequence: u64,
    /// Token moved.
    pub token: A,
    /// Entry type (credit or debit).
    pub entry_type: EntryType,
    /// Amount moved.
    pub amount: Amount,
    /// Ledger balance of `token` after the movement.
    pub balance_after: Amount,
}

/// Ordered record of every non-zero movement made through it.
///
/// The journal does not own the ledger; it wraps calls to
/// [`TokenLedger::apply`] so an aborted or settled call can be explained
/// afterwards. Failed operations are not recorded.
#[derive(Debug, Clone)]
pub struct Journal<A = TokenId> {
    entries: Vec<JournalEntry<A>>,
}

impl<A> Journal<A> {
    /// Create an empty journal.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Recorded entries, oldest first.
    pub fn entries(&self) -> &[JournalEntry<A>] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<A> Default for Journal<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Journal<A>
where
    A: Clone + Eq + Hash + fmt::Debug,
{
    /// Start a journal with one credit per balance the ledger already holds.
    pub fn opening(ledger: &TokenLedger<A>) -> Self {
        let mut journal = Self::new();
        for (token, amount) in ledger.iter() {
            journal.push(token.clone(), EntryType::Credit, amount.clone(), amount.clone());
        }
        journal
    }

    /// Apply `op` to `ledger` and record the movement.
    pub fn record(&mut self, ledger: &mut TokenLedger<A>, op: &Operation<A>) -> LedgerResult<Amount, A> {
        let moved = ledger.apply(op)?;

        if !moved.is_zero() {
            let entry_type = if op.is_credit() {
                EntryType::Credit
            } else {
                EntryType::Debit
            };
            let token = op.token().clone();
            let balance_after = ledger.balance_of(&token);
            self.push(token, entry_type, moved.clone(), balance_after);
        }

        Ok(moved)
    }

    /// Total credited for `token`.
    pub fn total_credits(&self, token: &A) -> Amount {
        self.total(token, EntryType::Credit)
    }

    /// Total debited for `token`.
    pub fn total_debits(&self, token: &A) -> Amount {
        self.total(token, EntryType::Debit)
    }

    /// Verify credits minus debits equals the ledger balance for every token
    /// the journal or the ledger knows about.
    pub fn is_reconciled(&self, ledger: &TokenLedger<A>) -> bool {
        let tokens: HashSet<&A> = self
            .entries
            .iter()
            .map(|e| &e.token)
            .chain(ledger.tokens())
            .collect();

        tokens.into_iter().all(|token| {
            self.total_credits(token)
                .checked_sub(&self.total_debits(token))
                .is_some_and(|net| net == ledger.balance_of(token))
        })
    }

    fn total(&self, token: &A, entry_type: EntryType) -> Amount {
        self.entries
            .iter()
            .filter(|e| e.entry_type == entry_type && &e.token == token)
            .map(|e| &e.amount)
            .sum()
    }

    fn push(&mut self, token: A, entry_type: EntryType, amount: Amount, balance_after: Amount) {
        let sequence = self.entries.len() as u64;
        self.entries.push(JournalEntry {
            sequence,
            token,
            entry_type,
            amount,
            balance_after,
        });
    }
}
