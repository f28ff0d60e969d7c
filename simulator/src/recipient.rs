//! Simulated transfer destination.

use std::collections::HashMap;
use std::convert::Infallible;

use tracing::debug;

use tokenvault_common::{Amount, Payment, TokenId, WorkId};
use tokenvault_ledger::TransferSink;

/// Receives settled payments and refunds, keeping running totals per token.
#[derive(Debug, Clone, Default)]
pub struct Recipient {
    /// Settled payments received, by token.
    received: HashMap<TokenId, Amount>,
    /// Incoming payments returned to the caller after an abort, by token.
    refunded: HashMap<TokenId, Amount>,
    /// Number of settlement transfers executed.
    transfers: u64,
    /// Number of refunds executed.
    refunds: u64,
}

impl Recipient {
    /// Create a recipient with no history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the payments of an aborted unit of work to the caller.
    pub fn refund(&mut self, work: WorkId, payments: &[Payment]) {
        debug!(work_id = %work, payments = payments.len(), "Refunding incoming payments");
        for payment in payments {
            *self.refunded.entry(payment.token.clone()).or_default() += &payment.amount;
        }
        self.refunds += 1;
    }

    /// Total received for `token`.
    #[allow(dead_code)]
    pub fn received(&self, token: &TokenId) -> Amount {
        self.received.get(token).cloned().unwrap_or_default()
    }

    /// Total refunded for `token`.
    #[allow(dead_code)]
    pub fn refunded(&self, token: &TokenId) -> Amount {
        self.refunded.get(token).cloned().unwrap_or_default()
    }

    /// Number of settlement transfers executed.
    pub fn transfers(&self) -> u64 {
        self.transfers
    }

    /// Number of refunds executed.
    pub fn refunds(&self) -> u64 {
        self.refunds
    }

    /// Received totals sorted by token, for reports.
    pub fn received_totals(&self) -> Vec<Payment> {
        sorted(&self.received)
    }

    /// Refunded totals sorted by token, for reports.
    pub fn refunded_totals(&self) -> Vec<Payment> {
        sorted(&self.refunded)
    }

    /// Fold another recipient's history into this one.
    pub fn merge(&mut self, other: Recipient) {
        for (token, amount) in other.received {
            *self.received.entry(token).or_default() += amount;
        }
        for (token, amount) in other.refunded {
            *self.refunded.entry(token).or_default() += amount;
        }
        self.transfers += other.transfers;
        self.refunds += other.refunds;
    }
}

impl TransferSink for Recipient {
    type Error = Infallible;

    fn transfer(&mut self, work: WorkId, payments: Vec<Payment>) -> Result<(), Self::Error> {
        debug!(work_id = %work, payments = payments.len(), "Transfer received");
        for Payment { token, amount } in payments {
            *self.received.entry(token).or_default() += amount;
        }
        self.transfers += 1;
        Ok(())
    }
}

fn sorted(totals: &HashMap<TokenId, Amount>) -> Vec<Payment> {
    let mut out: Vec<Payment> = totals
        .iter()
        .map(|(token, amount)| Payment::new(token.clone(), amount.clone()))
        .collect();
    out.sort_by(|a, b| a.token.cmp(&b.token));
    out
}
