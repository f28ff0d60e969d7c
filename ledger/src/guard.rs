//! Scope guard that settles a ledger before it can be lost.
//!
//! A ledger dropped with balances still inside silently forgets them. The
//! [`SettlementGuard`] owns the ledger for the duration of a unit of work and
//! guarantees one of two endings:
//!
//! - [`SettlementGuard::finish`] hands the settlement list to the sink; if the
//!   sink refuses, the ledger comes back inside [`SettlementError`];
//! - [`SettlementGuard::discard`] gives the ledger back to a caller that
//!   accounts for the balances elsewhere (e.g. a reverted call).
//!
//! If neither happens (early return, `?`, panic), `Drop` settles into the sink.

use std::convert::Infallible;
use std::error::Error as StdError;
use std::fmt;
use std::hash::Hash;
use std::mem;
use std::ops::{Deref, DerefMut};

use tracing::{debug, error, info, instrument, warn};

use tokenvault_common::{Payment, TokenId, WorkId};

use crate::ledger::TokenLedger;

/// Destination for settled payments: whatever actually moves tokens out.
pub trait TransferSink<A = TokenId> {
    /// Error returned when a transfer cannot be executed.
    type Error: StdError;

    /// Execute the outbound payments of one unit of work, in order.
    fn transfer(&mut self, work: WorkId, payments: Vec<Payment<A>>) -> Result<(), Self::Error>;
}

impl<A> TransferSink<A> for Vec<Payment<A>> {
    type Error = Infallible;

    fn transfer(&mut self, _work: WorkId, payments: Vec<Payment<A>>) -> Result<(), Self::Error> {
        self.extend(payments);
        Ok(())
    }
}

impl<A, S> TransferSink<A> for &mut S
where
    S: TransferSink<A> + ?Sized,
{
    type Error = S::Error;

    fn transfer(&mut self, work: WorkId, payments: Vec<Payment<A>>) -> Result<(), Self::Error> {
        (**self).transfer(work, payments)
    }
}

/// Sink failure from [`SettlementGuard::finish`].
///
/// Nothing left the ledger; `ledger` holds every balance the guard owned.
#[derive(Debug, thiserror::Error)]
#[error("Settlement of {work} failed: {source}")]
pub struct SettlementError<A, E> {
    /// Unit of work that failed to settle.
    pub work: WorkId,
    /// The ledger, untouched by the failed transfer.
    pub ledger: TokenLedger<A>,
    /// Error returned by the sink.
    pub source: E,
}

/// Owns a ledger for one unit of work and settles it on every exit path.
pub struct SettlementGuard<A, S>
where
    A: Clone + Eq + Hash + fmt::Debug,
    S: TransferSink<A>,
{
    work: WorkId,
    ledger: TokenLedger<A>,
    sink: S,
    resolved: bool,
}

impl<A, S> SettlementGuard<A, S>
where
    A: Clone + Eq + Hash + fmt::Debug,
    S: TransferSink<A>,
{
    /// Take ownership of `ledger` for unit of work `work`.
    pub fn new(work: WorkId, ledger: TokenLedger<A>, sink: S) -> Self {
        debug!(work_id = %work, tokens = ledger.len(), "Settlement guard armed");
        Self {
            work,
            ledger,
            sink,
            resolved: false,
        }
    }

    /// Unit of work this guard belongs to.
    pub fn work_id(&self) -> WorkId {
        self.work
    }

    /// Settle the ledger into the sink.
    #[instrument(skip(self), fields(work_id = %self.work))]
    pub fn finish(mut self) -> Result<(), SettlementError<A, S::Error>> {
        self.resolved = true;
        let payments = self.ledger.settle_all();

        if payments.is_empty() {
            debug!("Nothing to settle");
            return Ok(());
        }

        info!(payments = payments.len(), "Settling ledger");
        match self.sink.transfer(self.work, payments) {
            Ok(()) => {
                self.ledger = TokenLedger::new();
                Ok(())
            }
            Err(source) => {
                warn!(error = %source, "Sink rejected settlement, returning ledger");
                Err(SettlementError {
                    work: self.work,
                    ledger: mem::take(&mut self.ledger),
                    source,
                })
            }
        }
    }

    /// Give the ledger back without transferring anything.
    pub fn discard(mut self) -> TokenLedger<A> {
        self.resolved = true;
        info!(work_id = %self.work, tokens = self.ledger.len(), "Ledger discarded by caller");
        mem::take(&mut self.ledger)
    }
}

impl<A, S> Deref for SettlementGuard<A, S>
where
    A: Clone + Eq + Hash + fmt::Debug,
    S: TransferSink<A>,
{
    type Target = TokenLedger<A>;

    fn deref(&self) -> &Self::Target {
        &self.ledger
    }
}

impl<A, S> DerefMut for SettlementGuard<A, S>
where
    A: Clone + Eq + Hash + fmt::Debug,
    S: TransferSink<A>,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.ledger
    }
}

impl<A, S> Drop for SettlementGuard<A, S>
where
    A: Clone + Eq + Hash + fmt::Debug,
    S: TransferSink<A>,
{
    fn drop(&mut self) {
        if self.resolved {
            return;
        }

        let payments = mem::take(&mut self.ledger).into_settlement();
        if payments.is_empty() {
            return;
        }

        warn!(
            work_id = %self.work,
            payments = payments.len(),
            "Ledger left scope unsettled, settling on drop"
        );

        if let Err(e) = self.sink.transfer(self.work, payments) {
            error!(work_id = %self.work, error = %e, "Settlement on drop failed");
        }
    }
}
