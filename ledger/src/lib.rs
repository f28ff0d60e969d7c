//! tokenvault Ledger
//!
//! Transient multi-token ledger for a single unit of work: credit the
//! payments a call receives, move balances while it runs, then settle what is
//! left as an ordered list of outbound payments.
//!
//! # Example
//!
//! ```rust
//! use tokenvault_common::{Payment, Ratio, TokenId};
//! use tokenvault_ledger::TokenLedger;
//!
//! let wegld = TokenId::new("WEGLD-bd4d79");
//! let mut ledger: TokenLedger = TokenLedger::from_batch(vec![Payment::new(wegld.clone(), 1_000u64)]);
//!
//! let fee = ledger.withdraw_percentage(&wegld, Ratio::from_bps(30))?;
//! assert_eq!(fee.to_string(), "3");
//!
//! let out = ledger.settle_all();
//! assert_eq!(out, vec![Payment::new(wegld, 997u64)]);
//! # Ok::<(), tokenvault_ledger::LedgerError>(())
//! ```

pub mod error;
pub mod guard;
pub mod journal;
pub mod ledger;
pub mod operation;

pub use error::{LedgerError, LedgerResult};
pub use guard::{SettlementError, SettlementGuard, TransferSink};
pub use journal::{EntryType, Journal, JournalEntry};
pub use ledger::TokenLedger;
pub use operation::{Operation, OperationKind};
