//! tokenvault Common Types
//!
//! Value types shared by the ledger and its callers: token identifiers,
//! arbitrary-precision amounts, fixed-point ratios and settlement payments.

pub mod identifiers;
pub mod monetary;
pub mod settlement;
pub mod error;

pub use identifiers::*;
pub use monetary::*;
pub use settlement::*;
pub use error::*;
