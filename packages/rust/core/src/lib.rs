//! Knowledge exchange orchestration for Parentheses.
//!
//! This crate ties validation, per-domain pathways and the external ledger
//! into the submit / query / reward workflows.

mod cycle;
pub mod exchange;
pub mod ledger;

pub use exchange::{CycleReport, ExchangeOrchestrator};
pub use ledger::{InMemoryLedger, Ledger, Payout, with_timeout};
