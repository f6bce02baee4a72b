//! # Adapters
//!
//! - `simulated`: in-process ledger implementing `LedgerClient`
//! - `delivery`: subscription tasks turning network feeds into delivered messages

pub mod delivery;
pub mod simulated;
