//! # Shared Types Crate
//!
//! Ledger identifiers, timestamps, receipts and topic-message records used
//! by every crate in the workspace.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-crate ledger types are defined here.
//! - **Display Forms**: Identifiers print and parse as `shard.realm.num`,
//!   transaction ids as `payer@seconds.nanos`.
//! - **Signed Bodies**: Every type that is covered by a signature exposes a
//!   fixed-width big-endian `to_bytes()`.

pub mod entities;
pub mod errors;
pub mod receipts;

pub use entities::*;
pub use errors::*;
pub use receipts::*;
