//! # Error Types
//!
//! Defines error types shared across crates.

use thiserror::Error;

/// Failure to parse a `shard.realm.num` identifier.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdParseError {
    /// Not three dot-separated unsigned integers.
    #[error("Malformed entity id '{0}': expected shard.realm.num")]
    Malformed(String),
}
