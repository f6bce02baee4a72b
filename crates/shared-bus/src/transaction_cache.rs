//! # Time-Bounded Transaction Cache
//!
//! Duplicate-transaction rejection for the consensus queue.
//!
//! ## Rules
//!
//! - A transaction id is valid only while its valid-start lies inside the
//!   window `now - MAX_AGE ..= now + MAX_FUTURE_SKEW`
//! - A transaction id seen once is rejected until it ages out
//! - Ids are garbage-collected after the validity window expires, which
//!   bounds memory while still catching every replay inside the window

use shared_types::TransactionId;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Errors from transaction cache operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransactionCacheError {
    /// The transaction id has already been submitted.
    #[error("Transaction {transaction_id} has already been submitted")]
    Duplicate { transaction_id: TransactionId },

    /// The transaction valid-start is too old.
    #[error("Transaction valid start {valid_start} is too old (threshold: {threshold})")]
    Expired { valid_start: u64, threshold: u64 },

    /// The transaction valid-start is in the future.
    #[error("Transaction valid start {valid_start} is in the future (threshold: {threshold})")]
    NotYetValid { valid_start: u64, threshold: u64 },
}

/// Time-bounded cache of recently seen transaction ids.
///
/// - Valid-start window: now - 180s to now + 10s
/// - Id retention: 360s (2x the window)
/// - Garbage collection: every 10s
pub struct TimeBoundedTransactionCache {
    /// Map of transaction id -> valid-start seconds.
    cache: HashMap<TransactionId, u64>,

    /// Retention window in seconds.
    validity_window_secs: u64,

    /// Last garbage collection timestamp.
    last_gc: u64,

    /// Garbage collection interval in seconds.
    gc_interval_secs: u64,
}

impl TimeBoundedTransactionCache {
    /// Default retention: 2x the 180s valid-start window.
    pub const DEFAULT_VALIDITY_WINDOW: u64 = 360;

    /// Default garbage collection interval.
    pub const DEFAULT_GC_INTERVAL: u64 = 10;

    /// Maximum age of a valid-start.
    pub const MAX_AGE: u64 = 180;

    /// Maximum future skew of a valid-start.
    pub const MAX_FUTURE_SKEW: u64 = 10;

    /// Create a new cache with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Self::DEFAULT_VALIDITY_WINDOW, Self::DEFAULT_GC_INTERVAL)
    }

    /// Create a cache with custom settings.
    #[must_use]
    pub fn with_config(validity_window_secs: u64, gc_interval_secs: u64) -> Self {
        Self {
            cache: HashMap::new(),
            validity_window_secs,
            last_gc: Self::current_timestamp(),
            gc_interval_secs,
        }
    }

    /// Validate the valid-start and record the id atomically.
    ///
    /// The window check runs first so that every id that reaches the
    /// duplicate check is one the cache is guaranteed to still retain.
    ///
    /// # Errors
    ///
    /// - `TransactionCacheError::Expired` - valid-start older than 180s
    /// - `TransactionCacheError::NotYetValid` - valid-start more than 10s ahead
    /// - `TransactionCacheError::Duplicate` - id already seen
    pub fn validate_and_add(
        &mut self,
        transaction_id: TransactionId,
    ) -> Result<(), TransactionCacheError> {
        let now = Self::current_timestamp();
        let valid_start = transaction_id.valid_start.seconds;

        let min_valid = now.saturating_sub(Self::MAX_AGE);
        let max_valid = now.saturating_add(Self::MAX_FUTURE_SKEW);

        if valid_start < min_valid {
            return Err(TransactionCacheError::Expired {
                valid_start,
                threshold: min_valid,
            });
        }

        if valid_start > max_valid {
            return Err(TransactionCacheError::NotYetValid {
                valid_start,
                threshold: max_valid,
            });
        }

        if now.saturating_sub(self.last_gc) > self.gc_interval_secs {
            self.garbage_collect(now);
            self.last_gc = now;
        }

        if self.cache.contains_key(&transaction_id) {
            return Err(TransactionCacheError::Duplicate { transaction_id });
        }

        self.cache.insert(transaction_id, valid_start);

        Ok(())
    }

    /// Check if an id exists without adding it.
    #[must_use]
    pub fn contains(&self, transaction_id: &TransactionId) -> bool {
        self.cache.contains_key(transaction_id)
    }

    /// Get the number of cached ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    fn garbage_collect(&mut self, now: u64) {
        let expiry_threshold = now.saturating_sub(self.validity_window_secs);
        self.cache.retain(|_, &mut ts| ts > expiry_threshold);
    }

    fn current_timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

impl Default for TimeBoundedTransactionCache {
    fn default() -> Self {
        Self::new()
    }
}
