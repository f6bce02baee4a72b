//! # Shared Bus - Topic Message Fan-Out
//!
//! In-process delivery of consensus-ordered topic messages to subscribers,
//! plus the duplicate-transaction cache that guards the consensus queue.
//!
//! ## Delivery Pattern
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │  Consensus   │                    │  Subscriber  │
//! │    queue     │    publish()       │   (filter)   │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Topic Bus   │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```
//!
//! ## Guarantees
//!
//! - Messages reach each subscriber in publish order
//! - A subscriber that falls behind the channel capacity is told how many
//!   messages it lost (`BusDelivery::Lagged`) instead of blocking the publisher

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;
pub mod transaction_cache;

// Re-export main types
pub use events::TopicFilter;
pub use publisher::{InMemoryTopicBus, TopicPublisher};
pub use subscriber::{BusDelivery, Subscription};
pub use transaction_cache::{TimeBoundedTransactionCache, TransactionCacheError};

/// Maximum messages to buffer per subscriber before lag is reported.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
