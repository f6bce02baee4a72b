//! # Topic Lifecycle
//!
//! Drives a consensus topic through its whole life: create it, subscribe to
//! it, publish messages and delete it again.
//!
//! ## Architecture
//!
//! Hexagonal layout:
//! - **Domain Layer** (`domain/`): topic entities, signed transactions,
//!   chunking and the error taxonomy. No I/O.
//! - **Ports Layer** (`ports/`): the inbound `TopicLifecycleApi` and the
//!   outbound `LedgerClient` every network adapter implements.
//! - **Service Layer** (`service.rs`): `TopicLifecycleDriver`, which submits
//!   transactions, polls receipts and maps receipt statuses onto errors.
//! - **Adapters** (`adapters/`): the in-process simulated network and the
//!   subscription delivery tasks.
//!
//! ## Lifecycle
//!
//! ```text
//!  nonexistent ──create──→ active ──delete (admin signature)──→ deleted
//!                            │
//!                            └──publish (submit signature if required)
//! ```
//!
//! A topic created without an admin key can never be deleted.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export public API
pub use adapters::simulated::{connect, SimulatedClient, SimulatedNetwork, SimulatedNetworkConfig};
pub use domain::chunking::{
    split_message, ChunkAssembler, CHUNK_LIMIT, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CHUNKS,
};
pub use domain::entities::{
    AdminCapability, DeliveredMessage, DeliveryGuarantee, OperationReceipt, OperatorIdentity,
    PublishOptions, SubscriptionQuery, TopicCreateOptions, TopicHandle, TopicInfo, TopicState,
};
pub use domain::errors::{NetworkError, TopicError};
pub use domain::transactions::{SignaturePair, Transaction, TransactionBody};
pub use ports::inbound::{MessageCallback, TopicLifecycleApi};
pub use ports::outbound::{LedgerClient, NetworkProfile, TransactionResponse};
pub use ports::subscription::{SubscriptionHandle, TopicSubscription};
pub use service::{DriverSettings, TopicLifecycleDriver};
