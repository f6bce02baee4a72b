//! # Ports Layer
//!
//! Trait definitions for the hexagonal architecture.
//! - **Inbound (Driving)**: API that callers of the lifecycle use
//! - **Outbound (Driven)**: the ledger client the lifecycle depends on
//! - **Subscription handles**: what the inbound API returns for a subscription

pub mod inbound;
pub mod outbound;
pub mod subscription;
