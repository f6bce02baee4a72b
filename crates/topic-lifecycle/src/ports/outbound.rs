//! # Outbound Ports (Driven Ports / SPI)
//!
//! The ledger client the lifecycle driver depends on. Transaction signing
//! by the operator, transport, receipts and message feeds live behind it.

use crate::domain::entities::{SubscriptionQuery, TopicInfo};
use crate::domain::errors::TopicError;
use crate::domain::transactions::Transaction;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_bus::Subscription;
use shared_types::{AccountId, TopicId, TopicMessage, TransactionId, TransactionReceipt};
use std::fmt;
use std::str::FromStr;

/// Transport acknowledgement of a submitted transaction.
///
/// Acceptance for processing only; the outcome arrives in the receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionResponse {
    pub transaction_id: TransactionId,
    /// Node account that accepted the transaction.
    pub node_account_id: AccountId,
}

/// Connection to a consensus network on behalf of one operator.
///
/// One handle is shared (behind an `Arc`) by the lifecycle flow and every
/// subscription task.
#[async_trait]
pub trait LedgerClient: Send + Sync + 'static {
    /// The operator account paying for and signing every transaction.
    fn operator(&self) -> AccountId;

    /// Attach the operator signature and submit.
    ///
    /// # Errors
    ///
    /// - `TopicError::Network` - transport failure
    /// - `TopicError::ConsensusRejected` - precheck failure (duplicate or
    ///   expired transaction id, bad payer signature); nothing was queued
    async fn submit(&self, transaction: Transaction) -> Result<TransactionResponse, TopicError>;

    /// Current receipt of a submitted transaction (`Status::Unknown` until final).
    async fn get_receipt(
        &self,
        transaction_id: TransactionId,
    ) -> Result<TransactionReceipt, TopicError>;

    /// Register a live feed of messages for the query's topic.
    ///
    /// Resolves only once the network has acknowledged the registration.
    /// Every message reaching consensus afterwards is observed by the
    /// returned subscription.
    async fn subscribe(&self, query: &SubscriptionQuery) -> Result<Subscription, TopicError>;

    /// Historical messages of the query's topic with a sequence number
    /// greater than `after_sequence`, in consensus order.
    async fn message_history(
        &self,
        query: &SubscriptionQuery,
        after_sequence: u64,
    ) -> Result<Vec<TopicMessage>, TopicError>;

    /// Current network view of a topic.
    ///
    /// # Errors
    ///
    /// `TopicError::NotFound` when the topic is unknown or deleted.
    async fn topic_info(&self, topic_id: TopicId) -> Result<TopicInfo, TopicError>;
}

/// Named network a client connects to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkProfile {
    /// In-process simulated network.
    #[default]
    Local,
    Testnet,
    Previewnet,
    Mainnet,
}

/// One consensus node of a public network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeEndpoint {
    pub address: &'static str,
    pub account_id: AccountId,
}

const TESTNET_NODES: &[NodeEndpoint] = &[
    NodeEndpoint {
        address: "0.testnet.hedera.com:50211",
        account_id: AccountId::from_num(3),
    },
    NodeEndpoint {
        address: "1.testnet.hedera.com:50211",
        account_id: AccountId::from_num(4),
    },
];

const PREVIEWNET_NODES: &[NodeEndpoint] = &[
    NodeEndpoint {
        address: "0.previewnet.hedera.com:50211",
        account_id: AccountId::from_num(3),
    },
    NodeEndpoint {
        address: "1.previewnet.hedera.com:50211",
        account_id: AccountId::from_num(4),
    },
];

const MAINNET_NODES: &[NodeEndpoint] = &[
    NodeEndpoint {
        address: "35.237.200.180:50211",
        account_id: AccountId::from_num(3),
    },
    NodeEndpoint {
        address: "35.186.191.247:50211",
        account_id: AccountId::from_num(4),
    },
];

impl NetworkProfile {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Testnet => "testnet",
            Self::Previewnet => "previewnet",
            Self::Mainnet => "mainnet",
        }
    }

    /// Consensus nodes of a public network. Empty for `Local`.
    #[must_use]
    pub fn nodes(&self) -> &'static [NodeEndpoint] {
        match self {
            Self::Local => &[],
            Self::Testnet => TESTNET_NODES,
            Self::Previewnet => PREVIEWNET_NODES,
            Self::Mainnet => MAINNET_NODES,
        }
    }

    /// Mirror node serving message history and subscriptions.
    #[must_use]
    pub fn mirror_endpoint(&self) -> Option<&'static str> {
        match self {
            Self::Local => None,
            Self::Testnet => Some("testnet.mirrornode.hedera.com:443"),
            Self::Previewnet => Some("previewnet.mirrornode.hedera.com:443"),
            Self::Mainnet => Some("mainnet-public.mirrornode.hedera.com:443"),
        }
    }

    #[must_use]
    pub fn is_simulated(&self) -> bool {
        matches!(self, Self::Local)
    }
}

impl fmt::Display for NetworkProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NetworkProfile {
    type Err = TopicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "simulated" => Ok(Self::Local),
            "testnet" => Ok(Self::Testnet),
            "previewnet" => Ok(Self::Previewnet),
            "mainnet" => Ok(Self::Mainnet),
            other => Err(TopicError::Configuration(format!(
                "unknown network profile '{other}'"
            ))),
        }
    }
}
