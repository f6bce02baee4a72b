//! # Topic Lifecycle Errors
//!
//! Every lifecycle operation fails with one `TopicError`. Nothing is retried
//! automatically; a failure aborts the remaining dependent steps for that
//! topic only.

use shared_bus::TransactionCacheError;
use shared_crypto::CryptoError;
use shared_types::{IdParseError, Status, TopicId};
use std::time::Duration;
use thiserror::Error;

/// Transport-level failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NetworkError {
    /// The network could not be reached.
    #[error("Network unreachable: {0}")]
    Unreachable(String),

    /// A round trip or receipt wait exceeded its deadline.
    #[error("Timed out after {waited:?} waiting for {operation}")]
    Timeout {
        operation: &'static str,
        waited: Duration,
    },

    /// The connection failed mid-request.
    #[error("Transport failure: {0}")]
    Transport(String),
}

/// Errors from topic lifecycle operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TopicError {
    /// Missing or malformed configuration (operator identity, keys, profile).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The network could not be reached or did not answer in time.
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// The network rejected the transaction.
    #[error("Transaction rejected with status {status}")]
    ConsensusRejected { status: Status },

    /// A required signature is missing or does not match the topic's key.
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// A subscription could not be registered.
    #[error("Subscription failed: {0}")]
    Subscription(String),

    /// The topic does not exist or has been deleted.
    #[error("Topic {topic_id} not found")]
    NotFound { topic_id: TopicId },
}

impl TopicError {
    /// Map a non-success receipt status onto the error taxonomy.
    ///
    /// Signature problems surface as `Authorization`, missing or deleted
    /// topics as `NotFound`, everything else as `ConsensusRejected`.
    #[must_use]
    pub fn from_status(status: Status, topic_id: Option<TopicId>) -> Self {
        match (status, topic_id) {
            (Status::InvalidSignature | Status::Unauthorized, _) => {
                Self::Authorization(format!("network rejected signatures ({status})"))
            }
            (Status::InvalidTopicId | Status::TopicDeleted, Some(topic_id)) => {
                Self::NotFound { topic_id }
            }
            _ => Self::ConsensusRejected { status },
        }
    }

    /// Short label for metrics and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Network(_) => "network",
            Self::ConsensusRejected { .. } => "consensus_rejected",
            Self::Authorization(_) => "authorization",
            Self::Subscription(_) => "subscription",
            Self::NotFound { .. } => "not_found",
        }
    }
}

impl From<CryptoError> for TopicError {
    fn from(err: CryptoError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<IdParseError> for TopicError {
    fn from(err: IdParseError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<TransactionCacheError> for TopicError {
    fn from(err: TransactionCacheError) -> Self {
        let status = match err {
            TransactionCacheError::Duplicate { .. } => Status::DuplicateTransaction,
            TransactionCacheError::Expired { .. } => Status::TransactionExpired,
            TransactionCacheError::NotYetValid { .. } => Status::InvalidTransactionStart,
        };
        Self::ConsensusRejected { status }
    }
}
