//! # Receipts & Status Codes
//!
//! A receipt is the settlement record of one transaction. Until consensus
//! has been reached the network reports `Status::Unknown`; callers poll
//! until a final status arrives.

use crate::entities::{RunningHash, TopicId, TransactionId};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use std::fmt;

/// Result code attached to every receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Transaction reached consensus and was applied.
    Success,
    /// Consensus has not been reached yet (receipt not final).
    Unknown,
    /// A required key signature is missing or does not verify.
    InvalidSignature,
    /// The payer (operator) signature is missing or does not verify.
    InvalidPayerSignature,
    /// The entity has no key that could authorize this operation.
    Unauthorized,
    /// The topic does not exist.
    InvalidTopicId,
    /// The topic was deleted.
    TopicDeleted,
    /// A transaction with the same id was already submitted.
    DuplicateTransaction,
    /// The transaction valid-start is too far in the past.
    TransactionExpired,
    /// The transaction valid-start is in the future.
    InvalidTransactionStart,
    /// The message exceeds the per-transaction size limit.
    MessageSizeTooLarge,
    /// The message payload is empty.
    InvalidTopicMessage,
    /// Chunk number is zero or larger than the chunk total.
    InvalidChunkNumber,
    /// Chunk does not share the initial transaction id of its message.
    InvalidChunkTransactionId,
    /// Topic memo exceeds the allowed length.
    MemoTooLong,
}

impl Status {
    /// Whether this status is final (consensus reached, successfully or not).
    #[must_use]
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Whether the transaction was applied.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Canonical upper-case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Unknown => "UNKNOWN",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::InvalidPayerSignature => "INVALID_PAYER_SIGNATURE",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InvalidTopicId => "INVALID_TOPIC_ID",
            Self::TopicDeleted => "TOPIC_DELETED",
            Self::DuplicateTransaction => "DUPLICATE_TRANSACTION",
            Self::TransactionExpired => "TRANSACTION_EXPIRED",
            Self::InvalidTransactionStart => "INVALID_TRANSACTION_START",
            Self::MessageSizeTooLarge => "MESSAGE_SIZE_TOO_LARGE",
            Self::InvalidTopicMessage => "INVALID_TOPIC_MESSAGE",
            Self::InvalidChunkNumber => "INVALID_CHUNK_NUMBER",
            Self::InvalidChunkTransactionId => "INVALID_CHUNK_TRANSACTION_ID",
            Self::MemoTooLong => "MEMO_TOO_LONG",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settlement record of a transaction.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    /// Transaction this receipt belongs to.
    pub transaction_id: TransactionId,
    /// Final (or `Unknown`) status.
    pub status: Status,
    /// New topic id, set by a successful topic creation.
    pub topic_id: Option<TopicId>,
    /// Topic sequence number after a successful message submission.
    pub topic_sequence_number: Option<u64>,
    /// Topic running hash after a successful message submission.
    #[serde_as(as = "Option<Bytes>")]
    pub topic_running_hash: Option<RunningHash>,
}

impl TransactionReceipt {
    /// A receipt that only carries a status.
    #[must_use]
    pub fn with_status(transaction_id: TransactionId, status: Status) -> Self {
        Self {
            transaction_id,
            status,
            topic_id: None,
            topic_sequence_number: None,
            topic_running_hash: None,
        }
    }
}
