//! # Message Chunking
//!
//! Payloads larger than one transaction are split into chunks that share
//! the transaction id of the first chunk. Subscribers reassemble them.
//!
//! ```text
//! payload (2500 B) ──split──→ [1/3: 1024 B] [2/3: 1024 B] [3/3: 452 B]
//!                               tx = T        tx = T+1ns    tx = T+2ns
//!                               initial = T   initial = T   initial = T
//! ```

use crate::domain::entities::DeliveredMessage;
use crate::domain::errors::TopicError;
use shared_types::{Status, TopicMessage, TransactionId};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Bytes per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Maximum chunks per message.
pub const DEFAULT_MAX_CHUNKS: u32 = 20;

/// Hard ceiling on chunks per message, whatever `max_chunks` asks for.
///
/// Chunk `n` uses the initial transaction id plus `n - 1` ns, which must stay
/// below the next id `TransactionId::generate` hands out.
pub const CHUNK_LIMIT: u32 = TransactionId::GENERATION_STRIDE_NANOS as u32;

/// Split `payload` into at most `max_chunks` slices of `chunk_size` bytes.
///
/// `max_chunks` is capped at `CHUNK_LIMIT`.
///
/// # Errors
///
/// - `ConsensusRejected { InvalidTopicMessage }` for an empty payload
/// - `ConsensusRejected { MessageSizeTooLarge }` when more chunks are needed
pub fn split_message(
    payload: &[u8],
    chunk_size: usize,
    max_chunks: u32,
) -> Result<Vec<&[u8]>, TopicError> {
    if payload.is_empty() {
        return Err(TopicError::ConsensusRejected {
            status: Status::InvalidTopicMessage,
        });
    }

    let chunk_size = chunk_size.max(1);
    let max_chunks = max_chunks.min(CHUNK_LIMIT);
    let needed = payload.len().div_ceil(chunk_size);
    if needed > max_chunks as usize {
        debug!(
            size = payload.len(),
            needed,
            max_chunks,
            "Message needs more chunks than allowed"
        );
        return Err(TopicError::ConsensusRejected {
            status: Status::MessageSizeTooLarge,
        });
    }

    Ok(payload.chunks(chunk_size).collect())
}

struct PendingMessage {
    total: u32,
    parts: BTreeMap<u32, Vec<u8>>,
}

/// Reassembles chunked topic messages in consensus order.
///
/// Unchunked messages pass straight through. A chunked message is emitted
/// once its last missing chunk arrives, stamped with that chunk's consensus
/// timestamp, sequence number and running hash.
///
/// Publishers submit chunk 1 first, so only chunk 1 opens a message. A
/// later chunk whose message is not pending (its head was filtered out or
/// lost to lag) is dropped.
#[derive(Default)]
pub struct ChunkAssembler {
    pending: HashMap<TransactionId, PendingMessage>,
}

impl ChunkAssembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one consensus message; returns a complete message when one is ready.
    pub fn push(&mut self, message: TopicMessage) -> Option<DeliveredMessage> {
        let Some(info) = message.chunk_info else {
            return Some(DeliveredMessage {
                topic_id: message.topic_id,
                contents: message.contents,
                consensus_timestamp: message.consensus_timestamp,
                sequence_number: message.sequence_number,
                running_hash: message.running_hash,
                initial_transaction_id: None,
                chunk_count: 1,
            });
        };

        if info.number == 0 || info.number > info.total {
            warn!(
                topic = %message.topic_id,
                number = info.number,
                total = info.total,
                "Dropping chunk with out-of-range number"
            );
            return None;
        }

        if info.number != 1 && !self.pending.contains_key(&info.initial_transaction_id) {
            debug!(
                topic = %message.topic_id,
                sequence = message.sequence_number,
                number = info.number,
                "Dropping chunk of a message whose first chunk was not seen"
            );
            return None;
        }

        let pending = self
            .pending
            .entry(info.initial_transaction_id)
            .or_insert_with(|| PendingMessage {
                total: info.total,
                parts: BTreeMap::new(),
            });
        pending.parts.insert(info.number, message.contents);

        if pending.parts.len() < pending.total as usize {
            return None;
        }

        let complete = self.pending.remove(&info.initial_transaction_id)?;
        let contents = complete.parts.into_values().flatten().collect();

        Some(DeliveredMessage {
            topic_id: message.topic_id,
            contents,
            consensus_timestamp: message.consensus_timestamp,
            sequence_number: message.sequence_number,
            running_hash: message.running_hash,
            initial_transaction_id: Some(info.initial_transaction_id),
            chunk_count: info.total,
        })
    }

    /// Number of messages still missing chunks.
    #[must_use]
    pub fn pending_messages(&self) -> usize {
        self.pending.len()
    }

    /// Drop every partially received message; returns how many were dropped.
    ///
    /// Their remaining chunks are then ignored as they arrive.
    pub fn discard_incomplete(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }
}
