//! # Core Ledger Entities
//!
//! Identifiers, timestamps and message records shared by every crate that
//! talks to the consensus service.
//!
//! ## Clusters
//!
//! - **Identity**: `EntityId`, `AccountId`, `TopicId`
//! - **Time & Transactions**: `ConsensusTimestamp`, `TransactionId`
//! - **Topic Messages**: `TopicMessage`, `ChunkInfo`

use crate::errors::IdParseError;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A 48-byte SHA-384 running hash.
pub type RunningHash = [u8; 48];

/// Running hash of a topic that has not received any message yet.
pub const EMPTY_RUNNING_HASH: RunningHash = [0u8; 48];

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// A `shard.realm.num` triple identifying any ledger entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct EntityId {
    /// Shard number.
    pub shard: u64,
    /// Realm number.
    pub realm: u64,
    /// Entity number within the realm.
    pub num: u64,
}

impl EntityId {
    /// Create an entity id in shard 0, realm 0.
    #[must_use]
    pub const fn from_num(num: u64) -> Self {
        Self {
            shard: 0,
            realm: 0,
            num,
        }
    }

    /// Serialize to the 24-byte big-endian form used inside signed bodies.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 24] {
        let mut out = [0u8; 24];
        out[..8].copy_from_slice(&self.shard.to_be_bytes());
        out[8..16].copy_from_slice(&self.realm.to_be_bytes());
        out[16..].copy_from_slice(&self.num.to_be_bytes());
        out
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

impl FromStr for EntityId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parts: Vec<&str> = trimmed.split('.').collect();
        let [shard, realm, num] = parts.as_slice() else {
            return Err(IdParseError::Malformed(trimmed.to_string()));
        };

        let parse = |part: &str| {
            part.parse::<u64>()
                .map_err(|_| IdParseError::Malformed(trimmed.to_string()))
        };

        Ok(Self {
            shard: parse(*shard)?,
            realm: parse(*realm)?,
            num: parse(*num)?,
        })
    }
}

/// Identifier of an account (operator, payer or node).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct AccountId(pub EntityId);

impl AccountId {
    /// Account `0.0.num`.
    #[must_use]
    pub const fn from_num(num: u64) -> Self {
        Self(EntityId::from_num(num))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for AccountId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Identifier of a consensus topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct TopicId(pub EntityId);

impl TopicId {
    /// Topic `0.0.num`.
    #[must_use]
    pub const fn from_num(num: u64) -> Self {
        Self(EntityId::from_num(num))
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for TopicId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

// =============================================================================
// CLUSTER B: TIME & TRANSACTIONS
// =============================================================================

/// Seconds and nanoseconds since the Unix epoch.
///
/// Consensus timestamps are assigned by the network and totally order every
/// transaction it has accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct ConsensusTimestamp {
    /// Whole seconds since the epoch.
    pub seconds: u64,
    /// Nanoseconds within the second (always < 1_000_000_000).
    pub nanos: u32,
}

impl ConsensusTimestamp {
    /// Nanoseconds per second.
    pub const NANOS_PER_SECOND: u32 = 1_000_000_000;

    /// Build a timestamp, normalizing overflowing nanoseconds into seconds.
    #[must_use]
    pub fn new(seconds: u64, nanos: u32) -> Self {
        let carry = u64::from(nanos / Self::NANOS_PER_SECOND);
        Self {
            seconds: seconds.saturating_add(carry),
            nanos: nanos % Self::NANOS_PER_SECOND,
        }
    }

    /// Current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Convert from a `SystemTime`; times before the epoch clamp to zero.
    #[must_use]
    pub fn from_system_time(time: SystemTime) -> Self {
        let since_epoch = time.duration_since(UNIX_EPOCH).unwrap_or_default();
        Self {
            seconds: since_epoch.as_secs(),
            nanos: since_epoch.subsec_nanos(),
        }
    }

    /// Total nanoseconds since the epoch.
    #[must_use]
    pub fn as_nanos(&self) -> u128 {
        u128::from(self.seconds) * u128::from(Self::NANOS_PER_SECOND) + u128::from(self.nanos)
    }

    /// The timestamp one nanosecond later.
    #[must_use]
    pub fn next_nano(&self) -> Self {
        Self::new(self.seconds, self.nanos + 1)
    }

    /// Add a duration.
    #[must_use]
    pub fn plus(&self, duration: Duration) -> Self {
        Self::new(
            self.seconds.saturating_add(duration.as_secs()),
            self.nanos + duration.subsec_nanos(),
        )
    }

    /// Subtract a duration, saturating at the epoch.
    #[must_use]
    pub fn minus(&self, duration: Duration) -> Self {
        let total = self.as_nanos().saturating_sub(duration.as_nanos());
        let per_second = u128::from(Self::NANOS_PER_SECOND);
        Self {
            seconds: u64::try_from(total / per_second).unwrap_or(u64::MAX),
            nanos: u32::try_from(total % per_second).unwrap_or(0),
        }
    }

    /// Serialize to the 12-byte big-endian form used inside signed bodies.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 12] {
        let mut out = [0u8; 12];
        out[..8].copy_from_slice(&self.seconds.to_be_bytes());
        out[8..].copy_from_slice(&self.nanos.to_be_bytes());
        out
    }
}

impl fmt::Display for ConsensusTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}

/// Transaction identifier: the paying account plus its chosen valid-start time.
///
/// The network rejects a second transaction with an identical id while the
/// first is still inside its validity window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId {
    /// Account paying for (and signing) the transaction.
    pub account_id: AccountId,
    /// Earliest consensus time at which the transaction is valid.
    pub valid_start: ConsensusTimestamp,
}

impl TransactionId {
    /// Nanoseconds reserved after each generated valid start for chunk ids.
    pub const GENERATION_STRIDE_NANOS: u64 = 1_000;

    /// Generate a fresh id for `payer`, valid starting now.
    ///
    /// Valid starts handed out by one process are strictly increasing and at
    /// least `GENERATION_STRIDE_NANOS` apart.
    #[must_use]
    pub fn generate(payer: AccountId) -> Self {
        static LAST_VALID_START: AtomicU64 = AtomicU64::new(0);

        let now = u64::try_from(ConsensusTimestamp::now().as_nanos()).unwrap_or(u64::MAX);
        let mut last = LAST_VALID_START.load(Ordering::Relaxed);
        let chosen = loop {
            let next = now.max(last.saturating_add(Self::GENERATION_STRIDE_NANOS));
            match LAST_VALID_START.compare_exchange_weak(
                last,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break next,
                Err(current) => last = current,
            }
        };

        let per_second = u64::from(ConsensusTimestamp::NANOS_PER_SECOND);
        Self {
            account_id: payer,
            valid_start: ConsensusTimestamp::new(
                chosen / per_second,
                u32::try_from(chosen % per_second).unwrap_or(0),
            ),
        }
    }

    /// The id of chunk `offset` of a chunked message (valid start shifted by `offset` ns).
    #[must_use]
    pub fn with_nanos_offset(&self, offset: u32) -> Self {
        Self {
            account_id: self.account_id,
            valid_start: ConsensusTimestamp::new(
                self.valid_start.seconds,
                self.valid_start.nanos + offset,
            ),
        }
    }

    /// Serialize to the 36-byte form used inside signed bodies.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 36] {
        let mut out = [0u8; 36];
        out[..24].copy_from_slice(&self.account_id.0.to_bytes());
        out[24..].copy_from_slice(&self.valid_start.to_bytes());
        out
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.account_id, self.valid_start)
    }
}

// =============================================================================
// CLUSTER C: TOPIC MESSAGES
// =============================================================================

/// Position of one chunk inside a chunked message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkInfo {
    /// Transaction id of the first chunk; shared by every chunk of the message.
    pub initial_transaction_id: TransactionId,
    /// Number of chunks in the message.
    pub total: u32,
    /// 1-based position of this chunk.
    pub number: u32,
}

/// A message as recorded by consensus and delivered to subscribers.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicMessage {
    /// Topic the message was submitted to.
    pub topic_id: TopicId,
    /// Network-assigned consensus timestamp.
    pub consensus_timestamp: ConsensusTimestamp,
    /// Message payload bytes.
    pub contents: Vec<u8>,
    /// Topic running hash after this message.
    #[serde_as(as = "Bytes")]
    pub running_hash: RunningHash,
    /// Topic sequence number of this message (1-based).
    pub sequence_number: u64,
    /// Chunk position, when the message is part of a chunked submission.
    pub chunk_info: Option<ChunkInfo>,
}
