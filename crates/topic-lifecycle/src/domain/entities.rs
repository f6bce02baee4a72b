//! # Topic Lifecycle Entities
//!
//! Handles, capabilities and option types passed across the lifecycle API.

use crate::domain::chunking::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CHUNKS};
use crate::domain::errors::TopicError;
use serde::{Deserialize, Serialize};
use shared_crypto::{PrivateKey, PublicKey, Signature};
use shared_types::{
    AccountId, ConsensusTimestamp, RunningHash, TopicId, TransactionId, TransactionReceipt,
};
use std::fmt;
use std::str::FromStr;

/// Settlement record returned by state-changing operations.
pub type OperationReceipt = TransactionReceipt;

// =============================================================================
// TOPIC HANDLE & STATE
// =============================================================================

/// Opaque reference to a created topic.
///
/// Valid between a successful creation and a successful deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicHandle(TopicId);

impl TopicHandle {
    /// Wrap an existing topic id (e.g. one read from configuration).
    #[must_use]
    pub const fn new(topic_id: TopicId) -> Self {
        Self(topic_id)
    }

    /// The network topic id.
    #[must_use]
    pub const fn topic_id(&self) -> TopicId {
        self.0
    }
}

impl From<TopicId> for TopicHandle {
    fn from(topic_id: TopicId) -> Self {
        Self(topic_id)
    }
}

impl fmt::Display for TopicHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Lifecycle state of a topic. Transitions are one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicState {
    /// Never created.
    Nonexistent,
    /// Created and not yet deleted.
    Active,
    /// Deleted; never becomes active again.
    Deleted,
}

impl TopicState {
    /// Whether `self -> next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: TopicState) -> bool {
        matches!(
            (self, next),
            (Self::Nonexistent, Self::Active) | (Self::Active, Self::Deleted)
        )
    }
}

/// Network view of a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicInfo {
    pub topic_id: TopicId,
    pub memo: String,
    pub admin_key: Option<PublicKey>,
    pub submit_key: Option<PublicKey>,
    /// Sequence number of the last message (0 before the first).
    pub sequence_number: u64,
    pub running_hash: RunningHash,
    pub state: TopicState,
    pub created_at: ConsensusTimestamp,
}

impl TopicInfo {
    /// Whether publishing requires a signature.
    #[must_use]
    pub fn requires_submit_signature(&self) -> bool {
        self.submit_key.is_some()
    }
}

// =============================================================================
// IDENTITIES & CAPABILITIES
// =============================================================================

/// Signing credential bound to a topic at creation.
///
/// Authorizes deletion (as admin key) and signed publication (as submit key).
#[derive(Clone, Debug)]
pub struct AdminCapability {
    key: PrivateKey,
}

impl AdminCapability {
    /// Wrap an existing private key.
    #[must_use]
    pub fn new(key: PrivateKey) -> Self {
        Self { key }
    }

    /// Fresh Ed25519 capability.
    #[must_use]
    pub fn generate() -> Self {
        Self::new(PrivateKey::generate_ed25519())
    }

    /// Public half, as recorded on the topic.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.key.public_key()
    }

    /// Sign raw transaction body bytes.
    #[must_use]
    pub fn sign(&self, body: &[u8]) -> Signature {
        self.key.sign(body)
    }

    /// The underlying private key.
    #[must_use]
    pub fn private_key(&self) -> &PrivateKey {
        &self.key
    }
}

/// The paying and signing account of every transaction.
#[derive(Clone, Debug)]
pub struct OperatorIdentity {
    pub account_id: AccountId,
    pub private_key: PrivateKey,
}

impl OperatorIdentity {
    #[must_use]
    pub fn new(account_id: AccountId, private_key: PrivateKey) -> Self {
        Self {
            account_id,
            private_key,
        }
    }

    /// Parse an operator from its configuration strings.
    ///
    /// # Errors
    ///
    /// `TopicError::Configuration` when either value is malformed.
    pub fn parse(account_id: &str, private_key: &str) -> Result<Self, TopicError> {
        let account_id = AccountId::from_str(account_id)?;
        let private_key = PrivateKey::from_str(private_key).map_err(|e| {
            TopicError::Configuration(format!("operator private key: {e}"))
        })?;
        Ok(Self::new(account_id, private_key))
    }

    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.private_key.public_key()
    }
}

// =============================================================================
// OPTIONS
// =============================================================================

/// Parameters of a topic creation.
#[derive(Clone, Debug, Default)]
pub struct TopicCreateOptions {
    /// Free-form memo, at most 100 bytes.
    pub memo: String,
    /// Capability recorded as admin key; it also signs the creation.
    pub admin: Option<AdminCapability>,
    /// Key whose signature every publication must carry.
    pub submit_key: Option<PublicKey>,
}

impl TopicCreateOptions {
    /// Options binding `admin` as both admin key and submit key.
    #[must_use]
    pub fn with_capability(admin: AdminCapability) -> Self {
        Self {
            memo: String::new(),
            submit_key: Some(admin.public_key()),
            admin: Some(admin),
        }
    }

    #[must_use]
    pub fn memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    #[must_use]
    pub fn admin(mut self, admin: AdminCapability) -> Self {
        self.admin = Some(admin);
        self
    }

    #[must_use]
    pub fn submit_key(mut self, key: PublicKey) -> Self {
        self.submit_key = Some(key);
        self
    }
}

/// Parameters of a publication.
#[derive(Clone, Debug)]
pub struct PublishOptions {
    /// Capability signing every chunk.
    pub signer: Option<AdminCapability>,
    /// Upper bound on the number of chunk transactions.
    pub max_chunks: u32,
    /// Bytes per chunk.
    pub chunk_size: usize,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            signer: None,
            max_chunks: DEFAULT_MAX_CHUNKS,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl PublishOptions {
    #[must_use]
    pub fn signed_by(signer: AdminCapability) -> Self {
        Self {
            signer: Some(signer),
            ..Self::default()
        }
    }
}

// =============================================================================
// SUBSCRIPTIONS
// =============================================================================

/// How a subscription treats messages it fell behind on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryGuarantee {
    /// Skip messages lost to subscriber lag.
    #[default]
    BestEffort,
    /// Replay missed messages from the topic's history.
    AtLeastOnce,
}

impl FromStr for DeliveryGuarantee {
    type Err = TopicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "best-effort" => Ok(Self::BestEffort),
            "at-least-once" => Ok(Self::AtLeastOnce),
            other => Err(TopicError::Configuration(format!(
                "unknown delivery guarantee '{other}' (expected best-effort or at-least-once)"
            ))),
        }
    }
}

impl fmt::Display for DeliveryGuarantee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BestEffort => f.write_str("best-effort"),
            Self::AtLeastOnce => f.write_str("at-least-once"),
        }
    }
}

/// Which messages of a topic a subscription receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionQuery {
    pub topic_id: TopicId,
    /// Only messages at or after this consensus time (history included).
    pub start_time: Option<ConsensusTimestamp>,
    /// Stop after this many delivered messages.
    pub limit: Option<u64>,
}

impl SubscriptionQuery {
    #[must_use]
    pub fn new(topic_id: TopicId) -> Self {
        Self {
            topic_id,
            start_time: None,
            limit: None,
        }
    }

    #[must_use]
    pub fn starting_at(mut self, start: ConsensusTimestamp) -> Self {
        self.start_time = Some(start);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A message as handed to a subscriber. Chunked messages arrive reassembled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredMessage {
    pub topic_id: TopicId,
    pub contents: Vec<u8>,
    /// Consensus timestamp of the (last) chunk.
    pub consensus_timestamp: ConsensusTimestamp,
    /// Sequence number of the (last) chunk.
    pub sequence_number: u64,
    pub running_hash: RunningHash,
    /// Shared transaction id of a chunked message.
    pub initial_transaction_id: Option<TransactionId>,
    /// Number of chunks the message was split into (1 when not chunked).
    pub chunk_count: u32,
}

impl DeliveredMessage {
    /// Payload as UTF-8, lossy.
    #[must_use]
    pub fn contents_lossy(&self) -> String {
        String::from_utf8_lossy(&self.contents).into_owned()
    }
}
