//! # Simulated Network Adapter
//!
//! In-process ledger implementing `LedgerClient` for the `local` profile.
//!
//! ## Processing Pipeline
//!
//! ```text
//! submit() ──precheck──→ [consensus queue] ──→ consensus task ──→ receipts
//!   │  (tx-id window,                             │  (topic exists,
//!   │   duplicate id,                             │   key signatures,
//!   │   payer signature)                          │   size, chunks)
//!   ↓                                             ↓
//! ConsensusRejected                          topic bus ──→ subscribers
//! ```
//!
//! A single task drains the queue, so consensus timestamps strictly
//! increase in submission order. It is a test double, not a consensus
//! algorithm.

use crate::domain::entities::{OperatorIdentity, SubscriptionQuery, TopicInfo, TopicState};
use crate::domain::errors::{NetworkError, TopicError};
use crate::domain::transactions::{Transaction, TransactionBody};
use crate::ports::outbound::{LedgerClient, NetworkProfile, TransactionResponse};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use shared_bus::{
    InMemoryTopicBus, Subscription, TimeBoundedTransactionCache, TopicFilter, TopicPublisher,
    DEFAULT_CHANNEL_CAPACITY,
};
use shared_crypto::{PublicKey, Sha384Hasher};
use shared_types::{
    AccountId, ChunkInfo, ConsensusTimestamp, RunningHash, Status, TopicId, TopicMessage,
    TransactionId, TransactionReceipt, EMPTY_RUNNING_HASH,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Tunables of the simulated network.
#[derive(Debug, Clone)]
pub struct SimulatedNetworkConfig {
    /// Entity number of the first created topic.
    pub first_topic_num: u64,
    /// Node account reported in transaction responses.
    pub node_account_id: AccountId,
    /// Largest message (or chunk) a single transaction may carry.
    pub max_message_size: usize,
    /// Largest topic memo in bytes.
    pub max_memo_bytes: usize,
    /// Time the consensus task spends on each transaction.
    pub consensus_delay: Duration,
    /// Transactions that may wait in the consensus queue.
    pub queue_capacity: usize,
    /// Per-subscriber buffer before lag is reported.
    pub bus_capacity: usize,
}

impl Default for SimulatedNetworkConfig {
    fn default() -> Self {
        Self {
            first_topic_num: 1001,
            node_account_id: AccountId::from_num(3),
            max_message_size: 1024,
            max_memo_bytes: 100,
            consensus_delay: Duration::ZERO,
            queue_capacity: 1024,
            bus_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

// =============================================================================
// LEDGER STATE
// =============================================================================

struct TopicRecord {
    memo: String,
    admin_key: Option<PublicKey>,
    submit_key: Option<PublicKey>,
    sequence_number: u64,
    running_hash: RunningHash,
    created_at: ConsensusTimestamp,
    deleted: bool,
    history: Vec<TopicMessage>,
}

impl TopicRecord {
    fn info(&self, topic_id: TopicId) -> TopicInfo {
        TopicInfo {
            topic_id,
            memo: self.memo.clone(),
            admin_key: self.admin_key,
            submit_key: self.submit_key,
            sequence_number: self.sequence_number,
            running_hash: self.running_hash,
            state: if self.deleted {
                TopicState::Deleted
            } else {
                TopicState::Active
            },
            created_at: self.created_at,
        }
    }
}

struct LedgerState {
    accounts: HashMap<AccountId, PublicKey>,
    topics: BTreeMap<TopicId, TopicRecord>,
    receipts: HashMap<TransactionId, TransactionReceipt>,
    next_topic_num: u64,
    last_timestamp: ConsensusTimestamp,
}

impl LedgerState {
    fn next_timestamp(&mut self) -> ConsensusTimestamp {
        let now = ConsensusTimestamp::now();
        let next = if now > self.last_timestamp {
            now
        } else {
            self.last_timestamp.next_nano()
        };
        self.last_timestamp = next;
        next
    }

    fn create_topic(
        &mut self,
        tx: &Transaction,
        memo: &str,
        admin_key: Option<PublicKey>,
        submit_key: Option<PublicKey>,
        timestamp: ConsensusTimestamp,
        config: &SimulatedNetworkConfig,
    ) -> Result<TransactionReceipt, Status> {
        if memo.len() > config.max_memo_bytes {
            return Err(Status::MemoTooLong);
        }
        if let Some(key) = &admin_key {
            if !tx.is_signed_by(key) {
                return Err(Status::InvalidSignature);
            }
        }

        let topic_id = TopicId::from_num(self.next_topic_num);
        self.next_topic_num += 1;
        self.topics.insert(
            topic_id,
            TopicRecord {
                memo: memo.to_string(),
                admin_key,
                submit_key,
                sequence_number: 0,
                running_hash: EMPTY_RUNNING_HASH,
                created_at: timestamp,
                deleted: false,
                history: Vec::new(),
            },
        );

        let mut receipt = TransactionReceipt::with_status(tx.transaction_id, Status::Success);
        receipt.topic_id = Some(topic_id);
        Ok(receipt)
    }

    fn submit_message(
        &mut self,
        tx: &Transaction,
        topic_id: TopicId,
        message: &[u8],
        chunk_info: Option<ChunkInfo>,
        timestamp: ConsensusTimestamp,
        config: &SimulatedNetworkConfig,
    ) -> Result<(TransactionReceipt, TopicMessage), Status> {
        let topic = self.topics.get_mut(&topic_id).ok_or(Status::InvalidTopicId)?;
        if topic.deleted {
            return Err(Status::TopicDeleted);
        }
        if let Some(key) = &topic.submit_key {
            if !tx.is_signed_by(key) {
                return Err(Status::InvalidSignature);
            }
        }
        if message.is_empty() {
            return Err(Status::InvalidTopicMessage);
        }
        if message.len() > config.max_message_size {
            return Err(Status::MessageSizeTooLarge);
        }
        if let Some(info) = chunk_info {
            if info.number == 0 || info.number > info.total {
                return Err(Status::InvalidChunkNumber);
            }
            let initial = info.initial_transaction_id;
            if initial.account_id != tx.transaction_id.account_id
                || (info.number == 1 && initial != tx.transaction_id)
            {
                return Err(Status::InvalidChunkTransactionId);
            }
        }

        topic.sequence_number += 1;
        topic.running_hash = next_running_hash(
            &topic.running_hash,
            topic_id,
            timestamp,
            topic.sequence_number,
            message,
        );

        let recorded = TopicMessage {
            topic_id,
            consensus_timestamp: timestamp,
            contents: message.to_vec(),
            running_hash: topic.running_hash,
            sequence_number: topic.sequence_number,
            chunk_info,
        };
        topic.history.push(recorded.clone());

        let mut receipt = TransactionReceipt::with_status(tx.transaction_id, Status::Success);
        receipt.topic_sequence_number = Some(topic.sequence_number);
        receipt.topic_running_hash = Some(topic.running_hash);
        Ok((receipt, recorded))
    }

    fn delete_topic(
        &mut self,
        tx: &Transaction,
        topic_id: TopicId,
    ) -> Result<TransactionReceipt, Status> {
        let topic = self.topics.get_mut(&topic_id).ok_or(Status::InvalidTopicId)?;
        if topic.deleted {
            return Err(Status::TopicDeleted);
        }
        let Some(admin_key) = &topic.admin_key else {
            return Err(Status::Unauthorized);
        };
        if !tx.is_signed_by(admin_key) {
            return Err(Status::InvalidSignature);
        }

        topic.deleted = true;
        Ok(TransactionReceipt::with_status(tx.transaction_id, Status::Success))
    }
}

/// `SHA-384(previous || topic id || consensus timestamp || sequence number || message)`.
#[must_use]
pub fn next_running_hash(
    previous: &RunningHash,
    topic_id: TopicId,
    timestamp: ConsensusTimestamp,
    sequence_number: u64,
    message: &[u8],
) -> RunningHash {
    let mut hasher = Sha384Hasher::new();
    hasher
        .update(previous)
        .update(&topic_id.0.to_bytes())
        .update(&timestamp.to_bytes())
        .update(&sequence_number.to_be_bytes())
        .update(message);
    hasher.finalize()
}

// =============================================================================
// NETWORK
// =============================================================================

struct NetworkShared {
    config: SimulatedNetworkConfig,
    state: RwLock<LedgerState>,
    seen: Mutex<TimeBoundedTransactionCache>,
    bus: InMemoryTopicBus,
    reachable: AtomicBool,
}

impl NetworkShared {
    /// Apply one transaction and record its receipt.
    fn apply(&self, tx: &Transaction) -> Option<TopicMessage> {
        let mut state = self.state.write();
        let timestamp = state.next_timestamp();
        let tx_id = tx.transaction_id;

        let outcome = match &tx.body {
            TransactionBody::TopicCreate {
                memo,
                admin_key,
                submit_key,
            } => state
                .create_topic(tx, memo, *admin_key, *submit_key, timestamp, &self.config)
                .map(|receipt| (receipt, None)),
            TransactionBody::TopicMessageSubmit {
                topic_id,
                message,
                chunk_info,
            } => state
                .submit_message(tx, *topic_id, message, *chunk_info, timestamp, &self.config)
                .map(|(receipt, recorded)| (receipt, Some(recorded))),
            TransactionBody::TopicDelete { topic_id } => state
                .delete_topic(tx, *topic_id)
                .map(|receipt| (receipt, None)),
        };

        let (receipt, recorded) = match outcome {
            Ok(applied) => applied,
            Err(status) => {
                debug!(
                    transaction = %tx_id,
                    kind = tx.body.kind(),
                    %status,
                    "Transaction failed at consensus"
                );
                (TransactionReceipt::with_status(tx_id, status), None)
            }
        };

        debug!(
            transaction = %tx_id,
            kind = tx.body.kind(),
            status = %receipt.status,
            consensus_timestamp = %timestamp,
            "Transaction reached consensus"
        );
        state.receipts.insert(tx_id, receipt);
        recorded
    }
}

/// Handle to an in-process ledger. Cheap to clone.
///
/// The consensus task runs until every handle (and every client built from
/// one) has been dropped.
#[derive(Clone)]
pub struct SimulatedNetwork {
    shared: Arc<NetworkShared>,
    queue: mpsc::Sender<Transaction>,
}

impl SimulatedNetwork {
    /// Start a network and its consensus task.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(config: SimulatedNetworkConfig) -> Self {
        let (queue, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let shared = Arc::new(NetworkShared {
            state: RwLock::new(LedgerState {
                accounts: HashMap::new(),
                topics: BTreeMap::new(),
                receipts: HashMap::new(),
                next_topic_num: config.first_topic_num,
                last_timestamp: ConsensusTimestamp::default(),
            }),
            seen: Mutex::new(TimeBoundedTransactionCache::new()),
            bus: InMemoryTopicBus::with_capacity(config.bus_capacity.max(1)),
            reachable: AtomicBool::new(true),
            config,
        });

        tokio::spawn(run_consensus(shared.clone(), receiver));
        info!(
            first_topic = shared.config.first_topic_num,
            node = %shared.config.node_account_id,
            "Simulated network started"
        );

        Self { shared, queue }
    }

    /// Make `account_id` known with `public_key` as its payer key.
    pub fn register_account(&self, account_id: AccountId, public_key: PublicKey) {
        self.shared
            .state
            .write()
            .accounts
            .insert(account_id, public_key);
    }

    /// A client acting for `operator`.
    #[must_use]
    pub fn client(&self, operator: OperatorIdentity) -> SimulatedClient {
        SimulatedClient {
            network: self.clone(),
            operator,
        }
    }

    /// Fault injection: while unreachable every request fails with a transport error.
    pub fn set_reachable(&self, reachable: bool) {
        self.shared.reachable.store(reachable, Ordering::SeqCst);
        warn!(reachable, "Simulated network reachability changed");
    }

    #[must_use]
    pub fn is_reachable(&self) -> bool {
        self.shared.reachable.load(Ordering::SeqCst)
    }

    /// Messages that reached consensus, across all topics.
    #[must_use]
    pub fn messages_published(&self) -> u64 {
        self.shared.bus.messages_published()
    }

    /// Number of live message subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.shared.bus.subscriber_count()
    }

    fn ensure_reachable(&self) -> Result<(), TopicError> {
        if self.is_reachable() {
            Ok(())
        } else {
            Err(NetworkError::Unreachable("simulated network is offline".into()).into())
        }
    }

    /// Precheck a signed transaction and queue it for consensus.
    ///
    /// # Errors
    ///
    /// - `TopicError::Network` - network offline or queue closed
    /// - `TopicError::ConsensusRejected` - expired, future-dated or duplicate
    ///   transaction id, or missing payer signature
    pub async fn submit_transaction(
        &self,
        transaction: Transaction,
    ) -> Result<TransactionResponse, TopicError> {
        self.ensure_reachable()?;
        let transaction_id = transaction.transaction_id;

        self.shared.seen.lock().validate_and_add(transaction_id)?;

        let payer_key = self
            .shared
            .state
            .read()
            .accounts
            .get(&transaction_id.account_id)
            .copied();
        if !payer_key.is_some_and(|key| transaction.is_signed_by(&key)) {
            return Err(TopicError::ConsensusRejected {
                status: Status::InvalidPayerSignature,
            });
        }

        self.shared.state.write().receipts.insert(
            transaction_id,
            TransactionReceipt::with_status(transaction_id, Status::Unknown),
        );

        self.queue
            .send(transaction)
            .await
            .map_err(|_| NetworkError::Transport("consensus queue closed".into()))?;

        Ok(TransactionResponse {
            transaction_id,
            node_account_id: self.shared.config.node_account_id,
        })
    }

    /// Receipt of a transaction; `Unknown` until consensus.
    pub fn receipt(&self, transaction_id: TransactionId) -> Result<TransactionReceipt, TopicError> {
        self.ensure_reachable()?;
        Ok(self
            .shared
            .state
            .read()
            .receipts
            .get(&transaction_id)
            .cloned()
            .unwrap_or_else(|| TransactionReceipt::with_status(transaction_id, Status::Unknown)))
    }

    /// Current view of an active topic.
    pub fn topic(&self, topic_id: TopicId) -> Result<TopicInfo, TopicError> {
        self.ensure_reachable()?;
        let state = self.shared.state.read();
        match state.topics.get(&topic_id) {
            Some(record) if !record.deleted => Ok(record.info(topic_id)),
            _ => Err(TopicError::NotFound { topic_id }),
        }
    }

    /// Recorded messages after `after_sequence`, honouring the query's start time.
    ///
    /// History of a deleted topic stays readable.
    pub fn history(
        &self,
        query: &SubscriptionQuery,
        after_sequence: u64,
    ) -> Result<Vec<TopicMessage>, TopicError> {
        self.ensure_reachable()?;
        let state = self.shared.state.read();
        let record = state
            .topics
            .get(&query.topic_id)
            .ok_or(TopicError::NotFound {
                topic_id: query.topic_id,
            })?;

        Ok(record
            .history
            .iter()
            .filter(|m| m.sequence_number > after_sequence)
            .filter(|m| query.start_time.map_or(true, |start| m.consensus_timestamp >= start))
            .cloned()
            .collect())
    }

    /// Register a live subscription on an active topic.
    pub fn open_subscription(&self, query: &SubscriptionQuery) -> Result<Subscription, TopicError> {
        self.topic(query.topic_id)?;

        let mut filter = TopicFilter::topic(query.topic_id);
        if let Some(start) = query.start_time {
            filter = filter.starting_at(start);
        }
        Ok(self.shared.bus.subscribe(filter))
    }
}

async fn run_consensus(shared: Arc<NetworkShared>, mut queue: mpsc::Receiver<Transaction>) {
    while let Some(transaction) = queue.recv().await {
        if !shared.config.consensus_delay.is_zero() {
            tokio::time::sleep(shared.config.consensus_delay).await;
        }

        if let Some(message) = shared.apply(&transaction) {
            shared.bus.publish(message).await;
        }
    }
    debug!("Consensus queue closed, simulated network stopped");
}

// =============================================================================
// CLIENT
// =============================================================================

/// `LedgerClient` bound to one operator on a simulated network.
#[derive(Clone)]
pub struct SimulatedClient {
    network: SimulatedNetwork,
    operator: OperatorIdentity,
}

impl SimulatedClient {
    /// The network behind this client (for fault injection).
    #[must_use]
    pub fn network(&self) -> &SimulatedNetwork {
        &self.network
    }
}

#[async_trait]
impl LedgerClient for SimulatedClient {
    fn operator(&self) -> AccountId {
        self.operator.account_id
    }

    async fn submit(
        &self,
        mut transaction: Transaction,
    ) -> Result<TransactionResponse, TopicError> {
        transaction.sign_with(&self.operator.private_key);
        self.network.submit_transaction(transaction).await
    }

    async fn get_receipt(
        &self,
        transaction_id: TransactionId,
    ) -> Result<TransactionReceipt, TopicError> {
        self.network.receipt(transaction_id)
    }

    async fn subscribe(&self, query: &SubscriptionQuery) -> Result<Subscription, TopicError> {
        self.network.open_subscription(query)
    }

    async fn message_history(
        &self,
        query: &SubscriptionQuery,
        after_sequence: u64,
    ) -> Result<Vec<TopicMessage>, TopicError> {
        self.network.history(query, after_sequence)
    }

    async fn topic_info(&self, topic_id: TopicId) -> Result<TopicInfo, TopicError> {
        self.network.topic(topic_id)
    }
}

/// Connect `operator` to a network profile.
///
/// `local` starts a fresh simulated network with the operator's account
/// registered. Public profiles need a remote transport, which this crate
/// does not provide.
///
/// # Errors
///
/// `TopicError::Configuration` for every profile other than `local`.
pub fn connect(
    profile: NetworkProfile,
    operator: OperatorIdentity,
    config: SimulatedNetworkConfig,
) -> Result<SimulatedClient, TopicError> {
    if !profile.is_simulated() {
        let nodes: Vec<&str> = profile.nodes().iter().map(|node| node.address).collect();
        return Err(TopicError::Configuration(format!(
            "network profile '{profile}' requires a remote transport (nodes: {}; mirror: {})",
            nodes.join(", "),
            profile.mirror_endpoint().unwrap_or("none"),
        )));
    }

    let network = SimulatedNetwork::spawn(config);
    network.register_account(operator.account_id, operator.public_key());
    info!(operator = %operator.account_id, profile = %profile, "Connected to network");
    Ok(network.client(operator))
}
