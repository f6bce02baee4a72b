//! # Subscription Delivery
//!
//! Each subscription runs as its own task that turns the network feed into
//! `DeliveredMessage`s, one per message, in consensus order.
//!
//! ## Flow
//!
//! ```text
//! spawn ──→ register live feed ──→ fetch history ──→ ready ack ──→ caller resumes
//!                                                       │
//!           ┌───────────────────────────────────────────┘
//!           ↓
//!   history, then live feed ──dedupe by sequence──→ reassemble chunks ──→ sink
//!           │
//!           └─ lag: BestEffort skips, AtLeastOnce replays from history
//! ```
//!
//! The live feed is registered before history is read, so no message falls
//! between the two; the overlap is removed by sequence number.

use crate::domain::chunking::ChunkAssembler;
use crate::domain::entities::{DeliveredMessage, DeliveryGuarantee, SubscriptionQuery};
use crate::domain::errors::TopicError;
use crate::ports::inbound::MessageCallback;
use crate::ports::outbound::LedgerClient;
use crate::ports::subscription::{SubscriptionHandle, TopicSubscription};
use async_trait::async_trait;
use ledger_telemetry::{ACTIVE_SUBSCRIPTIONS, MESSAGES_DELIVERED};
use shared_bus::{BusDelivery, Subscription};
use shared_types::TopicMessage;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Where delivered messages go.
#[async_trait]
trait DeliverySink: Send + 'static {
    /// Hand over one message. `false` means nobody is listening any more.
    async fn deliver(&mut self, message: DeliveredMessage) -> bool;
}

struct ChannelSink(mpsc::Sender<DeliveredMessage>);

#[async_trait]
impl DeliverySink for ChannelSink {
    async fn deliver(&mut self, message: DeliveredMessage) -> bool {
        self.0.send(message).await.is_ok()
    }
}

struct CallbackSink(MessageCallback);

#[async_trait]
impl DeliverySink for CallbackSink {
    async fn deliver(&mut self, message: DeliveredMessage) -> bool {
        (self.0)(message);
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Cancelled,
    HandleDropped,
    ReceiverDropped,
    LimitReached,
    FeedClosed,
    BackfillFailed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Cancelled => "cancelled",
            Self::HandleDropped => "handle dropped",
            Self::ReceiverDropped => "receiver dropped",
            Self::LimitReached => "limit reached",
            Self::FeedClosed => "feed closed",
            Self::BackfillFailed => "backfill failed",
        };
        f.write_str(text)
    }
}

struct DeliveryWorker<C: LedgerClient> {
    id: Uuid,
    client: Arc<C>,
    query: SubscriptionQuery,
    guarantee: DeliveryGuarantee,
    cancel: watch::Receiver<bool>,
    assembler: ChunkAssembler,
    last_sequence: u64,
    delivered: u64,
}

impl<C: LedgerClient> DeliveryWorker<C> {
    async fn run<S: DeliverySink>(
        mut self,
        ready: oneshot::Sender<Result<(), TopicError>>,
        mut sink: S,
    ) {
        let mut live = match self.client.subscribe(&self.query).await {
            Ok(live) => live,
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };
        let history = match self.client.message_history(&self.query, 0).await {
            Ok(history) => history,
            Err(e) => {
                drop(live);
                let _ = ready.send(Err(e));
                return;
            }
        };
        if ready.send(Ok(())).is_err() {
            return;
        }

        ACTIVE_SUBSCRIPTIONS.inc();
        info!(
            subscription = %self.id,
            topic = %self.query.topic_id,
            guarantee = %self.guarantee,
            replay = history.len(),
            "Subscription ready"
        );

        let reason = self.drive(history, &mut live, &mut sink).await;

        ACTIVE_SUBSCRIPTIONS.dec();
        info!(
            subscription = %self.id,
            topic = %self.query.topic_id,
            delivered = self.delivered,
            %reason,
            "Subscription ended"
        );
    }

    async fn drive<S: DeliverySink>(
        &mut self,
        history: Vec<TopicMessage>,
        live: &mut Subscription,
        sink: &mut S,
    ) -> StopReason {
        for message in history {
            if let Err(reason) = self.accept(message, sink).await {
                return reason;
            }
        }

        loop {
            if *self.cancel.borrow() {
                return StopReason::Cancelled;
            }

            tokio::select! {
                biased;

                changed = self.cancel.changed() => {
                    if changed.is_err() {
                        return StopReason::HandleDropped;
                    }
                }

                delivery = live.recv_delivery() => {
                    let step = match delivery {
                        None => Err(StopReason::FeedClosed),
                        Some(BusDelivery::Message(message)) => {
                            self.on_live_message(message, sink).await
                        }
                        Some(BusDelivery::Lagged(missed)) => self.on_lag(missed, sink).await,
                    };
                    if let Err(reason) = step {
                        return reason;
                    }
                }
            }
        }
    }

    async fn on_live_message<S: DeliverySink>(
        &mut self,
        message: TopicMessage,
        sink: &mut S,
    ) -> Result<(), StopReason> {
        let gap = message.sequence_number > self.last_sequence + 1;
        if gap && self.guarantee == DeliveryGuarantee::AtLeastOnce {
            self.backfill(sink).await?;
        }
        self.accept(message, sink).await
    }

    async fn on_lag<S: DeliverySink>(
        &mut self,
        missed: u64,
        sink: &mut S,
    ) -> Result<(), StopReason> {
        match self.guarantee {
            DeliveryGuarantee::BestEffort => {
                // Chunks of partially received messages may be among the missed ones.
                let abandoned = self.assembler.discard_incomplete();
                warn!(
                    subscription = %self.id,
                    topic = %self.query.topic_id,
                    missed,
                    abandoned,
                    "Subscriber lagged, skipping missed messages"
                );
                Ok(())
            }
            DeliveryGuarantee::AtLeastOnce => {
                debug!(subscription = %self.id, missed, "Subscriber lagged, replaying");
                self.backfill(sink).await
            }
        }
    }

    async fn backfill<S: DeliverySink>(&mut self, sink: &mut S) -> Result<(), StopReason> {
        let missed = match self
            .client
            .message_history(&self.query, self.last_sequence)
            .await
        {
            Ok(missed) => missed,
            Err(e) => {
                warn!(subscription = %self.id, error = %e, "Backfill from history failed");
                return Err(StopReason::BackfillFailed);
            }
        };

        debug!(
            subscription = %self.id,
            after = self.last_sequence,
            count = missed.len(),
            "Backfilling from history"
        );
        for message in missed {
            self.accept(message, sink).await?;
        }
        Ok(())
    }

    async fn accept<S: DeliverySink>(
        &mut self,
        message: TopicMessage,
        sink: &mut S,
    ) -> Result<(), StopReason> {
        if *self.cancel.borrow() {
            return Err(StopReason::Cancelled);
        }
        if message.sequence_number <= self.last_sequence {
            trace!(sequence = message.sequence_number, "Skipping already delivered message");
            return Ok(());
        }
        self.last_sequence = message.sequence_number;

        let Some(delivered) = self.assembler.push(message) else {
            return Ok(());
        };
        if !sink.deliver(delivered).await {
            return Err(StopReason::ReceiverDropped);
        }

        self.delivered += 1;
        MESSAGES_DELIVERED.inc();

        if self.query.limit.is_some_and(|limit| self.delivered >= limit) {
            return Err(StopReason::LimitReached);
        }
        Ok(())
    }
}

struct StartedWorker {
    id: Uuid,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

async fn start_worker<C, S>(
    client: Arc<C>,
    query: SubscriptionQuery,
    guarantee: DeliveryGuarantee,
    sink: S,
) -> Result<StartedWorker, TopicError>
where
    C: LedgerClient,
    S: DeliverySink,
{
    let id = Uuid::new_v4();
    let topic_id = query.topic_id;
    let (cancel, cancel_rx) = watch::channel(false);
    let (ready_tx, ready_rx) = oneshot::channel();

    let worker = DeliveryWorker {
        id,
        client,
        query,
        guarantee,
        cancel: cancel_rx,
        assembler: ChunkAssembler::new(),
        last_sequence: 0,
        delivered: 0,
    };
    let task = tokio::spawn(worker.run(ready_tx, sink));

    match ready_rx.await {
        Ok(Ok(())) => Ok(StartedWorker { id, cancel, task }),
        Ok(Err(TopicError::Subscription(reason))) => Err(TopicError::Subscription(reason)),
        Ok(Err(e)) => Err(TopicError::Subscription(format!(
            "cannot subscribe to topic {topic_id}: {e}"
        ))),
        Err(_) => Err(TopicError::Subscription(format!(
            "delivery task for topic {topic_id} ended before registration"
        ))),
    }
}

/// Start a pull subscription buffering up to `buffer` undelivered messages.
pub(crate) async fn open_stream<C: LedgerClient>(
    client: Arc<C>,
    query: SubscriptionQuery,
    guarantee: DeliveryGuarantee,
    buffer: usize,
) -> Result<TopicSubscription, TopicError> {
    let topic_id = query.topic_id;
    let (sender, receiver) = mpsc::channel(buffer.max(1));
    let started = start_worker(client, query, guarantee, ChannelSink(sender)).await?;

    Ok(TopicSubscription::new(
        started.id,
        topic_id,
        receiver,
        started.cancel,
        started.task,
    ))
}

/// Start a subscription that runs `on_message` for each delivery.
pub(crate) async fn open_callback<C: LedgerClient>(
    client: Arc<C>,
    query: SubscriptionQuery,
    guarantee: DeliveryGuarantee,
    on_message: MessageCallback,
) -> Result<SubscriptionHandle, TopicError> {
    let topic_id = query.topic_id;
    let started = start_worker(client, query, guarantee, CallbackSink(on_message)).await?;

    Ok(SubscriptionHandle::new(
        started.id,
        topic_id,
        started.cancel,
        started.task,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::simulated::{connect, SimulatedClient, SimulatedNetworkConfig};
    use crate::domain::entities::OperatorIdentity;
    use crate::domain::transactions::{Transaction, TransactionBody};
    use crate::ports::outbound::NetworkProfile;
    use shared_crypto::PrivateKey;
    use shared_types::{AccountId, ChunkInfo, TopicId, TransactionId, TransactionReceipt};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};
    use tokio_stream::StreamExt;

    fn local(config: SimulatedNetworkConfig) -> Arc<SimulatedClient> {
        let operator =
            OperatorIdentity::new(AccountId::from_num(2), PrivateKey::generate_ed25519());
        Arc::new(connect(NetworkProfile::Local, operator, config).unwrap())
    }

    async fn wait_final(client: &SimulatedClient, tx_id: TransactionId) -> TransactionReceipt {
        timeout(Duration::from_secs(2), async {
            loop {
                let receipt = client.get_receipt(tx_id).await.unwrap();
                if receipt.status.is_final() {
                    return receipt;
                }
                sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("receipt")
    }

    async fn new_topic(client: &SimulatedClient) -> TopicId {
        let tx = Transaction::new(
            TransactionId::generate(client.operator()),
            TransactionBody::TopicCreate {
                memo: String::new(),
                admin_key: None,
                submit_key: None,
            },
        );
        let tx_id = tx.transaction_id;
        client.submit(tx).await.unwrap();
        wait_final(client, tx_id).await.topic_id.unwrap()
    }

    async fn publish(client: &SimulatedClient, topic_id: TopicId, payload: &[u8]) {
        let tx = Transaction::new(
            TransactionId::generate(client.operator()),
            TransactionBody::TopicMessageSubmit {
                topic_id,
                message: payload.to_vec(),
                chunk_info: None,
            },
        );
        let tx_id = tx.transaction_id;
        client.submit(tx).await.unwrap();
        wait_final(client, tx_id).await;
    }

    async fn publish_chunk(
        client: &SimulatedClient,
        topic_id: TopicId,
        initial: TransactionId,
        number: u32,
        total: u32,
        part: &[u8],
    ) {
        let tx = Transaction::new(
            initial.with_nanos_offset(number - 1),
            TransactionBody::TopicMessageSubmit {
                topic_id,
                message: part.to_vec(),
                chunk_info: Some(ChunkInfo {
                    initial_transaction_id: initial,
                    total,
                    number,
                }),
            },
        );
        let tx_id = tx.transaction_id;
        client.submit(tx).await.unwrap();
        wait_final(client, tx_id).await;
    }

    async fn next(subscription: &mut TopicSubscription) -> DeliveredMessage {
        timeout(Duration::from_secs(1), subscription.recv())
            .await
            .expect("timeout")
            .expect("message")
    }

    #[tokio::test]
    async fn test_history_then_live_in_order() {
        let client = local(SimulatedNetworkConfig::default());
        let topic_id = new_topic(&client).await;
        publish(&client, topic_id, b"before").await;

        let mut sub = open_stream(
            client.clone(),
            SubscriptionQuery::new(topic_id),
            DeliveryGuarantee::BestEffort,
            16,
        )
        .await
        .unwrap();

        publish(&client, topic_id, b"after").await;

        assert_eq!(next(&mut sub).await.contents, b"before");
        let live = next(&mut sub).await;
        assert_eq!(live.contents, b"after");
        assert_eq!(live.sequence_number, 2);
    }

    #[tokio::test]
    async fn test_subscribe_unknown_topic_fails() {
        let client = local(SimulatedNetworkConfig::default());
        let result = open_stream(
            client,
            SubscriptionQuery::new(TopicId::from_num(9999)),
            DeliveryGuarantee::BestEffort,
            16,
        )
        .await;
        assert!(matches!(result, Err(TopicError::Subscription(_))));
    }

    #[tokio::test]
    async fn test_subscribe_unreachable_fails() {
        let client = local(SimulatedNetworkConfig::default());
        let topic_id = new_topic(&client).await;
        client.network().set_reachable(false);

        let result = open_stream(
            client.clone(),
            SubscriptionQuery::new(topic_id),
            DeliveryGuarantee::BestEffort,
            16,
        )
        .await;
        assert!(matches!(result, Err(TopicError::Subscription(_))));
    }

    #[tokio::test]
    async fn test_limit_ends_stream() {
        let client = local(SimulatedNetworkConfig::default());
        let topic_id = new_topic(&client).await;
        for payload in [b"1", b"2", b"3"] {
            publish(&client, topic_id, payload).await;
        }

        let mut sub = open_stream(
            client.clone(),
            SubscriptionQuery::new(topic_id).limit(2),
            DeliveryGuarantee::BestEffort,
            16,
        )
        .await
        .unwrap();

        let seen: Vec<_> = timeout(Duration::from_secs(1), (&mut sub).collect::<Vec<_>>())
            .await
            .expect("stream should end at the limit");
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].contents, b"2");
    }

    #[tokio::test]
    async fn test_chunks_are_reassembled() {
        let client = local(SimulatedNetworkConfig::default());
        let topic_id = new_topic(&client).await;

        let mut sub = open_stream(
            client.clone(),
            SubscriptionQuery::new(topic_id),
            DeliveryGuarantee::BestEffort,
            16,
        )
        .await
        .unwrap();

        let initial = TransactionId::generate(client.operator());
        for (index, part) in [b"hello ".as_slice(), b"world"].into_iter().enumerate() {
            let number = index as u32 + 1;
            let tx = Transaction::new(
                initial.with_nanos_offset(index as u32),
                TransactionBody::TopicMessageSubmit {
                    topic_id,
                    message: part.to_vec(),
                    chunk_info: Some(ChunkInfo {
                        initial_transaction_id: initial,
                        total: 2,
                        number,
                    }),
                },
            );
            client.submit(tx).await.unwrap();
        }

        let message = next(&mut sub).await;
        assert_eq!(message.contents, b"hello world");
        assert_eq!(message.chunk_count, 2);
        assert_eq!(message.sequence_number, 2);
    }

    #[tokio::test]
    async fn test_callback_cancel_stops_delivery() {
        let client = local(SimulatedNetworkConfig::default());
        let topic_id = new_topic(&client).await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handle = open_callback(
            client.clone(),
            SubscriptionQuery::new(topic_id),
            DeliveryGuarantee::BestEffort,
            Box::new(move |message: DeliveredMessage| {
                sink.lock().unwrap().push(message.contents);
            }),
        )
        .await
        .unwrap();

        publish(&client, topic_id, b"first").await;
        timeout(Duration::from_secs(1), async {
            while seen.lock().unwrap().is_empty() {
                sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("first delivery");

        handle.cancel().await;
        publish(&client, topic_id, b"second").await;
        sleep(Duration::from_millis(20)).await;

        assert_eq!(*seen.lock().unwrap(), vec![b"first".to_vec()]);
    }

    #[tokio::test]
    async fn test_at_least_once_replays_after_lag() {
        let config = SimulatedNetworkConfig {
            bus_capacity: 2,
            ..SimulatedNetworkConfig::default()
        };
        let client = local(config);
        let topic_id = new_topic(&client).await;

        // One-slot buffer: the worker blocks on the channel while the bus overflows.
        let mut sub = open_stream(
            client.clone(),
            SubscriptionQuery::new(topic_id),
            DeliveryGuarantee::AtLeastOnce,
            1,
        )
        .await
        .unwrap();

        for i in 0..10u8 {
            publish(&client, topic_id, &[b'0' + i]).await;
        }

        let mut sequences = Vec::new();
        for _ in 0..10 {
            sequences.push(next(&mut sub).await.sequence_number);
        }
        assert_eq!(sequences, (1..=10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_dropping_stream_releases_live_feed() {
        let client = local(SimulatedNetworkConfig::default());
        let topic_id = new_topic(&client).await;

        let sub = open_stream(
            client.clone(),
            SubscriptionQuery::new(topic_id),
            DeliveryGuarantee::BestEffort,
            16,
        )
        .await
        .unwrap();
        assert_eq!(client.network().subscriber_count(), 1);

        sub.cancel().await;
        assert_eq!(client.network().subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_with_full_buffer_returns() {
        let client = local(SimulatedNetworkConfig::default());
        let topic_id = new_topic(&client).await;

        let sub = open_stream(
            client.clone(),
            SubscriptionQuery::new(topic_id),
            DeliveryGuarantee::BestEffort,
            1,
        )
        .await
        .unwrap();

        // Nothing is read: the worker ends up parked on the full buffer.
        for payload in [b"1", b"2", b"3"] {
            publish(&client, topic_id, payload).await;
        }

        timeout(Duration::from_secs(3), sub.cancel())
            .await
            .expect("cancel must not wait for the reader");
        assert_eq!(client.network().subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_history_replay_returns() {
        let client = local(SimulatedNetworkConfig::default());
        let topic_id = new_topic(&client).await;
        for i in 0..6u8 {
            publish(&client, topic_id, &[b'a' + i]).await;
        }

        let sub = open_stream(
            client.clone(),
            SubscriptionQuery::new(topic_id),
            DeliveryGuarantee::AtLeastOnce,
            1,
        )
        .await
        .unwrap();

        timeout(Duration::from_secs(3), sub.cancel())
            .await
            .expect("cancel must interrupt the replay");
        assert_eq!(client.network().subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_best_effort_skips_lagged_messages() {
        let config = SimulatedNetworkConfig {
            bus_capacity: 2,
            ..SimulatedNetworkConfig::default()
        };
        let client = local(config);
        let topic_id = new_topic(&client).await;

        let mut sub = open_stream(
            client.clone(),
            SubscriptionQuery::new(topic_id),
            DeliveryGuarantee::BestEffort,
            1,
        )
        .await
        .unwrap();

        // Sequence 3 opens a chunked message whose tail (11) survives the lag.
        let chunked = TransactionId::generate(client.operator());
        publish(&client, topic_id, b"1").await;
        publish(&client, topic_id, b"2").await;
        publish_chunk(&client, topic_id, chunked, 1, 2, b"head").await;
        for i in 4..=10u8 {
            publish(&client, topic_id, &[b'0' + i]).await;
        }
        publish_chunk(&client, topic_id, chunked, 2, 2, b"tail").await;
        publish(&client, topic_id, b"last").await;

        let mut delivered = Vec::new();
        loop {
            let message = next(&mut sub).await;
            assert_eq!(message.chunk_count, 1, "a partial message was delivered");
            delivered.push(message.sequence_number);
            if message.contents == b"last" {
                break;
            }
        }

        assert_eq!(delivered.first(), Some(&1));
        assert_eq!(delivered.last(), Some(&12));
        assert!(delivered.len() < 12, "lagged messages were not skipped");
        assert!(delivered.windows(2).all(|pair| pair[0] < pair[1]));

        publish(&client, topic_id, b"after").await;
        assert_eq!(next(&mut sub).await.sequence_number, 13);
    }
}
