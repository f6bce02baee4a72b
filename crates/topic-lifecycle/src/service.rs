//! # Topic Lifecycle Service
//!
//! `TopicLifecycleDriver` implements `TopicLifecycleApi` on top of any
//! `LedgerClient`.
//!
//! Every state-changing call builds a transaction, signs it with the
//! caller's capability, submits it and polls the receipt until it is final.
//! Receipt statuses are mapped onto `TopicError`.

use crate::adapters::delivery;
use crate::domain::chunking::split_message;
use crate::domain::entities::{
    AdminCapability, DeliveryGuarantee, OperationReceipt, PublishOptions, SubscriptionQuery,
    TopicCreateOptions, TopicHandle, TopicInfo,
};
use crate::domain::errors::{NetworkError, TopicError};
use crate::domain::transactions::{Transaction, TransactionBody};
use crate::ports::inbound::{MessageCallback, TopicLifecycleApi};
use crate::ports::outbound::LedgerClient;
use crate::ports::subscription::{SubscriptionHandle, TopicSubscription};
use async_trait::async_trait;
use ledger_telemetry::{
    metric_inc, time_histogram, CHUNKS_SUBMITTED, LIFECYCLE_ERRORS, MESSAGES_SUBMITTED,
    RECEIPT_WAIT_DURATION, TOPICS_CREATED, TOPICS_DELETED, TRANSACTIONS_REJECTED,
};
use shared_types::{ChunkInfo, TopicId, TransactionId, TransactionReceipt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

/// Timing and delivery settings of a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverSettings {
    /// Longest wait for a final receipt.
    pub receipt_timeout: Duration,
    /// Pause between receipt polls.
    pub receipt_poll_interval: Duration,
    /// Bound on each individual network round trip.
    pub request_timeout: Duration,
    /// Lag handling of new subscriptions.
    pub delivery: DeliveryGuarantee,
    /// Undelivered messages a pull subscription buffers.
    pub subscription_buffer: usize,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            receipt_timeout: Duration::from_secs(30),
            receipt_poll_interval: Duration::from_millis(50),
            request_timeout: Duration::from_secs(10),
            delivery: DeliveryGuarantee::BestEffort,
            subscription_buffer: 1024,
        }
    }
}

/// Topic lifecycle driver.
///
/// The ledger client is injected and shared with every subscription task.
pub struct TopicLifecycleDriver<C: LedgerClient> {
    client: Arc<C>,
    settings: DriverSettings,
}

impl<C: LedgerClient> TopicLifecycleDriver<C> {
    /// Create a driver with default settings.
    pub fn new(client: Arc<C>) -> Self {
        Self::with_settings(client, DriverSettings::default())
    }

    /// Create a driver with explicit settings.
    pub fn with_settings(client: Arc<C>, settings: DriverSettings) -> Self {
        Self { client, settings }
    }

    /// The injected ledger client.
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    /// Bound one round trip by the request timeout.
    async fn round_trip<T, F>(&self, operation: &'static str, request: F) -> Result<T, TopicError>
    where
        F: Future<Output = Result<T, TopicError>>,
    {
        match time::timeout(self.settings.request_timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(NetworkError::Timeout {
                operation,
                waited: self.settings.request_timeout,
            }
            .into()),
        }
    }

    /// Poll until the receipt of `transaction_id` is final.
    async fn await_receipt(
        &self,
        transaction_id: TransactionId,
    ) -> Result<TransactionReceipt, TopicError> {
        let _timer = time_histogram!(RECEIPT_WAIT_DURATION);
        let deadline = Instant::now() + self.settings.receipt_timeout;
        let period = self.settings.receipt_poll_interval.max(Duration::from_millis(1));
        let mut poll = time::interval(period);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            poll.tick().await;
            let receipt = self
                .round_trip("receipt", self.client.get_receipt(transaction_id))
                .await?;
            if receipt.status.is_final() {
                return Ok(receipt);
            }
            if Instant::now() >= deadline {
                warn!(transaction = %transaction_id, "Receipt not final before deadline");
                return Err(NetworkError::Timeout {
                    operation: "receipt",
                    waited: self.settings.receipt_timeout,
                }
                .into());
            }
        }
    }

    /// Submit, wait for the receipt, and map a failed status onto an error.
    async fn execute(&self, transaction: Transaction) -> Result<TransactionReceipt, TopicError> {
        let transaction_id = transaction.transaction_id;
        let topic_id = transaction.body.topic_id();
        let kind = transaction.body.kind();

        self.round_trip("submit", self.client.submit(transaction)).await?;
        let receipt = self.await_receipt(transaction_id).await?;

        if !receipt.status.is_success() {
            metric_inc!(TRANSACTIONS_REJECTED, &[receipt.status.as_str()]);
            debug!(
                transaction = %transaction_id,
                kind,
                status = %receipt.status,
                "Transaction failed"
            );
            return Err(TopicError::from_status(receipt.status, topic_id));
        }
        Ok(receipt)
    }

    fn new_transaction(&self, body: TransactionBody) -> Transaction {
        Transaction::new(TransactionId::generate(self.client.operator()), body)
    }

    fn record_failure<T>(
        operation: &'static str,
        result: Result<T, TopicError>,
    ) -> Result<T, TopicError> {
        if let Err(e) = &result {
            metric_inc!(LIFECYCLE_ERRORS, &[operation, e.kind()]);
            warn!(operation, error = %e, "Topic operation failed");
        }
        result
    }

    /// Reject a publication locally when the topic demands a signature it will not get.
    fn check_submit_authority(
        info: &TopicInfo,
        signer: Option<&AdminCapability>,
    ) -> Result<(), TopicError> {
        let Some(submit_key) = info.submit_key else {
            return Ok(());
        };
        match signer {
            None => Err(TopicError::Authorization(format!(
                "topic {} requires a submit key signature",
                info.topic_id
            ))),
            Some(signer) if signer.public_key() != submit_key => Err(TopicError::Authorization(
                format!("signer does not hold the submit key of topic {}", info.topic_id),
            )),
            Some(_) => Ok(()),
        }
    }

    async fn create(&self, options: TopicCreateOptions) -> Result<TopicHandle, TopicError> {
        let mut transaction = self.new_transaction(TransactionBody::TopicCreate {
            memo: options.memo.clone(),
            admin_key: options.admin.as_ref().map(AdminCapability::public_key),
            submit_key: options.submit_key,
        });
        if let Some(admin) = &options.admin {
            transaction.sign_with(admin.private_key());
        }

        let receipt = self.execute(transaction).await?;
        let topic_id = receipt.topic_id.ok_or_else(|| {
            TopicError::Network(NetworkError::Transport(
                "creation receipt carries no topic id".into(),
            ))
        })?;

        metric_inc!(TOPICS_CREATED);
        info!(
            topic = %topic_id,
            admin_key = options.admin.is_some(),
            submit_key = options.submit_key.is_some(),
            "Topic created"
        );
        Ok(TopicHandle::new(topic_id))
    }

    async fn publish_chunks(
        &self,
        topic_id: TopicId,
        payload: &[u8],
        options: &PublishOptions,
    ) -> Result<OperationReceipt, TopicError> {
        let chunks = split_message(payload, options.chunk_size, options.max_chunks)?;

        let info = self
            .round_trip("topic info", self.client.topic_info(topic_id))
            .await?;
        Self::check_submit_authority(&info, options.signer.as_ref())?;

        let total = u32::try_from(chunks.len()).unwrap_or(u32::MAX);
        let initial = TransactionId::generate(self.client.operator());
        let mut last_receipt = None;

        for (index, chunk) in chunks.into_iter().enumerate() {
            let number = u32::try_from(index).unwrap_or(u32::MAX) + 1;
            let chunk_info = (total > 1).then_some(ChunkInfo {
                initial_transaction_id: initial,
                total,
                number,
            });

            let mut transaction = Transaction::new(
                initial.with_nanos_offset(number - 1),
                TransactionBody::TopicMessageSubmit {
                    topic_id,
                    message: chunk.to_vec(),
                    chunk_info,
                },
            );
            if let Some(signer) = &options.signer {
                transaction.sign_with(signer.private_key());
            }

            let receipt = self.execute(transaction).await?;
            metric_inc!(CHUNKS_SUBMITTED);
            debug!(
                topic = %topic_id,
                chunk = number,
                total,
                sequence = ?receipt.topic_sequence_number,
                "Chunk reached consensus"
            );
            last_receipt = Some(receipt);
        }

        metric_inc!(MESSAGES_SUBMITTED);
        last_receipt.ok_or(TopicError::ConsensusRejected {
            status: shared_types::Status::InvalidTopicMessage,
        })
    }

    async fn delete(
        &self,
        topic_id: TopicId,
        signer: Option<&AdminCapability>,
    ) -> Result<OperationReceipt, TopicError> {
        let mut transaction = self.new_transaction(TransactionBody::TopicDelete { topic_id });
        if let Some(signer) = signer {
            transaction.sign_with(signer.private_key());
        }

        let receipt = self.execute(transaction).await?;
        metric_inc!(TOPICS_DELETED);
        info!(topic = %topic_id, "Topic deleted");
        Ok(receipt)
    }
}

#[async_trait]
impl<C: LedgerClient> TopicLifecycleApi for TopicLifecycleDriver<C> {
    #[instrument(skip_all, fields(admin = admin.is_some()))]
    async fn create_topic(
        &self,
        admin: Option<&AdminCapability>,
    ) -> Result<TopicHandle, TopicError> {
        let options = match admin {
            Some(admin) => TopicCreateOptions::with_capability(admin.clone()),
            None => TopicCreateOptions::default(),
        };
        Self::record_failure("create_topic", self.create(options).await)
    }

    #[instrument(skip_all, fields(memo = %options.memo))]
    async fn create_topic_with(
        &self,
        options: TopicCreateOptions,
    ) -> Result<TopicHandle, TopicError> {
        Self::record_failure("create_topic", self.create(options).await)
    }

    #[instrument(skip_all, fields(topic = %topic, size = payload.len(), signed = signer.is_some()))]
    async fn publish(
        &self,
        topic: &TopicHandle,
        payload: &[u8],
        signer: Option<&AdminCapability>,
    ) -> Result<OperationReceipt, TopicError> {
        let options = PublishOptions {
            signer: signer.cloned(),
            ..PublishOptions::default()
        };
        self.publish_with(topic, payload, &options).await
    }

    #[instrument(skip_all, fields(topic = %topic, size = payload.len()))]
    async fn publish_with(
        &self,
        topic: &TopicHandle,
        payload: &[u8],
        options: &PublishOptions,
    ) -> Result<OperationReceipt, TopicError> {
        Self::record_failure(
            "publish",
            self.publish_chunks(topic.topic_id(), payload, options).await,
        )
    }

    #[instrument(skip_all, fields(topic = %topic, signed = signer.is_some()))]
    async fn delete_topic(
        &self,
        topic: &TopicHandle,
        signer: Option<&AdminCapability>,
    ) -> Result<OperationReceipt, TopicError> {
        Self::record_failure("delete_topic", self.delete(topic.topic_id(), signer).await)
    }

    async fn topic_info(&self, topic: &TopicHandle) -> Result<TopicInfo, TopicError> {
        self.round_trip("topic info", self.client.topic_info(topic.topic_id()))
            .await
    }

    async fn subscribe(&self, topic: &TopicHandle) -> Result<TopicSubscription, TopicError> {
        self.subscribe_query(SubscriptionQuery::new(topic.topic_id()))
            .await
    }

    #[instrument(skip_all, fields(topic = %query.topic_id))]
    async fn subscribe_query(
        &self,
        query: SubscriptionQuery,
    ) -> Result<TopicSubscription, TopicError> {
        let result = delivery::open_stream(
            self.client.clone(),
            query,
            self.settings.delivery,
            self.settings.subscription_buffer,
        )
        .await;
        Self::record_failure("subscribe", result)
    }

    #[instrument(skip_all, fields(topic = %topic))]
    async fn subscribe_with(
        &self,
        topic: &TopicHandle,
        on_message: MessageCallback,
    ) -> Result<SubscriptionHandle, TopicError> {
        let result = delivery::open_callback(
            self.client.clone(),
            SubscriptionQuery::new(topic.topic_id()),
            self.settings.delivery,
            on_message,
        )
        .await;
        Self::record_failure("subscribe", result)
    }
}
