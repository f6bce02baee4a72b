//! # Failure Injection
//!
//! A `LedgerClient` wrapper that breaks one part of the port at a time, to
//! check how the driver surfaces transport faults.
//!
//! ## Faults
//!
//! | Fault | Expected error |
//! |-------|----------------|
//! | receipts never settle | `NetworkError::Timeout { operation: "receipt" }` |
//! | submit never answers | `NetworkError::Timeout { operation: "submit" }` |
//! | live feed refused | `TopicError::Subscription` |
//! | history unavailable | `TopicError::Subscription` |
//! | network offline | `TopicError::Network` / `TopicError::Subscription` |

use async_trait::async_trait;
use shared_bus::Subscription;
use shared_types::{AccountId, Status, TopicId, TopicMessage, TransactionId, TransactionReceipt};
use std::sync::atomic::{AtomicUsize, Ordering};
use topic_lifecycle::{
    LedgerClient, NetworkError, SimulatedClient, SubscriptionQuery, TopicError, TopicInfo,
    Transaction, TransactionResponse,
};

/// Part of the port to break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    None,
    ReceiptsNeverSettle,
    SubmitHangs,
    SubscribeRefused,
    HistoryUnavailable,
}

/// Simulated client with one injected fault.
pub struct FaultyClient {
    inner: SimulatedClient,
    fault: Fault,
    submissions: AtomicUsize,
}

impl FaultyClient {
    pub fn new(inner: SimulatedClient, fault: Fault) -> Self {
        Self {
            inner,
            fault,
            submissions: AtomicUsize::new(0),
        }
    }

    /// Transactions that reached `submit`.
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &SimulatedClient {
        &self.inner
    }
}

#[async_trait]
impl LedgerClient for FaultyClient {
    fn operator(&self) -> AccountId {
        self.inner.operator()
    }

    async fn submit(&self, transaction: Transaction) -> Result<TransactionResponse, TopicError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        if self.fault == Fault::SubmitHangs {
            std::future::pending::<()>().await;
        }
        self.inner.submit(transaction).await
    }

    async fn get_receipt(
        &self,
        transaction_id: TransactionId,
    ) -> Result<TransactionReceipt, TopicError> {
        if self.fault == Fault::ReceiptsNeverSettle {
            return Ok(TransactionReceipt::with_status(transaction_id, Status::Unknown));
        }
        self.inner.get_receipt(transaction_id).await
    }

    async fn subscribe(&self, query: &SubscriptionQuery) -> Result<Subscription, TopicError> {
        if self.fault == Fault::SubscribeRefused {
            return Err(NetworkError::Transport("mirror refused the stream".into()).into());
        }
        self.inner.subscribe(query).await
    }

    async fn message_history(
        &self,
        query: &SubscriptionQuery,
        after_sequence: u64,
    ) -> Result<Vec<TopicMessage>, TopicError> {
        if self.fault == Fault::HistoryUnavailable {
            return Err(NetworkError::Unreachable("mirror history offline".into()).into());
        }
        self.inner.message_history(query, after_sequence).await
    }

    async fn topic_info(&self, topic_id: TopicId) -> Result<TopicInfo, TopicError> {
        self.inner.topic_info(topic_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{driver_for, fast_settings, local_client, local_driver};
    use std::time::Duration;
    use topic_lifecycle::{
        DeliveredMessage, DriverSettings, SimulatedNetworkConfig, TopicHandle, TopicLifecycleApi,
        TopicLifecycleDriver,
    };

    fn faulty(fault: Fault, settings: DriverSettings) -> TopicLifecycleDriver<FaultyClient> {
        let client = FaultyClient::new(local_client(SimulatedNetworkConfig::default()), fault);
        driver_for(client, settings)
    }

    /// Create a topic through a healthy driver on the faulty client's network.
    async fn topic_on(driver: &TopicLifecycleDriver<FaultyClient>) -> TopicHandle {
        let healthy = TopicLifecycleDriver::with_settings(
            std::sync::Arc::new(driver.client().inner().clone()),
            fast_settings(),
        );
        healthy.create_topic(None).await.unwrap()
    }

    #[tokio::test]
    async fn test_unsettled_receipt_times_out() {
        let settings = DriverSettings {
            receipt_timeout: Duration::from_millis(40),
            ..fast_settings()
        };
        let driver = faulty(Fault::ReceiptsNeverSettle, settings);

        let err = driver.create_topic(None).await.unwrap_err();
        assert!(matches!(
            err,
            TopicError::Network(NetworkError::Timeout { operation: "receipt", .. })
        ));
        assert_eq!(driver.client().submissions(), 1);
    }

    #[tokio::test]
    async fn test_hanging_submit_hits_request_timeout() {
        let settings = DriverSettings {
            request_timeout: Duration::from_millis(30),
            ..fast_settings()
        };
        let driver = faulty(Fault::SubmitHangs, settings);
        let topic = topic_on(&driver).await;

        let err = driver.publish(&topic, b"stuck", None).await.unwrap_err();
        assert!(matches!(
            err,
            TopicError::Network(NetworkError::Timeout { operation: "submit", waited })
                if waited == Duration::from_millis(30)
        ));
        assert_eq!(driver.topic_info(&topic).await.unwrap().sequence_number, 0);
    }

    #[tokio::test]
    async fn test_refused_feed_is_subscription_error() {
        let driver = faulty(Fault::SubscribeRefused, fast_settings());
        let topic = topic_on(&driver).await;

        let err = driver.subscribe(&topic).await.unwrap_err();
        assert!(matches!(err, TopicError::Subscription(_)));
    }

    #[tokio::test]
    async fn test_missing_history_is_subscription_error() {
        let driver = faulty(Fault::HistoryUnavailable, fast_settings());
        let topic = topic_on(&driver).await;

        let err = driver
            .subscribe_with(&topic, Box::new(|_: DeliveredMessage| {}))
            .await
            .unwrap_err();
        assert!(matches!(err, TopicError::Subscription(_)));
        assert_eq!(driver.client().inner().network().subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_healthy_wrapper_passes_through() {
        let driver = faulty(Fault::None, fast_settings());
        let topic = driver.create_topic(None).await.unwrap();
        let receipt = driver.publish(&topic, b"fine", None).await.unwrap();
        assert_eq!(receipt.topic_sequence_number, Some(1));
        assert_eq!(driver.client().submissions(), 2);
    }

    #[tokio::test]
    async fn test_offline_network_fails_every_operation() {
        let driver = local_driver();
        let topic = driver.create_topic(None).await.unwrap();
        driver.client().network().set_reachable(false);

        assert!(matches!(
            driver.create_topic(None).await,
            Err(TopicError::Network(NetworkError::Unreachable(_)))
        ));
        assert!(matches!(
            driver.publish(&topic, b"x", None).await,
            Err(TopicError::Network(_))
        ));
        assert!(matches!(
            driver.subscribe(&topic).await,
            Err(TopicError::Subscription(_))
        ));

        driver.client().network().set_reachable(true);
        driver.publish(&topic, b"back online", None).await.unwrap();
    }
}
