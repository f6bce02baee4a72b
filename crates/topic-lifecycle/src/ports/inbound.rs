//! # Inbound Ports (Driving Ports / API)
//!
//! The lifecycle API callers drive a topic through.

use crate::domain::entities::{
    AdminCapability, DeliveredMessage, OperationReceipt, PublishOptions, SubscriptionQuery,
    TopicCreateOptions, TopicHandle, TopicInfo,
};
use crate::domain::errors::TopicError;
use crate::ports::subscription::{SubscriptionHandle, TopicSubscription};
use async_trait::async_trait;

/// Callback invoked once per delivered message.
pub type MessageCallback = Box<dyn FnMut(DeliveredMessage) + Send + 'static>;

/// Create, subscribe to, publish to and delete consensus topics.
///
/// Implementations must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait TopicLifecycleApi: Send + Sync {
    /// Create a topic, optionally bound to an admin capability.
    ///
    /// The capability becomes both admin key and submit key.
    ///
    /// # Errors
    ///
    /// - `TopicError::Network` - transport failure or receipt timeout
    /// - `TopicError::ConsensusRejected` - the network rejected the creation
    async fn create_topic(
        &self,
        admin: Option<&AdminCapability>,
    ) -> Result<TopicHandle, TopicError>;

    /// Create a topic with separate admin/submit keys and a memo.
    async fn create_topic_with(&self, options: TopicCreateOptions)
        -> Result<TopicHandle, TopicError>;

    /// Publish `payload`, signed by `signer` when given.
    ///
    /// # Errors
    ///
    /// - `TopicError::Authorization` - the topic demands a submit signature
    ///   and `signer` is absent or the wrong key; nothing is submitted
    /// - `TopicError::NotFound` - the topic is unknown or deleted
    /// - `TopicError::Network` - transport failure or receipt timeout
    async fn publish(
        &self,
        topic: &TopicHandle,
        payload: &[u8],
        signer: Option<&AdminCapability>,
    ) -> Result<OperationReceipt, TopicError>;

    /// Publish with explicit chunking options. Returns the last chunk's receipt.
    async fn publish_with(
        &self,
        topic: &TopicHandle,
        payload: &[u8],
        options: &PublishOptions,
    ) -> Result<OperationReceipt, TopicError>;

    /// Delete a topic, signed by its admin capability.
    ///
    /// # Errors
    ///
    /// - `TopicError::Authorization` - no admin key on the topic, or `signer`
    ///   does not match it
    /// - `TopicError::NotFound` - already deleted
    async fn delete_topic(
        &self,
        topic: &TopicHandle,
        signer: Option<&AdminCapability>,
    ) -> Result<OperationReceipt, TopicError>;

    /// Network view of a topic.
    async fn topic_info(&self, topic: &TopicHandle) -> Result<TopicInfo, TopicError>;

    /// Subscribe to a topic as a pull stream.
    ///
    /// # Errors
    ///
    /// `TopicError::Subscription` when the listener cannot be registered.
    async fn subscribe(&self, topic: &TopicHandle) -> Result<TopicSubscription, TopicError>;

    /// Subscribe with a start time and/or message limit.
    async fn subscribe_query(
        &self,
        query: SubscriptionQuery,
    ) -> Result<TopicSubscription, TopicError>;

    /// Subscribe with a callback run for each delivered message.
    async fn subscribe_with(
        &self,
        topic: &TopicHandle,
        on_message: MessageCallback,
    ) -> Result<SubscriptionHandle, TopicError>;
}
