//! # Subscription Handles
//!
//! What `TopicLifecycleApi::subscribe*` hands back to the caller. Both
//! handles own the cancel signal and the join handle of the delivery task
//! that feeds them.

use crate::domain::entities::DeliveredMessage;
use shared_types::TopicId;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tracing::debug;
use uuid::Uuid;

/// Pull subscription: a stream of delivered messages.
///
/// Dropping it ends the delivery task.
#[derive(Debug)]
pub struct TopicSubscription {
    id: Uuid,
    topic_id: TopicId,
    receiver: mpsc::Receiver<DeliveredMessage>,
    cancel: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl TopicSubscription {
    pub(crate) fn new(
        id: Uuid,
        topic_id: TopicId,
        receiver: mpsc::Receiver<DeliveredMessage>,
        cancel: watch::Sender<bool>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            id,
            topic_id,
            receiver,
            cancel,
            task: Some(task),
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn topic_id(&self) -> TopicId {
        self.topic_id
    }

    /// Next delivered message; `None` once the subscription has ended.
    pub async fn recv(&mut self) -> Option<DeliveredMessage> {
        self.receiver.recv().await
    }

    /// Next delivered message if one is already buffered.
    pub fn try_recv(&mut self) -> Option<DeliveredMessage> {
        self.receiver.try_recv().ok()
    }

    /// Stop deliveries and wait for the delivery task to finish.
    ///
    /// Buffered messages that were not received are discarded.
    pub async fn cancel(mut self) {
        let _ = self.cancel.send(true);
        // Wakes a worker parked on a full buffer.
        self.receiver.close();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        debug!(subscription = %self.id, topic = %self.topic_id, "Subscription cancelled");
    }
}

impl Stream for TopicSubscription {
    type Item = DeliveredMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Handle of a callback subscription.
///
/// Dropping the handle ends the subscription; `cancel` additionally waits
/// for an in-flight callback to return.
#[derive(Debug)]
pub struct SubscriptionHandle {
    id: Uuid,
    topic_id: TopicId,
    cancel: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    pub(crate) fn new(
        id: Uuid,
        topic_id: TopicId,
        cancel: watch::Sender<bool>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            id,
            topic_id,
            cancel,
            task: Some(task),
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn topic_id(&self) -> TopicId {
        self.topic_id
    }

    /// Whether the delivery task has stopped (limit reached, feed closed, ...).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stop deliveries; returns once no callback is running.
    pub async fn cancel(mut self) {
        let _ = self.cancel.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        debug!(subscription = %self.id, topic = %self.topic_id, "Subscription cancelled");
    }
}
