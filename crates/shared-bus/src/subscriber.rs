//! # Topic Subscriber
//!
//! Defines the subscription side of the topic message bus.

use crate::events::TopicFilter;
use shared_types::TopicMessage;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::debug;

/// One item observed by a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusDelivery {
    /// A message matching the subscription filter.
    Message(TopicMessage),
    /// The subscriber fell behind and this many messages were dropped for it.
    Lagged(u64),
}

/// Decrements the per-filter subscription count when the subscription goes away.
struct SubscriptionGuard {
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,
    filter_key: String,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        let Ok(mut subs) = self.subscriptions.write() else {
            return;
        };
        let Some(count) = subs.get_mut(&self.filter_key) else {
            debug!(topics = %self.filter_key, "Topic subscription dropped");
            return;
        };

        *count = count.saturating_sub(1);
        if *count == 0 {
            subs.remove(&self.filter_key);
        }
        debug!(topics = %self.filter_key, "Topic subscription dropped");
    }
}

/// A subscription handle for receiving topic messages.
///
/// When dropped, the subscription is automatically cleaned up.
pub struct Subscription {
    receiver: broadcast::Receiver<TopicMessage>,
    filter: TopicFilter,
    _guard: SubscriptionGuard,
}

impl Subscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<TopicMessage>,
        filter: TopicFilter,
        subscriptions: Arc<RwLock<HashMap<String, usize>>>,
        filter_key: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            _guard: SubscriptionGuard {
                subscriptions,
                filter_key,
            },
        }
    }

    /// Receive the next message that matches the filter, skipping over lag.
    ///
    /// # Returns
    ///
    /// - `Some(message)` - The next matching message
    /// - `None` - The channel was closed (bus dropped)
    pub async fn recv(&mut self) -> Option<TopicMessage> {
        loop {
            match self.recv_delivery().await? {
                BusDelivery::Message(message) => return Some(message),
                BusDelivery::Lagged(count) => {
                    debug!(lagged = count, "Subscriber lagged, some messages dropped");
                }
            }
        }
    }

    /// Receive the next matching message or a lag notification.
    ///
    /// Consumers that must not lose messages use the lag notification to
    /// backfill from topic history.
    pub async fn recv_delivery(&mut self) -> Option<BusDelivery> {
        loop {
            let message = match self.receiver.recv().await {
                Ok(m) => m,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    return Some(BusDelivery::Lagged(count));
                }
            };

            if self.filter.matches(&message) {
                return Some(BusDelivery::Message(message));
            }
        }
    }

    /// Get the filter for this subscription.
    #[must_use]
    pub fn filter(&self) -> &TopicFilter {
        &self.filter
    }
}
