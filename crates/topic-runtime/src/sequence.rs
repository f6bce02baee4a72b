//! # Lifecycle Sequence
//!
//! One pass of create → subscribe → publish → delete against any
//! `TopicLifecycleApi`.
//!
//! A failure in create, subscribe or publish aborts the remaining steps.
//! The deletion outcome is reported rather than propagated, so a refused
//! deletion of a topic without an admin key is still a complete run.

use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use topic_lifecycle::{
    AdminCapability, DeliveredMessage, OperationReceipt, PublishOptions, TopicCreateOptions,
    TopicError, TopicHandle, TopicLifecycleApi,
};
use tracing::{info, warn};

/// What one run does.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Messages published in order.
    pub messages: Vec<String>,
    /// Topic memo.
    pub memo: Option<String>,
    /// Capability bound to the topic as admin and submit key.
    pub admin: Option<AdminCapability>,
    pub subscribe: bool,
    pub delete: bool,
    /// How long to wait for self-delivery after the last publication.
    pub delivery_wait: Duration,
}

impl RunOptions {
    /// Publish `messages` to a topic administered by `admin`.
    pub fn new(messages: Vec<String>, admin: Option<AdminCapability>) -> Self {
        Self {
            messages,
            memo: None,
            admin,
            subscribe: true,
            delete: true,
            delivery_wait: Duration::from_secs(5),
        }
    }
}

/// Outcome of one run.
#[derive(Debug)]
pub struct RunReport {
    pub topic: TopicHandle,
    /// One receipt per published message (the last chunk's receipt).
    pub published: Vec<OperationReceipt>,
    /// Messages received back through the subscription.
    pub delivered: Vec<DeliveredMessage>,
    /// `None` when deletion was not requested.
    pub deletion: Option<Result<OperationReceipt, TopicError>>,
}

/// Drive one topic through its lifecycle.
pub async fn run_sequence<A>(api: &A, options: &RunOptions) -> Result<RunReport, TopicError>
where
    A: TopicLifecycleApi + ?Sized,
{
    let topic = match (&options.memo, &options.admin) {
        (None, admin) => api.create_topic(admin.as_ref()).await?,
        (Some(memo), admin) => {
            let create = match admin {
                Some(admin) => TopicCreateOptions::with_capability(admin.clone()),
                None => TopicCreateOptions::default(),
            };
            api.create_topic_with(create.memo(memo.clone())).await?
        }
    };
    info!(topic = %topic, "Topic ready");

    let subscription = if options.subscribe {
        Some(api.subscribe(&topic).await?)
    } else {
        None
    };

    let publish = PublishOptions {
        signer: options.admin.clone(),
        ..PublishOptions::default()
    };
    let mut published = Vec::with_capacity(options.messages.len());
    for message in &options.messages {
        let receipt = api.publish_with(&topic, message.as_bytes(), &publish).await?;
        info!(
            topic = %topic,
            status = %receipt.status,
            sequence = ?receipt.topic_sequence_number,
            "Message published"
        );
        published.push(receipt);
    }

    let mut delivered = Vec::new();
    if let Some(mut stream) = subscription {
        let deadline = Instant::now() + options.delivery_wait;
        while delivered.len() < options.messages.len() {
            match timeout_at(deadline, stream.recv()).await {
                Ok(Some(message)) => delivered.push(message),
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        topic = %topic,
                        received = delivered.len(),
                        expected = options.messages.len(),
                        "Stopped waiting for delivery"
                    );
                    break;
                }
            }
        }
        stream.cancel().await;
    }

    let deletion = if options.delete {
        let outcome = api.delete_topic(&topic, options.admin.as_ref()).await;
        match &outcome {
            Ok(receipt) => info!(topic = %topic, status = %receipt.status, "Topic deleted"),
            Err(e) => warn!(topic = %topic, error = %e, "Topic not deleted"),
        }
        Some(outcome)
    } else {
        None
    };

    Ok(RunReport {
        topic,
        published,
        delivered,
        deletion,
    })
}
