//! # Delivery Flows
//!
//! Subscription delivery end to end: publish through one driver, receive
//! through stream and callback subscriptions.
//!
//! ## Flows Tested
//!
//! 1. **Round trip**: published bytes equal delivered bytes, chunked or not
//! 2. **Fan-out**: every subscriber sees every message in consensus order
//! 3. **Replay**: subscriptions opened late receive history first
//! 4. **Cancellation**: nothing is delivered after `cancel()` returns, and
//!    `cancel()` returns even when nobody drains the stream
//! 5. **Slow consumer**: at-least-once delivery survives feed lag

#[cfg(test)]
mod tests {
    use crate::fixtures::{driver_for, fast_settings, local_client, local_driver};
    use parking_lot::Mutex;
    use rand::Rng;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};
    use tokio_stream::StreamExt;
    use topic_lifecycle::{
        AdminCapability, DeliveredMessage, DeliveryGuarantee, DriverSettings,
        SimulatedNetworkConfig, SubscriptionQuery, TopicLifecycleApi, TopicSubscription,
    };

    async fn next(sub: &mut TopicSubscription) -> DeliveredMessage {
        timeout(Duration::from_secs(2), sub.next())
            .await
            .expect("delivery timed out")
            .expect("subscription ended")
    }

    #[tokio::test]
    async fn test_round_trip_preserves_bytes() {
        let driver = local_driver();
        let cap = AdminCapability::generate();
        let topic = driver.create_topic(Some(&cap)).await.unwrap();
        let mut sub = driver.subscribe(&topic).await.unwrap();

        let mut rng = rand::thread_rng();
        let small: Vec<u8> = (0..300).map(|_| rng.gen()).collect();
        let large: Vec<u8> = (0..5000).map(|_| rng.gen()).collect();
        let payloads = [b"plain text".to_vec(), small, large, vec![0u8; 1]];

        for payload in &payloads {
            driver.publish(&topic, payload, Some(&cap)).await.unwrap();
        }
        for payload in &payloads {
            let delivered = next(&mut sub).await;
            assert_eq!(&delivered.contents, payload);
            assert_eq!(delivered.topic_id, topic.topic_id());
        }

        sub.cancel().await;
    }

    #[tokio::test]
    async fn test_every_subscriber_sees_consensus_order() {
        let driver = local_driver();
        let topic = driver.create_topic(None).await.unwrap();
        let mut first = driver.subscribe(&topic).await.unwrap();
        let mut second = driver.subscribe(&topic).await.unwrap();
        assert_eq!(driver.client().network().subscriber_count(), 2);

        for i in 0..25 {
            driver
                .publish(&topic, format!("event-{i:02}").as_bytes(), None)
                .await
                .unwrap();
        }

        for sub in [&mut first, &mut second] {
            let mut previous = None;
            for i in 0..25 {
                let message = next(sub).await;
                assert_eq!(message.contents_lossy(), format!("event-{i:02}"));
                if let Some((sequence, timestamp)) = previous {
                    assert_eq!(message.sequence_number, sequence + 1);
                    assert!(message.consensus_timestamp > timestamp);
                }
                previous = Some((message.sequence_number, message.consensus_timestamp));
            }
        }
    }

    #[tokio::test]
    async fn test_late_subscriber_replays_history() {
        let driver = local_driver();
        let topic = driver.create_topic(None).await.unwrap();
        for word in ["one", "two", "three"] {
            driver.publish(&topic, word.as_bytes(), None).await.unwrap();
        }

        let mut sub = driver.subscribe(&topic).await.unwrap();
        driver.publish(&topic, b"four", None).await.unwrap();

        let received: Vec<String> = (&mut sub)
            .take(4)
            .map(|message| message.contents_lossy())
            .collect()
            .await;
        assert_eq!(received, vec!["one", "two", "three", "four"]);
    }

    #[tokio::test]
    async fn test_start_time_and_limit_filter_history() {
        let driver = local_driver();
        let topic = driver.create_topic(None).await.unwrap();
        let mut all = driver.subscribe(&topic).await.unwrap();
        for word in ["early", "middle", "late"] {
            driver.publish(&topic, word.as_bytes(), None).await.unwrap();
        }
        next(&mut all).await;
        let middle = next(&mut all).await;

        let query = SubscriptionQuery::new(topic.topic_id())
            .starting_at(middle.consensus_timestamp)
            .limit(1);
        let mut filtered = driver.subscribe_query(query).await.unwrap();

        assert_eq!(next(&mut filtered).await.contents_lossy(), "middle");
        let end = timeout(Duration::from_secs(1), filtered.recv()).await;
        assert!(matches!(end, Ok(None)));
    }

    #[tokio::test]
    async fn test_cancelled_callback_receives_nothing_further() {
        let driver = local_driver();
        let topic = driver.create_topic(None).await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = driver
            .subscribe_with(
                &topic,
                Box::new(move |message: DeliveredMessage| {
                    sink.lock().push(message.sequence_number)
                }),
            )
            .await
            .unwrap();

        driver.publish(&topic, b"before", None).await.unwrap();
        timeout(Duration::from_secs(2), async {
            while seen.lock().is_empty() {
                sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("first delivery");

        handle.cancel().await;
        for _ in 0..3 {
            driver.publish(&topic, b"after", None).await.unwrap();
        }
        sleep(Duration::from_millis(20)).await;

        assert_eq!(*seen.lock(), vec![1]);
        assert_eq!(driver.client().network().subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_undrained_stream() {
        let settings = DriverSettings {
            subscription_buffer: 1,
            ..fast_settings()
        };
        let driver = driver_for(local_client(SimulatedNetworkConfig::default()), settings);
        let topic = driver.create_topic(None).await.unwrap();
        let sub = driver.subscribe(&topic).await.unwrap();

        for i in 0..3 {
            driver
                .publish(&topic, format!("unread-{i}").as_bytes(), None)
                .await
                .unwrap();
        }

        timeout(Duration::from_secs(3), sub.cancel())
            .await
            .expect("cancel returned while the buffer was full");
        assert_eq!(driver.client().network().subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_at_least_once_survives_slow_consumer() {
        let config = SimulatedNetworkConfig {
            bus_capacity: 4,
            ..SimulatedNetworkConfig::default()
        };
        let settings = DriverSettings {
            delivery: DeliveryGuarantee::AtLeastOnce,
            subscription_buffer: 1,
            ..fast_settings()
        };
        let driver = driver_for(local_client(config), settings);
        let topic = driver.create_topic(None).await.unwrap();
        let mut sub = driver.subscribe(&topic).await.unwrap();

        for i in 1..=30u64 {
            driver
                .publish(&topic, i.to_string().as_bytes(), None)
                .await
                .unwrap();
        }

        for expected in 1..=30u64 {
            let message = next(&mut sub).await;
            assert_eq!(message.sequence_number, expected);
            assert_eq!(message.contents_lossy(), expected.to_string());
        }
    }
}
