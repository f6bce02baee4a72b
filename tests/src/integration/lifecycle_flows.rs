//! # Lifecycle Flows
//!
//! Create → publish → delete scenarios through `TopicLifecycleApi`, plus the
//! runtime's configuration and sequence on top of it.
//!
//! ## Flows Tested
//!
//! 1. **Capability topic**: signed publish succeeds, unsigned publish is
//!    refused locally, deletion succeeds once
//! 2. **Open topic**: unsigned publish succeeds, deletion is always refused
//! 3. **Shared network**: two operators interleave on one topic
//! 4. **Runtime**: env configuration → connect → full sequence

#[cfg(test)]
mod tests {
    use crate::fixtures::{
        driver_for, fast_settings, local_client, local_driver, operator, second_driver,
        OPERATOR_NUM,
    };
    use shared_crypto::PrivateKey;
    use shared_types::{AccountId, Status};
    use std::collections::{HashMap, HashSet};
    use std::time::Duration;
    use tokio::time::timeout;
    use topic_lifecycle::{
        connect, AdminCapability, NetworkProfile, SimulatedNetworkConfig, TopicCreateOptions,
        TopicError, TopicLifecycleApi, TopicLifecycleDriver, TopicState,
    };
    use topic_runtime::{run_sequence, FileConfig, RunOptions, RuntimeConfig};

    // =============================================================================
    // SCENARIOS
    // =============================================================================

    #[tokio::test]
    async fn test_capability_topic_scenario() {
        let driver = local_driver();
        let cap = AdminCapability::generate();

        let topic = driver.create_topic(Some(&cap)).await.unwrap();

        let receipt = driver.publish(&topic, b"A", Some(&cap)).await.unwrap();
        assert_eq!(receipt.status, Status::Success);

        let published_before = driver.client().network().messages_published();
        let refused = driver.publish(&topic, b"B", None).await;
        assert!(matches!(refused, Err(TopicError::Authorization(_))));
        assert_eq!(driver.client().network().messages_published(), published_before);

        let deleted = driver.delete_topic(&topic, Some(&cap)).await.unwrap();
        assert_eq!(deleted.status, Status::Success);

        let again = driver.delete_topic(&topic, Some(&cap)).await;
        assert!(matches!(
            again,
            Err(TopicError::NotFound { topic_id }) if topic_id == topic.topic_id()
        ));
    }

    #[tokio::test]
    async fn test_open_topic_scenario() {
        let driver = local_driver();
        let topic = driver.create_topic(None).await.unwrap();

        let receipt = driver.publish(&topic, b"hello", None).await.unwrap();
        assert_eq!(receipt.status, Status::Success);

        let refused = driver.delete_topic(&topic, None).await;
        assert!(matches!(refused, Err(TopicError::Authorization(_))));

        let info = driver.topic_info(&topic).await.unwrap();
        assert_eq!(info.state, TopicState::Active);
        assert!(info.admin_key.is_none());
        assert!(!info.requires_submit_signature());
    }

    #[tokio::test]
    async fn test_sequence_numbers_and_running_hash_progress() {
        let driver = local_driver();
        let topic = driver.create_topic(None).await.unwrap();

        let mut hashes = HashSet::new();
        for expected in 1..=5u64 {
            let receipt = driver
                .publish(&topic, format!("message {expected}").as_bytes(), None)
                .await
                .unwrap();
            assert_eq!(receipt.topic_sequence_number, Some(expected));
            let hash = receipt.topic_running_hash.expect("running hash on submit receipt");
            assert!(hashes.insert(hash), "running hash repeated at {expected}");
        }

        let info = driver.topic_info(&topic).await.unwrap();
        assert_eq!(info.sequence_number, 5);
        assert!(hashes.contains(&info.running_hash));
    }

    #[tokio::test]
    async fn test_topics_get_distinct_ids() {
        let driver = local_driver();
        let first = driver.create_topic(None).await.unwrap();
        let second = driver.create_topic(None).await.unwrap();
        assert_ne!(first, second);

        driver.publish(&first, b"only first", None).await.unwrap();
        assert_eq!(driver.topic_info(&first).await.unwrap().sequence_number, 1);
        assert_eq!(driver.topic_info(&second).await.unwrap().sequence_number, 0);
    }

    #[tokio::test]
    async fn test_two_operators_share_one_topic() {
        let alice = local_driver();
        let bob = second_driver(alice.client().network(), 77);

        let alice_cap = AdminCapability::generate();
        let bob_submit = AdminCapability::generate();
        let topic = alice
            .create_topic_with(
                TopicCreateOptions::default()
                    .admin(alice_cap.clone())
                    .submit_key(bob_submit.public_key()),
            )
            .await
            .unwrap();

        let mut sub = alice.subscribe(&topic).await.unwrap();
        let payload = vec![b'b'; 2000];
        bob.publish(&topic, &payload, Some(&bob_submit)).await.unwrap();

        let delivered = timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("timeout")
            .expect("message");
        assert_eq!(delivered.contents, payload);
        assert_eq!(delivered.chunk_count, 2);
        let initial = delivered.initial_transaction_id.expect("chunked message id");
        assert_eq!(initial.account_id, AccountId::from_num(77));

        let refused = bob.delete_topic(&topic, Some(&bob_submit)).await;
        assert!(matches!(refused, Err(TopicError::Authorization(_))));
        alice.delete_topic(&topic, Some(&alice_cap)).await.unwrap();
        sub.cancel().await;
    }

    #[tokio::test]
    async fn test_public_profiles_need_remote_transport() {
        for profile in [
            NetworkProfile::Testnet,
            NetworkProfile::Previewnet,
            NetworkProfile::Mainnet,
        ] {
            let result =
                connect(profile, operator(OPERATOR_NUM), SimulatedNetworkConfig::default());
            assert!(matches!(result, Err(TopicError::Configuration(_))));
        }
    }

    // =============================================================================
    // RUNTIME
    // =============================================================================

    fn env_lookup(pairs: Vec<(&'static str, String)>) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<&'static str, String> = pairs.into_iter().collect();
        move |key: &str| map.get(key).cloned()
    }

    #[tokio::test]
    async fn test_runtime_sequence_with_operator_as_admin() {
        let key = PrivateKey::generate_ed25519();
        let config = RuntimeConfig::resolve(
            FileConfig::default(),
            env_lookup(vec![
                ("OPERATOR_ID", "0.0.1234".to_string()),
                ("OPERATOR_KEY", key.to_der_hex()),
                ("LEDGER_RECEIPT_POLL_MS", "1".to_string()),
            ]),
        )
        .unwrap();

        let client = connect(
            config.profile,
            config.operator.clone(),
            SimulatedNetworkConfig::default(),
        )
        .unwrap();
        let driver = TopicLifecycleDriver::with_settings(
            std::sync::Arc::new(client),
            config.driver.clone(),
        );

        let admin = AdminCapability::new(config.operator.private_key.clone());
        let options = RunOptions::new(vec!["Hello from the topic runtime!".into()], Some(admin));
        let report = run_sequence(&driver, &options).await.unwrap();

        assert_eq!(report.published[0].status, Status::Success);
        assert_eq!(report.delivered.len(), 1);
        assert_eq!(
            report.delivered[0].contents_lossy(),
            "Hello from the topic runtime!"
        );
        let deletion = report.deletion.expect("deletion requested").unwrap();
        assert_eq!(deletion.status, Status::Success);
    }

    #[test]
    fn test_runtime_config_missing_operator_is_configuration_error() {
        let err = RuntimeConfig::resolve(FileConfig::default(), env_lookup(vec![])).unwrap_err();
        assert!(matches!(TopicError::from(err), TopicError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_memo_limit_enforced_by_network() {
        let config = SimulatedNetworkConfig {
            max_memo_bytes: 8,
            ..SimulatedNetworkConfig::default()
        };
        let driver = driver_for(local_client(config), fast_settings());

        driver
            .create_topic_with(TopicCreateOptions::default().memo("8 bytes!"))
            .await
            .unwrap();
        let refused = driver
            .create_topic_with(TopicCreateOptions::default().memo("nine byte"))
            .await;
        assert_eq!(
            refused.unwrap_err(),
            TopicError::ConsensusRejected {
                status: Status::MemoTooLong
            }
        );
    }
}
