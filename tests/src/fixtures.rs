//! # Test Fixtures
//!
//! Shared setup for the integration scenarios.

use shared_crypto::PrivateKey;
use shared_types::AccountId;
use std::sync::Arc;
use std::time::Duration;
use topic_lifecycle::{
    connect, DriverSettings, LedgerClient, NetworkProfile, OperatorIdentity, SimulatedClient,
    SimulatedNetwork, SimulatedNetworkConfig, TopicLifecycleDriver,
};

/// Operator account used unless a test needs a second one.
pub const OPERATOR_NUM: u64 = 2;

/// A fresh Ed25519 operator for account `0.0.<num>`.
pub fn operator(num: u64) -> OperatorIdentity {
    OperatorIdentity::new(AccountId::from_num(num), PrivateKey::generate_ed25519())
}

/// Driver settings that poll receipts every millisecond.
pub fn fast_settings() -> DriverSettings {
    DriverSettings {
        receipt_timeout: Duration::from_secs(5),
        receipt_poll_interval: Duration::from_millis(1),
        request_timeout: Duration::from_secs(5),
        ..DriverSettings::default()
    }
}

/// Wrap any ledger client in a driver with `settings`.
pub fn driver_for<C: LedgerClient>(client: C, settings: DriverSettings) -> TopicLifecycleDriver<C> {
    TopicLifecycleDriver::with_settings(Arc::new(client), settings)
}

/// A simulated client connected through the `local` profile.
pub fn local_client(config: SimulatedNetworkConfig) -> SimulatedClient {
    connect(NetworkProfile::Local, operator(OPERATOR_NUM), config)
        .expect("local profile always connects")
}

/// A driver on a fresh simulated network with default limits.
pub fn local_driver() -> TopicLifecycleDriver<SimulatedClient> {
    driver_for(local_client(SimulatedNetworkConfig::default()), fast_settings())
}

/// A second driver on the same network, paying from account `0.0.<num>`.
pub fn second_driver(
    network: &SimulatedNetwork,
    num: u64,
) -> TopicLifecycleDriver<SimulatedClient> {
    let identity = operator(num);
    network.register_account(identity.account_id, identity.public_key());
    driver_for(network.client(identity), fast_settings())
}
