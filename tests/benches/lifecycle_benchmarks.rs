//! # Topic Lifecycle Benchmarks
//!
//! | Area | Operation |
//! |------|-----------|
//! | Chunking | split a payload and reassemble it |
//! | Running hash | SHA-384 chain step per message |
//! | Signatures | sign and verify a topic message transaction |
//! | Simulated network | publish with receipt acknowledgement |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shared_crypto::PrivateKey;
use shared_types::{AccountId, ChunkInfo, ConsensusTimestamp, TopicId, TopicMessage, TransactionId};
use std::sync::Arc;
use std::time::Duration;
use topic_lifecycle::adapters::simulated::next_running_hash;
use topic_lifecycle::{
    connect, split_message, ChunkAssembler, DriverSettings, NetworkProfile, OperatorIdentity,
    SimulatedNetworkConfig, TopicLifecycleApi, TopicLifecycleDriver, Transaction,
    TransactionBody, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CHUNKS,
};

// ============================================================================
// Chunking
// ============================================================================

fn bench_chunk_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunking");
    let topic_id = TopicId::from_num(1001);
    let initial = TransactionId::generate(AccountId::from_num(2));

    for size in [512usize, 4 * 1024, 16 * 1024] {
        let payload = vec![0x5Au8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(
            BenchmarkId::new("split_and_reassemble", size),
            &payload,
            |b, payload| {
                b.iter(|| {
                    let chunks = split_message(payload, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CHUNKS)
                        .expect("payload fits");
                    let total = chunks.len() as u32;
                    let mut assembler = ChunkAssembler::new();
                    let mut out = None;
                    for (index, chunk) in chunks.into_iter().enumerate() {
                        out = assembler.push(TopicMessage {
                            topic_id,
                            consensus_timestamp: ConsensusTimestamp::new(1, index as u32),
                            contents: chunk.to_vec(),
                            running_hash: [0u8; 48],
                            sequence_number: index as u64 + 1,
                            chunk_info: (total > 1).then_some(ChunkInfo {
                                initial_transaction_id: initial,
                                total,
                                number: index as u32 + 1,
                            }),
                        });
                    }
                    black_box(out)
                })
            },
        );
    }
    group.finish();
}

// ============================================================================
// Running hash
// ============================================================================

fn bench_running_hash(c: &mut Criterion) {
    let topic_id = TopicId::from_num(1001);
    let message = vec![7u8; DEFAULT_CHUNK_SIZE];

    c.bench_function("running_hash/next", |b| {
        let mut hash = [0u8; 48];
        let mut sequence = 0u64;
        b.iter(|| {
            sequence += 1;
            hash = next_running_hash(
                &hash,
                topic_id,
                ConsensusTimestamp::new(sequence, 0),
                sequence,
                black_box(&message),
            );
        })
    });
}

// ============================================================================
// Signatures
// ============================================================================

fn bench_transaction_signing(c: &mut Criterion) {
    let mut group = c.benchmark_group("transaction_signing");

    for (name, key) in [
        ("ed25519", PrivateKey::generate_ed25519()),
        ("secp256k1", PrivateKey::generate_secp256k1()),
    ] {
        let public_key = key.public_key();
        let body = TransactionBody::TopicMessageSubmit {
            topic_id: TopicId::from_num(1001),
            message: vec![1u8; 256],
            chunk_info: None,
        };
        let transaction_id = TransactionId::generate(AccountId::from_num(2));

        group.bench_function(BenchmarkId::new("sign", name), |b| {
            b.iter(|| Transaction::new(transaction_id, body.clone()).signed_with(&key))
        });

        let signed = Transaction::new(transaction_id, body.clone()).signed_with(&key);
        group.bench_function(BenchmarkId::new("verify", name), |b| {
            b.iter(|| black_box(signed.is_signed_by(&public_key)))
        });
    }
    group.finish();
}

// ============================================================================
// Simulated network
// ============================================================================

fn bench_publish_with_receipt(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    let driver = runtime.block_on(async {
        let operator =
            OperatorIdentity::new(AccountId::from_num(2), PrivateKey::generate_ed25519());
        let client = connect(NetworkProfile::Local, operator, SimulatedNetworkConfig::default())
            .expect("local profile");
        let settings = DriverSettings {
            receipt_poll_interval: Duration::from_millis(1),
            ..DriverSettings::default()
        };
        TopicLifecycleDriver::with_settings(Arc::new(client), settings)
    });
    let topic = runtime
        .block_on(driver.create_topic(None))
        .expect("topic created");

    let mut group = c.benchmark_group("simulated_network");
    group.measurement_time(Duration::from_secs(10));
    group.bench_function("publish_with_receipt", |b| {
        b.iter(|| {
            runtime
                .block_on(driver.publish(&topic, b"benchmark message", None))
                .expect("published")
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_chunk_round_trip,
    bench_running_hash,
    bench_transaction_signing,
    bench_publish_with_receipt
);
criterion_main!(benches);
