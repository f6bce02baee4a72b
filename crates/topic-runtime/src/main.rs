//! # Topic Runtime
//!
//! Command line entry point.
//!
//! ```text
//! topic-runtime run [--message <TEXT>]... [--memo <TEXT>] [--no-admin-key]
//!                   [--no-subscribe] [--no-delete] [--config <PATH>] [--json]
//! topic-runtime keygen [--secp256k1]
//! ```
//!
//! `run` connects the configured operator and drives one topic through its
//! lifecycle. The operator's own key doubles as the topic's admin key unless
//! `--no-admin-key` is given.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing::{info, Instrument};

use ledger_telemetry::{encode_metrics, init_telemetry, operation_span, TelemetryConfig};
use shared_crypto::PrivateKey;
use topic_lifecycle::{
    connect, AdminCapability, SimulatedNetworkConfig, TopicLifecycleDriver,
};
use topic_runtime::{run_sequence, RunOptions, RunReport, RuntimeConfig};

/// Create, subscribe to, publish to and delete a consensus topic.
#[derive(Parser, Debug)]
#[command(name = "topic-runtime", version)]
#[command(about = "Drive a consensus topic through its lifecycle")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a topic, subscribe, publish and delete it
    Run(RunArgs),
    /// Print a fresh key pair
    Keygen {
        /// Generate a secp256k1 key instead of Ed25519
        #[arg(long)]
        secp256k1: bool,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Message to publish (repeatable, published in order)
    #[arg(short, long = "message", default_value = "Hello from the topic runtime!")]
    messages: Vec<String>,

    /// Topic memo
    #[arg(long)]
    memo: Option<String>,

    /// Create the topic without an admin key (it can then never be deleted)
    #[arg(long)]
    no_admin_key: bool,

    /// Do not subscribe to the topic
    #[arg(long)]
    no_subscribe: bool,

    /// Leave the topic in place
    #[arg(long)]
    no_delete: bool,

    /// TOML configuration file
    #[arg(short, long, env = "TOPIC_RUNTIME_CONFIG")]
    config: Option<PathBuf>,

    /// Milliseconds to wait for published messages to arrive back
    #[arg(long, default_value_t = 5000)]
    delivery_wait_ms: u64,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Print Prometheus metrics after the run
    #[arg(long)]
    metrics: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Keygen { secp256k1 } => {
            keygen(secp256k1);
            Ok(())
        }
        Command::Run(args) => run(args).await,
    }
}

fn keygen(secp256k1: bool) {
    let key = if secp256k1 {
        PrivateKey::generate_secp256k1()
    } else {
        PrivateKey::generate_ed25519()
    };
    println!("private key: {}", key.to_der_hex());
    println!("public key:  {}", key.public_key());
}

async fn run(args: RunArgs) -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("Failed to load .env");
        }
    }

    let _telemetry = init_telemetry(TelemetryConfig::from_env())
        .await
        .context("Failed to initialize telemetry")?;

    let config = RuntimeConfig::load(args.config.as_deref()).context("Invalid configuration")?;
    info!(
        operator = %config.operator.account_id,
        profile = %config.profile,
        delivery = %config.driver.delivery,
        "Configuration loaded"
    );

    let client = connect(
        config.profile,
        config.operator.clone(),
        SimulatedNetworkConfig::default(),
    )
    .context("Failed to connect to network")?;
    let driver = TopicLifecycleDriver::with_settings(Arc::new(client), config.driver.clone());

    let admin = (!args.no_admin_key)
        .then(|| AdminCapability::new(config.operator.private_key.clone()));
    let options = RunOptions {
        messages: args.messages,
        memo: args.memo,
        admin,
        subscribe: !args.no_subscribe,
        delete: !args.no_delete,
        delivery_wait: Duration::from_millis(args.delivery_wait_ms),
    };

    let span = operation_span!("topic_run", profile = %config.profile);
    let report = run_sequence(&driver, &options)
        .instrument(span)
        .await
        .context("Topic lifecycle failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report_json(&report))?);
    } else {
        print_report(&report);
    }

    if args.metrics {
        print!("{}", encode_metrics()?);
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("The new topic ID is {}", report.topic);
    for (index, receipt) in report.published.iter().enumerate() {
        match receipt.topic_sequence_number {
            Some(sequence) => println!(
                "Message {} consensus status: {} (sequence {sequence})",
                index + 1,
                receipt.status
            ),
            None => println!("Message {} consensus status: {}", index + 1, receipt.status),
        }
    }
    for message in &report.delivered {
        println!(
            "Received #{} at {}: {}",
            message.sequence_number,
            message.consensus_timestamp,
            message.contents_lossy()
        );
    }
    match &report.deletion {
        Some(Ok(receipt)) => println!("The deletion consensus status is {}", receipt.status),
        Some(Err(e)) => println!("The topic was not deleted: {e}"),
        None => println!("The topic was left in place"),
    }
}

fn report_json(report: &RunReport) -> serde_json::Value {
    let delivered: Vec<_> = report
        .delivered
        .iter()
        .map(|message| {
            json!({
                "sequence_number": message.sequence_number,
                "consensus_timestamp": message.consensus_timestamp.to_string(),
                "contents": message.contents_lossy(),
                "chunks": message.chunk_count,
            })
        })
        .collect();
    let deletion = match &report.deletion {
        Some(Ok(receipt)) => json!({ "receipt": receipt }),
        Some(Err(e)) => json!({ "error": e.to_string(), "kind": e.kind() }),
        None => serde_json::Value::Null,
    };

    json!({
        "topic_id": report.topic.to_string(),
        "published": report.published,
        "delivered": delivered,
        "deletion": deletion,
    })
}
