//! # Topic Runtime
//!
//! Library half of the `topic-runtime` executable.
//!
//! ## Modules
//!
//! - `config/` - `RuntimeConfig` resolved from a TOML file and the
//!   environment (`.env` is loaded into the environment by the binary)
//! - `sequence/` - one create → subscribe → publish → delete pass over any
//!   `TopicLifecycleApi`
//!
//! ## Startup Sequence
//!
//! 1. Load `.env`, initialize telemetry
//! 2. Resolve configuration (missing operator values are fatal)
//! 3. Connect the operator to the configured network profile
//! 4. Run the lifecycle sequence and print every receipt

pub mod config;
pub mod sequence;

pub use config::{ConfigError, FileConfig, RuntimeConfig};
pub use sequence::{run_sequence, RunOptions, RunReport};
