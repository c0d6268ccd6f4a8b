//! Full node / secondary server parity harness
//!
//! This crate drives two servers exposing the same JSON-RPC and WebSocket
//! API with identical requests and records where they disagree.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐      ┌─────────────────┐
//! │  Full node      │      │  Secondary      │
//! │  :5005 / :6006  │      │ :51233 / :51234 │
//! └────────┬────────┘      └────────┬────────┘
//!          │                        │
//!          └──────────┬─────────────┘
//!                     │
//!              ┌──────▼──────┐
//!              │   Parity    │
//!              │   Harness   │──► RunReport
//!              └─────────────┘
//! ```
//!
//! The comparison engine lives in `parity-compare`, `parity-stream` and
//! `parity-ctid`; this crate wires it to real servers.

pub mod client;
pub mod config;
pub mod error;
pub mod harness;
pub mod report;

pub use client::{RpcClient, RpcResponse};
pub use config::HarnessConfig;
pub use error::{HarnessError, HarnessResult};
pub use harness::{compare_responses, ParityHarness};
pub use report::{NamedPartition, RunReport};

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Install a fmt subscriber honouring `RUST_LOG` (default `info`)
///
/// Returns `false` if a global subscriber was already installed, which
/// happens when several tests in one binary call this.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_test_writer()
        .finish();
    tracing::subscriber::set_global_default(subscriber).is_ok()
}
