//! Parity checks against real servers
//!
//! Run with: cargo test -p parity-harness --test live -- --ignored
//!
//! Requires a full node and a secondary server on the endpoints given by
//! RIPPLED_URL, CLIO_URL, RIPPLED_WS_URL and CLIO_WS_URL (defaults to the
//! usual local ports). Set PARITY_TX_HASH to check CTID lookups on a known
//! validated transaction and PARITY_ACCOUNT to pick the account queried.

use anyhow::Result;
use parity_compare::{CompareOptions, PartitionOrder};
use parity_harness::{init_tracing, HarnessConfig, ParityHarness};
use parity_stream::StreamCommand;
use serde_json::json;
use std::time::Duration;

const GENESIS_ACCOUNT: &str = "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh";

async fn connected_harness() -> Result<ParityHarness> {
    init_tracing();
    let config = HarnessConfig::from_env()?;
    let harness = ParityHarness::new(config)?;
    harness.wait_for_servers(Duration::from_secs(60)).await?;
    Ok(harness)
}

fn account() -> String {
    std::env::var("PARITY_ACCOUNT").unwrap_or_else(|_| GENESIS_ACCOUNT.to_string())
}

#[tokio::test]
#[ignore = "requires running servers"]
async fn test_live_requests() -> Result<()> {
    let mut harness = connected_harness().await?;
    let options = CompareOptions::new();

    let requests = [
        (
            "account_info",
            json!({"account": account(), "ledger_index": "validated"}),
        ),
        (
            "account_objects",
            json!({"account": account(), "ledger_index": "validated"}),
        ),
        (
            "ledger",
            json!({"ledger_index": "validated", "transactions": true}),
        ),
        ("fee", json!({})),
        // Both servers must fail the same way
        ("account_info", json!({"account": "rNotAnAccount"})),
    ];
    for (method, params) in requests {
        harness.compare_request(method, params, &options).await?;
    }

    harness.report.print_summary();
    assert!(harness.all_passed());
    Ok(())
}

#[tokio::test]
#[ignore = "requires running servers"]
async fn test_live_paging() -> Result<()> {
    let mut harness = connected_harness().await?;

    harness
        .compare_paged(
            "account_tx",
            json!({"account": account(), "ledger_index_min": -1, "ledger_index_max": -1}),
            "transactions",
            5,
            PartitionOrder::Ordered,
        )
        .await?;
    harness
        .compare_paged(
            "account_objects",
            json!({"account": account(), "ledger_index": "validated"}),
            "account_objects",
            10,
            PartitionOrder::Unordered,
        )
        .await?;

    harness.report.print_summary();
    assert!(harness.all_passed());
    Ok(())
}

#[tokio::test]
#[ignore = "requires running servers and PARITY_TX_HASH"]
async fn test_live_ctid_lookup() -> Result<()> {
    let Ok(hash) = std::env::var("PARITY_TX_HASH") else {
        return Ok(());
    };
    let mut harness = connected_harness().await?;

    harness.compare_ctid_lookup(&hash).await?;

    harness.report.print_summary();
    assert!(harness.all_passed());
    Ok(())
}

#[tokio::test]
#[ignore = "requires running servers"]
async fn test_live_ledger_stream() -> Result<()> {
    let mut harness = connected_harness().await?;

    harness
        .compare_streams(
            StreamCommand::subscribe().id(1).stream("ledger"),
            "ledgerClosed",
            Duration::from_secs(15),
        )
        .await?;

    harness.report.print_summary();
    assert!(harness.all_passed());
    Ok(())
}
