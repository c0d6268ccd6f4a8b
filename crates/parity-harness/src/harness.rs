//! Harness for running parity checks against both servers

use parity_compare::{
    compare_values, follow_markers, shape_of, verify_partition, CompareOptions, ComparisonResult,
    DiffCategory, Difference, PagedResult, PartitionOrder,
};
use parity_ctid::{decode, encode};
use parity_stream::{Session, StreamCommand, DEFAULT_CONNECT_TIMEOUT};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::client::{RpcClient, RpcResponse};
use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::report::RunReport;

/// Drives the full node and the secondary server with identical requests
pub struct ParityHarness {
    pub config: HarnessConfig,
    pub reference: RpcClient,
    pub secondary: RpcClient,
    pub report: RunReport,
}

impl ParityHarness {
    /// Create a new harness from config
    pub fn new(config: HarnessConfig) -> HarnessResult<Self> {
        let reference = RpcClient::full_node(&config.reference_url, config.request_timeout)?;
        let secondary = RpcClient::secondary(&config.secondary_url, config.request_timeout)?;

        Ok(Self {
            config,
            reference,
            secondary,
            report: RunReport::new(),
        })
    }

    /// Wait for both servers to be healthy
    pub async fn wait_for_servers(&self, timeout: Duration) -> HarnessResult<()> {
        for client in [&self.reference, &self.secondary] {
            info!(server = client.name(), "Waiting for server");
            if !client.wait_for_healthy(timeout).await {
                return Err(HarnessError::Unhealthy {
                    server: client.name().to_string(),
                    timeout,
                });
            }
            info!(server = client.name(), "Server is ready");
        }
        Ok(())
    }

    /// Send the same request to both servers and compare the results
    #[instrument(skip(self, params, options))]
    pub async fn compare_request(
        &mut self,
        method: &str,
        params: Value,
        options: &CompareOptions,
    ) -> HarnessResult<&ComparisonResult> {
        let reference = self.reference.request(method, params.clone()).await?;
        let secondary = self.secondary.request(method, params).await?;

        let result = compare_responses(method, &reference, &secondary, options);
        Ok(self.report.record_comparison(result))
    }

    /// Check marker paging on both servers and compare their collections
    ///
    /// `params` must describe an unpaged fetch (or one whose limit covers the
    /// whole collection); pages are then fetched with `limit` and followed
    /// until no marker remains. Records one partition check per server and
    /// one cross-server comparison of the full collections.
    #[instrument(skip(self, params))]
    pub async fn compare_paged(
        &mut self,
        method: &str,
        params: Value,
        key: &str,
        limit: u32,
        order: PartitionOrder,
    ) -> HarnessResult<bool> {
        let max_pages = self.config.max_pages;
        let mut partitions = Vec::new();
        let mut collections = Vec::new();

        for client in [&self.reference, &self.secondary] {
            let full_response = client.result(method, params.clone()).await?;
            let full = PagedResult::from_response(&full_response, key)?;

            let pages = follow_markers(key, max_pages, |marker| {
                let client = client.clone();
                let method = method.to_string();
                let params = page_params(&params, limit, marker);
                async move { client.result(&method, params).await }
            })
            .await?;
            debug!(server = client.name(), pages = pages.len(), "Collected pages");

            let report = verify_partition(&full, &pages, order);
            partitions.push((format!("{}[{}]", method, client.name()), report));
            collections.push(full.items);
        }

        let mut passed = true;
        for (name, report) in partitions {
            passed &= self.report.record_partition(&name, report).passed;
        }

        let mut left = serde_json::Map::new();
        left.insert(key.to_string(), Value::Array(collections.remove(0)));
        let mut right = serde_json::Map::new();
        right.insert(key.to_string(), Value::Array(collections.remove(0)));

        let cross = compare_values(
            &format!("{} (unpaged)", method),
            &Value::Object(left),
            &Value::Object(right),
            &CompareOptions::default(),
        );
        passed &= self.report.record_comparison(cross).passed;

        Ok(passed)
    }

    /// Check that looking a transaction up by CTID matches looking it up by hash
    ///
    /// On each server: the CTID is derived from the by-hash response's
    /// ledger index and transaction index, checked against the `ctid` field
    /// the server reports, and used for a second lookup whose response must
    /// match the first. The by-hash responses are then compared across
    /// servers.
    #[instrument(skip(self))]
    pub async fn compare_ctid_lookup(&mut self, hash: &str) -> HarnessResult<bool> {
        let network_id = self.config.network_id as u64;
        let mut results = Vec::new();
        let mut by_hash_responses = Vec::new();

        for client in [&self.reference, &self.secondary] {
            let by_hash = client.result("tx", json!({"transaction": hash})).await?;
            let expected = expected_ctid(client.name(), &by_hash, network_id)?;
            debug!(server = client.name(), ctid = %expected, "Derived CTID");

            let by_ctid = client.result("tx", json!({"ctid": expected})).await?;
            let mut result = compare_values(
                &format!("tx by hash vs ctid [{}]", client.name()),
                &by_hash,
                &by_ctid,
                &CompareOptions::new(),
            );
            if let Some(difference) = check_reported_ctid(&by_hash, &expected) {
                result.differences.push(difference);
                result.passed = false;
            }

            results.push(result);
            by_hash_responses.push(by_hash);
        }

        results.push(compare_values(
            "tx",
            &by_hash_responses[0],
            &by_hash_responses[1],
            &CompareOptions::new(),
        ));

        let mut passed = true;
        for result in results {
            passed &= self.report.record_comparison(result).passed;
        }
        Ok(passed)
    }

    /// Subscribe on both servers and compare the response and one pushed event
    ///
    /// The two sessions run one after the other; events are compared by
    /// shape since each server may report a different ledger. A frame that
    /// never arrives is a failed comparison; a dropped connection is an error.
    #[instrument(skip(self, command))]
    pub async fn compare_streams(
        &mut self,
        command: StreamCommand,
        event_type: &str,
        wait: Duration,
    ) -> HarnessResult<bool> {
        let id = command.id.unwrap_or(1);
        let command = command.id(id);
        let mut observed = Vec::new();

        for url in [&self.config.reference_ws_url, &self.config.secondary_ws_url] {
            let mut session =
                Session::open(url, Some(command.to_value()), DEFAULT_CONNECT_TIMEOUT).await?;
            let response = session.drain_response(Some(id), wait).await?;
            let event = session.drain_type(event_type, wait).await?;
            let frames = session.close().await?;
            debug!(url = %url, frames = frames.len(), "Stream session finished");
            observed.push((response, event));
        }

        let (reference_response, reference_event) = observed.remove(0);
        let (secondary_response, secondary_event) = observed.remove(0);

        let responses = compare_optional(
            &format!("{} response", command.command.as_str()),
            reference_response.as_ref(),
            secondary_response.as_ref(),
            |left, right, endpoint| compare_values(endpoint, left, right, &CompareOptions::new()),
        );
        let events = compare_optional(
            &format!("{} event shape", event_type),
            reference_event.as_ref(),
            secondary_event.as_ref(),
            |left, right, endpoint| {
                compare_values(
                    endpoint,
                    &shape_of(left),
                    &shape_of(right),
                    &CompareOptions::default(),
                )
            },
        );

        let mut passed = self.report.record_comparison(responses).passed;
        passed &= self.report.record_comparison(events).passed;
        Ok(passed)
    }

    /// Check if all checks passed
    pub fn all_passed(&self) -> bool {
        self.report.all_passed()
    }
}

/// Compare two RPC responses: HTTP status, then the `result` trees
///
/// A response without a `result` (non-JSON body, bare error envelope) only
/// differs from one that has it; two responses both lacking it agree.
pub fn compare_responses(
    endpoint: &str,
    reference: &RpcResponse,
    secondary: &RpcResponse,
    options: &CompareOptions,
) -> ComparisonResult {
    let mut result = match (reference.result(), secondary.result()) {
        (Some(left), Some(right)) => compare_values(endpoint, left, right, options),
        (None, None) => ComparisonResult {
            endpoint: endpoint.to_string(),
            passed: true,
            differences: Vec::new(),
        },
        (left, right) => {
            let describe = |side: Option<&Value>| match side {
                Some(value) => value.to_string(),
                None => "(no result)".to_string(),
            };
            ComparisonResult {
                endpoint: endpoint.to_string(),
                passed: false,
                differences: vec![Difference {
                    category: if left.is_some() {
                        DiffCategory::Missing
                    } else {
                        DiffCategory::Extra
                    },
                    path: "result".to_string(),
                    left_value: describe(left),
                    right_value: describe(right),
                }],
            }
        }
    };

    if reference.status != secondary.status {
        result.differences.insert(
            0,
            Difference {
                category: DiffCategory::Status,
                path: "status_code".to_string(),
                left_value: reference.status.to_string(),
                right_value: secondary.status.to_string(),
            },
        );
        result.passed = false;
    }

    result
}

fn page_params(params: &Value, limit: u32, marker: Option<Value>) -> Value {
    let mut params = params.clone();
    if let Some(obj) = params.as_object_mut() {
        obj.insert("limit".to_string(), json!(limit));
        match marker {
            Some(marker) => obj.insert("marker".to_string(), marker),
            None => obj.remove("marker"),
        };
    }
    params
}

fn expected_ctid(server: &str, tx: &Value, network_id: u64) -> HarnessResult<String> {
    let field = |pointer: &str| {
        tx.pointer(pointer)
            .and_then(Value::as_u64)
            .ok_or_else(|| HarnessError::MissingField {
                server: server.to_string(),
                field: pointer.trim_start_matches('/').replace('/', "."),
            })
    };

    let ledger_index = field("/ledger_index")?;
    let txn_index = field("/meta/TransactionIndex")?;
    Ok(encode(ledger_index, txn_index, network_id)?)
}

fn check_reported_ctid(tx: &Value, expected: &str) -> Option<Difference> {
    let difference = |right_value: String| Difference {
        category: DiffCategory::Value,
        path: "ctid".to_string(),
        left_value: expected.to_string(),
        right_value,
    };

    match tx.get("ctid").and_then(Value::as_str) {
        None => Some(Difference {
            category: DiffCategory::Missing,
            ..difference("(missing)".to_string())
        }),
        Some(reported) => match decode(reported) {
            Ok(ctid) if ctid.to_string() == expected => None,
            Ok(ctid) => Some(difference(ctid.to_string())),
            Err(e) => Some(difference(format!("{} ({})", reported, e))),
        },
    }
}

fn compare_optional<F>(
    endpoint: &str,
    left: Option<&Value>,
    right: Option<&Value>,
    compare: F,
) -> ComparisonResult
where
    F: FnOnce(&Value, &Value, &str) -> ComparisonResult,
{
    match (left, right) {
        (Some(left), Some(right)) => compare(left, right, endpoint),
        _ => {
            let describe = |side: Option<&Value>| match side {
                Some(value) => value.to_string(),
                None => "(nothing received)".to_string(),
            };
            ComparisonResult {
                endpoint: endpoint.to_string(),
                passed: false,
                differences: vec![Difference {
                    category: if left.is_some() {
                        DiffCategory::Missing
                    } else {
                        DiffCategory::Extra
                    },
                    path: "(frame)".to_string(),
                    left_value: describe(left),
                    right_value: describe(right),
                }],
            }
        }
    }
}
