//! End-to-end collection run through the public API: registry-shaped source
//! construction, height resolution, streaming into the JSONL sink.

use async_trait::async_trait;
use serde_json::{json, Value};
use snapflow::collector::{self, JsonlSink};
use snapflow::query::{DenomOwnersPage, QueryError, StateQuery};
use snapflow::source::{AssetParams, AstroportSource, SourceParams};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Minimal ledger: one pair contract, one LP token, three holders
struct FixtureLedger;

const HEIGHT: u64 = 4200;

#[async_trait]
impl StateQuery for FixtureLedger {
    async fn contract_state(
        &self,
        contract: &str,
        height: u64,
        msg: &Value,
    ) -> Result<Value, QueryError> {
        assert_eq!(height, HEIGHT);

        if msg.get("pair").is_some() {
            assert_eq!(contract, "pair-atom");
            return Ok(json!({ "liquidity_token": "lp-atom" }));
        }
        if msg.get("total_supply_at").is_some() {
            return Ok(json!("1000"));
        }
        if let Some(listing) = msg.get("all_accounts") {
            // Single page: all holders fit under the limit
            if listing.get("start_after").is_some() {
                return Ok(json!({ "accounts": [] }));
            }
            return Ok(json!({ "accounts": ["alice", "bob", "carol"] }));
        }
        if let Some(balance_at) = msg.get("balance_at") {
            let balance = match balance_at["address"].as_str().unwrap() {
                "alice" => "10",
                "bob" => "0",
                "carol" => "4",
                other => panic!("unexpected holder {}", other),
            };
            return Ok(json!({ "balance": balance }));
        }

        panic!("unexpected query {}", msg);
    }

    async fn total_supply(&self, denom: &str, height: u64) -> Result<String, QueryError> {
        assert_eq!(denom, "uatom");
        assert_eq!(height, HEIGHT);
        Ok("2000".to_string())
    }

    async fn denom_owners(
        &self,
        _denom: &str,
        _height: u64,
        _limit: u64,
        _key: Option<Vec<u8>>,
    ) -> Result<DenomOwnersPage, QueryError> {
        unimplemented!()
    }

    async fn balance(
        &self,
        _address: &str,
        _denom: &str,
        _height: u64,
    ) -> Result<String, QueryError> {
        unimplemented!()
    }

    async fn latest_height(&self) -> Result<u64, QueryError> {
        Ok(HEIGHT)
    }
}

fn fixture_source() -> AstroportSource {
    AstroportSource::with_query(
        "astroport",
        Arc::new(FixtureLedger),
        SourceParams {
            assets: vec![(
                "atom".to_string(),
                AssetParams {
                    denom: "uatom".to_string(),
                    pair_contract: "pair-atom".to_string(),
                },
            )],
            concurrency_limit: 2,
            pagination_limit: 30,
            tolerate_failed_fetches: true,
        },
    )
    .unwrap()
}

#[tokio::test]
async fn test_collect_run_writes_scaled_balances() {
    // Rate 2000/1000 = 2.0, multiplier 1.5 -> effective 3.0:
    // alice 10 -> 30, bob 0 filtered, carol 4 -> 12
    let source = fixture_source();
    let mut multipliers = HashMap::new();
    multipliers.insert("atom".to_string(), 1.5);

    // No pinned height: resolved from the ledger
    let height = collector::resolve_height(&source, None).await.unwrap();
    assert_eq!(height, HEIGHT);

    let temp = NamedTempFile::new().unwrap();
    let sink = JsonlSink::new(temp.path(), height).unwrap();

    let stats = collector::collect(&source, height, &multipliers, &sink)
        .await
        .unwrap();
    assert_eq!(stats.batches, 1);
    assert_eq!(stats.records, 2);
    drop(sink);

    let contents = std::fs::read_to_string(temp.path()).unwrap();
    let mut rows: Vec<Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    rows.sort_by_key(|row| row["address"].as_str().unwrap().to_string());

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["address"], "alice");
    assert_eq!(rows[0]["balance"], "30");
    assert_eq!(rows[0]["asset"], "atom");
    assert_eq!(rows[0]["height"], HEIGHT);
    assert_eq!(rows[1]["address"], "carol");
    assert_eq!(rows[1]["balance"], "12");
}

#[tokio::test]
async fn test_collect_fails_without_multiplier() {
    // A multiplier map missing the configured asset fails the whole run
    let source = fixture_source();
    let temp = NamedTempFile::new().unwrap();
    let sink = JsonlSink::new(temp.path(), HEIGHT).unwrap();

    let result = collector::collect(&source, HEIGHT, &HashMap::new(), &sink).await;
    assert!(result.is_err());
    drop(sink);

    assert!(std::fs::read_to_string(temp.path()).unwrap().is_empty());
}
