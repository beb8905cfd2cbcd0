//! Height-pinned state queries against a Tendermint RPC endpoint
//!
//! Every read the sources perform goes through the `StateQuery` trait so the
//! whole pipeline can be driven by a mock in tests. The production
//! implementation (`RpcStateQuery`) speaks Tendermint JSON-RPC over HTTP:
//! `abci_query` with an explicit `height` parameter for state reads and
//! `status` for the latest finalized height.
//!
//! A non-zero ABCI response code is always surfaced as an error. There is no
//! fallback to unpinned (latest) state and no retry at this layer.

use crate::proto;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use prost::Message;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::OnceCell;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const WASM_CONTRACT_STATE_PATH: &str = "/cosmwasm.wasm.v1.Query/SmartContractState";
const BANK_SUPPLY_OF_PATH: &str = "/cosmos.bank.v1beta1.Query/SupplyOf";
const BANK_BALANCE_PATH: &str = "/cosmos.bank.v1beta1.Query/Balance";
const BANK_DENOM_OWNERS_PATH: &str = "/cosmos.bank.v1beta1.Query/DenomOwners";

#[derive(Debug)]
pub enum QueryError {
    /// HTTP-level failure (connection, timeout, non-2xx status)
    Transport(String),
    /// JSON-RPC envelope error or missing result
    Rpc(String),
    /// Non-zero ABCI response code from the node
    Abci { code: u32, log: String },
    /// Response payload could not be decoded
    Decode(String),
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::Transport(msg) => write!(f, "Transport error: {}", msg),
            QueryError::Rpc(msg) => write!(f, "RPC error: {}", msg),
            QueryError::Abci { code, log } => {
                write!(f, "ABCI query error: {} Code: {}", log, code)
            }
            QueryError::Decode(msg) => write!(f, "Decode error: {}", msg),
        }
    }
}

impl std::error::Error for QueryError {}

impl From<reqwest::Error> for QueryError {
    fn from(e: reqwest::Error) -> Self {
        QueryError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(e: serde_json::Error) -> Self {
        QueryError::Decode(e.to_string())
    }
}

impl From<prost::DecodeError> for QueryError {
    fn from(e: prost::DecodeError) -> Self {
        QueryError::Decode(e.to_string())
    }
}

/// A page of denom holders from the bank module
#[derive(Debug, Clone)]
pub struct DenomOwnersPage {
    pub addresses: Vec<String>,
    /// Opaque key for the next page; None when this is the last page
    pub next_key: Option<Vec<u8>>,
}

/// Height-pinned read capability consumed by every source
///
/// All methods take an explicit height and must fail loudly instead of
/// answering from a different (e.g. latest) state.
#[async_trait]
pub trait StateQuery: Send + Sync {
    /// Smart-contract query at a height; `msg` is the contract's JSON query
    async fn contract_state(
        &self,
        contract: &str,
        height: u64,
        msg: &Value,
    ) -> Result<Value, QueryError>;

    /// Chain-wide total supply of a denom at a height
    async fn total_supply(&self, denom: &str, height: u64) -> Result<String, QueryError>;

    /// One page of addresses holding a denom at a height
    async fn denom_owners(
        &self,
        denom: &str,
        height: u64,
        limit: u64,
        key: Option<Vec<u8>>,
    ) -> Result<DenomOwnersPage, QueryError>;

    /// Bank balance of one account at a height
    async fn balance(&self, address: &str, denom: &str, height: u64)
        -> Result<String, QueryError>;

    /// Most recent finalized height known to the node
    async fn latest_height(&self) -> Result<u64, QueryError>;
}

#[derive(Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
pub(crate) struct AbciQueryResult {
    pub(crate) response: AbciResponse,
}

#[derive(Deserialize)]
pub(crate) struct AbciResponse {
    /// Absent means code 0 (success)
    pub(crate) code: Option<u32>,
    pub(crate) log: Option<String>,
    /// base64-encoded response bytes
    pub(crate) value: Option<String>,
}

#[derive(Deserialize)]
struct StatusResult {
    sync_info: SyncInfo,
}

#[derive(Deserialize)]
struct SyncInfo {
    latest_block_height: String,
}

/// Validate an ABCI response and decode its value bytes
pub(crate) fn decode_abci_value(response: AbciResponse) -> Result<Vec<u8>, QueryError> {
    let code = response.code.unwrap_or(0);
    if code != 0 {
        return Err(QueryError::Abci {
            code,
            log: response.log.unwrap_or_default(),
        });
    }
    match response.value {
        Some(value) if !value.is_empty() => BASE64
            .decode(value.as_bytes())
            .map_err(|e| QueryError::Decode(format!("Invalid base64 in ABCI value: {}", e))),
        _ => Ok(Vec::new()),
    }
}

/// Tendermint JSON-RPC implementation of `StateQuery`
///
/// The HTTP client is created lazily on first use and reused for the
/// lifetime of the source.
pub struct RpcStateQuery {
    rpc: String,
    client: OnceCell<reqwest::Client>,
}

impl RpcStateQuery {
    pub fn new(rpc: &str) -> Self {
        Self {
            rpc: rpc.to_string(),
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> Result<&reqwest::Client, QueryError> {
        self.client
            .get_or_try_init(|| async {
                reqwest::Client::builder()
                    .timeout(REQUEST_TIMEOUT)
                    .build()
                    .map_err(QueryError::from)
            })
            .await
    }

    async fn rpc_call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, QueryError> {
        let client = self.client().await?;
        let body = json!({
            "jsonrpc": "2.0",
            "id": 0,
            "method": method,
            "params": params,
        });

        let response = client.post(&self.rpc).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(QueryError::Transport(format!(
                "RPC endpoint returned HTTP {}",
                response.status()
            )));
        }

        let envelope: RpcEnvelope<T> = response.json().await?;
        if let Some(err) = envelope.error {
            return Err(QueryError::Rpc(format!(
                "{} (code {})",
                err.message, err.code
            )));
        }
        envelope
            .result
            .ok_or_else(|| QueryError::Rpc("Response missing result".to_string()))
    }

    /// Raw `abci_query` at a height, returning the decoded value bytes
    async fn abci_query(
        &self,
        path: &str,
        data: Vec<u8>,
        height: u64,
    ) -> Result<Vec<u8>, QueryError> {
        let result: AbciQueryResult = self
            .rpc_call(
                "abci_query",
                json!({
                    "path": path,
                    "data": hex::encode(data),
                    "height": height.to_string(),
                    "prove": false,
                }),
            )
            .await?;
        decode_abci_value(result.response)
    }
}

#[async_trait]
impl StateQuery for RpcStateQuery {
    async fn contract_state(
        &self,
        contract: &str,
        height: u64,
        msg: &Value,
    ) -> Result<Value, QueryError> {
        let request = proto::QuerySmartContractStateRequest {
            address: contract.to_string(),
            query_data: serde_json::to_vec(msg)?,
        };
        let value = self
            .abci_query(WASM_CONTRACT_STATE_PATH, request.encode_to_vec(), height)
            .await?;
        let response = proto::QuerySmartContractStateResponse::decode(value.as_slice())?;
        Ok(serde_json::from_slice(&response.data)?)
    }

    async fn total_supply(&self, denom: &str, height: u64) -> Result<String, QueryError> {
        let request = proto::QuerySupplyOfRequest {
            denom: denom.to_string(),
        };
        let value = self
            .abci_query(BANK_SUPPLY_OF_PATH, request.encode_to_vec(), height)
            .await?;
        let response = proto::QuerySupplyOfResponse::decode(value.as_slice())?;
        let amount = response
            .amount
            .ok_or_else(|| QueryError::Decode("SupplyOf response missing amount".to_string()))?;
        Ok(amount.amount)
    }

    async fn denom_owners(
        &self,
        denom: &str,
        height: u64,
        limit: u64,
        key: Option<Vec<u8>>,
    ) -> Result<DenomOwnersPage, QueryError> {
        let request = proto::QueryDenomOwnersRequest {
            denom: denom.to_string(),
            pagination: Some(proto::PageRequest {
                key: key.unwrap_or_default(),
                limit,
                ..Default::default()
            }),
        };
        let value = self
            .abci_query(BANK_DENOM_OWNERS_PATH, request.encode_to_vec(), height)
            .await?;
        let response = proto::QueryDenomOwnersResponse::decode(value.as_slice())?;

        let addresses = response
            .denom_owners
            .into_iter()
            .map(|owner| owner.address)
            .collect();
        let next_key = response
            .pagination
            .map(|p| p.next_key)
            .filter(|key| !key.is_empty());

        Ok(DenomOwnersPage {
            addresses,
            next_key,
        })
    }

    async fn balance(
        &self,
        address: &str,
        denom: &str,
        height: u64,
    ) -> Result<String, QueryError> {
        let request = proto::QueryBalanceRequest {
            address: address.to_string(),
            denom: denom.to_string(),
        };
        let value = self
            .abci_query(BANK_BALANCE_PATH, request.encode_to_vec(), height)
            .await?;
        let response = proto::QueryBalanceResponse::decode(value.as_slice())?;
        // An account with no balance entry holds zero of the denom
        Ok(response
            .balance
            .map(|coin| coin.amount)
            .unwrap_or_else(|| "0".to_string()))
    }

    async fn latest_height(&self) -> Result<u64, QueryError> {
        let status: StatusResult = self.rpc_call("status", json!({})).await?;
        status
            .sync_info
            .latest_block_height
            .parse()
            .map_err(|_| {
                QueryError::Decode(format!(
                    "Invalid latest_block_height: {}",
                    status.sync_info.latest_block_height
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_abci_value_success() {
        // Test: code absent means success, value is base64-decoded
        let response = AbciResponse {
            code: None,
            log: None,
            value: Some(BASE64.encode(b"{\"balance\":\"42\"}")),
        };

        let bytes = decode_abci_value(response).unwrap();
        assert_eq!(bytes, b"{\"balance\":\"42\"}");
    }

    #[test]
    fn test_decode_abci_value_empty() {
        // Test: missing/empty value decodes to empty bytes, not an error
        let response = AbciResponse {
            code: Some(0),
            log: None,
            value: None,
        };
        assert!(decode_abci_value(response).unwrap().is_empty());
    }

    #[test]
    fn test_decode_abci_value_nonzero_code() {
        // Test: non-zero code is an explicit error carrying the node's log
        let response = AbciResponse {
            code: Some(18),
            log: Some("invalid height".to_string()),
            value: None,
        };

        match decode_abci_value(response) {
            Err(QueryError::Abci { code, log }) => {
                assert_eq!(code, 18);
                assert_eq!(log, "invalid height");
            }
            other => panic!("Expected Abci error, got {:?}", other),
        }
    }

    #[test]
    fn test_abci_envelope_parsing() {
        // Test: a real-shaped Tendermint abci_query envelope parses
        let raw = r#"{
            "jsonrpc": "2.0",
            "id": 0,
            "result": {
                "response": {
                    "code": 0,
                    "log": "",
                    "value": "eyJhY2NvdW50cyI6W119"
                }
            }
        }"#;

        let envelope: RpcEnvelope<AbciQueryResult> = serde_json::from_str(raw).unwrap();
        let result = envelope.result.unwrap();
        let bytes = decode_abci_value(result.response).unwrap();
        assert_eq!(bytes, br#"{"accounts":[]}"#);
    }

    #[tokio::test]
    #[ignore] // Run only against a live RPC endpoint (SNAPFLOW_RPC)
    async fn test_latest_height_live() {
        let rpc = std::env::var("SNAPFLOW_RPC").expect("SNAPFLOW_RPC must be set");
        let query = RpcStateQuery::new(&rpc);
        let height = query.latest_height().await.unwrap();
        assert!(height > 0);
    }
}
