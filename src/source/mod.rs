//! Source contract and protocol registry
//!
//! A source computes, for every asset it is configured with, the complete
//! set of non-zero user balances as of a block height, scales each balance
//! by the caller-supplied per-asset multiplier, and streams the results page
//! by page to a `BatchSink`. All protocol adapters implement the same
//! two-operation `Source` trait and are selected by a configuration-driven
//! protocol identifier through `build_source`.
//!
//! Variants:
//! - `bank` - direct bank-ledger reader (neutron, kujira)
//! - `astroport` - LP-share reader with exchange-rate conversion
//! - `indexer` - external-indexer-backed reader (osmosis, secret)

pub mod astroport;
pub mod bank;
pub mod indexer;

use crate::query::QueryError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub use astroport::AstroportSource;
pub use bank::BankModuleSource;
pub use indexer::IndexerSource;

/// One scaled balance record as delivered to the sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBalance {
    pub address: String,
    /// Integer amount as a decimal string, already multiplier-scaled
    pub balance: String,
    pub asset: String,
}

/// Per-asset configuration entry
#[derive(Debug, Clone, Deserialize)]
pub struct AssetParams {
    pub denom: String,
    /// Pool/pair contract address; only LP-style sources use it
    #[serde(default)]
    pub pair_contract: String,
}

/// Source construction parameters shared by all variants
#[derive(Debug, Clone)]
pub struct SourceParams {
    /// (assetId, params) pairs in configuration order
    pub assets: Vec<(String, AssetParams)>,
    pub concurrency_limit: usize,
    pub pagination_limit: u32,
    /// When true a failed per-holder fetch drops that holder from the page;
    /// when false it aborts the whole run
    pub tolerate_failed_fetches: bool,
}

#[derive(Debug)]
pub enum SourceError {
    Config(String),
    UnknownProtocol(String),
    /// Caller supplied no multiplier for a configured asset
    MissingMultiplier(String),
    /// Pool-share total supply was zero, the exchange rate is undefined
    ZeroShareSupply { asset: String },
    Query(QueryError),
    Sink(Box<dyn std::error::Error + Send + Sync>),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Config(msg) => write!(f, "Configuration error: {}", msg),
            SourceError::UnknownProtocol(id) => write!(f, "Unknown protocol identifier: {}", id),
            SourceError::MissingMultiplier(asset) => {
                write!(f, "No multiplier configured for asset {}", asset)
            }
            SourceError::ZeroShareSupply { asset } => write!(
                f,
                "Pool share supply is zero for asset {}, exchange rate undefined",
                asset
            ),
            SourceError::Query(e) => write!(f, "Query failed: {}", e),
            SourceError::Sink(e) => write!(f, "Batch sink failed: {}", e),
        }
    }
}

impl std::error::Error for SourceError {}

impl From<QueryError> for SourceError {
    fn from(e: QueryError) -> Self {
        SourceError::Query(e)
    }
}

/// Downstream consumer of balance pages
///
/// `on_batch` is awaited before the next page is fetched, which gives the
/// consumer natural backpressure over the producer. It is never invoked
/// with an empty batch.
#[async_trait]
pub trait BatchSink: Send + Sync {
    async fn on_batch(
        &self,
        batch: Vec<UserBalance>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// The uniform contract every protocol adapter implements
#[async_trait]
pub trait Source: Send + Sync {
    /// Stream every configured asset's non-zero, multiplier-scaled balances
    /// as of `height` to the sink, page by page
    ///
    /// `multipliers` must contain an entry for every configured asset;
    /// a missing entry fails the call before any query is issued.
    async fn get_users_balances(
        &self,
        height: u64,
        multipliers: &HashMap<String, f64>,
        sink: &dyn BatchSink,
    ) -> Result<(), SourceError>;

    /// Most recent finalized height known to the backing ledger
    async fn get_last_block_height(&self) -> Result<u64, SourceError>;

    /// Protocol identifier this source was built for
    fn name(&self) -> &str;
}

/// Build the source registered for a protocol identifier
///
/// The mapping is a closed set; an unknown identifier is a fatal error.
pub fn build_source(
    protocol: &str,
    endpoint: &str,
    params: SourceParams,
) -> Result<Arc<dyn Source>, SourceError> {
    match protocol {
        "neutron" | "kujira" => Ok(Arc::new(BankModuleSource::new(protocol, endpoint, params)?)),
        "astroport" => Ok(Arc::new(AstroportSource::new(protocol, endpoint, params)?)),
        "osmosis" | "secret" => Ok(Arc::new(IndexerSource::new(protocol, endpoint, params)?)),
        other => Err(SourceError::UnknownProtocol(other.to_string())),
    }
}

/// Fail fast when the caller forgot a multiplier for any configured asset
pub(crate) fn require_multipliers(
    assets: &[(String, AssetParams)],
    multipliers: &HashMap<String, f64>,
) -> Result<(), SourceError> {
    for (asset_id, _) in assets {
        if !multipliers.contains_key(asset_id) {
            return Err(SourceError::MissingMultiplier(asset_id.clone()));
        }
    }
    Ok(())
}

/// Scale a raw balance string by a multiplier, rounding half-up
///
/// Returns None when the raw balance is not a number. Precision follows the
/// reference pipeline: values cross f64 on the way through.
pub(crate) fn scale_balance(raw: &str, multiplier: f64) -> Option<String> {
    let value: f64 = raw.parse().ok()?;
    Some(((value * multiplier).round() as u128).to_string())
}

/// Apply the effective multiplier to a settled page and drop anything that
/// rounds to zero or fails to parse
pub(crate) fn scale_batch(balances: Vec<UserBalance>, multiplier: f64) -> Vec<UserBalance> {
    balances
        .into_iter()
        .filter_map(|mut record| match scale_balance(&record.balance, multiplier) {
            Some(scaled) => {
                record.balance = scaled;
                Some(record)
            }
            None => {
                log::warn!(
                    "⚠️  Dropping {} ({}): unparseable balance '{}'",
                    record.address,
                    record.asset,
                    record.balance
                );
                None
            }
        })
        .filter(|record| record.balance != "0")
        .collect()
}
