//! Runtime configuration
//!
//! Environment variables select the endpoint, protocol and tuning knobs;
//! the asset table and multiplier map live in a JSON file so one deployment
//! can track many positions. Everything is validated once at startup and
//! missing required values are fatal.
//!
//! Variables:
//! - `SNAPFLOW_RPC` (required) - Tendermint RPC endpoint, http(s)
//! - `SNAPFLOW_SOURCE` (required) - protocol identifier for the registry
//! - `SNAPFLOW_ASSETS` (required) - path to the asset/multiplier JSON file
//! - `SNAPFLOW_HEIGHT` (optional) - pinned height; latest when unset
//! - `SNAPFLOW_OUT` (default: balances.jsonl) - JSONL output path
//! - `CONCURRENCY_LIMIT` (default: 3) - in-flight per-holder fetch cap
//! - `PAGINATION_LIMIT` (default: 30) - holder listing page size
//! - `TOLERATE_FAILED_FETCHES` (default: true) - drop failed holders
//!   instead of aborting the run

use crate::source::{AssetParams, SourceParams};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::env;
use std::fs;

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub rpc: String,
    pub source: String,
    pub assets_path: String,
    pub height: Option<u64>,
    pub out_path: String,
    pub concurrency_limit: usize,
    pub pagination_limit: u32,
    pub tolerate_failed_fetches: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let rpc = env::var("SNAPFLOW_RPC")
            .map_err(|_| ConfigError::MissingVariable("SNAPFLOW_RPC".to_string()))?;
        if !rpc.starts_with("http://") && !rpc.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "SNAPFLOW_RPC must start with http:// or https://".to_string(),
            ));
        }

        let source = env::var("SNAPFLOW_SOURCE")
            .map_err(|_| ConfigError::MissingVariable("SNAPFLOW_SOURCE".to_string()))?;

        let assets_path = env::var("SNAPFLOW_ASSETS")
            .map_err(|_| ConfigError::MissingVariable("SNAPFLOW_ASSETS".to_string()))?;

        let height = match env::var("SNAPFLOW_HEIGHT") {
            Ok(raw) => Some(raw.parse::<u64>().map_err(|_| {
                ConfigError::InvalidValue(format!("SNAPFLOW_HEIGHT is not a height: {}", raw))
            })?),
            Err(_) => None,
        };

        let out_path = env::var("SNAPFLOW_OUT").unwrap_or_else(|_| "balances.jsonl".to_string());

        let concurrency_limit = env::var("CONCURRENCY_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3);

        let pagination_limit = env::var("PAGINATION_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let tolerate_failed_fetches = env::var("TOLERATE_FAILED_FETCHES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(true);

        Ok(Self {
            rpc,
            source,
            assets_path,
            height,
            out_path,
            concurrency_limit,
            pagination_limit,
            tolerate_failed_fetches,
        })
    }

    pub fn source_params(&self, assets: Vec<(String, AssetParams)>) -> SourceParams {
        SourceParams {
            assets,
            concurrency_limit: self.concurrency_limit,
            pagination_limit: self.pagination_limit,
            tolerate_failed_fetches: self.tolerate_failed_fetches,
        }
    }
}

/// Contents of the `SNAPFLOW_ASSETS` file
#[derive(Debug, Clone)]
pub struct AssetsConfig {
    /// Preserves the file's ordering; sources iterate assets in this order
    pub assets: Vec<(String, AssetParams)>,
    pub multipliers: HashMap<String, f64>,
}

#[derive(Deserialize)]
struct RawAssetsFile {
    assets: serde_json::Map<String, Value>,
    multipliers: HashMap<String, f64>,
}

pub fn load_assets(path: &str) -> Result<AssetsConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|e| {
        ConfigError::InvalidValue(format!("Cannot read asset file {}: {}", path, e))
    })?;
    let parsed: RawAssetsFile = serde_json::from_str(&raw)
        .map_err(|e| ConfigError::InvalidValue(format!("Invalid asset file {}: {}", path, e)))?;

    if parsed.assets.is_empty() {
        return Err(ConfigError::InvalidValue(format!(
            "No assets configured in {}",
            path
        )));
    }

    let mut assets = Vec::with_capacity(parsed.assets.len());
    for (asset_id, value) in parsed.assets {
        let params: AssetParams = serde_json::from_value(value).map_err(|e| {
            ConfigError::InvalidValue(format!("Asset {}: {}", asset_id, e))
        })?;
        assets.push((asset_id, params));
    }

    Ok(AssetsConfig {
        assets,
        multipliers: parsed.multipliers,
    })
}
