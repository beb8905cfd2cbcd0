//! Astroport LP source
//!
//! Converts LP-share holdings into underlying-asset-equivalent balances.
//! Per configured asset, at the pinned height:
//!
//! 1. `pair {}` on the pair contract resolves the LP token contract
//! 2. `total_supply_at { block }` reads the LP share supply
//! 3. bank `SupplyOf` reads the underlying asset's chain-wide supply
//! 4. exchange rate = underlying supply / share supply
//! 5. effective multiplier = caller multiplier x exchange rate
//!
//! Holders are then enumerated via `all_accounts { limit, start_after }`
//! (cursor = last address of the previous page), each holder's `balance_at`
//! is read under the concurrency cap, zeros and failed fetches are dropped,
//! and every surviving balance is replaced by
//! `round(raw x effective multiplier)` before the page goes to the sink.

use crate::fetcher::settle_page;
use crate::pagination::{HolderLister, HolderPage, HolderPages};
use crate::query::{QueryError, RpcStateQuery, StateQuery};
use crate::source::{
    require_multipliers, scale_batch, AssetParams, BatchSink, Source, SourceError, SourceParams,
    UserBalance,
};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

pub struct AstroportSource {
    name: String,
    query: Arc<dyn StateQuery>,
    assets: Vec<(String, AssetParams)>,
    concurrency_limit: usize,
    pagination_limit: u32,
    tolerate_failed_fetches: bool,
}

/// cw20 `all_accounts` listing over one LP token contract
struct LpHolderLister {
    query: Arc<dyn StateQuery>,
    lp_contract: String,
}

#[async_trait]
impl HolderLister for LpHolderLister {
    async fn list_page(
        &self,
        height: u64,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<HolderPage, QueryError> {
        let mut msg = json!({ "all_accounts": { "limit": limit } });
        if let Some(cursor) = cursor {
            msg["all_accounts"]["start_after"] = json!(cursor);
        }

        let response = self
            .query
            .contract_state(&self.lp_contract, height, &msg)
            .await?;
        let accounts = response
            .get("accounts")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                QueryError::Decode("all_accounts response missing accounts".to_string())
            })?;

        let holders: Vec<String> = accounts
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        let next_cursor = holders.last().cloned();

        Ok(HolderPage {
            holders,
            next_cursor,
        })
    }
}

/// One holder's raw LP share balance at a height
async fn fetch_lp_balance(
    query: Arc<dyn StateQuery>,
    lp_contract: String,
    height: u64,
    address: String,
    asset: String,
) -> Result<UserBalance, QueryError> {
    let msg = json!({ "balance_at": { "address": address, "block": height } });
    let response = query.contract_state(&lp_contract, height, &msg).await?;
    let balance = response
        .get("balance")
        .and_then(|v| v.as_str())
        .ok_or_else(|| QueryError::Decode("balance_at response missing balance".to_string()))?
        .to_string();

    Ok(UserBalance {
        address,
        balance,
        asset,
    })
}

impl AstroportSource {
    pub fn new(name: &str, rpc: &str, params: SourceParams) -> Result<Self, SourceError> {
        Self::with_query(name, Arc::new(RpcStateQuery::new(rpc)), params)
    }

    /// Construct over an explicit query capability (tests inject mocks here)
    pub fn with_query(
        name: &str,
        query: Arc<dyn StateQuery>,
        params: SourceParams,
    ) -> Result<Self, SourceError> {
        if params.assets.is_empty() {
            return Err(SourceError::Config("No assets configured".to_string()));
        }
        for (asset_id, asset) in &params.assets {
            if asset.pair_contract.is_empty() {
                return Err(SourceError::Config(format!(
                    "Asset {} has no pair_contract configured",
                    asset_id
                )));
            }
        }

        Ok(Self {
            name: name.to_string(),
            query,
            assets: params.assets,
            concurrency_limit: params.concurrency_limit,
            pagination_limit: params.pagination_limit,
            tolerate_failed_fetches: params.tolerate_failed_fetches,
        })
    }

    /// Resolve the LP token contract from the pair contract's descriptor
    async fn lp_contract(&self, height: u64, pair_contract: &str) -> Result<String, QueryError> {
        let response = self
            .query
            .contract_state(pair_contract, height, &json!({ "pair": {} }))
            .await?;
        response
            .get("liquidity_token")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| QueryError::Decode("pair response missing liquidity_token".to_string()))
    }

    /// LP share -> underlying conversion rate at a height
    ///
    /// Computed fresh per (asset, height); never cached. A zero share supply
    /// is a fatal per-asset error, not an infinite rate.
    async fn lp_exchange_rate(
        &self,
        height: u64,
        denom: &str,
        lp_contract: &str,
        asset_id: &str,
    ) -> Result<f64, SourceError> {
        let msg = json!({ "total_supply_at": { "block": height } });
        let response = self.query.contract_state(lp_contract, height, &msg).await?;
        let lp_supply_raw = response
            .as_str()
            .ok_or_else(|| {
                QueryError::Decode("total_supply_at response is not a string".to_string())
            })?
            .to_string();
        let lp_supply: f64 = lp_supply_raw.parse().map_err(|_| {
            QueryError::Decode(format!("Invalid LP total supply: {}", lp_supply_raw))
        })?;

        let underlying_raw = self.query.total_supply(denom, height).await?;
        let underlying: f64 = underlying_raw.parse().map_err(|_| {
            QueryError::Decode(format!("Invalid underlying supply: {}", underlying_raw))
        })?;

        if lp_supply == 0.0 {
            return Err(SourceError::ZeroShareSupply {
                asset: asset_id.to_string(),
            });
        }

        Ok(underlying / lp_supply)
    }
}

#[async_trait]
impl Source for AstroportSource {
    async fn get_users_balances(
        &self,
        height: u64,
        multipliers: &HashMap<String, f64>,
        sink: &dyn BatchSink,
    ) -> Result<(), SourceError> {
        require_multipliers(&self.assets, multipliers)?;

        for (asset_id, asset) in &self.assets {
            let lp_contract = self.lp_contract(height, &asset.pair_contract).await?;
            let exchange_rate = self
                .lp_exchange_rate(height, &asset.denom, &lp_contract, asset_id)
                .await?;
            let multiplier = multipliers[asset_id] * exchange_rate;

            log::info!(
                "📊 {}: asset {} lp {} rate {:.6} effective multiplier {:.6}",
                self.name,
                asset_id,
                lp_contract,
                exchange_rate,
                multiplier
            );

            let lister = LpHolderLister {
                query: self.query.clone(),
                lp_contract: lp_contract.clone(),
            };
            let mut pages = HolderPages::new(&lister, height, self.pagination_limit);

            while let Some(holders) = pages.next_page().await? {
                log::debug!("Settling page of {} holders for {}", holders.len(), asset_id);

                let query = self.query.clone();
                let lp = lp_contract.clone();
                let asset_name = asset_id.clone();
                let balances = settle_page(
                    holders,
                    self.concurrency_limit,
                    self.tolerate_failed_fetches,
                    move |address| {
                        fetch_lp_balance(
                            query.clone(),
                            lp.clone(),
                            height,
                            address,
                            asset_name.clone(),
                        )
                    },
                )
                .await?;

                let batch = scale_batch(balances, multiplier);
                if batch.is_empty() {
                    continue;
                }
                sink.on_batch(batch).await.map_err(SourceError::Sink)?;
            }
        }

        Ok(())
    }

    async fn get_last_block_height(&self) -> Result<u64, SourceError> {
        Ok(self.query.latest_height().await?)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
