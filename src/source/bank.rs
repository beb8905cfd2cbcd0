//! Bank-module source
//!
//! Direct balance-ledger variant: holders of a native denom are enumerated
//! through the bank module's `DenomOwners` listing (opaque page-key cursor,
//! carried as base64 between pages), and each owner's bank balance is read
//! at the pinned height under the shared concurrency cap. No exchange rate
//! is involved; the caller's multiplier applies as-is.

use crate::fetcher::settle_page;
use crate::pagination::{HolderLister, HolderPage, HolderPages};
use crate::query::{QueryError, RpcStateQuery, StateQuery};
use crate::source::{
    require_multipliers, scale_batch, AssetParams, BatchSink, Source, SourceError, SourceParams,
    UserBalance,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::collections::HashMap;
use std::sync::Arc;

pub struct BankModuleSource {
    name: String,
    query: Arc<dyn StateQuery>,
    assets: Vec<(String, AssetParams)>,
    concurrency_limit: usize,
    pagination_limit: u32,
    tolerate_failed_fetches: bool,
}

/// `DenomOwners` listing for one denom; the cursor is the bank module's
/// page key, base64-encoded so it fits the string cursor contract
struct DenomOwnersLister {
    query: Arc<dyn StateQuery>,
    denom: String,
}

#[async_trait]
impl HolderLister for DenomOwnersLister {
    async fn list_page(
        &self,
        height: u64,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<HolderPage, QueryError> {
        let key = match cursor {
            Some(cursor) => Some(BASE64.decode(cursor.as_bytes()).map_err(|e| {
                QueryError::Decode(format!("Invalid page-key cursor: {}", e))
            })?),
            None => None,
        };

        let page = self
            .query
            .denom_owners(&self.denom, height, limit as u64, key)
            .await?;

        Ok(HolderPage {
            holders: page.addresses,
            next_cursor: page.next_key.map(|key| BASE64.encode(key)),
        })
    }
}

async fn fetch_bank_balance(
    query: Arc<dyn StateQuery>,
    denom: String,
    height: u64,
    address: String,
    asset: String,
) -> Result<UserBalance, QueryError> {
    let balance = query.balance(&address, &denom, height).await?;
    Ok(UserBalance {
        address,
        balance,
        asset,
    })
}

impl BankModuleSource {
    pub fn new(name: &str, rpc: &str, params: SourceParams) -> Result<Self, SourceError> {
        Self::with_query(name, Arc::new(RpcStateQuery::new(rpc)), params)
    }

    pub fn with_query(
        name: &str,
        query: Arc<dyn StateQuery>,
        params: SourceParams,
    ) -> Result<Self, SourceError> {
        if params.assets.is_empty() {
            return Err(SourceError::Config("No assets configured".to_string()));
        }
        for (asset_id, asset) in &params.assets {
            if asset.denom.is_empty() {
                return Err(SourceError::Config(format!(
                    "Asset {} has no denom configured",
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
}

#[async_trait]
impl Source for BankModuleSource {
    async fn get_users_balances(
        &self,
        height: u64,
        multipliers: &HashMap<String, f64>,
        sink: &dyn BatchSink,
    ) -> Result<(), SourceError> {
        require_multipliers(&self.assets, multipliers)?;

        for (asset_id, asset) in &self.assets {
            let multiplier = multipliers[asset_id];
            log::info!(
                "📊 {}: asset {} denom {} multiplier {:.6}",
                self.name,
                asset_id,
                asset.denom,
                multiplier
            );

            let lister = DenomOwnersLister {
                query: self.query.clone(),
                denom: asset.denom.clone(),
            };
            let mut pages = HolderPages::new(&lister, height, self.pagination_limit);

            while let Some(holders) = pages.next_page().await? {
                log::debug!("Settling page of {} holders for {}", holders.len(), asset_id);

                let query = self.query.clone();
                let denom = asset.denom.clone();
                let asset_name = asset_id.clone();
                let balances = settle_page(
                    holders,
                    self.concurrency_limit,
                    self.tolerate_failed_fetches,
                    move |address| {
                        fetch_bank_balance(
                            query.clone(),
                            denom.clone(),
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
