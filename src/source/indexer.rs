//! External-indexer source
//!
//! Indexer-backed variant for chains where walking contract state over RPC
//! is impractical. The indexer already knows per-holder balances at a
//! height, so each page arrives with balances inline and there is no
//! per-holder fetch fan-out. Pagination, zero-filtering, scaling and
//! streaming behave exactly like the ledger-backed variants.
//!
//! Endpoint contract:
//! - `GET {base}/balances?denom=&height=&limit=&cursor=` returning
//!   `{ "balances": [{ "address": "...", "balance": "..." }],
//!      "next_cursor": "..." | null }`
//! - `GET {base}/status` returning `{ "height": 123 }`

use crate::query::QueryError;
use crate::source::{
    require_multipliers, scale_batch, AssetParams, BatchSink, Source, SourceError, SourceParams,
    UserBalance,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::OnceCell;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct IndexerBalance {
    address: String,
    balance: String,
}

#[derive(Debug, Deserialize)]
struct IndexerBalancesPage {
    balances: Vec<IndexerBalance>,
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndexerStatus {
    height: u64,
}

pub struct IndexerSource {
    name: String,
    base_url: String,
    assets: Vec<(String, AssetParams)>,
    pagination_limit: u32,
    client: OnceCell<reqwest::Client>,
}

impl IndexerSource {
    pub fn new(name: &str, base_url: &str, params: SourceParams) -> Result<Self, SourceError> {
        if params.assets.is_empty() {
            return Err(SourceError::Config("No assets configured".to_string()));
        }
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(SourceError::Config(format!(
                "Indexer URL must start with http:// or https://: {}",
                base_url
            )));
        }

        Ok(Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            assets: params.assets,
            pagination_limit: params.pagination_limit,
            client: OnceCell::new(),
        })
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

    async fn fetch_page(
        &self,
        denom: &str,
        height: u64,
        cursor: Option<&str>,
    ) -> Result<IndexerBalancesPage, QueryError> {
        let client = self.client().await?;
        let url = format!("{}/balances", self.base_url);

        let mut request = client.get(&url).query(&[
            ("denom", denom.to_string()),
            ("height", height.to_string()),
            ("limit", self.pagination_limit.to_string()),
        ]);
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(QueryError::Transport(format!(
                "Indexer returned HTTP {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl Source for IndexerSource {
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

            let mut cursor: Option<String> = None;
            loop {
                let page = self
                    .fetch_page(&asset.denom, height, cursor.as_deref())
                    .await?;
                if page.balances.is_empty() {
                    break;
                }
                log::debug!(
                    "Indexer page of {} balances for {}",
                    page.balances.len(),
                    asset_id
                );

                let balances: Vec<UserBalance> = page
                    .balances
                    .into_iter()
                    .filter(|b| b.balance != "0")
                    .map(|b| UserBalance {
                        address: b.address,
                        balance: b.balance,
                        asset: asset_id.clone(),
                    })
                    .collect();

                let batch = scale_batch(balances, multiplier);
                if !batch.is_empty() {
                    sink.on_batch(batch).await.map_err(SourceError::Sink)?;
                }

                match page.next_cursor {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
            }
        }

        Ok(())
    }

    async fn get_last_block_height(&self) -> Result<u64, SourceError> {
        let client = self.client().await.map_err(SourceError::Query)?;
        let url = format!("{}/status", self.base_url);

        let response = client
            .get(&url)
            .send()
            .await
            .map_err(QueryError::from)?;
        if !response.status().is_success() {
            return Err(SourceError::Query(QueryError::Transport(format!(
                "Indexer returned HTTP {}",
                response.status()
            ))));
        }
        let status: IndexerStatus = response.json().await.map_err(QueryError::from)?;
        Ok(status.height)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
