//! Collection run orchestration
//!
//! Drives one source at one height: resolves the height when none is
//! pinned, streams every batch the source produces into the caller's sink,
//! and logs a per-run summary. The sink is awaited per batch, so a slow
//! consumer naturally throttles the producer.

use crate::source::{BatchSink, Source, SourceError, UserBalance};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Use the pinned height, or ask the ledger for its latest finalized one
pub async fn resolve_height(
    source: &dyn Source,
    pinned: Option<u64>,
) -> Result<u64, SourceError> {
    match pinned {
        Some(height) => Ok(height),
        None => {
            let height = source.get_last_block_height().await?;
            log::info!("No height pinned, using latest finalized height {}", height);
            Ok(height)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectStats {
    pub batches: u64,
    pub records: u64,
}

/// Pass-through sink that counts what flows to the real one
struct CountingSink<'a> {
    inner: &'a dyn BatchSink,
    batches: AtomicU64,
    records: AtomicU64,
}

#[async_trait]
impl BatchSink for CountingSink<'_> {
    async fn on_batch(
        &self,
        batch: Vec<UserBalance>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        self.records.fetch_add(batch.len() as u64, Ordering::SeqCst);
        self.inner.on_batch(batch).await
    }
}

/// Run one full aggregation pass for a source and report what was streamed
pub async fn collect(
    source: &dyn Source,
    height: u64,
    multipliers: &HashMap<String, f64>,
    sink: &dyn BatchSink,
) -> Result<CollectStats, SourceError> {
    let started = Instant::now();
    log::info!(
        "🚀 Collecting {} balances at height {}",
        source.name(),
        height
    );

    let counting = CountingSink {
        inner: sink,
        batches: AtomicU64::new(0),
        records: AtomicU64::new(0),
    };
    source.get_users_balances(height, multipliers, &counting).await?;

    let stats = CollectStats {
        batches: counting.batches.load(Ordering::SeqCst),
        records: counting.records.load(Ordering::SeqCst),
    };
    log::info!(
        "✅ {} complete: {} records in {} batches ({}ms)",
        source.name(),
        stats.records,
        stats.batches,
        started.elapsed().as_millis()
    );

    Ok(stats)
}

#[derive(Serialize)]
struct BalanceRow<'a> {
    address: &'a str,
    balance: &'a str,
    asset: &'a str,
    height: u64,
    collected_at: i64,
}

/// Default sink for the binary: one JSON object per record, appended to a
/// JSONL file and flushed per batch
pub struct JsonlSink {
    height: u64,
    writer: Mutex<BufWriter<std::fs::File>>,
}

impl JsonlSink {
    pub fn new(path: &Path, height: u64) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        log::info!("📝 Writing balances to: {}", path.display());
        Ok(Self {
            height,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

#[async_trait]
impl BatchSink for JsonlSink {
    async fn on_batch(
        &self,
        batch: Vec<UserBalance>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let collected_at = chrono::Utc::now().timestamp();
        let mut writer = self.writer.lock().unwrap();

        for record in &batch {
            let row = BalanceRow {
                address: &record.address,
                balance: &record.balance,
                asset: &record.asset,
                height: self.height,
                collected_at,
            };
            let json = serde_json::to_string(&row)?;
            writeln!(writer, "{}", json)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl Drop for JsonlSink {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}
