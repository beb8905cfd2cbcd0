//! Bounded concurrent per-holder balance fetching
//!
//! One page of holder addresses fans out into individual balance reads with
//! a hard cap on how many are in flight at once. Settle-all semantics: every
//! fetch runs to completion or failure independently, and (by default) a
//! failed fetch drops that holder from the page instead of aborting the
//! page. Results come back in completion order, not request order.

use crate::query::QueryError;
use crate::source::UserBalance;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Fetch every address in a page under the concurrency cap and gather the
/// surviving non-zero balances
///
/// `fetch` builds the balance read for one address; the future only starts
/// running once a semaphore permit is held, so at most `concurrency_limit`
/// reads are outstanding at any instant.
///
/// Failure policy: with `tolerate_failures` the failed holder is logged and
/// dropped (silent undercount, no retry); without it the first failure
/// aborts the page and bubbles up.
pub async fn settle_page<F, Fut>(
    addresses: Vec<String>,
    concurrency_limit: usize,
    tolerate_failures: bool,
    fetch: F,
) -> Result<Vec<UserBalance>, QueryError>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<UserBalance, QueryError>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency_limit.max(1)));
    let mut tasks = JoinSet::new();

    for address in addresses {
        let semaphore = semaphore.clone();
        let fut = fetch(address.clone());
        tasks.spawn(async move {
            // Futures are lazy: the read does not start until the permit
            // is acquired
            let _permit = semaphore.acquire_owned().await.ok();
            (address, fut.await)
        });
    }

    let mut balances = Vec::new();
    let mut dropped = 0usize;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(balance))) => balances.push(balance),
            Ok((address, Err(e))) => {
                if !tolerate_failures {
                    tasks.abort_all();
                    return Err(e);
                }
                dropped += 1;
                log::warn!("⚠️  Dropping holder {}: {}", address, e);
            }
            Err(e) => {
                if !tolerate_failures {
                    tasks.abort_all();
                    return Err(QueryError::Transport(format!("Fetch task failed: {}", e)));
                }
                dropped += 1;
                log::error!("❌ Fetch task failed: {}", e);
            }
        }
    }

    if dropped > 0 {
        log::warn!("⚠️  Dropped {} holders from page after fetch failures", dropped);
    }

    // Zero balances carry no reward and are not worth propagating
    balances.retain(|b| b.balance != "0");
    Ok(balances)
}
