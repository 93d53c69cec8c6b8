use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::fetch::{listing_url, Fetch};
use crate::parser::ids::parse_ids;
use crate::store::IdWriter;

/// Why a walker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The page had no IDs: past the end of the listing.
    Exhausted { page: u32 },
    /// Next page would be past the configured ceiling.
    Ceiling { page: u32 },
    /// The page came back with a non-success status and no IDs. The rest of
    /// this walker's pages are not visited.
    ErrorStatus { page: u32, status: u16 },
}

enum WalkerEvent {
    /// IDs of one listing page, in document order.
    Ids(Vec<String>),
    Done { walker: u32, reason: StopReason },
}

struct WalkerSummary {
    pages: usize,
    retries: usize,
}

#[derive(Debug, Default)]
pub struct DiscoveryStats {
    pub ids: usize,
    pub pages: usize,
    pub retries: usize,
    pub exhausted: usize,
    pub ceiling_hits: usize,
    pub error_stops: usize,
}

/// Walk every listing page and write each stable ID as it arrives.
///
/// Walker `k` (1-based) owns pages `k, k + W, k + 2W, ...` so the walkers
/// cover the listing without overlap. Discovery is over once every walker
/// has reported `Done`. `out` is flushed after each page's IDs.
pub async fn discover_ids<W: Write>(
    fetcher: Arc<dyn Fetch>,
    settings: &Settings,
    out: &mut IdWriter<W>,
) -> Result<DiscoveryStats> {
    let walkers = settings.discovery_walkers as u32;
    let (tx, mut rx) = mpsc::channel::<WalkerEvent>(walkers as usize * 16);

    info!(walkers, ceiling = settings.page_ceiling, "discovering stable IDs");

    let mut tasks = JoinSet::new();
    for walker in 1..=walkers {
        let fetcher = Arc::clone(&fetcher);
        let base = settings.base_url.clone();
        let ceiling = settings.page_ceiling;
        let tx = tx.clone();
        tasks.spawn(async move { walk(fetcher.as_ref(), &base, walker, walkers, ceiling, tx).await });
    }
    drop(tx);

    let mut stats = DiscoveryStats::default();
    let mut done = 0u32;
    while done < walkers {
        let Some(event) = rx.recv().await else {
            // Every sender is gone without a Done: a walker panicked. The join below reports it.
            break;
        };
        match event {
            WalkerEvent::Ids(ids) => {
                for id in &ids {
                    out.write(id).with_context(|| format!("writing id {}", id))?;
                }
                out.flush().context("flushing id list")?;
                stats.ids += ids.len();
            }
            WalkerEvent::Done { walker, reason } => {
                done += 1;
                match reason {
                    StopReason::Exhausted { .. } => stats.exhausted += 1,
                    StopReason::Ceiling { .. } => stats.ceiling_hits += 1,
                    StopReason::ErrorStatus { .. } => stats.error_stops += 1,
                }
                debug!(walker, ?reason, done, "walker finished");
            }
        }
    }

    while let Some(joined) = tasks.join_next().await {
        let summary = joined.context("listing walker panicked")?;
        stats.pages += summary.pages;
        stats.retries += summary.retries;
    }

    info!(
        ids = stats.ids,
        pages = stats.pages,
        retries = stats.retries,
        error_stops = stats.error_stops,
        "discovery finished"
    );
    Ok(stats)
}

async fn walk(
    fetcher: &dyn Fetch,
    base: &str,
    walker: u32,
    step: u32,
    ceiling: u32,
    tx: mpsc::Sender<WalkerEvent>,
) -> WalkerSummary {
    let mut summary = WalkerSummary { pages: 0, retries: 0 };
    let mut page = walker;
    let mut attempt = 0usize;

    let reason = loop {
        if page > ceiling {
            warn!(walker, page, ceiling, "page ceiling reached, stopping walker");
            break StopReason::Ceiling { page };
        }

        let url = listing_url(base, page);
        debug!(walker, %url, "fetching listing page");
        let listing = match fetcher.fetch(&url).await {
            Ok(listing) => listing,
            Err(e) => {
                // Same page again, no cap and no backoff.
                attempt += 1;
                summary.retries += 1;
                warn!(walker, page, attempt, error = %e, "listing fetch failed, retrying");
                tokio::task::yield_now().await;
                continue;
            }
        };
        attempt = 0;
        summary.pages += 1;

        let ids = parse_ids(&listing.body);
        if ids.is_empty() {
            if !listing.is_success() {
                let status = listing.status;
                warn!(
                    walker,
                    page,
                    status,
                    "listing page returned an error status, stopping walker; its later pages are skipped"
                );
                break StopReason::ErrorStatus { page, status };
            }
            info!(walker, page, "no IDs on page, stopping walker");
            break StopReason::Exhausted { page };
        }
        debug!(walker, page, count = ids.len(), "found IDs");

        if tx.send(WalkerEvent::Ids(ids)).await.is_err() {
            return summary;
        }
        page += step;
    };

    let _ = tx.send(WalkerEvent::Done { walker, reason }).await;
    summary
}
