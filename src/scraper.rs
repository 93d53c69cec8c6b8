use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::fetch::{detail_url, Fetch};
use crate::model::Stable;
use crate::parser::stable::extract;
use crate::store::{IdWriter, RecordWriteError, RecordWriter};

/// Scrape stats returned after completion.
#[derive(Debug, Default)]
pub struct ScrapeStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
}

/// Fetch and extract every ID with a fixed pool of workers.
///
/// Resolved stables go to `data`, everything else to `errors` (ID only).
/// Each input ID produces exactly one line in one of the two.
pub async fn scrape_stables<E: Write, D: Write>(
    fetcher: Arc<dyn Fetch>,
    settings: &Settings,
    ids: Vec<String>,
    errors: &mut IdWriter<E>,
    data: &mut RecordWriter<D>,
) -> Result<ScrapeStats> {
    let workers = settings.detail_workers;
    let total = ids.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    // Feeder: IDs in, shared by all workers.
    let (id_tx, id_rx) = mpsc::channel::<String>(workers * 2);
    let id_rx = Arc::new(Mutex::new(id_rx));
    tokio::spawn(async move {
        for id in ids {
            if id_tx.send(id).await.is_err() {
                break;
            }
        }
    });

    // Channel: workers send results, main loop writes them
    let (tx, mut rx) = mpsc::channel::<Stable>(workers * 2);

    let mut pool = JoinSet::new();
    for worker in 0..workers {
        let fetcher = Arc::clone(&fetcher);
        let id_rx = Arc::clone(&id_rx);
        let base = settings.base_url.clone();
        let tx = tx.clone();

        pool.spawn(async move {
            loop {
                let next = id_rx.lock().await.recv().await;
                let Some(id) = next else { break };
                let stable = scrape_one(fetcher.as_ref(), &base, id).await;
                if tx.send(stable).await.is_err() {
                    break;
                }
            }
            debug!(worker, "detail worker done");
        });
    }

    // Drop our copy of tx so rx closes when every worker has finished
    drop(tx);

    let mut stats = ScrapeStats {
        total,
        ..Default::default()
    };

    while let Some(stable) = rx.recv().await {
        if !stable.is_resolved() {
            errors.write(&stable.id)?;
            stats.errors += 1;
        } else {
            match data.write(&stable) {
                Ok(()) => stats.ok += 1,
                Err(RecordWriteError::Serialize { id, source }) => {
                    warn!(%id, error = %source, "could not serialize stable, marking failed");
                    errors.write(&id)?;
                    stats.errors += 1;
                }
                Err(e) => return Err(e).context("writing success list"),
            }
        }
        pb.inc(1);
    }

    while let Some(joined) = pool.join_next().await {
        joined.context("detail worker panicked")?;
    }

    pb.finish_and_clear();
    info!(
        "Scraped {} stables ({} ok, {} errors)",
        stats.total, stats.ok, stats.errors
    );

    Ok(stats)
}

/// One ID in, one stable out. Failures come back unresolved; the cause is
/// only in the log.
async fn scrape_one(fetcher: &dyn Fetch, base: &str, id: String) -> Stable {
    let url = detail_url(base, &id);
    debug!(%id, %url, "fetching stable page");

    let page = match fetcher.fetch(&url).await {
        Ok(page) => page,
        Err(e) => {
            warn!(%id, error = %e, "stable page fetch failed");
            return Stable::unresolved(id);
        }
    };

    match extract(&id, &page.body) {
        Ok(stable) => stable,
        Err(e) => {
            warn!(%id, error = %e, "stable page did not parse");
            Stable::unresolved(id)
        }
    }
}
