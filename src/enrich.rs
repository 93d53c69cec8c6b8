use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::config::GeocodeConfig;
use crate::error::EnrichError;
use crate::fetch::Fetch;
use crate::geocode::resolve;
use crate::model::Stable;

#[derive(Debug, Default)]
pub struct EnrichStats {
    pub read: usize,
    pub geocoded: usize,
    pub dropped: usize,
}

/// Geocodes stables one at a time, pausing between lookups.
pub struct Enricher {
    fetcher: Arc<dyn Fetch>,
    config: GeocodeConfig,
    delay: Duration,
}

impl Enricher {
    pub fn new(fetcher: Arc<dyn Fetch>, config: GeocodeConfig, delay: Duration) -> Self {
        Self {
            fetcher,
            config,
            delay,
        }
    }

    pub async fn geocode(&self, stable: Stable) -> Result<Stable, EnrichError> {
        let url = self.config.query_url(&stable.address);
        debug!(id = %stable.id, address = %stable.address, "geocoding");
        let page = self.fetcher.fetch(&url).await?;
        let resolution = resolve(&page.body)?;
        Ok(resolution.apply(stable))
    }

    /// Only stables that geocoded cleanly come back; the rest are logged and
    /// dropped, never passed through without coordinates.
    pub async fn run<I>(&self, records: I) -> anyhow::Result<(Vec<Stable>, EnrichStats)>
    where
        I: IntoIterator<Item = anyhow::Result<Stable>>,
        I::IntoIter: ExactSizeIterator,
    {
        let records = records.into_iter();
        let pb = ProgressBar::new(records.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} (eta {eta})")?
                .progress_chars("=> "),
        );

        let delay_ms = self.delay.as_millis() as u64;
        info!(geocoder = %self.config.url, delay_ms, "geocoding stables");

        let mut stats = EnrichStats::default();
        let mut enriched = Vec::new();
        let mut first_call = true;

        for record in records {
            pb.inc(1);
            stats.read += 1;

            let stable = match record {
                Ok(stable) => stable,
                Err(e) => {
                    let reason = format!("{:#}", e);
                    warn!(error = %reason, "skipping unreadable record");
                    stats.dropped += 1;
                    continue;
                }
            };

            if !first_call {
                tokio::time::sleep(self.delay).await;
            }
            first_call = false;

            let id = stable.id.clone();
            let address = stable.address.clone();
            match self.geocode(stable).await {
                Ok(stable) => {
                    stats.geocoded += 1;
                    enriched.push(stable);
                }
                Err(e) => {
                    warn!(%id, %address, error = %e, "geocode failed, dropping stable");
                    stats.dropped += 1;
                }
            }
        }

        pb.finish_and_clear();
        info!(
            "Geocoded {} of {} stables ({} dropped)",
            stats.geocoded, stats.read, stats.dropped
        );
        Ok((enriched, stats))
    }
}
