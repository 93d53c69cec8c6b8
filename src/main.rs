mod config;
mod discover;
mod enrich;
mod error;
mod fetch;
mod geocode;
mod model;
mod parser;
mod scraper;
mod store;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::config::{GeocodeConfig, Settings};
use crate::fetch::{Fetch, HttpFetcher};
use crate::store::{IdWriter, RecordWriter};

#[derive(Parser)]
#[command(name = "stable_scraper", about = "Maryland Horse Board stable directory scraper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk the listing pages and write every stable ID
    Discover {
        /// Where to write the ID list
        #[arg(long, default_value = store::ID_FILE)]
        ids: PathBuf,
    },
    /// Fetch each stable page from an ID list
    Extract(ExtractArgs),
    /// Discover (if the ID list is missing) then extract
    Crawl(ExtractArgs),
    /// Geocode extracted stables
    Geocode {
        /// File containing stable data
        #[arg(long = "in", default_value = store::DATA_FILE)]
        input: PathBuf,
        /// Target file for geocoded data
        #[arg(long = "out", default_value = store::GEOCODED_FILE)]
        output: PathBuf,
    },
}

#[derive(Args)]
struct ExtractArgs {
    /// ID list to read (a previous error list works too)
    #[arg(long, default_value = store::ID_FILE)]
    ids: PathBuf,
    /// IDs that failed to fetch or parse
    #[arg(long, default_value = store::ERROR_FILE)]
    errors: PathBuf,
    /// Extracted stables, one JSON object per line
    #[arg(long, default_value = store::DATA_FILE)]
    out: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;
    info!(?settings, "settings loaded");

    let result = match cli.command {
        Commands::Discover { ids } => {
            let fetcher = http(&settings)?;
            run_discover(fetcher, &settings, &ids).await
        }
        Commands::Extract(args) => {
            let fetcher = http(&settings)?;
            run_extract(fetcher, &settings, &args).await
        }
        Commands::Crawl(args) => {
            let fetcher = http(&settings)?;
            if args.ids.exists() {
                println!("Using existing ID list {}", args.ids.display());
            } else {
                println!("Crawling portal...");
                run_discover(Arc::clone(&fetcher), &settings, &args.ids).await?;
            }
            run_extract(fetcher, &settings, &args).await
        }
        Commands::Geocode { input, output } => {
            let geocode = GeocodeConfig::from_env()?;
            let fetcher = http(&settings)?;
            run_geocode(fetcher, geocode, &settings, &input, &output).await
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn http(settings: &Settings) -> anyhow::Result<Arc<dyn Fetch>> {
    let fetcher = HttpFetcher::new(settings).context("building HTTP client")?;
    Ok(Arc::new(fetcher))
}

async fn run_discover(
    fetcher: Arc<dyn Fetch>,
    settings: &Settings,
    path: &Path,
) -> anyhow::Result<()> {
    let mut out = IdWriter::new(store::create(path)?);
    let stats = discover::discover_ids(fetcher, settings, &mut out).await?;
    let written = out.written();
    out.finish()
        .with_context(|| format!("flushing {}", path.display()))?;

    println!(
        "Found {} IDs on {} pages ({} transport retries, {} walkers hit the page ceiling)",
        stats.ids, stats.pages, stats.retries, stats.ceiling_hits
    );
    if stats.error_stops > 0 {
        println!(
            "{} walkers stopped on an error status; their later pages were not visited.",
            stats.error_stops
        );
    }
    println!("Wrote {} IDs to {}", written, path.display());
    Ok(())
}

async fn run_extract(
    fetcher: Arc<dyn Fetch>,
    settings: &Settings,
    args: &ExtractArgs,
) -> anyhow::Result<()> {
    let ids = store::read_ids(&args.ids)?;
    if ids.is_empty() {
        println!("No IDs in {}. Run 'discover' first.", args.ids.display());
        return Ok(());
    }

    let mut errors = IdWriter::new(store::create(&args.errors)?);
    let mut data = RecordWriter::new(store::create(&args.out)?);

    println!("Scraping {} stables ({} workers)...", ids.len(), settings.detail_workers);
    let stats = scraper::scrape_stables(fetcher, settings, ids, &mut errors, &mut data).await?;
    errors
        .finish()
        .with_context(|| format!("flushing {}", args.errors.display()))?;
    data.finish()
        .with_context(|| format!("flushing {}", args.out.display()))?;

    println!(
        "Done: {} scraped ({} ok, {} errors).",
        stats.total, stats.ok, stats.errors
    );
    if stats.errors > 0 {
        println!(
            "Failed IDs are in {}; rerun with --ids {} to retry them.",
            args.errors.display(),
            args.errors.display()
        );
    }
    Ok(())
}

async fn run_geocode(
    fetcher: Arc<dyn Fetch>,
    geocode: GeocodeConfig,
    settings: &Settings,
    input: &Path,
    output: &Path,
) -> anyhow::Result<()> {
    println!("Reading from {}, writing to {}", input.display(), output.display());
    let records: Vec<_> = store::open_records(input)?.collect();

    let enricher = enrich::Enricher::new(fetcher, geocode, settings.geocode_delay());
    let (stables, stats) = enricher.run(records).await?;
    store::write_enriched(output, &stables)?;

    println!(
        "Geocoded {} of {} stables ({} dropped).",
        stats.geocoded, stats.read, stats.dropped
    );
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
