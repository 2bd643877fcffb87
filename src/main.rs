mod config;
mod error;
mod loader;
mod models;
mod pipeline;
mod scraper;
mod storage;
mod utils;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::AppConfig;
use crate::error::RunFailure;
use crate::loader::{discover_snapshots, load_snapshot, snapshot_url};
use crate::models::{ListingKind, RouteType};
use crate::pipeline::rating::ThreadRandom;
use crate::pipeline::{Pipeline, RunReport, validate_hotel_url};
use crate::scraper::geo::{GeoLookup, NoGeoLookup, NominatimLookup};
use crate::scraper::{SnapshotSession, WebDriverSession};
use crate::storage::{CsvStore, Tabular};

#[derive(Parser)]
#[command(name = "travel-scraper", about = "Bus, train and hotel listing extractor", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Directory for the CSV files (overrides `output.dir`)
    #[arg(short, long, global = true)]
    out: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape a bus search results page
    Bus {
        #[arg(long)]
        url: String,

        #[arg(long, value_enum, default_value = "route")]
        route_type: RouteType,
    },

    /// Scrape a train search results page
    Train {
        #[arg(long)]
        url: String,

        #[arg(long, value_enum, default_value = "route")]
        route_type: RouteType,
    },

    /// Scrape a booking.com search results page
    Hotel {
        #[arg(long)]
        url: String,

        /// Skip the geocoding lookup; map links stay empty
        #[arg(long)]
        no_maps: bool,
    },

    /// Extract listings from saved pages instead of a live browser
    Parse {
        #[arg(long, value_enum)]
        kind: ListingKind,

        /// A single saved page
        #[arg(long, conflicts_with = "dir", required_unless_present = "dir")]
        file: Option<PathBuf>,

        /// Every .html/.htm page in a directory
        #[arg(long)]
        dir: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "route")]
        route_type: RouteType,

        #[arg(long)]
        no_maps: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "travel_scraper=info,warn",
        1 => "travel_scraper=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;
    let out_dir = cli.out.clone().unwrap_or_else(|| config.output.dir.clone());
    let store = CsvStore::open(&out_dir)?;
    info!("CSV output goes to {:?}", store.dir());
    let pipeline = Pipeline::new(config);

    match cli.command {
        Command::Bus { url, route_type } => {
            let mut session = WebDriverSession::start(&pipeline.config().browser).await?;
            let outcome = pipeline.run_bus(&mut session, &url, route_type).await;
            present(ListingKind::Bus, outcome, &store)?;
        }

        Command::Train { url, route_type } => {
            let mut session = WebDriverSession::start(&pipeline.config().browser).await?;
            let outcome = pipeline.run_train(&mut session, &url, route_type).await;
            present(ListingKind::Train, outcome, &store)?;
        }

        Command::Hotel { url, no_maps } => {
            // Reject before a browser is ever launched.
            validate_hotel_url(&url)?;
            let geo = geo_lookup(&pipeline, no_maps)?;
            let mut session = WebDriverSession::start(&pipeline.config().browser).await?;
            let outcome = pipeline
                .run_hotel(&mut session, &url, geo.as_ref(), &mut ThreadRandom)
                .await;
            present(ListingKind::Hotel, outcome, &store)?;
        }

        Command::Parse { kind, file, dir, route_type, no_maps } => {
            let files = match (file, dir) {
                (Some(file), _) => vec![file],
                (None, Some(dir)) => discover_snapshots(&dir)?,
                (None, None) => vec![],
            };
            if files.is_empty() {
                warn!("No saved pages to parse.");
            }

            let geo = geo_lookup(&pipeline, no_maps)?;
            let mut failures = 0usize;
            for path in &files {
                if let Err(e) = parse_snapshot(&pipeline, kind, path, route_type, geo.as_ref(), &store).await {
                    eprintln!("{:?}: {:#}", path, e);
                    failures += 1;
                }
            }

            info!("Parsed {} page(s), {} failed", files.len() - failures, failures);
            if failures > 0 {
                return Err(anyhow!("{} of {} page(s) failed", failures, files.len()));
            }
        }
    }

    Ok(())
}

fn geo_lookup(pipeline: &Pipeline, no_maps: bool) -> Result<Box<dyn GeoLookup>> {
    let geo = &pipeline.config().geo;
    if no_maps || !geo.enabled {
        info!("Map link lookup disabled.");
        return Ok(Box::new(NoGeoLookup));
    }
    Ok(Box::new(NominatimLookup::new(geo)?))
}

async fn parse_snapshot(
    pipeline: &Pipeline,
    kind: ListingKind,
    path: &Path,
    route_type: RouteType,
    geo: &dyn GeoLookup,
    store: &CsvStore,
) -> Result<()> {
    let mut session = SnapshotSession::new(load_snapshot(path)?);
    let url = snapshot_url(path);

    match kind {
        ListingKind::Bus => {
            let outcome = pipeline.run_bus(&mut session, &url, route_type).await;
            present(kind, outcome, store)
        }
        ListingKind::Train => {
            let outcome = pipeline.run_train(&mut session, &url, route_type).await;
            present(kind, outcome, store)
        }
        ListingKind::Hotel => {
            let outcome = pipeline.replay_hotel(&mut session, geo, &mut ThreadRandom).await;
            present(kind, outcome, store)
        }
    }
}

/// Summary, CSV files, then the run's log. Failed runs still show their log.
fn present<T: Tabular>(
    kind: ListingKind,
    outcome: std::result::Result<RunReport<T>, RunFailure>,
    store: &CsvStore,
) -> Result<()> {
    let report = match outcome {
        Ok(report) => report,
        Err(failure) => {
            println!("─────────────────────────────────");
            println!("  {} scraping failed", kind.label());
            println!("─────────────────────────────────");
            print_log(&failure.log);
            if let Some(hint) = failure.error.hint() {
                eprintln!("hint: {}", hint);
            }
            return Err(failure.error.into());
        }
    };

    let written = report.records.save(store)?;

    println!("─────────────────────────────────");
    println!("  {} results", kind.label());
    println!("─────────────────────────────────");
    println!("  Rows     : {}", report.records.row_count());
    println!("  Problems : {}", report.log.problems().count());
    println!("  Took     : {}", utils::fmt_seconds(report.elapsed));
    if written.is_empty() {
        println!("  Files    : none (no rows)");
    }
    for path in &written {
        println!("  File     : {}", path.display());
    }
    println!("─────────────────────────────────");
    print_log(&report.log);
    Ok(())
}

fn print_log(log: &models::ExtractionLog) {
    if log.is_empty() {
        return;
    }
    println!("Extraction log ({} entries):", log.len());
    for entry in log.entries() {
        println!("  {}", entry);
    }
}
