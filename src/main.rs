mod api;
mod config;
mod db;
mod error;
mod feeds;
mod fetcher;
mod ingest;
mod jobs;
mod merge;
mod scanner;
mod types;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::db::{Gateway, MarketDataStore};
use crate::error::Result;
use crate::fetcher::{DirectorySource, FeedSource, HttpSource};
use crate::ingest::Ingestor;
use crate::jobs::run_scan_job;
use crate::scanner::Scanner;
use crate::types::ScanParams;

#[derive(Parser)]
#[command(
    name = "scanner",
    about = "End-of-day delivery and volume accumulation scanner for NSE equities"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the JSON API.
    Serve,
    /// Fetch, merge and store the daily feeds for a date or date range.
    Ingest {
        /// First date to ingest (YYYY-MM-DD).
        #[arg(long)]
        from: NaiveDate,

        /// Last date to ingest, inclusive. Defaults to --from.
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Download from the exchange archive instead of reading local files.
        #[arg(long, default_value_t = false)]
        http: bool,

        /// Directory feed files are read from, or saved to with --http. Defaults to FEED_DIR.
        #[arg(long)]
        feed_dir: Option<PathBuf>,

        /// Dates processed in parallel. Defaults to INGEST_CONCURRENCY.
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Scan one stored date and print the ranked results as JSON.
    Scan {
        /// Trading date to evaluate (YYYY-MM-DD).
        #[arg(long)]
        date: NaiveDate,

        #[arg(long)]
        min_delivery: Option<f64>,

        #[arg(long)]
        vol_multiplier: Option<f64>,

        #[arg(long)]
        max_price_move: Option<f64>,

        /// Trading days in the average-volume baseline.
        #[arg(long)]
        lookback: Option<u32>,

        /// Record the run and store its results.
        #[arg(long, default_value_t = false)]
        persist: bool,

        /// With --persist, rescan even if a completed run exists.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// List stored trading dates, newest first.
    Dates,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli.command, cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Commands, cfg: Config) -> Result<()> {
    let gateway = Gateway::open(&cfg.db_path).await?;
    info!("Database ready at {}", cfg.db_path);

    match command {
        Commands::Serve => serve(&cfg, gateway).await,
        Commands::Ingest { from, to, http, feed_dir, concurrency } => {
            let to = to.unwrap_or(from);
            let feed_dir = feed_dir.unwrap_or_else(|| cfg.feed_dir.clone());
            let source: Box<dyn FeedSource> = if http {
                Box::new(HttpSource::from_config(&Config { feed_dir, ..cfg.clone() })?)
            } else {
                Box::new(DirectorySource::new(feed_dir))
            };
            let concurrency = concurrency.unwrap_or(cfg.ingest_concurrency);

            let summary = Ingestor::new(source.as_ref(), &gateway)
                .ingest_range(from, to, concurrency)
                .await;
            for (date, reason) in &summary.failed {
                warn!(date = %date, "[INGEST] not stored: {reason}");
            }
            summary.ensure_complete()
        }
        Commands::Scan {
            date,
            min_delivery,
            vol_multiplier,
            max_price_move,
            lookback,
            persist,
            force,
        } => {
            let defaults = cfg.scan_defaults;
            let params = ScanParams {
                min_delivery_pct: min_delivery.unwrap_or(defaults.min_delivery_pct),
                volume_spike_multiplier: vol_multiplier.unwrap_or(defaults.volume_spike_multiplier),
                max_price_move_pct: max_price_move.unwrap_or(defaults.max_price_move_pct),
                lookback_days: lookback.unwrap_or(defaults.lookback_days),
            };
            params.validate()?;

            let outcome = if persist {
                run_scan_job(&gateway, date, &params, force).await
            } else {
                Scanner::new(&gateway).run(date, &params).await
            };
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Commands::Dates => {
            for date in gateway.available_dates().await? {
                println!("{date}");
            }
            Ok(())
        }
    }
}

async fn serve(cfg: &Config, gateway: Gateway) -> Result<()> {
    let state = ApiState {
        gateway,
        scan_defaults: cfg.scan_defaults,
    };
    let app = router(state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
