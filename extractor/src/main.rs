use anyhow::Context;
use catalog_core::{telemetry, Config, Error};
use catalog_extractor::app::App;
use catalog_extractor::market::Market;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::process;
use tracing::{error, info, Instrument};

#[derive(Parser)]
#[clap(name = "catalog-extractor")]
#[clap(about = "Vendor catalog extractor for Selling Partner API markets", version)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch catalog items for every credentialed market and store them
    Run {
        /// Only process these market codes (repeatable)
        #[clap(long = "market", env = "RUN_MARKETS", value_delimiter = ',')]
        markets: Vec<Market>,

        /// Partition date (YYYY-MM-DD), defaults to today in UTC
        #[clap(long, env = "RUN_DATE")]
        date: Option<NaiveDate>,
    },

    /// Print the built-in market table
    Markets,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, "Fatal error");
        eprintln!("Fatal error: {e:#}");
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Markets = cli.command {
        print_markets();
        return Ok(());
    }

    // Load configuration
    let config = Config::load()
        .map_err(Error::from)
        .context("Failed to load config")?;

    // Initialize telemetry
    telemetry::init(&config.telemetry)?;

    if let Commands::Run { markets, date } = cli.command {
        // Fixed once so every object of the run lands in the same partition
        let ingestion_date = date.unwrap_or_else(|| Utc::now().date_naive());
        let run_id = uuid::Uuid::new_v4();

        let app = App::new(config).await?;
        let summary = app
            .run(&markets, ingestion_date)
            .instrument(tracing::info_span!("run", %run_id))
            .await;

        for market in summary.skipped_markets() {
            info!(
                market = %market.market,
                reason = market.skipped.as_deref().unwrap_or_default(),
                "Market skipped"
            );
        }
        for market in summary.abandoned_markets() {
            info!(
                market = %market.market,
                processed = market.processed,
                unread = market.unread_rows(),
                reason = market.abandoned.as_deref().unwrap_or_default(),
                "Market abandoned partway"
            );
        }
    }

    telemetry::shutdown();
    Ok(())
}

fn print_markets() {
    println!("{:<6} {:<6} {:<16} {:<10} ENDPOINT", "MARKET", "REGION", "MARKETPLACE_ID", "AWS");
    for market in Market::ALL {
        let d = market.descriptor();
        println!(
            "{:<6} {:<6} {:<16} {:<10} {}",
            market,
            d.region,
            d.marketplace_id,
            d.region.aws_region(),
            d.api_endpoint
        );
    }
}
