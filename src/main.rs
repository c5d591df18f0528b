mod config;
mod loader;
mod market;
mod metrics;
mod models;
mod pipeline;
mod provider;
mod sources;
mod statement;
mod storage;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::pipeline::Pipeline;
use crate::provider::http_client::HttpClient;
use crate::provider::yahoo::YahooProvider;

#[derive(Parser)]
#[command(name = "jpx-screener", about = "Stock listing and fundamentals ETL", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Download the exchange listing spreadsheet and write stocks_all.json
    JpList {
        /// Output file (default: stocks_all.json in the listing directory)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Fetch the ticker registry, enrich every ticker, write us_stocks_all.json
    UsList {
        /// Output file (default: us_stocks_all.json in the listing directory)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Split a listing JSON into fixed-size chunk files
    Split {
        /// Input listing JSON
        #[arg(short, long, default_value = "stocks_all.json")]
        input: PathBuf,

        /// Companies per chunk file
        #[arg(short = 's', long = "size", default_value_t = 1000,
              value_parser = clap::value_parser!(u32).range(1..))]
        size: u32,
    },

    /// Fetch fundamentals for every listed company and write a timestamped CSV
    Summarize {
        /// Input listing JSON
        #[arg(default_value = "stocks_sample.json")]
        input: PathBuf,

        /// Input listing JSON as a flag (overrides the positional)
        #[arg(short, long = "json")]
        json: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "jpx_screener=info,warn",
        1 => "jpx_screener=debug,info",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .compact()
        .with_target(false)
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;

    match cli.command {
        Command::JpList { out } => {
            let _t = utils::Timer::start("Exchange listing download");
            let client = HttpClient::new(&config.http)?;
            let records = sources::jpx::fetch_listing(&config.sources, &client).await?;

            let path = out.unwrap_or_else(|| config.export.listing_dir.join("stocks_all.json"));
            storage::write_records_json(&path, &records)?;
            info!("Saved {} companies to {:?}", records.len(), path);
        }

        Command::UsList { out } => {
            let _t = utils::Timer::start("Registry listing build");
            let provider = YahooProvider::new(&config)?;
            let records = sources::sec::build_us_listing(&config, &provider).await?;

            let path = out.unwrap_or_else(|| config.export.listing_dir.join("us_stocks_all.json"));
            storage::write_records_json(&path, &records)?;
            info!("Saved {} companies to {:?}", records.len(), path);
        }

        Command::Split { input, size } => {
            let files = loader::split_listing(&input, size as usize, &config.export.listing_dir)?;
            info!("{} chunk files written", files.len());
        }

        Command::Summarize { input, json } => {
            let input = json.unwrap_or(input);
            let stats = Pipeline::new(config)?.run(&input).await?;

            info!(
                "Summary: {} succeeded / {} failed (of {})",
                stats.succeeded, stats.failed, stats.processed
            );
            if let Some(path) = stats.output {
                info!("Snapshot file: {:?}", path);
            }
        }
    }

    Ok(())
}
