use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pricesync::config::{Config, EnvConfig};
use pricesync::sync::{PriceSync, StockSchedule};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pricesync")]
#[command(about = "Refresh tracked asset prices and the portfolio total")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "pricesync.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one refresh and print the run report
    Run {
        /// Refresh stock prices regardless of the hour
        #[arg(long, conflicts_with = "skip_stocks")]
        force_stocks: bool,

        /// Never refresh stock prices on this run
        #[arg(long)]
        skip_stocks: bool,
    },
    /// Show the effective configuration
    Config,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let layer = fmt::layer().with_writer(std::io::stderr).with_target(true).with_level(true);

    if json {
        tracing_subscriber::registry().with(filter).with(layer.json()).init();
    } else {
        tracing_subscriber::registry().with(filter).with(layer).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::var("ENVIRONMENT").map_or(true, |env| env != "production") {
        dotenv::dotenv().ok();
    }

    let cli = Cli::parse();
    init_tracing(cli.json);

    let config = Config::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load pricesync config: {}", cli.config.display()))?;

    match cli.command {
        Command::Config => {
            println!("# {}", cli.config.display());
            print!("{}", toml::to_string_pretty(&config).context("Failed to render config")?);
        }
        Command::Run {
            force_stocks,
            skip_stocks,
        } => {
            let env = EnvConfig::from_env()?;
            let mut sync = PriceSync::from_config(&config, &env)?;
            if force_stocks {
                sync = sync.with_schedule(StockSchedule::Always);
            } else if skip_stocks {
                sync = sync.with_schedule(StockSchedule::Never);
            }

            let report = sync.run().await?;
            info!(status = report.status_code, "price refresh complete");
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
