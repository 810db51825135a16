//! TriSplit command line
//!
//! Preview splits, replay scripted scenarios against in-memory
//! collaborators, and inspect a configured splitter store.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use trisplit_splitter::{DonationSplitter, SplitterConfig};
use trisplit_types::{
    format_units, Address, AssetInfo, Bps, EpochPolicy, MAX_DECIMALS, SHARE_DECIMALS,
};

mod scenario;

use scenario::{Scenario, Simulation};

#[derive(Parser)]
#[command(name = "trisplit-cli")]
#[command(about = "TriSplit epoch-weighted donation splitter tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how an asset amount splits across three weights
    Preview {
        /// Asset amount in raw units
        #[arg(long)]
        assets: u128,

        /// Three comma-separated weights in basis points, e.g. 5000,3000,2000
        #[arg(long, value_delimiter = ',')]
        weights: Vec<Bps>,

        /// Asset decimals used for display
        #[arg(
            long,
            default_value_t = 18,
            value_parser = clap::value_parser!(u8).range(0..=MAX_DECIMALS as i64)
        )]
        decimals: u8,

        /// Asset symbol used for display
        #[arg(long, default_value = "ASSET")]
        symbol: String,
    },

    /// Replay a scenario file and print the results as JSON
    Simulate {
        /// Splitter configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Scenario file
        #[arg(short, long)]
        scenario: PathBuf,

        /// Stop at the first failed step
        #[arg(long)]
        fail_fast: bool,
    },

    /// Print epoch, pending shares, policies and settlement statistics
    Status {
        /// Splitter configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Number of recent settlements to list
        #[arg(long, default_value_t = 5)]
        recent: usize,
    },

    /// Load and validate a configuration file
    CheckConfig {
        /// Splitter configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Preview {
            assets,
            weights,
            decimals,
            symbol,
        } => {
            init_tracing("warn");
            preview(assets, &weights, &AssetInfo::new(symbol, decimals))?;
        }
        Commands::Simulate {
            config,
            scenario,
            fail_fast,
        } => {
            let config = load_config(&config)?;
            init_tracing(&config.logging.level);
            simulate(&config, &scenario, fail_fast)?;
        }
        Commands::Status { config, recent } => {
            let config = load_config(&config)?;
            init_tracing(&config.logging.level);
            status(&config, recent)?;
        }
        Commands::CheckConfig { config } => {
            let loaded = load_config(&config)?;
            println!("✓ {} is valid", config.display());
            println!("{}", loaded.to_toml_string()?);
        }
    }

    Ok(())
}

/// Logs go to stderr so JSON output on stdout stays machine readable.
/// `RUST_LOG` wins over the configured level.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: &Path) -> Result<SplitterConfig> {
    SplitterConfig::load(path).with_context(|| format!("Failed to load config {}", path.display()))
}

fn preview(assets: u128, weights: &[Bps], asset: &AssetInfo) -> Result<()> {
    let weights: [Bps; 3] = match weights.try_into() {
        Ok(w) => w,
        Err(_) => bail!("expected exactly 3 weights, got {}", weights.len()),
    };
    // Placeholder recipients; only the weights matter for a preview
    let recipients = [1u8, 2, 3].map(|n| Address::new([n; 20]));
    let policy = EpochPolicy::new(recipients, weights).context("Invalid weights")?;
    let split = policy.split(assets);

    println!("Splitting {}", asset.display_amount(assets));
    for (index, (amount, bps)) in split.amounts.iter().zip(weights).enumerate() {
        println!(
            "  slot {}: {:>8} -> {}",
            index,
            format_bps(bps),
            asset.display_amount(*amount)
        );
    }
    println!("  remainder folded into slot 0: {}", split.remainder);
    Ok(())
}

fn simulate(config: &SplitterConfig, scenario_path: &Path, fail_fast: bool) -> Result<()> {
    let scenario = Scenario::load_from_file(scenario_path)?;
    let mut simulation = Simulation::new(config, &scenario.vault)?;
    let report = simulation.run(&scenario, fail_fast)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if fail_fast && report.failed_steps() > 0 {
        bail!("scenario stopped after a failed step");
    }
    Ok(())
}

fn status(config: &SplitterConfig, recent: usize) -> Result<()> {
    let splitter = DonationSplitter::from_config(config).context("Failed to open splitter")?;
    let asset = &config.asset;

    println!("Current epoch:   {}", splitter.current_epoch()?);
    println!(
        "Pending shares:  {}",
        format_units(splitter.pending_shares()?, SHARE_DECIMALS)
    );
    print_policy("Current policy", splitter.current_policy()?.as_ref());
    print_policy("Upcoming policy", splitter.next_policy()?.as_ref());

    let stats = splitter.statistics()?;
    println!("Settlements:     {}", stats.settlements);
    println!(
        "Distributed:     {}",
        asset.display_amount(stats.total_assets_distributed)
    );
    println!(
        "Average:         {}",
        asset.display_amount(stats.average_per_settlement)
    );

    let records = splitter.recent(recent)?;
    if !records.is_empty() {
        println!("Recent settlements:");
        for record in records {
            println!(
                "  #{} epoch {}: {} shares -> {} at {}",
                record.sequence,
                record.epoch,
                format_units(record.shares_redeemed, SHARE_DECIMALS),
                asset.display_amount(record.assets_distributed),
                record.share_price
            );
        }
    }
    Ok(())
}

fn print_policy(label: &str, policy: Option<&EpochPolicy>) {
    match policy {
        Some(policy) => {
            println!("{}:", label);
            for slot in &policy.slots {
                println!("  {} {:>8}", slot.address, format_bps(slot.weight_bps));
            }
        }
        None => println!("{}: (none)", label),
    }
}

fn format_bps(bps: Bps) -> String {
    format!("{}.{:02}%", bps / 100, bps % 100)
}
