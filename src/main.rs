//! Decay bias CLI.
//!
//! # Usage
//!
//! ```bash
//! # Summarize the ATM window of one or more saved option-chain snapshots
//! decay-bias analyze data/nifty.json data/banknifty.json
//!
//! # Override pricing inputs and window size
//! decay-bias analyze data/nifty.json --days 2 --rate 0.065 --around 5 --limit 11
//!
//! # Classify one strike (ATM when --strike is omitted)
//! decay-bias strike data/nifty.json --strike 19800 --json
//!
//! # Replay a snapshot that carries no timestamp as of a given session
//! decay-bias analyze data/old.json --date 2024-12-23
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use decay_bias::config::EngineConfig;
use decay_bias::data::{ChainSource, JsonFileSource};
use decay_bias::signal::{
    analyze_sources, exchange_today, ChainReport, PreparedChain, StrikeMode, TradeDate,
};

const SEPARATOR: &str = "============================================================";

#[derive(Parser)]
#[command(name = "decay-bias")]
#[command(about = "Classify call/put theta decay bias from option-chain snapshots")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize decay bias across the strikes around ATM
    Analyze {
        /// Snapshot JSON files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Strikes on each side of ATM
        #[arg(long)]
        around: Option<usize>,

        /// Maximum strikes in the window
        #[arg(long)]
        limit: Option<usize>,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Classify a single strike
    Strike {
        /// Snapshot JSON file
        file: PathBuf,

        /// Strike to classify (defaults to ATM)
        #[arg(long)]
        strike: Option<f64>,

        #[command(flatten)]
        engine: EngineArgs,
    },
}

#[derive(Args)]
struct EngineArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Trading days to expiry (default: from the nearest listed expiry)
    #[arg(long)]
    days: Option<f64>,

    /// Annual risk-free rate, decimal
    #[arg(long)]
    rate: Option<f64>,

    /// Use rows of every expiry instead of the nearest one
    #[arg(long)]
    all_expiries: bool,

    /// Trade date (YYYY-MM-DD), defaults to the snapshot's timestamp,
    /// then to today on the exchange clock
    #[arg(long)]
    date: Option<String>,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

impl EngineArgs {
    fn config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => EngineConfig::default(),
        };

        if let Some(days) = self.days {
            config.days_to_expiry = Some(days);
        }
        if let Some(rate) = self.rate {
            config.risk_free_rate = rate;
        }
        if self.all_expiries {
            config.nearest_expiry_only = false;
        }
        config.validate()?;
        Ok(config)
    }

    fn trade_date(&self) -> Result<TradeDate> {
        match &self.date {
            Some(d) => NaiveDate::parse_from_str(d, "%Y-%m-%d")
                .map(TradeDate::Fixed)
                .context("Invalid date format"),
            None => Ok(TradeDate::FromSnapshot {
                fallback: exchange_today(),
            }),
        }
    }
}

fn print_report(report: &ChainReport) {
    println!("{}", SEPARATOR);
    println!("{}", report.source);
    println!("{}", SEPARATOR);
    println!("  Trade date:  {}", report.trade_date);
    match report.spot {
        Some(spot) => println!("  Spot:        {:.2}", spot),
        None => println!("  Spot:        n/a"),
    }
    if let Some(expiry) = report.expiry {
        println!("  Expiry:      {}", expiry);
    }
    println!(
        "  Pricing:     {} trading days, r = {:.4}",
        report.pricing.days_to_expiry, report.pricing.risk_free_rate
    );
    if !report.can_estimate_theta() {
        println!("  Note:        no time to expiry, blank thetas are not estimated");
    }
    match report.summary.atm_strike {
        Some(atm) => println!("  ATM strike:  {}", atm),
        None => println!("  ATM strike:  n/a"),
    }
    println!();

    println!(
        "  {:>10}  {:>12}  {:>12}  {}",
        "Strike", "CE theta", "PE theta", "Bias"
    );
    for row in &report.summary.evaluated {
        let marker = if Some(row.strike) == report.summary.atm_strike {
            " *"
        } else {
            ""
        };
        println!(
            "  {:>10}  {:>12.4}  {:>12.4}  {}{}",
            row.strike, row.call_theta, row.put_theta, row.label, marker
        );
    }
    println!();

    for (label, count) in report.summary.counts.iter() {
        println!("  {:<18} {}", label.as_str(), count);
    }
    println!();
    println!("  Verdict: {}", report.verdict);
    println!();
}

fn cmd_analyze(
    files: Vec<PathBuf>,
    around: Option<usize>,
    limit: Option<usize>,
    engine: EngineArgs,
) -> Result<()> {
    let mut config = engine.config()?;
    if let Some(around) = around {
        config.around_atm = around;
    }
    if let Some(limit) = limit {
        config.strikes_limit = limit;
    }
    config.validate()?;

    let trade_date = engine.trade_date()?;
    let sources: Vec<JsonFileSource> = files.iter().map(JsonFileSource::new).collect();
    let results = analyze_sources(&sources, &config, trade_date);

    let mut reports = Vec::new();
    let mut failures = 0;
    for (source, result) in sources.iter().zip(results) {
        match result {
            Ok(report) => reports.push(report),
            Err(e) => {
                failures += 1;
                eprintln!("{}: {}", source.name(), e);
            }
        }
    }

    if engine.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            print_report(report);
        }
    }

    if reports.is_empty() && failures > 0 {
        bail!("No snapshot could be analyzed");
    }
    Ok(())
}

fn cmd_strike(file: PathBuf, strike: Option<f64>, engine: EngineArgs) -> Result<()> {
    let config = engine.config()?;
    let trade_date = engine.trade_date()?;

    let source = JsonFileSource::new(&file);
    let payload = source
        .fetch()
        .with_context(|| format!("Failed to read snapshot {}", file.display()))?;

    let prepared = PreparedChain::new(&payload, &config, trade_date);
    let mode = match strike {
        Some(k) => StrikeMode::Specific(k),
        None => StrikeMode::Atm,
    };

    let Some(result) = prepared.classify_strike(mode) else {
        bail!("Cannot pick an ATM strike: snapshot has no spot or no strikes");
    };

    if engine.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Strike:    {}", result.strike);
        println!("CE theta:  {:.4}", result.call_theta);
        println!("PE theta:  {:.4}", result.put_theta);
        println!("Bias:      {}", result.label);
        if !prepared.can_estimate_theta() {
            println!("Note:      no time to expiry, blank thetas are not estimated");
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("decay_bias=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            files,
            around,
            limit,
            engine,
        } => cmd_analyze(files, around, limit, engine)?,
        Commands::Strike {
            file,
            strike,
            engine,
        } => cmd_strike(file, strike, engine)?,
    }

    Ok(())
}
