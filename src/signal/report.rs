//! Snapshot-level analysis.
//!
//! Resolves expiry, spot and pricing inputs for a raw payload, then runs
//! the window summary. Batches of independent sources are analyzed in
//! parallel; nothing is shared between them.

use chrono::{FixedOffset, NaiveDate, NaiveTime, Timelike, Utc};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::data::{ChainSource, RawChain, SourceError};

use super::classifier::{trading_days_between, PricingContext, StrikeBias};
use super::window::{
    decay_bias_for_chain, summarize_bias_across_strikes, StrikeMode, WindowSummary, WindowVerdict,
};

/// Exchange offset from UTC (IST, +05:30).
pub const EXCHANGE_UTC_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Regular session, minutes after midnight exchange time.
pub const SESSION_OPEN_MINUTES: f64 = 9.0 * 60.0 + 15.0;
pub const SESSION_CLOSE_MINUTES: f64 = 15.0 * 60.0 + 30.0;

/// Today's date on the exchange clock.
pub fn exchange_today() -> NaiveDate {
    match FixedOffset::east_opt(EXCHANGE_UTC_OFFSET_SECS) {
        Some(offset) => Utc::now().with_timezone(&offset).date_naive(),
        None => Utc::now().date_naive(),
    }
}

/// Share of the regular session still ahead at `time`, in `[0, 1]`.
/// An unknown time counts as a full session.
pub fn session_remaining(time: Option<NaiveTime>) -> f64 {
    let Some(time) = time else {
        return 1.0;
    };
    let minutes = f64::from(time.hour() * 60 + time.minute()) + f64::from(time.second()) / 60.0;
    ((SESSION_CLOSE_MINUTES - minutes) / (SESSION_CLOSE_MINUTES - SESSION_OPEN_MINUTES))
        .clamp(0.0, 1.0)
}

/// Which date a snapshot is analyzed as of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeDate {
    /// A caller-chosen date, regardless of the snapshot's timestamp.
    Fixed(NaiveDate),
    /// The snapshot's own timestamp, or `fallback` when it has none.
    FromSnapshot { fallback: NaiveDate },
}

impl TradeDate {
    /// Resolve the trade date, plus the time of day when the snapshot's
    /// timestamp falls on that date.
    pub fn resolve(&self, chain: &RawChain<'_>) -> (NaiveDate, Option<NaiveTime>) {
        let stamp = chain.extract_timestamp();
        let date = match *self {
            Self::Fixed(date) => date,
            Self::FromSnapshot { fallback } => stamp.map(|ts| ts.date()).unwrap_or(fallback),
        };
        let time = stamp.filter(|ts| ts.date() == date).map(|ts| ts.time());
        (date, time)
    }
}

/// A raw payload with its analysis inputs resolved.
#[derive(Debug, Clone, Copy)]
pub struct PreparedChain<'a> {
    pub chain: RawChain<'a>,
    pub trade_date: NaiveDate,
    pub spot: Option<f64>,
    pub expiry: Option<NaiveDate>,
    pub pricing: PricingContext,
}

impl<'a> PreparedChain<'a> {
    /// Resolve inputs for `payload`.
    ///
    /// Days to expiry come from the config when set, otherwise from the
    /// nearest listed expiry on or after the trade date. On expiry day
    /// that is the share of the session left; with no listed expiry it
    /// is 0 (no fallback estimates possible).
    pub fn new(payload: &'a Value, config: &EngineConfig, trade_date: TradeDate) -> Self {
        let raw = RawChain::new(payload);
        let (date, time) = trade_date.resolve(&raw);
        let expiry = raw.nearest_expiry(date);

        let chain = match expiry {
            Some(e) if config.nearest_expiry_only => raw.for_expiry(e),
            _ => raw,
        };

        let days = config.days_to_expiry.unwrap_or_else(|| match expiry {
            Some(e) if e == date => session_remaining(time),
            Some(e) => trading_days_between(date, e) as f64,
            None => 0.0,
        });
        if days == 0.0 {
            warn!("Zero days to expiry, missing theta cannot be estimated");
        }

        Self {
            chain,
            trade_date: date,
            spot: chain.extract_spot(),
            expiry,
            pricing: PricingContext::new(days).with_rate(config.risk_free_rate),
        }
    }

    /// Summarize the ATM window.
    pub fn summarize(&self, config: &EngineConfig) -> WindowSummary {
        summarize_bias_across_strikes(
            &self.chain,
            self.spot.unwrap_or(0.0),
            &self.pricing,
            config.strikes_limit,
            config.around_atm,
        )
    }

    /// Classify one strike (ATM or a given one).
    pub fn classify_strike(&self, mode: StrikeMode) -> Option<StrikeBias> {
        decay_bias_for_chain(&self.chain, self.spot.unwrap_or(0.0), &self.pricing, mode)
    }

    /// Whether blank thetas can be estimated at all.
    pub fn can_estimate_theta(&self) -> bool {
        self.pricing.time_to_expiry() > 0.0
    }
}

/// Analysis of one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainReport {
    pub source: String,
    pub trade_date: NaiveDate,
    pub spot: Option<f64>,
    pub expiry: Option<NaiveDate>,
    pub pricing: PricingContext,
    pub verdict: WindowVerdict,
    pub summary: WindowSummary,
}

impl ChainReport {
    /// Whether blank thetas could be estimated for this report.
    pub fn can_estimate_theta(&self) -> bool {
        self.pricing.time_to_expiry() > 0.0
    }
}

/// Analyze one raw payload.
pub fn analyze_payload(
    source: &str,
    payload: &Value,
    config: &EngineConfig,
    trade_date: TradeDate,
) -> ChainReport {
    let prepared = PreparedChain::new(payload, config, trade_date);
    let summary = prepared.summarize(config);

    ChainReport {
        source: source.to_string(),
        trade_date: prepared.trade_date,
        spot: prepared.spot,
        expiry: prepared.expiry,
        pricing: prepared.pricing,
        verdict: summary.verdict(),
        summary,
    }
}

/// Fetch and analyze one source.
pub fn analyze_source<S: ChainSource + ?Sized>(
    source: &S,
    config: &EngineConfig,
    trade_date: TradeDate,
) -> Result<ChainReport, SourceError> {
    let payload = source.fetch()?;
    Ok(analyze_payload(&source.name(), &payload, config, trade_date))
}

/// Analyze many sources in parallel. Results keep the input order.
pub fn analyze_sources<S: ChainSource + Sync>(
    sources: &[S],
    config: &EngineConfig,
    trade_date: TradeDate,
) -> Vec<Result<ChainReport, SourceError>> {
    info!("Analyzing {} snapshots", sources.len());
    sources
        .par_iter()
        .map(|source| analyze_source(source, config, trade_date))
        .collect()
}
