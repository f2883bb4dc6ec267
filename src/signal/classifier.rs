//! Per-strike decay bias classification.
//!
//! Compares call and put theta at one strike and reports which side is
//! losing time value faster. Exchange theta of exactly 0 is read as "not
//! reported" and replaced with a Black-Scholes estimate from the leg's
//! implied volatility. A genuine zero-decay quote is indistinguishable
//! from a blank one and gets re-estimated too.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{OptionSide, SideQuote, StrikeRow};
use crate::pricing::black_scholes::{BlackScholes, DEFAULT_RISK_FREE_RATE};

/// Trading days per year used for time to expiry.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Volatility floor for the fallback estimator.
pub const MIN_FALLBACK_VOL: f64 = 1e-8;

/// Decay bias at a strike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BiasLabel {
    /// Calls decaying faster.
    #[serde(rename = "CE Decay Bias")]
    CeDecayBias,
    /// Puts decaying faster.
    #[serde(rename = "PE Decay Bias")]
    PeDecayBias,
    /// Both decaying at the same rate.
    #[serde(rename = "Both Sides Decay")]
    BothSidesDecay,
    /// Neither side decaying.
    #[serde(rename = "No Decay Bias")]
    NoDecayBias,
    /// Row could not be classified.
    #[serde(rename = "No Data")]
    NoData,
}

impl BiasLabel {
    /// Every label, in reporting order.
    pub const ALL: [BiasLabel; 5] = [
        Self::CeDecayBias,
        Self::PeDecayBias,
        Self::BothSidesDecay,
        Self::NoDecayBias,
        Self::NoData,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CeDecayBias => "CE Decay Bias",
            Self::PeDecayBias => "PE Decay Bias",
            Self::BothSidesDecay => "Both Sides Decay",
            Self::NoDecayBias => "No Decay Bias",
            Self::NoData => "No Data",
        }
    }
}

impl fmt::Display for BiasLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs for the fallback theta estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingContext {
    /// Trading days to expiry.
    pub days_to_expiry: f64,
    /// Annual risk-free rate (decimal).
    pub risk_free_rate: f64,
}

impl PricingContext {
    /// Context at the default risk-free rate.
    pub fn new(days_to_expiry: f64) -> Self {
        Self {
            days_to_expiry,
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
        }
    }

    pub fn with_rate(mut self, risk_free_rate: f64) -> Self {
        self.risk_free_rate = risk_free_rate;
        self
    }

    /// Context from a trade date and an expiry date, counting weekdays
    /// after `trade_date` up to and including `expiry`.
    pub fn from_dates(trade_date: NaiveDate, expiry: NaiveDate) -> Self {
        Self::new(trading_days_between(trade_date, expiry) as f64)
    }

    /// Time to expiry in trading years, never negative.
    pub fn time_to_expiry(&self) -> f64 {
        (self.days_to_expiry / TRADING_DAYS_PER_YEAR).max(0.0)
    }
}

/// Weekdays in `(from, to]`. Zero when `to` is not after `from`.
///
/// Counted from whole weeks plus the leftover days, so the span can be
/// arbitrarily long.
pub fn trading_days_between(from: NaiveDate, to: NaiveDate) -> u32 {
    let span = to.signed_duration_since(from).num_days();
    if span <= 0 {
        return 0;
    }

    let whole_weeks = span / 7;
    let start = i64::from(from.weekday().num_days_from_monday());
    // Monday..=Friday are 0..=4
    let leftover = (1..=span % 7)
        .filter(|offset| (start + offset) % 7 < 5)
        .count() as i64;

    u32::try_from(whole_weeks * 5 + leftover).unwrap_or(u32::MAX)
}

/// Classification of one strike.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrikeBias {
    pub strike: f64,
    pub label: BiasLabel,
    /// Call theta used for the decision (reported or estimated).
    pub call_theta: f64,
    /// Put theta used for the decision (reported or estimated).
    pub put_theta: f64,
}

impl StrikeBias {
    /// Result for a strike that could not be classified.
    pub fn no_data(strike: f64) -> Self {
        Self {
            strike,
            label: BiasLabel::NoData,
            call_theta: 0.0,
            put_theta: 0.0,
        }
    }
}

/// Classify the decay bias at one strike.
pub fn classify(row: &StrikeRow, spot: f64, ctx: &PricingContext) -> StrikeBias {
    let (call, put) = match (row.side(OptionSide::Call), row.side(OptionSide::Put)) {
        (Some(call), Some(put)) => (call, put),
        _ => return StrikeBias::no_data(row.strike),
    };

    // negated comparisons also reject NaN
    if !(row.strike > 0.0) || !(spot > 0.0) {
        return StrikeBias::no_data(row.strike);
    }

    let bs = BlackScholes::new(ctx.risk_free_rate);
    let time = ctx.time_to_expiry();

    let call_theta = leg_theta(&bs, call, spot, row.strike, time, OptionSide::Call);
    let put_theta = leg_theta(&bs, put, spot, row.strike, time, OptionSide::Put);

    StrikeBias {
        strike: row.strike,
        label: label_for(call_theta, put_theta),
        call_theta,
        put_theta,
    }
}

/// Reported theta, or a Black-Scholes estimate when it is exactly zero.
fn leg_theta(
    bs: &BlackScholes,
    quote: &SideQuote,
    spot: f64,
    strike: f64,
    time: f64,
    side: OptionSide,
) -> f64 {
    let reported = quote.theta_or_zero();
    if reported != 0.0 {
        return reported;
    }

    let vol = quote.iv_decimal().max(MIN_FALLBACK_VOL);
    let estimated = bs.theta(spot, strike, time, vol, side);
    debug!(
        strike,
        side = side.as_str(),
        vol,
        estimated,
        "Theta not reported, using Black-Scholes estimate"
    );
    estimated
}

/// Decision rule over the two thetas.
pub fn label_for(call_theta: f64, put_theta: f64) -> BiasLabel {
    match (call_theta < 0.0, put_theta < 0.0) {
        (true, true) => {
            let (call_mag, put_mag) = (call_theta.abs(), put_theta.abs());
            if call_mag > put_mag {
                BiasLabel::CeDecayBias
            } else if put_mag > call_mag {
                BiasLabel::PeDecayBias
            } else {
                BiasLabel::BothSidesDecay
            }
        }
        (true, false) => BiasLabel::CeDecayBias,
        (false, true) => BiasLabel::PeDecayBias,
        (false, false) => BiasLabel::NoDecayBias,
    }
}
