//! Core data types for option-chain snapshots.
//!
//! These mirror the shape of an exchange option chain (one row per
//! strike, a call and a put leg per row) with every quote field optional,
//! because live feeds are routinely incomplete.

use serde::{Deserialize, Serialize};

/// Option side (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionSide {
    Call,
    Put,
}

impl OptionSide {
    /// Exchange leg key ("CE" / "PE").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "CE",
            Self::Put => "PE",
        }
    }
}

/// One leg of a strike row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideQuote {
    /// Exchange-reported daily theta. `Some(0.0)` is how the exchange
    /// says "not reported".
    pub theta: Option<f64>,

    /// Implied volatility in percent (12.5 means 12.5%).
    pub implied_volatility: Option<f64>,
}

impl SideQuote {
    pub fn new(theta: Option<f64>, implied_volatility: Option<f64>) -> Self {
        Self {
            theta,
            implied_volatility,
        }
    }

    /// Theta with absent values read as 0.
    pub fn theta_or_zero(&self) -> f64 {
        self.theta.unwrap_or(0.0)
    }

    /// Implied volatility as a decimal, absent read as 0.
    pub fn iv_decimal(&self) -> f64 {
        self.implied_volatility.unwrap_or(0.0) / 100.0
    }
}

/// A strike's two-sided quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrikeRow {
    pub strike: f64,
    pub call: Option<SideQuote>,
    pub put: Option<SideQuote>,
}

impl StrikeRow {
    pub fn new(strike: f64, call: Option<SideQuote>, put: Option<SideQuote>) -> Self {
        Self { strike, call, put }
    }

    /// Leg for the given side.
    pub fn side(&self, side: OptionSide) -> Option<&SideQuote> {
        match side {
            OptionSide::Call => self.call.as_ref(),
            OptionSide::Put => self.put.as_ref(),
        }
    }

    /// Whether both legs are present.
    pub fn is_two_sided(&self) -> bool {
        self.call.is_some() && self.put.is_some()
    }
}

/// Point-in-time capture of one index's option chain.
///
/// Rows are unique by strike and kept in ascending strike order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionChainSnapshot {
    /// Underlying last traded value, if the feed carried one.
    pub spot: Option<f64>,

    /// Strike rows, ascending by strike.
    pub rows: Vec<StrikeRow>,
}

impl OptionChainSnapshot {
    /// Build a snapshot from rows. The first row seen for a strike wins.
    pub fn new(spot: Option<f64>, rows: Vec<StrikeRow>) -> Self {
        let mut rows: Vec<StrikeRow> = rows
            .into_iter()
            .filter(|r| r.strike.is_finite())
            .collect();
        // stable, so dedup_by keeps the first row seen per strike
        rows.sort_by(|a, b| a.strike.total_cmp(&b.strike));
        rows.dedup_by(|later, earlier| later.strike == earlier.strike);

        Self { spot, rows }
    }

    /// All strikes, ascending.
    pub fn strikes(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.strike).collect()
    }

    /// Find the row at a strike (exact match).
    pub fn row_at_strike(&self, strike: f64) -> Option<&StrikeRow> {
        self.rows.iter().find(|r| r.strike == strike)
    }

    /// Number of rows with both legs present.
    pub fn two_sided_rows(&self) -> usize {
        self.rows.iter().filter(|r| r.is_two_sided()).count()
    }
}
