//! ATM selection and windowed aggregation.
//!
//! A window is an index-based slice of the sorted strike list centred on
//! the ATM strike. Each strike in it is classified and the labels are
//! tallied. The window verdict is a plain majority vote between CE and PE
//! labelled strikes; theta magnitudes do not weigh in.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::data::ChainAccess;

use super::classifier::{classify, BiasLabel, PricingContext, StrikeBias};

/// Default number of strikes on each side of ATM.
pub const DEFAULT_AROUND_ATM: usize = 7;

/// Default cap on strikes in a window.
pub const DEFAULT_STRIKES_LIMIT: usize = 15;

/// Which strike to classify on its own.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StrikeMode {
    /// The strike closest to spot.
    Atm,
    /// A caller-chosen strike.
    Specific(f64),
}

/// Overall window verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowVerdict {
    #[serde(rename = "CE Decay Active")]
    CeDecayActive,
    #[serde(rename = "PE Decay Active")]
    PeDecayActive,
    #[serde(rename = "Both Sides Decay")]
    BothSidesDecay,
}

impl WindowVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CeDecayActive => "CE Decay Active",
            Self::PeDecayActive => "PE Decay Active",
            Self::BothSidesDecay => "Both Sides Decay",
        }
    }
}

impl fmt::Display for WindowVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label tallies. All five labels are always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BiasCounts(BTreeMap<BiasLabel, usize>);

impl Default for BiasCounts {
    fn default() -> Self {
        Self(BiasLabel::ALL.iter().map(|label| (*label, 0)).collect())
    }
}

impl BiasCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, label: BiasLabel) {
        *self.0.entry(label).or_insert(0) += 1;
    }

    pub fn get(&self, label: BiasLabel) -> usize {
        self.0.get(&label).copied().unwrap_or(0)
    }

    /// Sum over all labels.
    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BiasLabel, usize)> + '_ {
        self.0.iter().map(|(label, count)| (*label, *count))
    }
}

/// Result of summarizing one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSummary {
    /// Strike closest to spot, if one could be picked.
    pub atm_strike: Option<f64>,
    /// Per-strike results, in window order.
    pub evaluated: Vec<StrikeBias>,
    pub counts: BiasCounts,
}

impl WindowSummary {
    /// Majority vote between CE and PE labelled strikes.
    pub fn verdict(&self) -> WindowVerdict {
        let ce = self.counts.get(BiasLabel::CeDecayBias);
        let pe = self.counts.get(BiasLabel::PeDecayBias);
        if ce > pe {
            WindowVerdict::CeDecayActive
        } else if pe > ce {
            WindowVerdict::PeDecayActive
        } else {
            WindowVerdict::BothSidesDecay
        }
    }

    /// Result for a single strike in the window.
    pub fn at_strike(&self, strike: f64) -> Option<&StrikeBias> {
        self.evaluated.iter().find(|e| e.strike == strike)
    }
}

/// Strike closest to spot. Ties go to the first strike in list order.
/// Non-finite strikes are ignored.
pub fn pick_atm(spot: f64, strikes: &[f64]) -> Option<f64> {
    if !(spot > 0.0) {
        return None;
    }

    let mut best: Option<(f64, f64)> = None;
    for &strike in strikes {
        let distance = (strike - spot).abs();
        if !distance.is_finite() {
            continue;
        }
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((strike, distance)),
        }
    }
    best.map(|(strike, _)| strike)
}

/// Index-based window of `around_atm` strikes either side of `atm`,
/// capped at `strikes_limit`.
///
/// `strikes` must be sorted ascending. When the cap bites, strikes are
/// dropped from whichever end is farther (in index) from ATM, upper end
/// first on a tie. Empty if `atm` is not in `strikes`.
pub fn window_around_atm(
    strikes: &[f64],
    atm: f64,
    around_atm: usize,
    strikes_limit: usize,
) -> Vec<f64> {
    let Some(center) = strikes.iter().position(|s| *s == atm) else {
        return Vec::new();
    };

    let mut start = center.saturating_sub(around_atm);
    let mut end = (center + around_atm + 1).min(strikes.len());

    while end - start > strikes_limit {
        if center - start > end - 1 - center {
            start += 1;
        } else {
            end -= 1;
        }
    }

    strikes[start..end].to_vec()
}

/// Classify every strike of `window` and tally the labels.
///
/// Strikes with no row are recorded as `No Data`. The output keeps the
/// window's order.
pub fn summarize_window<C: ChainAccess + ?Sized>(
    chain: &C,
    spot: f64,
    ctx: &PricingContext,
    window: &[f64],
) -> WindowSummary {
    let atm_strike = pick_atm(spot, &chain.strikes());
    let mut counts = BiasCounts::new();
    let mut evaluated = Vec::with_capacity(window.len());

    for &strike in window {
        let result = match chain.row_for_strike(strike) {
            Some(row) => classify(&row, spot, ctx),
            None => {
                debug!(strike, "No row for strike in window");
                StrikeBias::no_data(strike)
            }
        };
        counts.increment(result.label);
        evaluated.push(result);
    }

    let summary = WindowSummary {
        atm_strike,
        evaluated,
        counts,
    };

    info!(
        atm = ?summary.atm_strike,
        strikes = window.len(),
        ce = summary.counts.get(BiasLabel::CeDecayBias),
        pe = summary.counts.get(BiasLabel::PeDecayBias),
        verdict = summary.verdict().as_str(),
        "Summarized decay bias window"
    );

    summary
}

/// Classify a single strike of the chain.
///
/// `None` when ATM is requested but no ATM strike can be picked. A
/// specific strike with no row classifies as `No Data`.
pub fn decay_bias_for_chain<C: ChainAccess + ?Sized>(
    chain: &C,
    spot: f64,
    ctx: &PricingContext,
    mode: StrikeMode,
) -> Option<StrikeBias> {
    let strike = match mode {
        StrikeMode::Atm => pick_atm(spot, &chain.strikes())?,
        StrikeMode::Specific(strike) => strike,
    };

    Some(match chain.row_for_strike(strike) {
        Some(row) => classify(&row, spot, ctx),
        None => StrikeBias::no_data(strike),
    })
}

/// Pick ATM, build the window around it and summarize it.
///
/// With no ATM strike the window is empty and every count is zero.
pub fn summarize_bias_across_strikes<C: ChainAccess + ?Sized>(
    chain: &C,
    spot: f64,
    ctx: &PricingContext,
    strikes_limit: usize,
    around_atm: usize,
) -> WindowSummary {
    let strikes = chain.strikes();
    let window = pick_atm(spot, &strikes)
        .map(|atm| window_around_atm(&strikes, atm, around_atm, strikes_limit))
        .unwrap_or_default();

    summarize_window(chain, spot, ctx, &window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{OptionChainSnapshot, RawChain, SideQuote, StrikeRow};
    use serde_json::json;

    fn two_sided(strike: f64, call_theta: f64, put_theta: f64) -> StrikeRow {
        StrikeRow::new(
            strike,
            Some(SideQuote::new(Some(call_theta), Some(12.0))),
            Some(SideQuote::new(Some(put_theta), Some(13.0))),
        )
    }

    fn chain() -> OptionChainSnapshot {
        OptionChainSnapshot::new(
            Some(19_850.0),
            vec![
                two_sided(19_700.0, -2.0, -8.0),
                two_sided(19_800.0, -9.0, -7.0),
                two_sided(19_900.0, -10.0, -6.0),
                StrikeRow::new(20_000.0, None, Some(SideQuote::new(Some(-3.0), None))),
            ],
        )
    }

    #[test]
    fn test_pick_atm_closest() {
        assert_eq!(
            pick_atm(19_850.0, &[19_700.0, 19_800.0, 19_900.0, 20_000.0]),
            Some(19_800.0)
        );
        assert_eq!(pick_atm(19_990.0, &[19_700.0, 20_000.0]), Some(20_000.0));
    }

    #[test]
    fn test_pick_atm_degenerate() {
        assert_eq!(pick_atm(19_850.0, &[]), None);
        assert_eq!(pick_atm(0.0, &[19_800.0]), None);
        assert_eq!(pick_atm(-5.0, &[19_800.0]), None);
        assert_eq!(pick_atm(f64::NAN, &[19_800.0]), None);
    }

    #[test]
    fn test_pick_atm_skips_non_finite_strikes() {
        assert_eq!(pick_atm(100.0, &[90.0, f64::NAN]), Some(90.0));
        assert_eq!(pick_atm(100.0, &[f64::NAN, 120.0, f64::INFINITY]), Some(120.0));
        assert_eq!(pick_atm(100.0, &[f64::NAN, f64::NEG_INFINITY]), None);
        assert_eq!(pick_atm(f64::INFINITY, &[100.0]), None);
    }

    #[test]
    fn test_pick_atm_tie_keeps_first() {
        assert_eq!(pick_atm(150.0, &[100.0, 200.0]), Some(100.0));
        assert_eq!(pick_atm(150.0, &[200.0, 100.0]), Some(200.0));
    }

    #[test]
    fn test_window_around_atm() {
        let strikes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64 * 10.0).collect();

        let window = window_around_atm(&strikes, 200.0, 2, 15);
        assert_eq!(window, vec![180.0, 190.0, 200.0, 210.0, 220.0]);

        // clamped at the low end
        let window = window_around_atm(&strikes, 110.0, 3, 15);
        assert_eq!(window, vec![100.0, 110.0, 120.0, 130.0, 140.0]);

        // capped, trimmed symmetrically
        let window = window_around_atm(&strikes, 200.0, 7, 4);
        assert_eq!(window, vec![180.0, 190.0, 200.0, 210.0]);
        let window = window_around_atm(&strikes, 200.0, 7, 3);
        assert_eq!(window, vec![190.0, 200.0, 210.0]);

        assert!(window_around_atm(&strikes, 205.0, 2, 15).is_empty());
        assert!(window_around_atm(&strikes, 200.0, 2, 0).is_empty());
    }

    #[test]
    fn test_summarize_window_counts() {
        let snapshot = chain();
        let ctx = PricingContext::new(2.0);
        let window = [19_700.0, 19_800.0, 19_900.0, 20_000.0, 20_100.0];
        let summary = summarize_window(&snapshot, 19_850.0, &ctx, &window);

        assert_eq!(summary.atm_strike, Some(19_800.0));
        let order: Vec<f64> = summary.evaluated.iter().map(|e| e.strike).collect();
        assert_eq!(order, window.to_vec());

        assert_eq!(summary.counts.get(BiasLabel::CeDecayBias), 2);
        assert_eq!(summary.counts.get(BiasLabel::PeDecayBias), 1);
        assert_eq!(summary.counts.get(BiasLabel::BothSidesDecay), 0);
        assert_eq!(summary.counts.get(BiasLabel::NoDecayBias), 0);
        // one-legged row and missing row
        assert_eq!(summary.counts.get(BiasLabel::NoData), 2);
        assert_eq!(summary.counts.total(), window.len());
        assert_eq!(summary.counts.iter().count(), 5);

        let missing = summary.at_strike(20_100.0).unwrap();
        assert_eq!(*missing, StrikeBias::no_data(20_100.0));
        assert_eq!(summary.verdict(), WindowVerdict::CeDecayActive);
    }

    #[test]
    fn test_empty_window_has_all_labels() {
        let summary = summarize_window(&chain(), 19_850.0, &PricingContext::new(2.0), &[]);
        assert!(summary.evaluated.is_empty());
        assert_eq!(summary.counts.iter().count(), 5);
        assert_eq!(summary.counts.total(), 0);
        assert_eq!(summary.verdict(), WindowVerdict::BothSidesDecay);

        let json = serde_json::to_value(&summary.counts).unwrap();
        for label in BiasLabel::ALL {
            assert_eq!(json[label.as_str()], json!(0));
        }
    }

    #[test]
    fn test_verdict_majority() {
        let mut counts = BiasCounts::new();
        counts.increment(BiasLabel::PeDecayBias);
        counts.increment(BiasLabel::PeDecayBias);
        counts.increment(BiasLabel::CeDecayBias);
        counts.increment(BiasLabel::BothSidesDecay);
        let summary = WindowSummary {
            atm_strike: None,
            evaluated: Vec::new(),
            counts,
        };
        assert_eq!(summary.verdict(), WindowVerdict::PeDecayActive);
        assert_eq!(summary.verdict().to_string(), "PE Decay Active");
    }

    #[test]
    fn test_decay_bias_for_chain_modes() {
        let snapshot = chain();
        let ctx = PricingContext::new(2.0);

        let atm = decay_bias_for_chain(&snapshot, 19_850.0, &ctx, StrikeMode::Atm).unwrap();
        assert_eq!(atm.strike, 19_800.0);
        assert_eq!(atm.label, BiasLabel::CeDecayBias);

        let specific =
            decay_bias_for_chain(&snapshot, 19_850.0, &ctx, StrikeMode::Specific(19_700.0))
                .unwrap();
        assert_eq!(specific.label, BiasLabel::PeDecayBias);

        let missing =
            decay_bias_for_chain(&snapshot, 19_850.0, &ctx, StrikeMode::Specific(12_345.0))
                .unwrap();
        assert_eq!(missing.label, BiasLabel::NoData);

        assert!(decay_bias_for_chain(&snapshot, 0.0, &ctx, StrikeMode::Atm).is_none());
    }

    #[test]
    fn test_summarize_bias_across_strikes_raw() {
        let payload = json!({
            "records": {
                "underlyingValue": 19_850.0,
                "data": [
                    {"strikePrice": 19_700, "CE": {"theta": -2.0, "impliedVolatility": 12}, "PE": {"theta": -8.0, "impliedVolatility": 13}},
                    {"strikePrice": 19_800, "CE": {"theta": -9.0, "impliedVolatility": 12}, "PE": {"theta": -9.0, "impliedVolatility": 13}},
                    {"strikePrice": 19_900, "CE": {"theta": -1.0, "impliedVolatility": 12}, "PE": {"theta": 2.0, "impliedVolatility": 13}},
                    {"strikePrice": 20_000, "CE": {"theta": 1.0, "impliedVolatility": 12}, "PE": {"theta": 1.0, "impliedVolatility": 13}}
                ]
            }
        });
        let raw = RawChain::new(&payload);
        let ctx = PricingContext::new(2.0);
        let summary = summarize_bias_across_strikes(&raw, 19_850.0, &ctx, 15, 1);

        assert_eq!(summary.atm_strike, Some(19_800.0));
        let labels: Vec<BiasLabel> = summary.evaluated.iter().map(|e| e.label).collect();
        assert_eq!(
            labels,
            vec![
                BiasLabel::PeDecayBias,
                BiasLabel::BothSidesDecay,
                BiasLabel::CeDecayBias
            ]
        );
        assert_eq!(summary.verdict(), WindowVerdict::BothSidesDecay);

        let none = summarize_bias_across_strikes(&raw, 0.0, &ctx, 15, 1);
        assert_eq!(none.atm_strike, None);
        assert_eq!(none.counts.total(), 0);
    }
}
