//! Black-Scholes theta estimator.
//!
//! European options, no dividend adjustment. Theta is returned per
//! calendar day (annual theta / 365) to stay numerically compatible with
//! exchange-reported values.

use crate::data::OptionSide;

use super::normal::{std_normal_cdf, std_normal_pdf};

/// Default annual risk-free rate (decimal).
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.06;

/// Black-Scholes calculator holding the risk-free rate.
#[derive(Debug, Clone, Copy)]
pub struct BlackScholes {
    /// Annual risk-free interest rate (decimal).
    pub rate: f64,
}

impl Default for BlackScholes {
    fn default() -> Self {
        Self {
            rate: DEFAULT_RISK_FREE_RATE,
        }
    }
}

impl BlackScholes {
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }

    /// Calculate d1 parameter.
    fn d1(&self, spot: f64, strike: f64, time: f64, vol: f64) -> f64 {
        let numerator = (spot / strike).ln() + (self.rate + 0.5 * vol * vol) * time;
        numerator / (vol * time.sqrt())
    }

    /// Calculate d2 parameter.
    fn d2(&self, spot: f64, strike: f64, time: f64, vol: f64) -> f64 {
        self.d1(spot, strike, time, vol) - vol * time.sqrt()
    }

    /// Daily theta.
    ///
    /// `time` is in years and `vol` is a decimal (0.15, not 15). Returns
    /// exactly `0.0` when any of spot, strike, time or vol is not positive.
    /// That zero means "cannot price", so callers that care must check
    /// their inputs rather than read it as zero decay.
    pub fn theta(&self, spot: f64, strike: f64, time: f64, vol: f64, side: OptionSide) -> f64 {
        if spot <= 0.0 || strike <= 0.0 || time <= 0.0 || vol <= 0.0 {
            return 0.0;
        }

        let d1 = self.d1(spot, strike, time, vol);
        let d2 = self.d2(spot, strike, time, vol);
        let discount_r = (-self.rate * time).exp();

        let term1 = -(spot * std_normal_pdf(d1) * vol) / (2.0 * time.sqrt());

        let annual = match side {
            OptionSide::Call => term1 - self.rate * strike * discount_r * std_normal_cdf(d2),
            OptionSide::Put => term1 + self.rate * strike * discount_r * std_normal_cdf(-d2),
        };

        annual / 365.0
    }
}

/// Daily theta for one leg at rate `rate`.
pub fn daily_theta(
    spot: f64,
    strike: f64,
    time: f64,
    rate: f64,
    vol: f64,
    side: OptionSide,
) -> f64 {
    BlackScholes::new(rate).theta(spot, strike, time, vol, side)
}
