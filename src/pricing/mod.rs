//! Pricing primitives.
//!
//! Provides:
//! - Standard normal PDF/CDF (Abramowitz-Stegun approximation)
//! - Black-Scholes daily theta, used when the exchange leaves theta blank

pub mod black_scholes;
pub mod normal;

pub use black_scholes::{daily_theta, BlackScholes};
pub use normal::{std_normal_cdf, std_normal_pdf};
