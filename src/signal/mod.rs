//! Decay bias signal.
//!
//! Provides:
//! - Per-strike classification (call vs put theta)
//! - ATM selection, strike windows and label tallies
//! - Snapshot-level reports, batched in parallel

pub mod classifier;
pub mod report;
pub mod window;

pub use classifier::{
    classify, label_for, trading_days_between, BiasLabel, PricingContext, StrikeBias,
};
pub use report::{
    analyze_payload, analyze_source, analyze_sources, exchange_today, session_remaining,
    ChainReport, PreparedChain, TradeDate,
};
pub use window::{
    decay_bias_for_chain, pick_atm, summarize_bias_across_strikes, summarize_window,
    window_around_atm, BiasCounts, StrikeMode, WindowSummary, WindowVerdict,
};
