pub mod config;
pub mod data;
pub mod pricing;
pub mod signal;

// Re-export commonly used types
pub use config::{ConfigError, EngineConfig};
pub use data::{
    ChainAccess, ChainSource, JsonFileSource, OptionChainSnapshot, OptionSide, RawChain,
    SideQuote, SourceError, StrikeRow,
};
pub use pricing::{daily_theta, std_normal_cdf, std_normal_pdf, BlackScholes};
pub use signal::{
    classify, pick_atm, summarize_window, BiasLabel, ChainReport, PricingContext, StrikeBias,
    StrikeMode, TradeDate, WindowSummary, WindowVerdict,
};
