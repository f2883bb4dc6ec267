pub mod accessor;
pub mod source;
pub mod types;

pub use accessor::{
    extract_spot, extract_strikes, row_for_strike, ChainAccess, RawChain, EXPIRY_FORMAT,
    TIMESTAMP_FORMAT,
};
pub use source::{parse_payload, ChainSource, JsonFileSource, SourceError, StaticSource};
pub use types::{OptionChainSnapshot, OptionSide, SideQuote, StrikeRow};
