//! Read-only accessors over raw option-chain payloads.
//!
//! Exchange payloads are loosely shaped: optional nesting, numbers sent as
//! strings, legs missing near the wings. Every lookup here degrades to
//! `None` (or an empty list) instead of failing.
//!
//! Two layouts are understood:
//! - NSE: `{"records": {"underlyingValue", "expiryDates", "data": [{"strikePrice", "expiryDate", "CE": {..}, "PE": {..}}]}}`
//! - flat: `{"spot", "rows": [{"strike", "call": {..}, "put": {..}}]}`

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::warn;

use super::types::{OptionChainSnapshot, OptionSide, SideQuote, StrikeRow};

/// Expiry label format used by NSE ("26-Dec-2024").
pub const EXPIRY_FORMAT: &str = "%d-%b-%Y";

/// Snapshot timestamp format used by NSE ("23-Dec-2024 15:30:00").
pub const TIMESTAMP_FORMAT: &str = "%d-%b-%Y %H:%M:%S";

/// Common read access over a chain, raw or typed.
pub trait ChainAccess {
    /// Underlying value, if present and numeric.
    fn spot(&self) -> Option<f64>;

    /// Unique strikes, ascending.
    fn strikes(&self) -> Vec<f64>;

    /// First row whose strike equals `strike` exactly.
    fn row_for_strike(&self, strike: f64) -> Option<StrikeRow>;
}

/// Borrowed view over a raw JSON snapshot.
#[derive(Debug, Clone, Copy)]
pub struct RawChain<'a> {
    value: &'a Value,
    expiry: Option<NaiveDate>,
}

impl<'a> RawChain<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self {
            value,
            expiry: None,
        }
    }

    /// Restrict row lookups to one expiry. Rows that carry no expiry
    /// field are kept.
    pub fn for_expiry(mut self, expiry: NaiveDate) -> Self {
        self.expiry = Some(expiry);
        self
    }

    fn records(&self) -> Option<&'a Value> {
        self.value.get("records").filter(|r| r.is_object())
    }

    /// Raw row entries, honoring the expiry filter.
    fn raw_rows(&self) -> impl Iterator<Item = &'a Value> + 'a {
        let rows = self
            .records()
            .and_then(|r| r.get("data"))
            .or_else(|| self.value.get("rows"))
            .or_else(|| self.value.get("data"))
            .and_then(Value::as_array)
            .map(|a| a.as_slice())
            .unwrap_or(&[]);

        let expiry = self.expiry;
        rows.iter()
            .filter(|row| row.is_object())
            .filter(move |row| match (expiry, row_expiry(row)) {
                (Some(wanted), Some(found)) => wanted == found,
                _ => true,
            })
    }

    /// Underlying value.
    pub fn extract_spot(&self) -> Option<f64> {
        let direct = self
            .records()
            .and_then(|r| r.get("underlyingValue"))
            .and_then(as_number)
            .or_else(|| self.value.get("spot").and_then(as_number))
            .or_else(|| self.value.get("underlyingValue").and_then(as_number));

        // NSE also repeats the underlying inside each leg.
        direct.or_else(|| {
            self.raw_rows().find_map(|row| {
                [OptionSide::Call, OptionSide::Put]
                    .into_iter()
                    .filter_map(|side| leg(row, side))
                    .find_map(|l| l.get("underlyingValue").and_then(as_number))
            })
        })
    }

    /// When the exchange took the snapshot (exchange local time).
    pub fn extract_timestamp(&self) -> Option<NaiveDateTime> {
        let raw = self
            .records()
            .and_then(|r| r.get("timestamp"))
            .or_else(|| self.value.get("timestamp"))
            .and_then(Value::as_str)?
            .trim();

        NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
            .ok()
    }

    /// Sorted unique strikes with a parseable numeric strike field.
    pub fn extract_strikes(&self) -> Vec<f64> {
        let mut strikes: Vec<f64> = self.raw_rows().filter_map(row_strike).collect();
        strikes.sort_by(f64::total_cmp);
        strikes.dedup();
        strikes
    }

    /// First row whose strike numerically equals `strike`.
    pub fn row_for_strike(&self, strike: f64) -> Option<StrikeRow> {
        self.raw_rows()
            .find(|row| row_strike(row) == Some(strike))
            .map(|row| parse_row(row, strike))
    }

    /// Expiry dates listed in the payload, ascending. Falls back to the
    /// rows' own expiry fields when no list is present.
    pub fn extract_expiry_dates(&self) -> Vec<NaiveDate> {
        let listed = self
            .records()
            .and_then(|r| r.get("expiryDates"))
            .or_else(|| self.value.get("expiryDates"))
            .and_then(Value::as_array);

        let mut dates: Vec<NaiveDate> = match listed {
            Some(list) => list.iter().filter_map(parse_expiry).collect(),
            None => RawChain::new(self.value)
                .raw_rows()
                .filter_map(row_expiry)
                .collect(),
        };
        dates.sort();
        dates.dedup();
        dates
    }

    /// First listed expiry on or after `date`.
    pub fn nearest_expiry(&self, date: NaiveDate) -> Option<NaiveDate> {
        self.extract_expiry_dates().into_iter().find(|d| *d >= date)
    }

    /// Materialize the view into a typed snapshot.
    pub fn to_snapshot(&self) -> OptionChainSnapshot {
        let spot = self.extract_spot();
        let rows: Vec<StrikeRow> = self
            .raw_rows()
            .filter_map(|row| row_strike(row).map(|strike| parse_row(row, strike)))
            .collect();

        if spot.is_none() {
            warn!("Snapshot carries no usable underlying value");
        }
        if rows.is_empty() {
            warn!("Snapshot carries no parseable strike rows");
        }

        OptionChainSnapshot::new(spot, rows)
    }
}

impl ChainAccess for RawChain<'_> {
    fn spot(&self) -> Option<f64> {
        self.extract_spot()
    }

    fn strikes(&self) -> Vec<f64> {
        self.extract_strikes()
    }

    fn row_for_strike(&self, strike: f64) -> Option<StrikeRow> {
        RawChain::row_for_strike(self, strike)
    }
}

impl ChainAccess for OptionChainSnapshot {
    fn spot(&self) -> Option<f64> {
        self.spot
    }

    fn strikes(&self) -> Vec<f64> {
        OptionChainSnapshot::strikes(self)
    }

    fn row_for_strike(&self, strike: f64) -> Option<StrikeRow> {
        self.row_at_strike(strike).cloned()
    }
}

impl OptionChainSnapshot {
    /// Build a typed snapshot from a raw payload.
    pub fn from_raw(value: &Value) -> Self {
        RawChain::new(value).to_snapshot()
    }
}

/// Underlying value of a raw payload.
pub fn extract_spot(snapshot: &Value) -> Option<f64> {
    RawChain::new(snapshot).extract_spot()
}

/// Sorted unique strikes of a raw payload.
pub fn extract_strikes(snapshot: &Value) -> Vec<f64> {
    RawChain::new(snapshot).extract_strikes()
}

/// First row at `strike` in a raw payload.
pub fn row_for_strike(snapshot: &Value, strike: f64) -> Option<StrikeRow> {
    RawChain::new(snapshot).row_for_strike(strike)
}

/// Read a finite number from a JSON number or numeric string.
fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn row_strike(row: &Value) -> Option<f64> {
    row.get("strikePrice")
        .or_else(|| row.get("strike"))
        .and_then(as_number)
}

fn leg(row: &Value, side: OptionSide) -> Option<&Value> {
    let alt = match side {
        OptionSide::Call => "call",
        OptionSide::Put => "put",
    };
    row.get(side.as_str())
        .or_else(|| row.get(alt))
        .filter(|l| l.is_object())
}

fn parse_leg(row: &Value, side: OptionSide) -> Option<SideQuote> {
    let leg = leg(row, side)?;
    let theta = leg.get("theta").and_then(as_number);
    let iv = leg
        .get("impliedVolatility")
        .or_else(|| leg.get("iv"))
        .and_then(as_number);
    Some(SideQuote::new(theta, iv))
}

fn parse_row(row: &Value, strike: f64) -> StrikeRow {
    StrikeRow::new(
        strike,
        parse_leg(row, OptionSide::Call),
        parse_leg(row, OptionSide::Put),
    )
}

fn parse_expiry(value: &Value) -> Option<NaiveDate> {
    let s = value.as_str()?.trim();
    NaiveDate::parse_from_str(s, EXPIRY_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .ok()
}

fn row_expiry(row: &Value) -> Option<NaiveDate> {
    row.get("expiryDate")
        .or_else(|| row.get("expiry"))
        .and_then(parse_expiry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nse_payload() -> Value {
        json!({
            "records": {
                "expiryDates": ["02-Jan-2025", "26-Dec-2024", "bad-date"],
                "underlyingValue": 45120.35,
                "data": [
                    {
                        "strikePrice": 45100,
                        "expiryDate": "26-Dec-2024",
                        "CE": {"theta": -12.5, "impliedVolatility": 12.5},
                        "PE": {"theta": -9.1, "impliedVolatility": 14.2}
                    },
                    {
                        "strikePrice": "45000",
                        "expiryDate": "26-Dec-2024",
                        "CE": {"impliedVolatility": "11.8"},
                        "PE": {"theta": 0, "impliedVolatility": 13.0}
                    },
                    {
                        "strikePrice": 45100,
                        "expiryDate": "02-Jan-2025",
                        "CE": {"theta": -3.0, "impliedVolatility": 10.0},
                        "PE": {"theta": -4.0, "impliedVolatility": 11.0}
                    },
                    {"strikePrice": "n/a", "CE": {}},
                    {"strikePrice": 45200, "expiryDate": "26-Dec-2024", "PE": {"theta": -2.0}},
                    "garbage"
                ]
            }
        })
    }

    #[test]
    fn test_extract_spot_nse() {
        assert_eq!(extract_spot(&nse_payload()), Some(45120.35));
    }

    #[test]
    fn test_extract_spot_flat_and_missing() {
        assert_eq!(extract_spot(&json!({"spot": "19850.5"})), Some(19850.5));
        assert_eq!(extract_spot(&json!({"records": {"data": []}})), None);
        assert_eq!(extract_spot(&json!([1, 2, 3])), None);
        assert_eq!(extract_spot(&json!({"spot": "abc"})), None);
    }

    #[test]
    fn test_extract_spot_from_leg() {
        let payload = json!({
            "records": {"data": [{"strikePrice": 100, "CE": {"underlyingValue": 101.5}}]}
        });
        assert_eq!(extract_spot(&payload), Some(101.5));
    }

    #[test]
    fn test_extract_timestamp() {
        let payload = json!({"records": {"timestamp": "23-Dec-2024 15:30:00"}});
        let ts = RawChain::new(&payload).extract_timestamp().unwrap();
        assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2024, 12, 23).unwrap());
        assert_eq!(ts.format("%H:%M").to_string(), "15:30");

        let flat = json!({"timestamp": "2024-12-23T09:20:00"});
        assert!(RawChain::new(&flat).extract_timestamp().is_some());

        assert_eq!(RawChain::new(&nse_payload()).extract_timestamp(), None);
        let bad = json!({"records": {"timestamp": "yesterday"}});
        assert_eq!(RawChain::new(&bad).extract_timestamp(), None);
    }

    #[test]
    fn test_extract_strikes_sorted_unique() {
        assert_eq!(
            extract_strikes(&nse_payload()),
            vec![45000.0, 45100.0, 45200.0]
        );
        assert!(extract_strikes(&json!({})).is_empty());
        assert!(extract_strikes(&json!({"records": "oops"})).is_empty());
    }

    #[test]
    fn test_row_for_strike_first_match() {
        let payload = nse_payload();
        let row = row_for_strike(&payload, 45100.0).unwrap();
        assert_eq!(row.strike, 45100.0);
        assert_eq!(row.call.as_ref().unwrap().theta, Some(-12.5));
        assert_eq!(row.put.as_ref().unwrap().implied_volatility, Some(14.2));

        let row = row_for_strike(&payload, 45000.0).unwrap();
        let call = row.call.unwrap();
        assert_eq!(call.theta, None);
        assert_eq!(call.implied_volatility, Some(11.8));

        let row = row_for_strike(&payload, 45200.0).unwrap();
        assert!(row.call.is_none());
        assert!(row.put.is_some());

        assert!(row_for_strike(&payload, 45100.05).is_none());
    }

    #[test]
    fn test_expiry_filter() {
        let payload = nse_payload();
        let chain = RawChain::new(&payload);
        let dates = chain.extract_expiry_dates();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 12, 26).unwrap(),
                NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            ]
        );

        let next_week = chain.for_expiry(dates[1]);
        let row = next_week.row_for_strike(45100.0).unwrap();
        assert_eq!(row.call.unwrap().theta, Some(-3.0));
        // the 45000 row belongs to the other expiry
        assert!(next_week.row_for_strike(45000.0).is_none());
    }

    #[test]
    fn test_nearest_expiry() {
        let payload = nse_payload();
        let chain = RawChain::new(&payload);
        let mid = NaiveDate::from_ymd_opt(2024, 12, 27).unwrap();
        assert_eq!(
            chain.nearest_expiry(mid),
            NaiveDate::from_ymd_opt(2025, 1, 2)
        );
        let late = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        assert_eq!(chain.nearest_expiry(late), None);
    }

    #[test]
    fn test_flat_layout() {
        let payload = json!({
            "spot": 19850,
            "rows": [
                {"strike": 19800, "call": {"theta": -5.0, "iv": 11.0}, "put": {"theta": -6.0}},
                {"strike": 19900, "call": null}
            ]
        });
        let snapshot = OptionChainSnapshot::from_raw(&payload);
        assert_eq!(snapshot.spot, Some(19850.0));
        assert_eq!(snapshot.strikes(), vec![19800.0, 19900.0]);
        let row = snapshot.row_at_strike(19800.0).unwrap();
        assert_eq!(row.call.as_ref().unwrap().implied_volatility, Some(11.0));
        assert!(snapshot.row_at_strike(19900.0).unwrap().call.is_none());
    }

    #[test]
    fn test_typed_and_raw_agree() {
        let payload = nse_payload();
        let raw = RawChain::new(&payload);
        let typed = OptionChainSnapshot::from_raw(&payload);
        assert_eq!(ChainAccess::spot(&raw), ChainAccess::spot(&typed));
        assert_eq!(ChainAccess::strikes(&raw), ChainAccess::strikes(&typed));
        for strike in typed.strikes() {
            assert_eq!(
                ChainAccess::row_for_strike(&raw, strike),
                ChainAccess::row_for_strike(&typed, strike)
            );
        }
    }
}
