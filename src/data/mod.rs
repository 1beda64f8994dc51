//! Historical price data consumed by the simulation.
//!
//! The engine operates on daily closing prices only. Loading prices from a
//! provider is the caller's job; this module just holds the table and
//! answers the lookups the loop and the indicator strategies need.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};

/// Per-asset, per-date closing price table.
///
/// Backed by ordered maps so date iteration is chronological and runs are
/// deterministic for identical inputs.
#[derive(Debug, Clone, Default)]
pub struct PriceSeries {
    closes: BTreeMap<String, BTreeMap<NaiveDate, Decimal>>,
}

impl PriceSeries {
    /// Create an empty price table
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one closing price
    pub fn insert(&mut self, asset: &str, date: NaiveDate, close: Decimal) {
        self.closes
            .entry(asset.to_string())
            .or_default()
            .insert(date, close);
    }

    /// Build from (asset, date, close) triples
    pub fn from_closes<I>(closes: I) -> Self
    where
        I: IntoIterator<Item = (String, NaiveDate, Decimal)>,
    {
        let mut series = Self::new();
        for (asset, date, close) in closes {
            series.insert(&asset, date, close);
        }
        series
    }

    /// Closing price for an asset on an exact date
    pub fn close(&self, asset: &str, date: NaiveDate) -> Option<Decimal> {
        self.closes.get(asset)?.get(&date).copied()
    }

    /// Last known close on or before a date (forward fill across gaps)
    pub fn close_on_or_before(&self, asset: &str, date: NaiveDate) -> Option<Decimal> {
        self.closes
            .get(asset)?
            .range(..=date)
            .next_back()
            .map(|(_, close)| *close)
    }

    /// Up to `count` closes ending at `date` (inclusive), oldest first.
    ///
    /// Returns fewer than `count` entries when the history is short; callers
    /// needing a full window must check the length themselves.
    pub fn closes_through(&self, asset: &str, date: NaiveDate, count: usize) -> Vec<Decimal> {
        let Some(by_date) = self.closes.get(asset) else {
            return Vec::new();
        };
        let mut window: Vec<Decimal> = by_date
            .range(..=date)
            .rev()
            .take(count)
            .map(|(_, close)| *close)
            .collect();
        window.reverse();
        window
    }

    /// Whether an asset has any price at all
    pub fn has_asset(&self, asset: &str) -> bool {
        self.closes.contains_key(asset)
    }

    /// Union of trading dates across `assets` inside [start, end], ascending
    pub fn trading_dates(
        &self,
        assets: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<NaiveDate> {
        let mut dates: BTreeSet<NaiveDate> = BTreeSet::new();
        for asset in assets {
            if let Some(by_date) = self.closes.get(asset) {
                dates.extend(by_date.range(start..=end).map(|(date, _)| *date));
            }
        }
        dates.into_iter().collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn sample_series() -> PriceSeries {
        let mut series = PriceSeries::new();
        series.insert("AAA", day(1), dec!(100));
        series.insert("AAA", day(2), dec!(101));
        series.insert("AAA", day(4), dec!(103));
        series.insert("BBB", day(2), dec!(50));
        series
    }

    #[test]
    fn test_exact_lookup() {
        let series = sample_series();
        assert_eq!(series.close("AAA", day(2)), Some(dec!(101)));
        assert_eq!(series.close("AAA", day(3)), None);
        assert_eq!(series.close("CCC", day(2)), None);
    }

    #[test]
    fn test_forward_fill_lookup() {
        let series = sample_series();
        // Day 3 has no print, the day-2 close carries forward
        assert_eq!(series.close_on_or_before("AAA", day(3)), Some(dec!(101)));
        assert_eq!(series.close_on_or_before("AAA", day(1)), Some(dec!(100)));
        assert_eq!(series.close_on_or_before("BBB", day(1)), None);
    }

    #[test]
    fn test_closes_through_window() {
        let series = sample_series();
        assert_eq!(
            series.closes_through("AAA", day(4), 2),
            vec![dec!(101), dec!(103)]
        );
        // Short history returns what exists
        assert_eq!(
            series.closes_through("AAA", day(2), 5),
            vec![dec!(100), dec!(101)]
        );
        assert!(series.closes_through("CCC", day(2), 5).is_empty());
    }

    #[test]
    fn test_trading_dates_union() {
        let series = sample_series();
        let assets = vec!["AAA".to_string(), "BBB".to_string()];
        assert_eq!(
            series.trading_dates(&assets, day(1), day(4)),
            vec![day(1), day(2), day(4)]
        );
        assert_eq!(series.trading_dates(&assets, day(3), day(3)), Vec::<NaiveDate>::new());
    }
}
