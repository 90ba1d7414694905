//! Market data containers.
//!
//! Two orientations of the same bars are used:
//! - [`HistoricalData`]: symbol -> date -> bar, the shape data sources produce.
//! - [`MarketData`]: date -> symbol -> bar, the shape the simulation consumes.
//!
//! Symbols are stored uppercased so they line up with [`Transaction`] symbols.
//!
//! [`Transaction`]: crate::domain::transaction::Transaction

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ohlcv::OhlcvBar;

/// All bars for one date, keyed by symbol.
pub type DaySnapshot = BTreeMap<String, OhlcvBar>;

/// A live quote. Only the price is needed to validate orders.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RealTimeQuote {
    pub price: f64,
}

/// Live quotes keyed by symbol.
pub type RealTimeQuotes = BTreeMap<String, RealTimeQuote>;

/// Date-indexed cumulative market data. Once a date is set it is never
/// overwritten.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketData {
    days: BTreeMap<NaiveDate, DaySnapshot>,
}

impl MarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.days.contains_key(&date)
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DaySnapshot> {
        self.days.get(&date)
    }

    pub fn bar(&self, date: NaiveDate, symbol: &str) -> Option<&OhlcvBar> {
        self.days.get(&date).and_then(|day| day.get(symbol))
    }

    /// Store `snapshot` for `date` unless data for that date already exists.
    /// Returns whether the snapshot was stored.
    pub fn insert_if_absent(&mut self, date: NaiveDate, snapshot: DaySnapshot) -> bool {
        if self.days.contains_key(&date) {
            return false;
        }
        self.days.insert(date, snapshot);
        true
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.days.keys().copied()
    }

    /// Closing prices of `symbol` strictly before `date`, oldest first,
    /// skipping days without a bar.
    pub fn closes_before(&self, symbol: &str, date: NaiveDate) -> Vec<f64> {
        self.days
            .range(..date)
            .filter_map(|(_, day)| day.get(symbol).map(|bar| bar.close))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn clear(&mut self) {
        self.days.clear();
    }
}

/// Symbol-indexed historical bars, as loaded from a data source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoricalData {
    symbols: BTreeMap<String, BTreeMap<NaiveDate, OhlcvBar>>,
}

impl HistoricalData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the bars of one symbol. A symbol that is already present is kept
    /// as is and the new bars are dropped with a warning. Returns whether the
    /// bars were added.
    pub fn insert_symbol(&mut self, symbol: &str, bars: BTreeMap<NaiveDate, OhlcvBar>) -> bool {
        let symbol = symbol.to_uppercase();
        if self.symbols.contains_key(&symbol) {
            tracing::warn!(%symbol, "duplicate symbol in historical data, dropping it");
            return false;
        }
        self.symbols.insert(symbol, bars);
        true
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.symbols.keys().map(String::as_str)
    }

    pub fn bars(&self, symbol: &str) -> Option<&BTreeMap<NaiveDate, OhlcvBar>> {
        self.symbols.get(symbol)
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Flip to date -> symbol -> bar, ordered by date.
    pub fn by_date(&self) -> BTreeMap<NaiveDate, DaySnapshot> {
        let mut transposed: BTreeMap<NaiveDate, DaySnapshot> = BTreeMap::new();
        for (symbol, bars) in &self.symbols {
            for (date, bar) in bars {
                transposed
                    .entry(*date)
                    .or_default()
                    .insert(symbol.clone(), *bar);
            }
        }
        transposed
    }
}
