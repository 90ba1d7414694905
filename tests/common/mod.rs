#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use std::collections::{BTreeMap, HashMap};
use stocksim::domain::error::SimError;
pub use stocksim::domain::ohlcv::OhlcvBar;
use stocksim::ports::data_port::DataPort;

pub struct MockDataPort {
    pub data: HashMap<String, BTreeMap<NaiveDate, OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: BTreeMap<NaiveDate, OhlcvBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_daily(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, OhlcvBar>, SimError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(SimError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(symbol)
            .map(|bars| {
                bars.range(start_date..=end_date)
                    .map(|(d, b)| (*d, *b))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_symbols(&self) -> Result<Vec<String>, SimError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(close: f64) -> OhlcvBar {
    OhlcvBar::new(close - 1.0, close + 1.0, close - 2.0, close, 1000)
}

/// One bar per calendar day (weekends included) from `start`, with closes
/// taken from `closes` in order.
pub fn bars_from_closes(start: NaiveDate, closes: &[f64]) -> BTreeMap<NaiveDate, OhlcvBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| (start + Duration::days(i as i64), make_bar(c)))
        .collect()
}

/// `count` daily bars rising by `step` from `start_price`.
pub fn generate_bars(
    start: NaiveDate,
    count: usize,
    start_price: f64,
    step: f64,
) -> BTreeMap<NaiveDate, OhlcvBar> {
    let closes: Vec<f64> = (0..count).map(|i| start_price + step * i as f64).collect();
    bars_from_closes(start, &closes)
}

/// Render bars as the CSV layout the CSV adapter reads.
pub fn bars_to_csv(bars: &BTreeMap<NaiveDate, OhlcvBar>) -> String {
    let mut out = String::from("date,open,high,low,close,volume\n");
    for (d, b) in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            d.format("%Y-%m-%d"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        ));
    }
    out
}
