//! Daily OHLCV record.

use serde::{Deserialize, Serialize};

/// One trading day of price data for a single symbol.
///
/// The symbol and date are the keys of the maps that hold a bar, so they are
/// not repeated here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl OhlcvBar {
    pub fn new(open: f64, high: f64, low: f64, close: f64, volume: i64) -> Self {
        OhlcvBar {
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// A bar where every price is `close`. Used for close-only quotes.
    pub fn flat(close: f64) -> Self {
        OhlcvBar::new(close, close, close, close, 0)
    }
}
