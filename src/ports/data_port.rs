//! Historical data access port.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::domain::error::SimError;
use crate::domain::ohlcv::OhlcvBar;

pub trait DataPort {
    /// Daily bars of `symbol` in `[start_date, end_date]`, keyed by date.
    fn fetch_daily(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, OhlcvBar>, SimError>;

    fn list_symbols(&self) -> Result<Vec<String>, SimError>;
}
