//! Symbol lists and loading historical data for them.

use chrono::NaiveDate;
use std::collections::HashSet;

use crate::domain::error::SimError;
use crate::domain::market_data::HistoricalData;
use crate::ports::data_port::DataPort;

/// Parse a comma separated symbol list. Symbols are uppercased; repeats are
/// dropped with a warning. Empty entries are an error.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, SimError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(SimError::ConfigInvalid {
                section: "data".into(),
                key: "symbols".into(),
                reason: "empty entry in symbol list".into(),
            });
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            tracing::warn!(%symbol, "duplicate symbol in list, dropping it");
            continue;
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

/// Fetch daily bars for every symbol in `[start_date, end_date]`.
///
/// Symbols whose fetch fails or returns nothing are skipped with a warning.
/// Fails only when no symbol has data.
pub fn load_historical(
    data_port: &dyn DataPort,
    symbols: &[String],
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<HistoricalData, SimError> {
    let mut historical = HistoricalData::new();

    for symbol in symbols {
        let bars = match data_port.fetch_daily(symbol, start_date, end_date) {
            Ok(bars) => bars,
            Err(e) => {
                tracing::warn!(%symbol, error = %e, "skipping symbol");
                continue;
            }
        };
        if bars.is_empty() {
            tracing::warn!(%symbol, "skipping symbol, no data in range");
            continue;
        }
        tracing::info!(%symbol, bars = bars.len(), "loaded");
        historical.insert_symbol(symbol, bars);
    }

    if historical.is_empty() {
        return Err(SimError::Data {
            reason: format!("none of {} symbols has data between {start_date} and {end_date}", symbols.len()),
        });
    }
    Ok(historical)
}
