//! CSV file data adapter.
//!
//! One file per symbol, `<SYMBOL>.csv`, with a
//! `date,open,high,low,close,volume` header and `YYYY-MM-DD` dates.

use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use crate::domain::error::SimError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::transaction::TransactionRecord;
use crate::ports::data_port::DataPort;

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: i64,
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// `<symbol>.csv` when it exists, else the first `.csv` file whose stem
    /// matches the symbol ignoring case.
    fn csv_path(&self, symbol: &str) -> PathBuf {
        let exact = self.base_path.join(format!("{}.csv", symbol));
        if exact.is_file() {
            return exact;
        }
        fs::read_dir(&self.base_path)
            .into_iter()
            .flatten()
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .find(|path| {
                path.extension().and_then(|e| e.to_str()) == Some("csv")
                    && path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .is_some_and(|stem| stem.eq_ignore_ascii_case(symbol))
            })
            .unwrap_or(exact)
    }
}

impl DataPort for CsvAdapter {
    fn fetch_daily(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, OhlcvBar>, SimError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| SimError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = BTreeMap::new();

        for (line, result) in rdr.deserialize::<CsvRow>().enumerate() {
            let row = result.map_err(|e| SimError::Data {
                reason: format!("{}: CSV parse error: {}", path.display(), e),
            })?;
            let date = NaiveDate::parse_from_str(row.date.trim(), "%Y-%m-%d").map_err(|e| {
                SimError::Data {
                    reason: format!(
                        "{}: invalid date '{}' on row {}: {}",
                        path.display(),
                        row.date,
                        line + 1,
                        e
                    ),
                }
            })?;

            if date < start_date || date > end_date {
                continue;
            }
            bars.insert(
                date,
                OhlcvBar::new(row.open, row.high, row.low, row.close, row.volume),
            );
        }

        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, SimError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| SimError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SimError::Data {
                reason: format!("directory entry error: {}", e),
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                symbols.push(stem.to_uppercase());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}

/// Write applied transactions as CSV, one record per row with a header.
pub fn write_ledger(path: &std::path::Path, records: &[TransactionRecord]) -> Result<(), SimError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| SimError::Data {
        reason: format!("failed to create {}: {}", path.display(), e),
    })?;
    for record in records {
        writer.serialize(record).map_err(|e| SimError::Data {
            reason: format!("failed to write ledger row: {}", e),
        })?;
    }
    writer.flush()?;
    Ok(())
}
