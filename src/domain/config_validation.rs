//! Configuration validation.
//!
//! Validates all config fields before a simulation runs.

use chrono::NaiveDate;
use std::str::FromStr;

use crate::domain::calendar::Region;
use crate::domain::error::SimError;
use crate::domain::indicator::rsi::RsiMethod;
use crate::domain::symbols::parse_symbols;
use crate::ports::config_port::ConfigPort;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn validate_simulation_config(config: &dyn ConfigPort) -> Result<(), SimError> {
    validate_dates(config)?;
    validate_market(config)?;
    validate_initial_fund(config)?;
    validate_commission(config)?;
    validate_data(config)?;
    validate_strategy(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> SimError {
    SimError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn missing(section: &str, key: &str) -> SimError {
    SimError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

/// Parse an optional key, failing on values that are present but malformed.
fn parse_optional<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, SimError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| invalid(section, key, format!("'{raw}' is not a valid number"))),
    }
}

pub fn parse_date(config: &dyn ConfigPort, section: &str, key: &str) -> Result<NaiveDate, SimError> {
    let value = config.get_string(section, key).ok_or_else(|| missing(section, key))?;
    NaiveDate::parse_from_str(&value, DATE_FORMAT)
        .map_err(|_| invalid(section, key, format!("invalid {key} format, expected YYYY-MM-DD")))
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), SimError> {
    let start_date = parse_date(config, "simulation", "start_date")?;
    let end_date = parse_date(config, "simulation", "end_date")?;
    if start_date >= end_date {
        return Err(invalid(
            "simulation",
            "start_date",
            "start_date must be before end_date",
        ));
    }
    Ok(())
}

fn validate_market(config: &dyn ConfigPort) -> Result<(), SimError> {
    let value = config
        .get_string("simulation", "market")
        .ok_or_else(|| missing("simulation", "market"))?;
    value
        .parse::<Region>()
        .map(|_| ())
        .map_err(|e| invalid("simulation", "market", e.to_string()))
}

fn validate_initial_fund(config: &dyn ConfigPort) -> Result<(), SimError> {
    if let Some(value) = parse_optional::<f64>(config, "simulation", "initial_fund")? {
        if !(value > 0.0 && value.is_finite()) {
            return Err(invalid(
                "simulation",
                "initial_fund",
                "initial_fund must be positive",
            ));
        }
    }
    Ok(())
}

fn validate_commission(config: &dyn ConfigPort) -> Result<(), SimError> {
    for key in ["commission_per_trade", "commission_pct"] {
        if let Some(value) = parse_optional::<f64>(config, "simulation", key)? {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(invalid("simulation", key, format!("{key} must be non-negative")));
            }
        }
    }
    Ok(())
}

fn validate_data(config: &dyn ConfigPort) -> Result<(), SimError> {
    config
        .get_string("data", "path")
        .ok_or_else(|| missing("data", "path"))?;
    let symbols = config
        .get_string("data", "symbols")
        .ok_or_else(|| missing("data", "symbols"))?;
    parse_symbols(&symbols)?;
    Ok(())
}

fn validate_strategy(config: &dyn ConfigPort) -> Result<(), SimError> {
    let kind = config
        .get_string("strategy", "kind")
        .unwrap_or_else(|| "rsi_reversion".to_string());
    match kind.as_str() {
        "buy_and_hold" => return Ok(()),
        "rsi_reversion" => {}
        other => {
            return Err(invalid(
                "strategy",
                "kind",
                format!("unknown strategy '{other}', expected buy_and_hold or rsi_reversion"),
            ));
        }
    }

    if let Some(period) = parse_optional::<i64>(config, "strategy", "rsi_period")? {
        if period < 1 {
            return Err(invalid("strategy", "rsi_period", "rsi_period must be at least 1"));
        }
    }
    if let Some(method) = config.get_string("strategy", "rsi_method") {
        method
            .parse::<RsiMethod>()
            .map_err(|e| invalid("strategy", "rsi_method", e))?;
    }
    if let Some(lot) = parse_optional::<i64>(config, "strategy", "lot_size")? {
        if lot < 1 {
            return Err(invalid("strategy", "lot_size", "lot_size must be at least 1"));
        }
    }

    let lower = parse_optional::<f64>(config, "strategy", "lower_bound")?.unwrap_or(20.0);
    let upper = parse_optional::<f64>(config, "strategy", "upper_bound")?.unwrap_or(80.0);
    for (key, value) in [("lower_bound", lower), ("upper_bound", upper)] {
        if !(0.0..=100.0).contains(&value) {
            return Err(invalid("strategy", key, format!("{key} must be between 0 and 100")));
        }
    }
    if lower >= upper {
        return Err(invalid(
            "strategy",
            "lower_bound",
            "lower_bound must be below upper_bound",
        ));
    }
    Ok(())
}
