//! Domain error types.
//!
//! `SimError` is the fail-fast channel: every variant aborts the operation
//! that raised it. Per-order rejections live in
//! [`crate::domain::account::Rejection`] and never surface here.

use chrono::NaiveDate;

/// Top-level error type for stocksim.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("start date {start} must be before end date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("no market data for {date}")]
    NoDataForDay { date: NaiveDate },

    #[error("cannot go backwards: trader is at {last} but was asked to trade on {requested}")]
    TimeTravel {
        last: NaiveDate,
        requested: NaiveDate,
    },

    #[error("invalid transaction: {reason}")]
    InvalidTransaction { reason: String },

    #[error("cash must not be negative, got {cash}")]
    NegativeCash { cash: f64 },

    #[error("no transaction history to analyze")]
    EmptyHistory,

    #[error("need to shift by at least one open day")]
    ZeroShift,

    #[error("need at least {need} previous closes, have {have}")]
    InsufficientPriceHistory { have: usize, need: usize },

    #[error("unknown market region: {value}")]
    UnknownRegion { value: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&SimError> for std::process::ExitCode {
    fn from(err: &SimError) -> Self {
        let code: u8 = match err {
            SimError::Io(_) => 1,
            SimError::ConfigParse { .. }
            | SimError::ConfigMissing { .. }
            | SimError::ConfigInvalid { .. }
            | SimError::UnknownRegion { .. } => 2,
            SimError::Data { .. } | SimError::NoDataForDay { .. } => 3,
            SimError::InvalidDateRange { .. }
            | SimError::TimeTravel { .. }
            | SimError::InvalidTransaction { .. }
            | SimError::NegativeCash { .. }
            | SimError::ZeroShift
            | SimError::InsufficientPriceHistory { .. } => 4,
            SimError::EmptyHistory => 5,
        };
        std::process::ExitCode::from(code)
    }
}
