//! Core domain types and logic.

pub mod account;
pub mod analyzer;
pub mod calendar;
pub mod commission;
pub mod config_validation;
pub mod error;
pub mod indicator;
pub mod market_data;
pub mod ohlcv;
pub mod session;
pub mod strategy;
pub mod symbols;
pub mod transaction;
