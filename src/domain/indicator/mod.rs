//! Technical indicators used by the built-in strategies.

pub mod rsi;
