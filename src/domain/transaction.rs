//! Order value type.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;

use super::error::SimError;

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Sell,
    Hold,
    Buy,
}

impl Action {
    /// -1 for sell, 0 for hold, +1 for buy.
    pub fn sign(&self) -> i64 {
        match self {
            Action::Sell => -1,
            Action::Hold => 0,
            Action::Buy => 1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::Sell => "sell",
            Action::Hold => "hold",
            Action::Buy => "buy",
        }
    }
}

impl TryFrom<i8> for Action {
    type Error = SimError;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Action::Sell),
            0 => Ok(Action::Hold),
            1 => Ok(Action::Buy),
            other => Err(SimError::InvalidTransaction {
                reason: format!("action {other} is invalid, must be one of -1, 0, 1"),
            }),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single order. Validated on construction and immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    symbol: String,
    action: Action,
    amount: i64,
    price: f64,
    timestamp: NaiveDateTime,
}

impl Transaction {
    /// Build an order from its raw parts.
    ///
    /// Fails when `action` is not -1, 0 or 1, `amount` is not positive,
    /// `price` is not a positive number, or `symbol` is blank. The symbol is
    /// stored uppercased.
    pub fn new(
        symbol: &str,
        action: i8,
        amount: i64,
        price: f64,
        timestamp: NaiveDateTime,
    ) -> Result<Self, SimError> {
        Self::with_action(symbol, Action::try_from(action)?, amount, price, timestamp)
    }

    pub fn with_action(
        symbol: &str,
        action: Action,
        amount: i64,
        price: f64,
        timestamp: NaiveDateTime,
    ) -> Result<Self, SimError> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(SimError::InvalidTransaction {
                reason: "symbol must not be empty".into(),
            });
        }
        if amount <= 0 {
            return Err(SimError::InvalidTransaction {
                reason: format!("amount must be positive, got {amount}"),
            });
        }
        if !(price > 0.0 && price.is_finite()) {
            return Err(SimError::InvalidTransaction {
                reason: format!("price must be positive, got {price}"),
            });
        }
        Ok(Transaction {
            symbol,
            action,
            amount,
            price,
            timestamp,
        })
    }

    pub fn buy(
        symbol: &str,
        amount: i64,
        price: f64,
        timestamp: NaiveDateTime,
    ) -> Result<Self, SimError> {
        Self::with_action(symbol, Action::Buy, amount, price, timestamp)
    }

    pub fn sell(
        symbol: &str,
        amount: i64,
        price: f64,
        timestamp: NaiveDateTime,
    ) -> Result<Self, SimError> {
        Self::with_action(symbol, Action::Sell, amount, price, timestamp)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn is_buy(&self) -> bool {
        self.action == Action::Buy
    }

    pub fn is_sell(&self) -> bool {
        self.action == Action::Sell
    }

    pub fn action_name(&self) -> &'static str {
        self.action.name()
    }

    /// Signed share change this order makes to a position.
    pub fn share_delta(&self) -> i64 {
        self.action.sign() * self.amount
    }

    pub fn to_record(&self) -> TransactionRecord {
        TransactionRecord {
            datetime: self.timestamp.format(DATETIME_FORMAT).to_string(),
            action: self.action_name(),
            symbol: self.symbol.clone(),
            amount: self.amount,
            price: self.price,
        }
    }
}

/// Flat representation of a [`Transaction`] for ledgers and reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    pub datetime: String,
    pub action: &'static str,
    pub symbol: String,
    pub amount: i64,
    pub price: f64,
}
