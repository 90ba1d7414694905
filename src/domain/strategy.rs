//! Trading strategies.
//!
//! A strategy is asked once per simulated day for the orders it wants to
//! place. It sees the market data accumulated so far and a read-only view of
//! its account.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::BTreeMap;

use super::error::SimError;
use super::indicator::rsi::{self, RsiMethod, DEFAULT_RSI_PERIOD, RSI_LOWER_BOUND, RSI_UPPER_BOUND};
use super::market_data::{MarketData, RealTimeQuotes};
use super::transaction::Transaction;

/// Everything a strategy may look at when proposing orders.
#[derive(Debug, Clone, Copy)]
pub struct StrategyContext<'a> {
    pub market: &'a MarketData,
    pub current_day: NaiveDate,
    pub position: &'a BTreeMap<String, i64>,
    pub cash: f64,
    pub history: &'a [Transaction],
    pub real_time: Option<&'a RealTimeQuotes>,
}

impl StrategyContext<'_> {
    pub fn held(&self, symbol: &str) -> i64 {
        self.position.get(symbol).copied().unwrap_or(0)
    }

    /// Live quote when trading in real time, else today's close.
    pub fn current_price(&self, symbol: &str) -> Option<f64> {
        match self.real_time {
            Some(quotes) => quotes.get(symbol).map(|q| q.price),
            None => self.market.bar(self.current_day, symbol).map(|b| b.close),
        }
    }

    /// Timestamp for orders placed today.
    pub fn order_time(&self) -> NaiveDateTime {
        self.current_day.and_time(NaiveTime::MIN)
    }

    /// Symbols with a price today.
    pub fn tradable_symbols(&self) -> Vec<String> {
        match self.real_time {
            Some(quotes) => quotes.keys().cloned().collect(),
            None => self
                .market
                .day(self.current_day)
                .map(|day| day.keys().cloned().collect())
                .unwrap_or_default(),
        }
    }
}

/// Produces the orders for one day. Called at most once per day; the
/// returned orders are applied in order.
pub trait Strategy {
    fn propose(&mut self, ctx: &StrategyContext<'_>) -> Result<Vec<Transaction>, SimError>;
}

impl<F> Strategy for F
where
    F: FnMut(&StrategyContext<'_>) -> Result<Vec<Transaction>, SimError>,
{
    fn propose(&mut self, ctx: &StrategyContext<'_>) -> Result<Vec<Transaction>, SimError> {
        self(ctx)
    }
}

/// Spend the available cash on one symbol as soon as it has a price, then
/// hold forever.
#[derive(Debug, Clone, Default)]
pub struct BuyAndHold {
    /// Symbol to buy; the first tradable symbol when unset.
    pub symbol: Option<String>,
    /// Cash kept back so the commission can still be paid.
    pub fee_reserve: f64,
}

impl Strategy for BuyAndHold {
    fn propose(&mut self, ctx: &StrategyContext<'_>) -> Result<Vec<Transaction>, SimError> {
        let symbol = match &self.symbol {
            Some(s) => s.to_uppercase(),
            None => match ctx.tradable_symbols().into_iter().next() {
                Some(s) => s,
                None => return Ok(Vec::new()),
            },
        };
        if ctx.held(&symbol) > 0 {
            return Ok(Vec::new());
        }
        let Some(price) = ctx.current_price(&symbol) else {
            return Ok(Vec::new());
        };
        let amount = ((ctx.cash - self.fee_reserve) / price).floor() as i64;
        if amount <= 0 {
            return Ok(Vec::new());
        }
        Ok(vec![Transaction::buy(&symbol, amount, price, ctx.order_time())?])
    }
}

/// Mean reversion on RSI: buy a lot when RSI drops below `lower_bound` and
/// nothing is held, sell the whole holding once RSI rises above
/// `upper_bound`.
#[derive(Debug, Clone)]
pub struct RsiReversion {
    /// Symbols to trade; every tradable symbol when empty.
    pub symbols: Vec<String>,
    pub period: usize,
    pub method: RsiMethod,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub lot_size: i64,
}

impl Default for RsiReversion {
    fn default() -> Self {
        RsiReversion {
            symbols: Vec::new(),
            period: DEFAULT_RSI_PERIOD,
            method: RsiMethod::Simple,
            lower_bound: RSI_LOWER_BOUND,
            upper_bound: RSI_UPPER_BOUND,
            lot_size: 10,
        }
    }
}

impl Strategy for RsiReversion {
    fn propose(&mut self, ctx: &StrategyContext<'_>) -> Result<Vec<Transaction>, SimError> {
        let symbols = if self.symbols.is_empty() {
            ctx.tradable_symbols()
        } else {
            self.symbols.iter().map(|s| s.to_uppercase()).collect()
        };

        let mut orders = Vec::new();
        for symbol in symbols {
            let Some(price) = ctx.current_price(&symbol) else {
                continue;
            };
            let previous = ctx.market.closes_before(&symbol, ctx.current_day);
            let value = match rsi::rsi(price, &previous, self.period, self.method) {
                Ok(v) => v,
                // Still warming up.
                Err(SimError::InsufficientPriceHistory { .. }) => continue,
                Err(e) => return Err(e),
            };

            let held = ctx.held(&symbol);
            if held == 0 && value < self.lower_bound {
                orders.push(Transaction::buy(&symbol, self.lot_size, price, ctx.order_time())?);
            } else if held > 0 && value > self.upper_bound {
                orders.push(Transaction::sell(&symbol, held, price, ctx.order_time())?);
            }
        }
        Ok(orders)
    }
}
