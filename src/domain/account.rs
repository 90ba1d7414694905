//! Trader account: cash, positions and the order pipeline.
//!
//! Each simulated day the account asks its strategy for orders, then runs
//! every order through resolve price -> validate -> apply. A failed order is
//! logged and skipped; it never aborts the rest of the day's orders.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::commission::{CommissionModel, FlatFee};
use super::error::SimError;
use super::market_data::{MarketData, RealTimeQuotes};
use super::strategy::{Strategy, StrategyContext};
use super::transaction::{Action, Transaction};

/// Why a proposed order was not applied.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error("{symbol} is not in the real-time quotes")]
    MissingQuote { symbol: String },

    #[error("no price data at all for {symbol}")]
    NoPriceData { symbol: String },

    #[error("buy {symbol} at {price} is below the market price {market}")]
    BuyBelowMarket {
        symbol: String,
        price: f64,
        market: f64,
    },

    #[error("sell {symbol} at {price} is above the market price {market}")]
    SellAboveMarket {
        symbol: String,
        price: f64,
        market: f64,
    },

    #[error("cash {cash:.2} cannot cover {amount} {symbol} at {price} with commission {commission:.2}")]
    InsufficientCash {
        symbol: String,
        amount: i64,
        price: f64,
        commission: f64,
        cash: f64,
    },

    #[error("holding {held} {symbol}, cannot sell {amount}")]
    InsufficientHoldings {
        symbol: String,
        held: i64,
        amount: i64,
    },
}

/// Result of pushing one order through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderOutcome {
    Applied(Transaction),
    Rejected {
        transaction: Transaction,
        reason: Rejection,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PriceSource {
    RealTime,
    DayClose,
    LastClose,
}

pub struct TraderAccount {
    name: String,
    initial_fund: f64,
    cash: f64,
    position: BTreeMap<String, i64>,
    latest_close_price: HashMap<String, f64>,
    history: Vec<Transaction>,
    strategy: Box<dyn Strategy>,
    commission: Box<dyn CommissionModel>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    current_day: NaiveDate,
}

impl TraderAccount {
    /// New account with no commission. Fails on a negative fund.
    pub fn new(
        name: &str,
        initial_fund: f64,
        start_date: NaiveDate,
        end_date: NaiveDate,
        strategy: Box<dyn Strategy>,
    ) -> Result<Self, SimError> {
        if !(initial_fund >= 0.0) {
            return Err(SimError::NegativeCash { cash: initial_fund });
        }
        Ok(TraderAccount {
            name: name.to_string(),
            initial_fund,
            cash: initial_fund,
            position: BTreeMap::new(),
            latest_close_price: HashMap::new(),
            history: Vec::new(),
            strategy,
            commission: Box::new(FlatFee::default()),
            start_date,
            end_date,
            current_day: start_date,
        })
    }

    pub fn with_commission(mut self, commission: Box<dyn CommissionModel>) -> Self {
        self.commission = commission;
        self
    }

    /// Back to the initial fund with no positions or history, ready to run
    /// the same strategy again.
    pub fn reset(&mut self) {
        self.cash = self.initial_fund;
        self.position.clear();
        self.latest_close_price.clear();
        self.history.clear();
        self.current_day = self.start_date;
    }

    pub fn set_strategy(&mut self, strategy: Box<dyn Strategy>) {
        self.strategy = strategy;
    }

    /// Run one day: ask the strategy for orders and apply the valid ones.
    ///
    /// Returns the applied orders in the order they were proposed. Fails if
    /// `current_day` is before the last day this account traded on, or if
    /// the strategy itself fails.
    pub fn make_trades(
        &mut self,
        market: &MarketData,
        current_day: NaiveDate,
        real_time: Option<&RealTimeQuotes>,
    ) -> Result<Vec<Transaction>, SimError> {
        if current_day < self.current_day {
            return Err(SimError::TimeTravel {
                last: self.current_day,
                requested: current_day,
            });
        }
        self.current_day = current_day;

        let ctx = StrategyContext {
            market,
            current_day,
            position: &self.position,
            cash: self.cash,
            history: &self.history,
            real_time,
        };
        let proposed = self.strategy.propose(&ctx)?;

        let mut applied = Vec::with_capacity(proposed.len());
        for transaction in proposed {
            match self.submit_order(transaction, market, current_day, real_time) {
                OrderOutcome::Applied(t) => applied.push(t),
                OrderOutcome::Rejected {
                    transaction,
                    reason,
                } => {
                    tracing::warn!(
                        trader = %self.name,
                        day = %current_day,
                        symbol = transaction.symbol(),
                        action = transaction.action_name(),
                        %reason,
                        "order rejected"
                    );
                }
            }
        }
        Ok(applied)
    }

    /// Resolve the reference price, validate and apply a single order.
    pub fn submit_order(
        &mut self,
        transaction: Transaction,
        market: &MarketData,
        current_day: NaiveDate,
        real_time: Option<&RealTimeQuotes>,
    ) -> OrderOutcome {
        let (reference, source) =
            match self.reference_price(transaction.symbol(), market, current_day, real_time) {
                Ok(found) => found,
                Err(reason) => {
                    return OrderOutcome::Rejected {
                        transaction,
                        reason,
                    };
                }
            };

        let commission = self.commission_for(&transaction);
        if let Err(reason) = self.validate(&transaction, reference, commission) {
            return OrderOutcome::Rejected {
                transaction,
                reason,
            };
        }

        self.apply(&transaction, reference, commission, source);
        OrderOutcome::Applied(transaction)
    }

    fn reference_price(
        &self,
        symbol: &str,
        market: &MarketData,
        current_day: NaiveDate,
        real_time: Option<&RealTimeQuotes>,
    ) -> Result<(f64, PriceSource), Rejection> {
        if let Some(quotes) = real_time {
            return quotes
                .get(symbol)
                .map(|q| (q.price, PriceSource::RealTime))
                .ok_or_else(|| Rejection::MissingQuote {
                    symbol: symbol.to_string(),
                });
        }
        if let Some(bar) = market.bar(current_day, symbol) {
            return Ok((bar.close, PriceSource::DayClose));
        }
        // Data gap: fall back to the last close seen for the symbol.
        self.latest_close_price
            .get(symbol)
            .map(|&p| (p, PriceSource::LastClose))
            .ok_or_else(|| Rejection::NoPriceData {
                symbol: symbol.to_string(),
            })
    }

    fn validate(
        &self,
        transaction: &Transaction,
        reference: f64,
        commission: f64,
    ) -> Result<(), Rejection> {
        let symbol = transaction.symbol();
        let amount = transaction.amount();
        let value = amount as f64 * reference;

        match transaction.action() {
            Action::Buy => {
                if transaction.price() < reference {
                    return Err(Rejection::BuyBelowMarket {
                        symbol: symbol.to_string(),
                        price: transaction.price(),
                        market: reference,
                    });
                }
                if self.cash < value + commission {
                    return Err(Rejection::InsufficientCash {
                        symbol: symbol.to_string(),
                        amount,
                        price: reference,
                        commission,
                        cash: self.cash,
                    });
                }
            }
            Action::Sell => {
                if transaction.price() > reference {
                    return Err(Rejection::SellAboveMarket {
                        symbol: symbol.to_string(),
                        price: transaction.price(),
                        market: reference,
                    });
                }
                let held = self.position_of(symbol);
                if held < amount {
                    return Err(Rejection::InsufficientHoldings {
                        symbol: symbol.to_string(),
                        held,
                        amount,
                    });
                }
                // Commission larger than cash plus proceeds would leave cash negative.
                if self.cash + value < commission {
                    return Err(Rejection::InsufficientCash {
                        symbol: symbol.to_string(),
                        amount,
                        price: reference,
                        commission,
                        cash: self.cash,
                    });
                }
            }
            Action::Hold => {}
        }
        Ok(())
    }

    fn apply(
        &mut self,
        transaction: &Transaction,
        reference: f64,
        commission: f64,
        source: PriceSource,
    ) {
        let symbol = transaction.symbol();
        let value = transaction.amount() as f64 * reference;
        match transaction.action() {
            Action::Buy => self.cash -= value + commission,
            Action::Sell => self.cash += value - commission,
            Action::Hold => {}
        }
        // Guard against float dust when spending exactly the available cash.
        if self.cash < 0.0 {
            self.cash = 0.0;
        }

        let delta = transaction.share_delta();
        if delta != 0 {
            let held = self.position.entry(symbol.to_string()).or_insert(0);
            *held += delta;
            if *held == 0 {
                self.position.remove(symbol);
            }
        }
        if source == PriceSource::DayClose {
            self.latest_close_price.insert(symbol.to_string(), reference);
        }

        tracing::debug!(
            trader = %self.name,
            action = transaction.action_name(),
            amount = transaction.amount(),
            symbol,
            price = reference,
            cash = self.cash,
            "order applied"
        );
        self.history.push(transaction.clone());
    }

    /// Fee the commission model charges for `transaction`.
    pub fn commission_for(&self, transaction: &Transaction) -> f64 {
        if transaction.action() == Action::Hold {
            return 0.0;
        }
        self.commission.commission(transaction)
    }

    /// Cash plus held shares valued at their latest known price.
    pub fn total_value(&self) -> f64 {
        let holdings: f64 = self
            .position
            .iter()
            .filter_map(|(symbol, &held)| self.latest_price(symbol).map(|p| held as f64 * p))
            .sum();
        self.cash + holdings
    }

    /// Last close recorded for `symbol`, or the price of the last applied
    /// order on it when it was only ever traded on live quotes.
    pub fn latest_price(&self, symbol: &str) -> Option<f64> {
        self.latest_close_price.get(symbol).copied().or_else(|| {
            self.history
                .iter()
                .rev()
                .find(|t| t.symbol() == symbol)
                .map(Transaction::price)
        })
    }

    pub fn log_assets(&self) {
        tracing::info!(
            trader = %self.name,
            day = %self.current_day,
            total_value = self.total_value(),
            "total value of the trader"
        );
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn initial_fund(&self) -> f64 {
        self.initial_fund
    }

    pub fn position(&self) -> &BTreeMap<String, i64> {
        &self.position
    }

    pub fn position_of(&self, symbol: &str) -> i64 {
        self.position.get(symbol).copied().unwrap_or(0)
    }

    pub fn transaction_history(&self) -> &[Transaction] {
        &self.history
    }

    /// Replace the ledger, e.g. to analyze a history recorded elsewhere.
    pub fn set_transaction_history(&mut self, history: Vec<Transaction>) {
        self.history = history;
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    pub fn current_day(&self) -> NaiveDate {
        self.current_day
    }
}

impl fmt::Debug for TraderAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraderAccount")
            .field("name", &self.name)
            .field("cash", &self.cash)
            .field("position", &self.position)
            .field("transactions", &self.history.len())
            .field("current_day", &self.current_day)
            .finish_non_exhaustive()
    }
}
