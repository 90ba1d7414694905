//! Performance analysis of a finished trader.
//!
//! The ledger is replayed in order. Each sell is matched against the most
//! recent buy of the same symbol (last buy wins, no lot queue), and a running
//! assets figure seeded with the initial fund is snapshotted at every month
//! and year rollover.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use std::collections::HashMap;

use super::account::TraderAccount;
use super::calendar::busday_count;
use super::error::SimError;
use super::transaction::{Action, Transaction};

/// The `(alpha, beta, profit_probability)` summary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scores {
    /// Return score, higher is better.
    pub alpha: f64,
    /// Volatility score, lower is better.
    pub beta: f64,
    pub profit_probability: f64,
}

impl Scores {
    /// False when a zero or undefined average leaked into a score.
    pub fn is_finite(&self) -> bool {
        self.alpha.is_finite() && self.beta.is_finite() && self.profit_probability.is_finite()
    }
}

/// A sell matched with its cost basis.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeExtreme {
    pub symbol: String,
    pub amount: i64,
    pub bought_for: f64,
    pub sold_for: f64,
    pub sold_at: NaiveDateTime,
    /// `amount * (sold_for - bought_for)`.
    pub pnl: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceReport {
    pub trader: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub final_balance: f64,
    pub final_assets: f64,
    pub sells: usize,
    pub sell_buy_ratio_mean: f64,
    pub sell_buy_ratio_std: f64,
    pub profit_probability: f64,
    pub hold_days_mean: f64,
    pub hold_days_std: f64,
    /// Month over month return rates in percent, first two snapshots skipped.
    pub monthly_returns: Vec<f64>,
    pub monthly_return_mean: f64,
    pub monthly_return_std: f64,
    pub min_monthly_return: Option<f64>,
    pub max_monthly_return: Option<f64>,
    /// Year over year return rates in percent, first two snapshots skipped.
    pub annual_returns: Vec<f64>,
    pub annual_return_mean: f64,
    pub annual_return_std: f64,
    pub monthly_transactions_mean: f64,
    pub largest_gain: Option<TradeExtreme>,
    pub largest_loss: Option<TradeExtreme>,
    pub lowest_assets: f64,
    pub lowest_assets_date: NaiveDate,
    pub scores: Scores,
    /// Averages that were zero or undefined when used as a divisor.
    pub degenerate_inputs: Vec<&'static str>,
}

/// Replay the trader's ledger into a report. Fails on an empty ledger.
pub fn analyze(trader: &TraderAccount) -> Result<PerformanceReport, SimError> {
    let history = trader.transaction_history();
    if history.is_empty() {
        return Err(SimError::EmptyHistory);
    }

    let mut last_buy: HashMap<&str, &Transaction> = HashMap::new();
    let mut ratios = Vec::new();
    let mut profitable = 0usize;
    let mut hold_days = Vec::new();
    let mut largest_gain: Option<TradeExtreme> = None;
    let mut largest_loss: Option<TradeExtreme> = None;

    let mut assets = trader.initial_fund();
    let mut lowest_assets = assets;
    let mut lowest_assets_date = trader.start_date();

    let mut month = (trader.start_date().year(), trader.start_date().month());
    let mut year = trader.start_date().year();
    let mut monthly_assets = Vec::new();
    let mut annual_assets = Vec::new();
    let mut monthly_counts = Vec::new();
    let mut this_month = 0usize;

    for tx in history {
        let date = tx.date();

        match tx.action() {
            Action::Buy => {
                last_buy.insert(tx.symbol(), tx);
                assets -= trader.commission_for(tx);
            }
            Action::Sell => match last_buy.get(tx.symbol()).copied() {
                None => tracing::warn!(
                    symbol = tx.symbol(),
                    at = %tx.timestamp(),
                    "sell without a prior buy, left out of the statistics"
                ),
                Some(bought) => {
                    let ratio = tx.price() / bought.price();
                    ratios.push(ratio);
                    if ratio > 1.0 {
                        profitable += 1;
                    }
                    hold_days.push(busday_count(bought.date(), date) as f64);

                    let pnl = tx.amount() as f64 * (tx.price() - bought.price());
                    let extreme = || TradeExtreme {
                        symbol: tx.symbol().to_string(),
                        amount: tx.amount(),
                        bought_for: bought.price(),
                        sold_for: tx.price(),
                        sold_at: tx.timestamp(),
                        pnl,
                    };
                    if pnl > 0.0 && largest_gain.as_ref().is_none_or(|g| pnl > g.pnl) {
                        largest_gain = Some(extreme());
                    }
                    if pnl < 0.0 && largest_loss.as_ref().is_none_or(|l| pnl < l.pnl) {
                        largest_loss = Some(extreme());
                    }

                    assets += pnl - trader.commission_for(tx);
                    if assets < lowest_assets {
                        lowest_assets = assets;
                        lowest_assets_date = date;
                    }
                }
            },
            Action::Hold => {}
        }

        // Rollover snapshots include the transaction that crossed into the
        // new period, one entry per elapsed period.
        while (date.year(), date.month()) > month {
            monthly_assets.push(assets);
            monthly_counts.push(this_month);
            this_month = 0;
            month = if month.1 == 12 {
                (month.0 + 1, 1)
            } else {
                (month.0, month.1 + 1)
            };
        }
        while date.year() > year {
            annual_assets.push(assets);
            year += 1;
        }
        this_month += 1;
    }

    let sells = ratios.len();
    let sell_buy_ratio_mean = mean(&ratios);
    let sell_buy_ratio_std = std_dev(&ratios);
    let profit_probability = profitable as f64 / sells as f64;
    let monthly_returns = return_rates(&monthly_assets);
    let annual_returns = return_rates(&annual_assets);
    let monthly_return_mean = mean(&monthly_returns);
    let monthly_return_std = std_dev(&monthly_returns);
    let counts: Vec<f64> = monthly_counts.iter().map(|&c| c as f64).collect();

    let scores = Scores {
        alpha: 0.8 * monthly_return_mean + 0.2 * (sell_buy_ratio_mean - 1.0) * 100.0,
        beta: 0.7 * sell_buy_ratio_std / sell_buy_ratio_mean * 100.0
            + 0.3 * (monthly_return_std / monthly_return_mean) * 100.0,
        profit_probability,
    };

    let mut degenerate_inputs = Vec::new();
    if !is_usable_divisor(sell_buy_ratio_mean) {
        degenerate_inputs.push("mean sell/buy ratio");
    }
    if !is_usable_divisor(monthly_return_mean) {
        degenerate_inputs.push("mean monthly return");
    }
    if sells == 0 {
        degenerate_inputs.push("number of sells");
    }
    if !degenerate_inputs.is_empty() {
        tracing::warn!(
            trader = trader.name(),
            inputs = ?degenerate_inputs,
            "zero or undefined averages, scores are not meaningful"
        );
    }

    let report = PerformanceReport {
        trader: trader.name().to_string(),
        start_date: trader.start_date(),
        end_date: trader.end_date(),
        final_balance: trader.total_value(),
        final_assets: assets,
        sells,
        sell_buy_ratio_mean,
        sell_buy_ratio_std,
        profit_probability,
        hold_days_mean: mean(&hold_days),
        hold_days_std: std_dev(&hold_days),
        min_monthly_return: monthly_returns.iter().copied().reduce(f64::min),
        max_monthly_return: monthly_returns.iter().copied().reduce(f64::max),
        monthly_returns,
        monthly_return_mean,
        monthly_return_std,
        annual_return_mean: mean(&annual_returns),
        annual_return_std: std_dev(&annual_returns),
        annual_returns,
        monthly_transactions_mean: mean(&counts),
        largest_gain,
        largest_loss,
        lowest_assets,
        lowest_assets_date,
        scores,
        degenerate_inputs,
    };
    report.log();
    Ok(report)
}

impl PerformanceReport {
    pub fn log(&self) {
        tracing::info!(
            trader = %self.trader,
            start = %self.start_date,
            end = %self.end_date,
            final_balance = format_args!("{:.2}", self.final_balance),
            final_assets = format_args!("{:.2}", self.final_assets),
            "performance metrics"
        );
        tracing::info!(
            monthly_return_mean = format_args!("{:.2}", self.monthly_return_mean),
            monthly_return_std = format_args!("{:.2}", self.monthly_return_std),
            annual_return_mean = format_args!("{:.2}", self.annual_return_mean),
            annual_return_std = format_args!("{:.2}", self.annual_return_std),
            sell_buy_ratio_mean = format_args!("{:.4}", self.sell_buy_ratio_mean),
            sell_buy_ratio_std = format_args!("{:.4}", self.sell_buy_ratio_std),
            "return and risk"
        );
        tracing::info!(
            lowest_assets = format_args!("{:.2}", self.lowest_assets),
            lowest_assets_date = %self.lowest_assets_date,
            monthly_transactions_mean = format_args!("{:.2}", self.monthly_transactions_mean),
            hold_days_mean = format_args!("{:.2}", self.hold_days_mean),
            hold_days_std = format_args!("{:.2}", self.hold_days_std),
            "activity"
        );
        if let Some(gain) = &self.largest_gain {
            tracing::info!(
                symbol = %gain.symbol,
                pnl = format_args!("{:.2}", gain.pnl),
                bought_for = gain.bought_for,
                sold_for = gain.sold_for,
                sold_at = %gain.sold_at,
                "largest gain"
            );
        }
        if let Some(loss) = &self.largest_loss {
            tracing::info!(
                symbol = %loss.symbol,
                pnl = format_args!("{:.2}", loss.pnl),
                bought_for = loss.bought_for,
                sold_for = loss.sold_for,
                sold_at = %loss.sold_at,
                "largest loss"
            );
        }
        tracing::info!(
            alpha = format_args!("{:.2}", self.scores.alpha),
            beta = format_args!("{:.2}", self.scores.beta),
            profit_probability = format_args!("{:.2}", self.scores.profit_probability),
            "final score"
        );
    }
}

/// Percent change between consecutive snapshots, skipping the first two
/// snapshots since they cover partial periods.
fn return_rates(snapshots: &[f64]) -> Vec<f64> {
    (2..snapshots.len())
        .map(|i| (snapshots[i] / snapshots[i - 1] - 1.0) * 100.0)
        .collect()
}

/// NaN for an empty slice.
fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation, NaN for an empty slice.
fn std_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

fn is_usable_divisor(value: f64) -> bool {
    value.is_finite() && value != 0.0
}
