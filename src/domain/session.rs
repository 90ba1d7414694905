//! Market session: the simulation clock.
//!
//! A session walks open days from the start date towards the end date,
//! filling the cumulative market data one day at a time and letting every
//! registered trader act on it.

use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::account::TraderAccount;
use super::calendar::{Region, TradingCalendar};
use super::error::SimError;
use super::market_data::{DaySnapshot, HistoricalData, MarketData, RealTimeQuotes};
use super::transaction::Transaction;

#[derive(Debug)]
pub struct MarketSession {
    start_date: NaiveDate,
    end_date: NaiveDate,
    current_day: NaiveDate,
    calendar: Arc<TradingCalendar>,
    cumulative: MarketData,
    historical_by_date: Option<BTreeMap<NaiveDate, DaySnapshot>>,
    traders: Vec<TraderAccount>,
}

impl MarketSession {
    /// Session over `[start_date, end_date)` for `region`, with its own
    /// calendar.
    pub fn new(
        historical: Option<&HistoricalData>,
        region: Region,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Self, SimError> {
        let calendar = Arc::new(TradingCalendar::for_range(region, start_date, end_date));
        Self::with_calendar(historical, calendar, start_date, end_date)
    }

    /// Session sharing an existing calendar.
    ///
    /// Fails when `start_date` is not before `end_date`. The clock starts on
    /// the first open day on or after `start_date`.
    pub fn with_calendar(
        historical: Option<&HistoricalData>,
        calendar: Arc<TradingCalendar>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Self, SimError> {
        if start_date >= end_date {
            return Err(SimError::InvalidDateRange {
                start: start_date,
                end: end_date,
            });
        }

        let historical_by_date = match historical {
            Some(data) if !data.is_empty() => {
                tracing::info!("transposing historical data by date");
                let by_date = data.by_date();
                tracing::info!(days = by_date.len(), "historical data transposed");
                Some(by_date)
            }
            _ => None,
        };

        Ok(MarketSession {
            start_date,
            end_date,
            current_day: calendar.next_open_day(start_date),
            calendar,
            cumulative: MarketData::new(),
            historical_by_date,
            traders: Vec::new(),
        })
    }

    /// Drop all cumulative data and rewind to the first open day. Traders
    /// are kept as they are.
    pub fn reset(&mut self) {
        self.cumulative.clear();
        self.current_day = self.calendar.next_open_day(self.start_date);
    }

    pub fn is_the_end(&self) -> bool {
        self.current_day >= self.end_date
    }

    pub fn has_data_for_date(&self, date: NaiveDate) -> bool {
        self.cumulative.contains_date(date)
    }

    /// Store `data` for `date` unless that date already has data.
    pub fn append_data_for_date(&mut self, data: DaySnapshot, date: NaiveDate) {
        self.cumulative.insert_if_absent(date, data);
    }

    /// Make sure today has data: an already stored snapshot wins, then the
    /// supplied close quote, then the historical data.
    pub fn append_data_for_today(
        &mut self,
        today_close_quote: Option<DaySnapshot>,
    ) -> Result<(), SimError> {
        let today = self.current_day;
        if self.cumulative.contains_date(today) {
            return Ok(());
        }
        if let Some(quote) = today_close_quote {
            self.cumulative.insert_if_absent(today, quote);
            return Ok(());
        }
        let snapshot = self
            .historical_by_date
            .as_ref()
            .and_then(|by_date| by_date.get(&today))
            .cloned()
            .ok_or(SimError::NoDataForDay { date: today })?;
        self.cumulative.insert_if_absent(today, snapshot);
        Ok(())
    }

    pub fn today_data(&self) -> Result<&DaySnapshot, SimError> {
        self.cumulative
            .day(self.current_day)
            .ok_or(SimError::NoDataForDay {
                date: self.current_day,
            })
    }

    pub fn current_day(&self) -> NaiveDate {
        self.current_day
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    pub fn calendar(&self) -> &TradingCalendar {
        &self.calendar
    }

    pub fn market_data(&self) -> &MarketData {
        &self.cumulative
    }

    pub fn add_trader(&mut self, trader: TraderAccount) {
        self.traders.push(trader);
    }

    pub fn clear_all_traders(&mut self) {
        self.traders.clear();
    }

    pub fn traders(&self) -> &[TraderAccount] {
        &self.traders
    }

    pub fn traders_mut(&mut self) -> &mut [TraderAccount] {
        &mut self.traders
    }

    /// Hand the session's traders back, e.g. for analysis after a run.
    pub fn into_traders(self) -> Vec<TraderAccount> {
        self.traders
    }

    /// Let every trader act on today, in registration order. Without
    /// real-time quotes today's data is loaded from history first.
    ///
    /// Returns the applied orders of each trader.
    pub fn make_trades(
        &mut self,
        real_time: Option<&RealTimeQuotes>,
    ) -> Result<Vec<Vec<Transaction>>, SimError> {
        if real_time.is_none() {
            self.append_data_for_today(None)?;
        }
        let today = self.current_day;
        let market = &self.cumulative;
        self.traders
            .iter_mut()
            .map(|trader| trader.make_trades(market, today, real_time))
            .collect()
    }

    /// Store today's data and move the clock to the next open day.
    pub fn forward_one_day(
        &mut self,
        today_close_quote: Option<DaySnapshot>,
    ) -> Result<(), SimError> {
        self.append_data_for_today(today_close_quote)?;
        self.current_day = self
            .calendar
            .next_open_day(self.current_day + Duration::days(1));
        tracing::debug!(day = %self.current_day, "market moved forward");
        self.refresh_indicators();
        Ok(())
    }

    /// One simulation tick: trade on today, then move on.
    pub fn trade_and_forward(
        &mut self,
        today_close_quote: Option<DaySnapshot>,
    ) -> Result<Vec<Vec<Transaction>>, SimError> {
        let applied = self.make_trades(None)?;
        self.forward_one_day(today_close_quote)?;
        Ok(applied)
    }

    /// Tick until the end date. Returns how many orders were applied.
    pub fn run_to_end(&mut self) -> Result<usize, SimError> {
        let mut applied = 0;
        while !self.is_the_end() {
            applied += self
                .trade_and_forward(None)?
                .iter()
                .map(Vec::len)
                .sum::<usize>();
        }
        Ok(applied)
    }

    // Hook for derived market indicators such as index levels.
    fn refresh_indicators(&mut self) {
        tracing::trace!(day = %self.current_day, "refreshing market indicators");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::calendar::is_open_day;
    use crate::domain::commission::FlatFee;
    use crate::domain::ohlcv::OhlcvBar;
    use crate::domain::strategy::StrategyContext;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Every calendar day in the range, closing at `base + offset`.
    fn daily_history(symbol: &str, from: NaiveDate, to: NaiveDate, base: f64) -> HistoricalData {
        let bars = from
            .iter_days()
            .take_while(|d| *d <= to)
            .enumerate()
            .map(|(i, d)| (d, OhlcvBar::flat(base + i as f64)))
            .collect();
        let mut hist = HistoricalData::new();
        hist.insert_symbol(symbol, bars);
        hist
    }

    fn snapshot(symbol: &str, close: f64) -> DaySnapshot {
        let mut snap = DaySnapshot::new();
        snap.insert(symbol.to_string(), OhlcvBar::flat(close));
        snap
    }

    #[test]
    fn rejects_inverted_range() {
        let err = MarketSession::new(None, Region::Nyse, date(2020, 2, 1), date(2020, 1, 1));
        assert!(matches!(err, Err(SimError::InvalidDateRange { .. })));
        let same = MarketSession::new(None, Region::Nyse, date(2020, 1, 1), date(2020, 1, 1));
        assert!(same.is_err());
    }

    #[test]
    fn starts_on_first_open_day() {
        // New Year's Day is closed.
        let session =
            MarketSession::new(None, Region::Nyse, date(2020, 1, 1), date(2020, 2, 1)).unwrap();
        assert_eq!(session.current_day(), date(2020, 1, 2));
    }

    #[test]
    fn forward_skips_weekend() {
        let mut session =
            MarketSession::new(None, Region::Nyse, date(2020, 1, 3), date(2020, 2, 1)).unwrap();
        session
            .forward_one_day(Some(snapshot("MSFT", 1.0)))
            .unwrap();
        assert_eq!(session.current_day(), date(2020, 1, 6));
        assert!(session.has_data_for_date(date(2020, 1, 3)));
    }

    #[test]
    fn forward_without_data_fails() {
        let mut session =
            MarketSession::new(None, Region::Nyse, date(2020, 1, 2), date(2020, 2, 1)).unwrap();
        assert!(matches!(
            session.forward_one_day(None),
            Err(SimError::NoDataForDay { .. })
        ));
        assert!(matches!(
            session.today_data(),
            Err(SimError::NoDataForDay { .. })
        ));
    }

    #[test]
    fn stored_data_is_never_replaced() {
        let mut session =
            MarketSession::new(None, Region::Nyse, date(2020, 1, 2), date(2020, 2, 1)).unwrap();
        session.append_data_for_date(snapshot("MSFT", 1.0), date(2020, 1, 2));
        session
            .append_data_for_today(Some(snapshot("MSFT", 2.0)))
            .unwrap();
        assert_eq!(session.today_data().unwrap()["MSFT"].close, 1.0);
    }

    #[test]
    fn historical_data_fills_gaps() {
        let hist = daily_history("msft", date(2020, 1, 1), date(2020, 1, 31), 100.0);
        let mut session =
            MarketSession::new(Some(&hist), Region::Nyse, date(2020, 1, 1), date(2020, 2, 1))
                .unwrap();
        session.append_data_for_today(None).unwrap();
        assert_eq!(session.today_data().unwrap()["MSFT"].close, 101.0);
    }

    #[test]
    fn reset_rewinds_and_clears() {
        let hist = daily_history("MSFT", date(2020, 1, 1), date(2020, 1, 31), 100.0);
        let mut session =
            MarketSession::new(Some(&hist), Region::Nyse, date(2020, 1, 1), date(2020, 2, 1))
                .unwrap();
        session.forward_one_day(None).unwrap();
        session.forward_one_day(None).unwrap();
        session.reset();
        assert_eq!(session.current_day(), date(2020, 1, 2));
        assert!(session.market_data().is_empty());
    }

    #[test]
    fn buy_on_day_one_sell_on_day_five() {
        let hist = daily_history("MSFT", date(2020, 1, 1), date(2020, 1, 31), 100.0);
        let start = date(2020, 1, 1);
        let end = date(2020, 2, 1);
        let mut session = MarketSession::new(Some(&hist), Region::Nyse, start, end).unwrap();

        let mut day = 0;
        let strategy = move |ctx: &StrategyContext<'_>| -> Result<Vec<Transaction>, SimError> {
            day += 1;
            let Some(price) = ctx.current_price("MSFT") else {
                return Ok(Vec::new());
            };
            match day {
                1 => Ok(vec![Transaction::buy("MSFT", 10, price, ctx.order_time())?]),
                5 => Ok(vec![Transaction::sell("MSFT", 10, price, ctx.order_time())?]),
                _ => Ok(Vec::new()),
            }
        };
        let trader = TraderAccount::new("scenario", 10_000.0, start, end, Box::new(strategy))
            .unwrap()
            .with_commission(Box::new(FlatFee::new(5.0)));
        session.add_trader(trader);

        let applied = session.run_to_end().unwrap();
        assert_eq!(applied, 2);
        assert!(session.is_the_end());

        // Open days: Jan 2 (close 101) and Jan 8 (close 107).
        let close1 = 101.0;
        let close5 = 107.0;
        let trader = &session.traders()[0];
        assert_relative_eq!(
            trader.cash(),
            10_000.0 - (10.0 * close1 + 5.0) + (10.0 * close5 - 5.0)
        );
        assert_eq!(trader.position_of("MSFT"), 0);
        assert_eq!(trader.transaction_history().len(), 2);
    }

    #[test]
    fn traders_act_in_registration_order() {
        let d = date(2020, 1, 2);
        let mut session = MarketSession::new(None, Region::Nyse, d, date(2020, 1, 10)).unwrap();
        session.append_data_for_date(snapshot("MSFT", 10.0), d);
        for name in ["first", "second"] {
            let strategy = |ctx: &StrategyContext<'_>| -> Result<Vec<Transaction>, SimError> {
                Ok(vec![Transaction::buy("MSFT", 1, 10.0, ctx.order_time())?])
            };
            session.add_trader(
                TraderAccount::new(name, 100.0, d, date(2020, 1, 10), Box::new(strategy)).unwrap(),
            );
        }
        let applied = session.make_trades(None).unwrap();
        assert_eq!(applied.len(), 2);
        assert_eq!(session.traders()[1].name(), "second");
        session.clear_all_traders();
        assert!(session.traders().is_empty());
    }

    proptest! {
        #[test]
        fn forward_lands_on_later_open_day(offset in 0i64..3_000, region_idx in 0usize..3) {
            let region = [Region::Nyse, Region::Nasdaq, Region::Tsx][region_idx];
            let start = date(2000, 1, 1) + Duration::days(offset);
            let mut session =
                MarketSession::new(None, region, start, start + Duration::days(30)).unwrap();
            let before = session.current_day();
            session.forward_one_day(Some(snapshot("X", 1.0))).unwrap();
            prop_assert!(session.current_day() > before);
            prop_assert!(is_open_day(session.current_day(), region));
        }
    }
}
