//! End-to-end simulation tests through the public API.

mod common;

use approx::assert_relative_eq;
use common::*;
use proptest::prelude::*;
use stocksim::domain::account::{OrderOutcome, Rejection, TraderAccount};
use stocksim::domain::analyzer::analyze;
use stocksim::domain::calendar::{is_open_day, shift_open_days, Region};
use stocksim::domain::commission::FlatFee;
use stocksim::domain::error::SimError;
use stocksim::domain::market_data::{DaySnapshot, MarketData, RealTimeQuote, RealTimeQuotes};
use stocksim::domain::session::MarketSession;
use stocksim::domain::strategy::{BuyAndHold, RsiReversion, StrategyContext};
use stocksim::domain::symbols::load_historical;
use stocksim::domain::transaction::Transaction;

/// Buys `amount` on the first open day it is called and sells on the
/// `sell_on`-th call.
fn buy_then_sell(
    symbol: &'static str,
    amount: i64,
    sell_on: usize,
) -> impl FnMut(&StrategyContext<'_>) -> Result<Vec<Transaction>, SimError> {
    let mut calls = 0;
    move |ctx| {
        calls += 1;
        let Some(price) = ctx.current_price(symbol) else {
            return Ok(Vec::new());
        };
        if calls == 1 {
            Ok(vec![Transaction::buy(symbol, amount, price, ctx.order_time())?])
        } else if calls == sell_on {
            Ok(vec![Transaction::sell(symbol, amount, price, ctx.order_time())?])
        } else {
            Ok(Vec::new())
        }
    }
}

mod session_scenarios {
    use super::*;

    #[test]
    fn nyse_january_round_trip() {
        let start = date(2020, 1, 1);
        let end = date(2020, 2, 1);
        let port = MockDataPort::new().with_bars("MSFT", generate_bars(start, 31, 150.0, 1.0));
        let hist = load_historical(&port, &["MSFT".to_string()], start, end).unwrap();

        let mut session = MarketSession::new(Some(&hist), Region::Nyse, start, end).unwrap();
        let fee = 4.95;
        let trader = TraderAccount::new(
            "round-trip",
            10_000.0,
            start,
            end,
            Box::new(buy_then_sell("MSFT", 10, 5)),
        )
        .unwrap()
        .with_commission(Box::new(FlatFee::new(fee)));
        session.add_trader(trader);

        session.run_to_end().unwrap();

        // Day 1 is Jan 2, day 5 is Jan 8.
        let close1 = 151.0;
        let close5 = 157.0;
        assert!(close5 > close1);
        let trader = &session.traders()[0];
        assert_relative_eq!(
            trader.cash(),
            10_000.0 - (10.0 * close1 + fee) + (10.0 * close5 - fee)
        );
        assert_eq!(trader.position_of("MSFT"), 0);
        assert_eq!(trader.transaction_history().len(), 2);
        assert_eq!(trader.transaction_history()[0].date(), date(2020, 1, 2));
        assert_eq!(trader.transaction_history()[1].date(), date(2020, 1, 8));
    }

    #[test]
    fn missing_day_is_fatal() {
        let start = date(2020, 1, 1);
        let end = date(2020, 2, 1);
        // Bars stop on Jan 5, the next open day is Jan 6.
        let port = MockDataPort::new().with_bars("MSFT", generate_bars(start, 5, 100.0, 0.0));
        let hist = load_historical(&port, &["MSFT".to_string()], start, end).unwrap();
        let mut session = MarketSession::new(Some(&hist), Region::Nyse, start, end).unwrap();

        match session.run_to_end() {
            Err(SimError::NoDataForDay { date: missing }) => assert_eq!(missing, date(2020, 1, 6)),
            other => panic!("expected missing data for Jan 6, got {other:?}"),
        }
    }

    #[test]
    fn real_time_trading_then_close_quote() {
        let start = date(2020, 3, 2);
        let end = date(2020, 3, 31);
        let mut session = MarketSession::new(None, Region::Nasdaq, start, end).unwrap();
        let trader = TraderAccount::new(
            "live",
            1_000.0,
            start,
            end,
            Box::new(buy_then_sell("AAPL", 2, 2)),
        )
        .unwrap();
        session.add_trader(trader);

        let mut quotes = RealTimeQuotes::new();
        quotes.insert("AAPL".into(), RealTimeQuote { price: 250.0 });
        let applied = session.make_trades(Some(&quotes)).unwrap();
        assert_eq!(applied[0].len(), 1);

        let mut close = DaySnapshot::new();
        close.insert("AAPL".into(), make_bar(255.0));
        session.forward_one_day(Some(close)).unwrap();
        assert_eq!(session.current_day(), date(2020, 3, 3));
        assert_eq!(session.market_data().bar(start, "AAPL").unwrap().close, 255.0);

        let mut later = RealTimeQuotes::new();
        later.insert("AAPL".into(), RealTimeQuote { price: 260.0 });
        session.make_trades(Some(&later)).unwrap();

        let trader = &session.traders()[0];
        assert_relative_eq!(trader.cash(), 1_000.0 - 500.0 + 520.0);
        assert_eq!(trader.position_of("AAPL"), 0);
    }

    #[test]
    fn traders_share_market_data() {
        let start = date(2021, 6, 1);
        let end = date(2021, 7, 1);
        let port = MockDataPort::new()
            .with_bars("MSFT", generate_bars(start, 30, 250.0, 0.5))
            .with_bars("AAPL", generate_bars(start, 30, 125.0, -0.25));
        let symbols = vec!["MSFT".to_string(), "AAPL".to_string()];
        let hist = load_historical(&port, &symbols, start, end).unwrap();
        let mut session = MarketSession::new(Some(&hist), Region::Tsx, start, end).unwrap();

        for symbol in ["MSFT", "AAPL"] {
            let strategy = BuyAndHold {
                symbol: Some(symbol.to_string()),
                fee_reserve: 0.0,
            };
            session.add_trader(
                TraderAccount::new(symbol, 5_000.0, start, end, Box::new(strategy)).unwrap(),
            );
        }
        session.run_to_end().unwrap();

        let msft = &session.traders()[0];
        let aapl = &session.traders()[1];
        assert_eq!(msft.position_of("MSFT"), 20);
        assert_eq!(aapl.position_of("AAPL"), 40);
        assert!(msft.cash() >= 0.0 && aapl.cash() >= 0.0);
        // Canada Day is closed, the clock stops on July 2.
        assert_eq!(session.current_day(), date(2021, 7, 2));
    }
}

mod strategies {
    use super::*;

    /// Ten falling days then ten rising days, repeated.
    fn zigzag(cycles: usize) -> Vec<f64> {
        let mut closes = Vec::new();
        for _ in 0..cycles {
            closes.extend((0..10).map(|i| 100.0 - 3.0 * i as f64));
            closes.extend((0..10).map(|i| 73.0 + 3.0 * i as f64));
        }
        closes
    }

    #[test]
    fn rsi_reversion_trades_both_ways() {
        let start = date(2019, 1, 1);
        let end = date(2019, 12, 31);
        let closes = zigzag(19);
        let port = MockDataPort::new().with_bars("XYZ", bars_from_closes(start, &closes));
        let hist = load_historical(&port, &["XYZ".to_string()], start, end).unwrap();
        let mut session = MarketSession::new(Some(&hist), Region::Nyse, start, end).unwrap();

        let strategy = RsiReversion {
            symbols: vec!["XYZ".into()],
            period: 6,
            ..RsiReversion::default()
        };
        session.add_trader(
            TraderAccount::new("rsi", 10_000.0, start, end, Box::new(strategy))
                .unwrap()
                .with_commission(Box::new(FlatFee::new(1.0))),
        );
        session.run_to_end().unwrap();

        let trader = &session.traders()[0];
        let history = trader.transaction_history();
        assert!(history.iter().any(Transaction::is_buy));
        assert!(history.iter().any(Transaction::is_sell));
        // Never sells more than it holds.
        let mut held = 0;
        for tx in history {
            held += tx.share_delta();
            assert!(held >= 0);
        }
        assert_eq!(held, trader.position_of("XYZ"));

        let report = analyze(trader).unwrap();
        assert!(report.sells > 0);
        assert!(report.profit_probability > 0.5);
        assert!(report.sell_buy_ratio_mean > 1.0);
    }
}

mod order_validation {
    use super::*;

    fn one_day_market(symbol: &str, close: f64) -> MarketData {
        let mut snapshot = DaySnapshot::new();
        snapshot.insert(symbol.to_string(), make_bar(close));
        let mut market = MarketData::new();
        market.insert_if_absent(date(2020, 1, 2), snapshot);
        market
    }

    fn idle(_: &StrategyContext<'_>) -> Result<Vec<Transaction>, SimError> {
        Ok(Vec::new())
    }

    #[test]
    fn rejection_reasons_are_specific() {
        let market = one_day_market("MSFT", 100.0);
        let day = date(2020, 1, 2);
        let mut trader =
            TraderAccount::new("t", 50.0, day, date(2020, 2, 1), Box::new(idle)).unwrap();
        let ts = day.and_hms_opt(0, 0, 0).unwrap();

        let outcome = trader.submit_order(
            Transaction::buy("MSFT", 1, 100.0, ts).unwrap(),
            &market,
            day,
            None,
        );
        match outcome {
            OrderOutcome::Rejected { reason, .. } => {
                assert!(matches!(reason, Rejection::InsufficientCash { .. }));
                assert!(reason.to_string().contains("MSFT"));
            }
            OrderOutcome::Applied(_) => panic!("order should have been rejected"),
        }
    }

    proptest! {
        #[test]
        fn unaffordable_buy_changes_nothing(amount in 1i64..1_000, cash in 0.0f64..99.0) {
            let market = one_day_market("MSFT", 100.0);
            let day = date(2020, 1, 2);
            let mut trader =
                TraderAccount::new("t", cash, day, date(2020, 2, 1), Box::new(idle)).unwrap();
            let ts = day.and_hms_opt(0, 0, 0).unwrap();

            let outcome = trader.submit_order(
                Transaction::buy("MSFT", amount, 100.0, ts).unwrap(),
                &market,
                day,
                None,
            );
            let rejected = matches!(outcome, OrderOutcome::Rejected { .. });
            prop_assert!(rejected);
            prop_assert_eq!(trader.cash().to_bits(), cash.to_bits());
            prop_assert!(trader.position().is_empty());
            prop_assert!(trader.transaction_history().is_empty());
        }

        #[test]
        fn round_trip_cash(k in 1i64..100, p1 in 1.0f64..500.0, p2 in 1.0f64..500.0, fee in 0.0f64..20.0) {
            let day1 = date(2020, 1, 2);
            let day2 = date(2020, 1, 3);
            let mut market = MarketData::new();
            let mut s1 = DaySnapshot::new();
            s1.insert("MSFT".into(), make_bar(p1));
            let mut s2 = DaySnapshot::new();
            s2.insert("MSFT".into(), make_bar(p2));
            market.insert_if_absent(day1, s1);
            market.insert_if_absent(day2, s2);

            let cash = 100_000.0;
            let mut trader = TraderAccount::new("t", cash, day1, date(2020, 2, 1), Box::new(idle))
                .unwrap()
                .with_commission(Box::new(move |_: &Transaction| fee));
            let buy = Transaction::buy("MSFT", k, p1, day1.and_hms_opt(0, 0, 0).unwrap()).unwrap();
            let sell = Transaction::sell("MSFT", k, p2, day2.and_hms_opt(0, 0, 0).unwrap()).unwrap();

            let bought = matches!(trader.submit_order(buy, &market, day1, None), OrderOutcome::Applied(_));
            prop_assert!(bought);
            let sold = matches!(trader.submit_order(sell, &market, day2, None), OrderOutcome::Applied(_));
            prop_assert!(sold);

            let expected = cash - (k as f64 * p1 + fee) + (k as f64 * p2 - fee);
            prop_assert!((trader.cash() - expected).abs() < 1e-6);
            prop_assert_eq!(trader.position_of("MSFT"), 0);
        }
    }
}

mod calendar_properties {
    use super::*;

    #[test]
    fn special_closures() {
        for d in [date(2001, 9, 11), date(2012, 10, 29), date(2018, 12, 5)] {
            assert!(!is_open_day(d, Region::Nyse), "{d} should be closed");
        }
        // Boxing Day 2003 was a trading day on the TSX.
        assert!(is_open_day(date(2003, 12, 26), Region::Tsx));
        assert!(!is_open_day(date(2002, 12, 26), Region::Tsx));
    }

    proptest! {
        #[test]
        fn shift_round_trips(offset in 0i64..20_000, n in 1i64..40, region_idx in 0usize..3) {
            let region = [Region::Nyse, Region::Nasdaq, Region::Tsx][region_idx];
            let start = date(1980, 1, 1) + chrono::Duration::days(offset);
            let open = shift_open_days(start, 1, region).unwrap();
            let there = shift_open_days(open, n, region).unwrap();
            prop_assert_eq!(shift_open_days(there, -n, region).unwrap(), open);
        }
    }
}
