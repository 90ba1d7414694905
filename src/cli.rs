//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::{write_ledger, CsvAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::account::TraderAccount;
use crate::domain::analyzer::{analyze, PerformanceReport};
use crate::domain::calendar::{Region, TradingCalendar};
use crate::domain::commission::{CommissionModel, FlatFee, PerTradePlusPct};
use crate::domain::config_validation::{parse_date, validate_simulation_config, DATE_FORMAT};
use crate::domain::error::SimError;
use crate::domain::indicator::rsi::RsiMethod;
use crate::domain::session::MarketSession;
use crate::domain::strategy::{BuyAndHold, RsiReversion, Strategy};
use crate::domain::symbols::{load_historical, parse_symbols};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(name = "stocksim", about = "Day-by-day stock market simulator")]
pub struct Cli {
    /// Log level filter, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a simulation
    Simulate {
        #[arg(short, long)]
        config: PathBuf,
        /// Write the applied transactions to this CSV file
        #[arg(long)]
        ledger: Option<PathBuf>,
    },
    /// Validate a simulation configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List symbols available in the configured data directory
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Check whether a day is an open trading day
    Calendar {
        #[arg(long)]
        market: String,
        #[arg(long)]
        date: String,
        /// Also print the open day this many open days away
        #[arg(long, allow_hyphen_values = true)]
        shift: Option<i64>,
    },
}

/// Which built-in strategy to run and its parameters.
#[derive(Debug, Clone)]
pub enum StrategyConfig {
    BuyAndHold,
    RsiReversion(RsiReversion),
}

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub region: Region,
    pub initial_fund: f64,
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub trader_name: String,
    pub data_path: PathBuf,
    pub symbols: Vec<String>,
    pub strategy: StrategyConfig,
}

impl SimulationConfig {
    pub fn commission_model(&self) -> Box<dyn CommissionModel> {
        if self.commission_pct > 0.0 {
            Box::new(PerTradePlusPct {
                per_trade: self.commission_per_trade,
                pct: self.commission_pct,
            })
        } else {
            Box::new(FlatFee::new(self.commission_per_trade))
        }
    }

    pub fn build_strategy(&self) -> Box<dyn Strategy> {
        match &self.strategy {
            StrategyConfig::BuyAndHold => Box::new(BuyAndHold {
                symbol: self.symbols.first().cloned(),
                fee_reserve: self.commission_per_trade
                    + self.initial_fund * self.commission_pct / 100.0,
            }),
            StrategyConfig::RsiReversion(params) => Box::new(params.clone()),
        }
    }
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Simulate { config, ledger } => run_simulate(&config, ledger.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::ListSymbols { config } => run_list_symbols(&config),
        Command::Calendar {
            market,
            date,
            shift,
        } => run_calendar(&market, &date, shift),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(fail)
}

fn fail(err: SimError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

fn run_simulate(config_path: &Path, ledger_path: Option<&Path>) -> ExitCode {
    // Stage 1: Load and validate config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_simulation_config(&adapter) {
        return fail(e);
    }
    let sim_config = match build_simulation_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    // Stage 2: Run against the CSV data directory
    let data_port = CsvAdapter::new(sim_config.data_path.clone());
    let (trader, report) = match run_simulation(&data_port, &sim_config) {
        Ok(result) => result,
        Err(e) => return fail(e),
    };

    // Stage 3: Console summary
    print_summary(&trader, report.as_ref());

    // Stage 4: Optional ledger
    if let Some(path) = ledger_path {
        let records: Vec<_> = trader
            .transaction_history()
            .iter()
            .map(|t| t.to_record())
            .collect();
        if let Err(e) = write_ledger(path, &records) {
            return fail(e);
        }
        eprintln!("\nLedger written to: {}", path.display());
    }
    ExitCode::SUCCESS
}

pub fn build_simulation_config(adapter: &dyn ConfigPort) -> Result<SimulationConfig, SimError> {
    let start_date = parse_date(adapter, "simulation", "start_date")?;
    let end_date = parse_date(adapter, "simulation", "end_date")?;
    let region: Region = adapter
        .get_string("simulation", "market")
        .ok_or_else(|| SimError::ConfigMissing {
            section: "simulation".into(),
            key: "market".into(),
        })?
        .parse()?;
    let data_path = adapter
        .get_string("data", "path")
        .map(PathBuf::from)
        .ok_or_else(|| SimError::ConfigMissing {
            section: "data".into(),
            key: "path".into(),
        })?;
    let symbols = parse_symbols(&adapter.get_string("data", "symbols").unwrap_or_default())?;

    let strategy = match adapter.get_string("strategy", "kind").as_deref() {
        Some("buy_and_hold") => StrategyConfig::BuyAndHold,
        _ => {
            let defaults = RsiReversion::default();
            let method = match adapter.get_string("strategy", "rsi_method") {
                Some(m) => m.parse::<RsiMethod>().map_err(|reason| SimError::ConfigInvalid {
                    section: "strategy".into(),
                    key: "rsi_method".into(),
                    reason,
                })?,
                None => defaults.method,
            };
            StrategyConfig::RsiReversion(RsiReversion {
                symbols: symbols.clone(),
                period: adapter.get_int("strategy", "rsi_period", defaults.period as i64) as usize,
                method,
                lower_bound: adapter.get_double("strategy", "lower_bound", defaults.lower_bound),
                upper_bound: adapter.get_double("strategy", "upper_bound", defaults.upper_bound),
                lot_size: adapter.get_int("strategy", "lot_size", defaults.lot_size),
            })
        }
    };

    Ok(SimulationConfig {
        start_date,
        end_date,
        region,
        initial_fund: adapter.get_double("simulation", "initial_fund", 100_000.0),
        commission_per_trade: adapter.get_double("simulation", "commission_per_trade", 0.0),
        commission_pct: adapter.get_double("simulation", "commission_pct", 0.0),
        trader_name: adapter
            .get_string("simulation", "trader_name")
            .unwrap_or_else(|| "trader".to_string()),
        data_path,
        symbols,
        strategy,
    })
}

/// Load data, run one trader from start to end and analyze it.
///
/// The report is `None` when the trader never traded.
pub fn run_simulation(
    data_port: &dyn DataPort,
    config: &SimulationConfig,
) -> Result<(TraderAccount, Option<PerformanceReport>), SimError> {
    let historical = load_historical(
        data_port,
        &config.symbols,
        config.start_date,
        config.end_date,
    )?;

    let mut session = MarketSession::new(
        Some(&historical),
        config.region,
        config.start_date,
        config.end_date,
    )?;
    let trader = TraderAccount::new(
        &config.trader_name,
        config.initial_fund,
        config.start_date,
        config.end_date,
        config.build_strategy(),
    )?
    .with_commission(config.commission_model());
    session.add_trader(trader);

    eprintln!(
        "Running simulation: {} symbols on {}, {} to {}",
        config.symbols.len(),
        config.region,
        config.start_date,
        config.end_date,
    );
    let applied = session.run_to_end()?;
    eprintln!("  Applied {} transactions", applied);

    let Some(trader) = session.into_traders().into_iter().next() else {
        return Err(SimError::Data {
            reason: "session finished without its trader".into(),
        });
    };
    trader.log_assets();

    if trader.transaction_history().is_empty() {
        tracing::warn!(trader = trader.name(), "no transactions, nothing to analyze");
        return Ok((trader, None));
    }
    let report = analyze(&trader)?;
    Ok((trader, Some(report)))
}

fn print_summary(trader: &TraderAccount, report: Option<&PerformanceReport>) {
    eprintln!("\n=== Results: {} ===", trader.name());
    eprintln!("Initial Fund:     {:.2}", trader.initial_fund());
    eprintln!("Final Value:      {:.2}", trader.total_value());
    eprintln!("Cash:             {:.2}", trader.cash());
    eprintln!("Transactions:     {}", trader.transaction_history().len());

    if !trader.position().is_empty() {
        eprintln!("\n=== Open Positions ===");
        for (symbol, held) in trader.position() {
            eprintln!("  {}: {} shares", symbol, held);
        }
    }

    let Some(report) = report else {
        return;
    };
    eprintln!("\n=== Performance ===");
    eprintln!("Final Assets:     {:.2}", report.final_assets);
    eprintln!("Sells:            {}", report.sells);
    eprintln!("Sell/Buy Ratio:   {:.4} (std {:.4})", report.sell_buy_ratio_mean, report.sell_buy_ratio_std);
    eprintln!("Monthly Return:   {:.2}% (std {:.2})", report.monthly_return_mean, report.monthly_return_std);
    eprintln!("Annual Return:    {:.2}% (std {:.2})", report.annual_return_mean, report.annual_return_std);
    eprintln!("Hold Days:        {:.2} (std {:.2})", report.hold_days_mean, report.hold_days_std);
    eprintln!(
        "Lowest Assets:    {:.2} on {}",
        report.lowest_assets, report.lowest_assets_date
    );
    eprintln!("\n=== Score ===");
    eprintln!("Alpha:            {:.2}", report.scores.alpha);
    eprintln!("Beta:             {:.2}", report.scores.beta);
    eprintln!("Profit Prob.:     {:.2}", report.scores.profit_probability);
    if !report.degenerate_inputs.is_empty() {
        eprintln!(
            "warning: scores are undefined, zero or missing: {}",
            report.degenerate_inputs.join(", ")
        );
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_simulation_config(&adapter) {
        return fail(e);
    }
    match build_simulation_config(&adapter) {
        Ok(config) => {
            eprintln!("Config validated successfully");
            eprintln!(
                "  {} symbols on {}, {} to {}",
                config.symbols.len(),
                config.region,
                config.start_date,
                config.end_date
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_list_symbols(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let Some(path) = adapter.get_string("data", "path") else {
        return fail(SimError::ConfigMissing {
            section: "data".into(),
            key: "path".into(),
        });
    };
    match CsvAdapter::new(PathBuf::from(path)).list_symbols() {
        Ok(symbols) => {
            for symbol in symbols {
                println!("{symbol}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_calendar(market: &str, date: &str, shift: Option<i64>) -> ExitCode {
    let region: Region = match market.parse() {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    let day = match NaiveDate::parse_from_str(date, DATE_FORMAT) {
        Ok(d) => d,
        Err(_) => {
            return fail(SimError::ConfigInvalid {
                section: "calendar".into(),
                key: "date".into(),
                reason: format!("invalid date '{date}', expected YYYY-MM-DD"),
            });
        }
    };

    let calendar = TradingCalendar::new(region);
    let status = if calendar.is_open_day(day) { "open" } else { "closed" };
    println!("{day} {region} {status}");

    if let Some(n) = shift {
        match calendar.shift_open_days(day, n) {
            Ok(shifted) => println!("{n:+} open days: {shifted}"),
            Err(e) => return fail(e),
        }
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[simulation]
start_date = 2020-01-01
end_date = 2020-02-01
market = NYSE
commission_per_trade = 5
trader_name = tester

[data]
path = /tmp/prices
symbols = msft, aapl

[strategy]
rsi_period = 6
lot_size = 3
"#;

    #[test]
    fn builds_config_with_defaults() {
        let adapter = FileConfigAdapter::from_string(CONFIG).unwrap();
        let config = build_simulation_config(&adapter).unwrap();
        assert_eq!(config.region, Region::Nyse);
        assert_eq!(config.initial_fund, 100_000.0);
        assert_eq!(config.trader_name, "tester");
        assert_eq!(config.symbols, vec!["MSFT", "AAPL"]);
        match config.strategy {
            StrategyConfig::RsiReversion(params) => {
                assert_eq!(params.period, 6);
                assert_eq!(params.lot_size, 3);
                assert_eq!(params.method, RsiMethod::Simple);
                assert_eq!(params.lower_bound, 20.0);
            }
            StrategyConfig::BuyAndHold => panic!("expected rsi_reversion"),
        }
    }

    #[test]
    fn buy_and_hold_kind() {
        let content = CONFIG.replace("rsi_period = 6", "kind = buy_and_hold");
        let adapter = FileConfigAdapter::from_string(&content).unwrap();
        let config = build_simulation_config(&adapter).unwrap();
        assert!(matches!(config.strategy, StrategyConfig::BuyAndHold));
    }

    #[test]
    fn pct_commission_selects_per_trade_plus_pct() {
        let adapter = FileConfigAdapter::from_string(CONFIG).unwrap();
        let mut config = build_simulation_config(&adapter).unwrap();
        config.commission_pct = 1.0;
        let ts = config.start_date.and_hms_opt(0, 0, 0).unwrap();
        let tx = crate::domain::transaction::Transaction::buy("MSFT", 10, 10.0, ts).unwrap();
        assert_eq!(config.commission_model().commission(&tx), 5.0 + 1.0);
    }

    #[test]
    fn cli_parses_calendar_shift() {
        let cli = Cli::try_parse_from([
            "stocksim",
            "calendar",
            "--market",
            "tsx",
            "--date",
            "2020-07-01",
            "--shift",
            "-2",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "info");
        assert!(matches!(
            cli.command,
            Command::Calendar { shift: Some(-2), .. }
        ));
    }

    // ExitCode has no PartialEq, compare the debug form.
    fn same_code(a: ExitCode, b: ExitCode) -> bool {
        format!("{a:?}") == format!("{b:?}")
    }

    #[test]
    fn calendar_command_rejects_bad_market() {
        assert!(same_code(
            run_calendar("lse", "2020-01-02", None),
            ExitCode::from(2)
        ));
    }

    #[test]
    fn calendar_command_succeeds() {
        assert!(same_code(
            run_calendar("nyse", "2020-01-02", Some(1)),
            ExitCode::SUCCESS
        ));
    }
}
