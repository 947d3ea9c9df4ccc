//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{Level, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{BacktestFailure, BacktestResult, Backtester};
use crate::domain::benchmark::{Comparison, compare_to_buy_and_hold};
use crate::domain::config_validation::{RunConfig, load_run_config};
use crate::domain::metrics::Metrics;
use crate::domain::selection::DataSelection;
use crate::domain::trades::TradeSummary;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::{ReportPort, RunReport};

#[derive(Parser, Debug)]
#[command(name = "tradesim", about = "Single-asset trading strategy backtester")]
pub struct Cli {
    /// Log every fill and suppressed order
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,
    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory for equity, trade and summary CSV files
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Skip the buy-and-hold comparison
        #[arg(long)]
        no_benchmark: bool,
    },
    /// Validate a run configuration without loading data
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show data range for symbol(s)
    Info {
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

impl Cli {
    /// Installs the global stderr subscriber. Call once, from the binary.
    /// `TRADESIM_LOG` (an `EnvFilter` directive) overrides the flags.
    pub fn init_logging(&self) {
        let level = if self.verbose {
            Level::DEBUG
        } else if self.quiet {
            Level::WARN
        } else {
            Level::INFO
        };
        let directive = std::env::var("TRADESIM_LOG").unwrap_or_else(|_| level.to_string());
        let filter = EnvFilter::try_new(&directive).unwrap_or_else(|e| {
            eprintln!("warning: invalid TRADESIM_LOG '{directive}' ({e}), using {level}");
            EnvFilter::new(level.to_string())
        });

        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .finish();

        if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("warning: logging already initialized ({e})");
        }
    }
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            output,
            no_benchmark,
        } => run_backtest(&config, output.as_deref(), !no_benchmark),
        Command::Validate { config } => run_validate(&config),
        Command::Info {
            symbol,
            data_dir,
            config,
        } => run_info(symbol.as_deref(), data_dir.as_deref(), config.as_deref()),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

/// Relative `data_dir` values are taken relative to the config file.
pub fn resolve_data_dir(config_path: &Path, data_dir: &Path) -> PathBuf {
    if data_dir.is_absolute() {
        return data_dir.to_path_buf();
    }
    match config_path.parent() {
        Some(parent) => parent.join(data_dir),
        None => data_dir.to_path_buf(),
    }
}

fn load_run(config_path: &Path) -> Result<RunConfig, ExitCode> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;
    let mut run = load_run_config(&adapter).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;
    run.data.data_dir = resolve_data_dir(config_path, &run.data.data_dir);
    Ok(run)
}

fn run_backtest(config_path: &Path, output: Option<&Path>, with_benchmark: bool) -> ExitCode {
    let run = match load_run(config_path) {
        Ok(r) => r,
        Err(code) => return code,
    };
    let data_port = CsvAdapter::new(run.data.data_dir.clone());
    run_backtest_pipeline(&data_port, &run, output, with_benchmark)
}

/// Fetch, simulate, score, print and optionally write the report.
///
/// A run that fails part way still prints and writes what it settled
/// before the failure; the exit code reflects the error.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    run: &RunConfig,
    output: Option<&Path>,
    with_benchmark: bool,
) -> ExitCode {
    let bars = match data_port.fetch_bars(&run.data.symbol, &run.data.selection) {
        Ok(bars) => bars,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let backtester = match Backtester::from_configs(&run.backtest, run.broker, &run.strategy) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let (result, failure) = match backtester.run(&bars) {
        Ok(result) => (result, None),
        Err(BacktestFailure {
            error,
            partial,
            bar_index,
        }) => {
            eprintln!("error: backtest aborted at bar {bar_index}: {error}");
            eprintln!("Partial results up to bar {bar_index} follow.");
            (*partial, Some(error))
        }
    };

    let rf = run.backtest.risk_free_rate;
    let (metrics, trades) = Metrics::compute(&result, rf);

    let comparison = if with_benchmark && failure.is_none() {
        match compare_to_buy_and_hold(&result, &bars, &run.benchmark, rf) {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("Benchmark skipped: {}", e);
                None
            }
        }
    } else {
        None
    };

    print_summary(&result, &metrics, &trades, comparison.as_ref());

    if let Some(dir) = output {
        let report = RunReport {
            result: &result,
            metrics: &metrics,
            trades: &trades,
            comparison: comparison.as_ref(),
        };
        match CsvReportAdapter::new().write(&report, dir) {
            Ok(files) => {
                for f in &files {
                    eprintln!("  wrote {}", f.display());
                }
            }
            Err(e) => {
                eprintln!("error: failed to write report: {e}");
                return (&e).into();
            }
        }
    }

    match failure {
        Some(e) => (&e).into(),
        None => ExitCode::SUCCESS,
    }
}

fn print_summary(
    result: &BacktestResult,
    metrics: &Metrics,
    trades: &TradeSummary,
    comparison: Option<&Comparison>,
) {
    println!("\n=== {} on {} ===", result.strategy, result.symbol);
    for (key, value) in &result.parameters {
        println!("  {key}: {value}");
    }
    if let (Some(first), Some(last)) = (result.equity_curve.first(), result.equity_curve.last()) {
        println!("Period:           {} to {}", first.date, last.date);
    }
    println!("Bars:             {}", result.bars_processed);
    println!("Initial Capital:  {:.2}", result.initial_capital());
    println!("Final Equity:     {:.2}", result.final_equity());
    println!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    println!("CAGR:             {:.2}%", metrics.cagr * 100.0);
    println!("Volatility:       {:.2}%", metrics.volatility * 100.0);
    println!("Sharpe Ratio:     {:.2}", metrics.sharpe);
    println!("Sortino Ratio:    {:.2}", metrics.sortino);
    println!("Omega Ratio:      {:.2}", metrics.omega);
    println!("Calmar Ratio:     {:.2}", metrics.calmar);
    println!("Max Drawdown:     {:.1}%", metrics.max_drawdown * 100.0);
    println!("Drawdown Bars:    {}", metrics.max_drawdown_duration);

    println!("\n=== Trading ===");
    println!("Fills:            {}", result.trade_log.len());
    println!("Round Trips:      {}", trades.total);
    println!("Win Rate:         {:.1}%", trades.win_rate * 100.0);
    println!("Profit Factor:    {:.2}", trades.profit_factor);
    println!("Commissions:      {:.2}", result.portfolio.commissions_paid);
    println!("Suppressed:       {}", result.suppressed_orders);
    println!("Rejected:         {}", result.rejected_orders);
    if !result.completed {
        println!("Status:           incomplete");
    }

    if let Some(c) = comparison {
        let b = &c.benchmark_metrics;
        println!("\n=== Buy & Hold ===");
        println!("Total Return:     {:.2}%", b.total_return * 100.0);
        println!("Sharpe Ratio:     {:.2}", b.sharpe);
        println!("Max Drawdown:     {:.1}%", b.max_drawdown * 100.0);
        println!("Excess Return:    {:+.2}%", c.excess_return() * 100.0);
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    let run = match load_run(config_path) {
        Ok(r) => r,
        Err(code) => return code,
    };

    let strategy = match run.strategy.build() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("\nStrategy: {} on {}", strategy.name(), strategy.symbol());
    for (key, value) in strategy.parameters() {
        eprintln!("  {key}: {value}");
    }
    eprintln!("  warmup: {} bars", strategy.warmup_period());

    eprintln!("\nData:");
    eprintln!("  dir: {}", run.data.data_dir.display());
    eprintln!("  selection: {}", describe_selection(&run.data.selection));

    let bt = &run.backtest;
    eprintln!("\nBacktest:");
    eprintln!("  initial_capital: {:.2}", bt.initial_capital);
    eprintln!("  allow_margin: {}", bt.allow_margin);
    eprintln!("  allow_shorting: {}", bt.allow_shorting);
    eprintln!("  rebalance_band: {}", bt.rebalance_band);
    eprintln!("  funds_policy: {}", bt.funds_policy.as_str());
    eprintln!(
        "  costs: {} per order, {} bps slippage",
        run.broker.commission_per_order, run.broker.slippage_bps
    );

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn describe_selection(selection: &DataSelection) -> String {
    match selection {
        DataSelection::Max => "max".to_string(),
        DataSelection::Range { start, end } => format!("{start} to {end}"),
        DataSelection::Lookback(lookback) => format!("last {lookback:?}"),
    }
}

fn run_info(symbol: Option<&str>, data_dir: Option<&Path>, config_path: Option<&Path>) -> ExitCode {
    let (dir, config_symbol) = match (data_dir, config_path) {
        (Some(dir), _) => (dir.to_path_buf(), None),
        (None, Some(path)) => {
            let config = match load_config(path) {
                Ok(c) => c,
                Err(code) => return code,
            };
            let dir = config
                .get_string("data", "data_dir")
                .map_or_else(|| PathBuf::from("data"), PathBuf::from);
            (resolve_data_dir(path, &dir), config.get_string("data", "symbol"))
        }
        (None, None) => {
            eprintln!("error: --data-dir or --config is required for info");
            return ExitCode::from(2);
        }
    };

    let adapter = CsvAdapter::new(dir);
    let symbols = match symbol.map(str::to_string).or(config_symbol) {
        Some(s) => vec![s],
        None => match adapter.list_symbols() {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        },
    };

    if symbols.is_empty() {
        eprintln!("No symbols found");
        return ExitCode::SUCCESS;
    }

    for s in &symbols {
        match adapter.get_data_range(s) {
            Ok(Some((first, last, count))) => {
                println!("{}: {} bars, {} to {}", s, count, first, last);
            }
            Ok(None) => eprintln!("{}: no data found", s),
            Err(e) => {
                eprintln!("error reading {}: {}", s, e);
                return (&e).into();
            }
        }
    }
    ExitCode::SUCCESS
}
