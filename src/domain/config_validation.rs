//! Configuration validation.
//!
//! Builds the typed, immutable run configuration from a [`ConfigPort`].
//! Every value is checked before any data is loaded. Unknown keys in a
//! recognized section are rejected so typos do not silently fall back to
//! defaults.

use std::path::PathBuf;

use chrono::NaiveDate;

use crate::domain::backtest::{BacktestConfig, FundsPolicy};
use crate::domain::broker::BrokerConfig;
use crate::domain::error::SimError;
use crate::domain::selection::DataSelection;
use crate::domain::strategies::{RsiReversionConfig, SmaTrendConfig, StrategyConfig};
use crate::ports::config_port::ConfigPort;

const BACKTEST_KEYS: &[&str] = &[
    "initial_capital",
    "allow_margin",
    "cash_buffer",
    "allow_shorting",
    "rebalance_band",
    "funds_policy",
    "risk_free_rate",
];
const COST_KEYS: &[&str] = &["commission_per_order", "slippage_bps"];
const DATA_KEYS: &[&str] = &["symbol", "data_dir", "start_date", "end_date", "period"];
const BUY_AND_HOLD_KEYS: &[&str] = &["kind", "quantity"];
const SMA_TREND_KEYS: &[&str] = &["kind", "vol_target", "signal_window", "vol_window", "max_weight"];
const RSI_REVERSION_KEYS: &[&str] = &[
    "kind",
    "vol_target",
    "signal_window",
    "vol_window",
    "max_weight",
    "oversold",
    "overbought",
];

/// Where bars come from and which of them a run uses.
#[derive(Debug, Clone, PartialEq)]
pub struct DataConfig {
    pub symbol: String,
    pub data_dir: PathBuf,
    pub selection: DataSelection,
}

/// Everything one run needs, validated.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub backtest: BacktestConfig,
    pub broker: BrokerConfig,
    pub benchmark: BrokerConfig,
    pub data: DataConfig,
    pub strategy: StrategyConfig,
}

pub fn load_run_config(config: &dyn ConfigPort) -> Result<RunConfig, SimError> {
    let backtest = load_backtest_config(config)?;
    let broker = load_cost_config(config, "broker", &BrokerConfig::default())?;
    let benchmark = load_cost_config(config, "benchmark", &broker)?;
    let data = load_data_config(config)?;
    let strategy = load_strategy_config(config, &data.symbol)?;
    Ok(RunConfig {
        backtest,
        broker,
        benchmark,
        data,
        strategy,
    })
}

pub fn load_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, SimError> {
    reject_unknown_keys(config, "backtest", BACKTEST_KEYS)?;
    let defaults = BacktestConfig::default();
    let funds_policy = match config.get_string("backtest", "funds_policy") {
        None => defaults.funds_policy,
        Some(v) => FundsPolicy::parse(&v).ok_or_else(|| {
            SimError::invalid(
                "backtest",
                "funds_policy",
                format!("unknown policy '{v}', expected reject, scale_down or abort"),
            )
        })?,
    };
    let backtest = BacktestConfig {
        initial_capital: read_f64(config, "backtest", "initial_capital", defaults.initial_capital)?,
        allow_margin: read_bool(config, "backtest", "allow_margin", defaults.allow_margin)?,
        cash_buffer: read_f64(config, "backtest", "cash_buffer", defaults.cash_buffer)?,
        allow_shorting: read_bool(config, "backtest", "allow_shorting", defaults.allow_shorting)?,
        rebalance_band: read_f64(config, "backtest", "rebalance_band", defaults.rebalance_band)?,
        funds_policy,
        risk_free_rate: read_f64(config, "backtest", "risk_free_rate", defaults.risk_free_rate)?,
    };
    backtest.validate()?;
    Ok(backtest)
}

/// Reads `[broker]` or `[benchmark]`, falling back to `defaults` per key.
pub fn load_cost_config(
    config: &dyn ConfigPort,
    section: &str,
    defaults: &BrokerConfig,
) -> Result<BrokerConfig, SimError> {
    reject_unknown_keys(config, section, COST_KEYS)?;
    let costs = BrokerConfig {
        commission_per_order: read_f64(
            config,
            section,
            "commission_per_order",
            defaults.commission_per_order,
        )?,
        slippage_bps: read_f64(config, section, "slippage_bps", defaults.slippage_bps)?,
    };
    costs.validate().map_err(|err| match err {
        SimError::ConfigInvalid { key, reason, .. } => SimError::ConfigInvalid {
            section: section.to_string(),
            key,
            reason,
        },
        other => other,
    })?;
    Ok(costs)
}

pub fn load_data_config(config: &dyn ConfigPort) -> Result<DataConfig, SimError> {
    reject_unknown_keys(config, "data", DATA_KEYS)?;
    let symbol = require(config, "data", "symbol")?;
    let data_dir = config
        .get_string("data", "data_dir")
        .map_or_else(|| PathBuf::from("data"), PathBuf::from);

    let start = config.get_string("data", "start_date");
    let end = config.get_string("data", "end_date");
    let period = config.get_string("data", "period");
    let selection = match (start, end, period) {
        (Some(_), _, Some(_)) | (_, Some(_), Some(_)) => {
            return Err(SimError::invalid(
                "data",
                "period",
                "period cannot be combined with start_date/end_date",
            ));
        }
        (Some(s), Some(e), None) => {
            DataSelection::range(parse_date(&s, "start_date")?, parse_date(&e, "end_date")?)?
        }
        (Some(_), None, None) => return Err(missing("data", "end_date")),
        (None, Some(_), None) => return Err(missing("data", "start_date")),
        (None, None, Some(p)) => DataSelection::parse_period(&p)?,
        (None, None, None) => DataSelection::Max,
    };

    Ok(DataConfig {
        symbol,
        data_dir,
        selection,
    })
}

pub fn load_strategy_config(config: &dyn ConfigPort, symbol: &str) -> Result<StrategyConfig, SimError> {
    let kind = require(config, "strategy", "kind")?;
    let strategy = match kind.to_ascii_lowercase().as_str() {
        "buy_and_hold" => {
            reject_unknown_keys(config, "strategy", BUY_AND_HOLD_KEYS)?;
            let quantity = match config.get_string("strategy", "quantity") {
                None => None,
                Some(_) => Some(read_f64(config, "strategy", "quantity", 0.0)?),
            };
            StrategyConfig::BuyAndHold {
                symbol: symbol.to_string(),
                quantity,
            }
        }
        "sma_trend" => {
            reject_unknown_keys(config, "strategy", SMA_TREND_KEYS)?;
            let d = SmaTrendConfig::new(symbol);
            StrategyConfig::SmaTrend(SmaTrendConfig {
                vol_target: read_f64(config, "strategy", "vol_target", d.vol_target)?,
                sma_window: read_usize(config, "strategy", "signal_window", d.sma_window)?,
                vol_window: read_usize(config, "strategy", "vol_window", d.vol_window)?,
                max_weight: read_f64(config, "strategy", "max_weight", d.max_weight)?,
                ..d
            })
        }
        "rsi_reversion" => {
            reject_unknown_keys(config, "strategy", RSI_REVERSION_KEYS)?;
            let d = RsiReversionConfig::new(symbol);
            StrategyConfig::RsiReversion(RsiReversionConfig {
                vol_target: read_f64(config, "strategy", "vol_target", d.vol_target)?,
                rsi_window: read_usize(config, "strategy", "signal_window", d.rsi_window)?,
                vol_window: read_usize(config, "strategy", "vol_window", d.vol_window)?,
                max_weight: read_f64(config, "strategy", "max_weight", d.max_weight)?,
                oversold: read_f64(config, "strategy", "oversold", d.oversold)?,
                overbought: read_f64(config, "strategy", "overbought", d.overbought)?,
                ..d
            })
        }
        other => {
            return Err(SimError::invalid(
                "strategy",
                "kind",
                format!("unknown strategy '{other}', expected buy_and_hold, sma_trend or rsi_reversion"),
            ));
        }
    };
    strategy.validate()?;
    Ok(strategy)
}

fn reject_unknown_keys(config: &dyn ConfigPort, section: &str, allowed: &[&str]) -> Result<(), SimError> {
    match config.keys(section).into_iter().find(|k| !allowed.contains(&k.as_str())) {
        Some(key) => Err(SimError::invalid(section, &key, "unknown key")),
        None => Ok(()),
    }
}

fn missing(section: &str, key: &str) -> SimError {
    SimError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

fn require(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, SimError> {
    config.get_string(section, key).ok_or_else(|| missing(section, key))
}

fn read_f64(config: &dyn ConfigPort, section: &str, key: &str, default: f64) -> Result<f64, SimError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(v) => v
            .parse::<f64>()
            .ok()
            .filter(|x| x.is_finite())
            .ok_or_else(|| SimError::invalid(section, key, format!("'{v}' is not a number"))),
    }
}

fn read_usize(config: &dyn ConfigPort, section: &str, key: &str, default: usize) -> Result<usize, SimError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(v) => v
            .parse::<usize>()
            .map_err(|_| SimError::invalid(section, key, format!("'{v}' is not a whole number"))),
    }
}

fn read_bool(config: &dyn ConfigPort, section: &str, key: &str, default: bool) -> Result<bool, SimError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(v) => match v.to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" => Ok(false),
            _ => Err(SimError::invalid(section, key, format!("'{v}' is not a boolean"))),
        },
    }
}

fn parse_date(value: &str, key: &str) -> Result<NaiveDate, SimError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        SimError::invalid("data", key, format!("invalid {key} format, expected YYYY-MM-DD"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;
    use crate::domain::selection::Lookback;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn assert_invalid(result: Result<RunConfig, SimError>, expected_key: &str) {
        match result {
            Err(SimError::ConfigInvalid { key, .. }) => assert_eq!(key, expected_key),
            other => panic!("expected ConfigInvalid for {expected_key}, got {other:?}"),
        }
    }

    const MINIMAL: &str = "[data]\nsymbol = SPY\n[strategy]\nkind = buy_and_hold\n";

    #[test]
    fn minimal_config_uses_defaults() {
        let run = load_run_config(&make_config(MINIMAL)).unwrap();
        assert_eq!(run.backtest, BacktestConfig::default());
        assert_eq!(run.broker, BrokerConfig::default());
        assert_eq!(run.benchmark, BrokerConfig::default());
        assert_eq!(run.data.symbol, "SPY");
        assert_eq!(run.data.data_dir, PathBuf::from("data"));
        assert_eq!(run.data.selection, DataSelection::Max);
        assert_eq!(
            run.strategy,
            StrategyConfig::BuyAndHold {
                symbol: "SPY".into(),
                quantity: None
            }
        );
    }

    #[test]
    fn full_config_parses() {
        let content = r#"
[backtest]
initial_capital = 50000
allow_shorting = yes
rebalance_band = 0.05
funds_policy = scale_down
risk_free_rate = 0.02

[broker]
commission_per_order = 1.5
slippage_bps = 2

[data]
symbol = QQQ
data_dir = /tmp/bars
period = 10y

[strategy]
kind = rsi_reversion
signal_window = 10
oversold = 25
"#;
        let run = load_run_config(&make_config(content)).unwrap();
        assert!((run.backtest.initial_capital - 50_000.0).abs() < f64::EPSILON);
        assert!(run.backtest.allow_shorting);
        assert_eq!(run.backtest.funds_policy, FundsPolicy::ScaleDown);
        assert!((run.broker.commission_per_order - 1.5).abs() < f64::EPSILON);
        assert_eq!(run.benchmark, run.broker);
        assert_eq!(run.data.selection, DataSelection::Lookback(Lookback::Years(10)));
        match run.strategy {
            StrategyConfig::RsiReversion(c) => {
                assert_eq!(c.symbol, "QQQ");
                assert_eq!(c.rsi_window, 10);
                assert!((c.oversold - 25.0).abs() < f64::EPSILON);
                assert!((c.overbought - 70.0).abs() < f64::EPSILON);
            }
            other => panic!("unexpected strategy {other:?}"),
        }
    }

    #[test]
    fn benchmark_costs_override_broker() {
        let content = format!("{MINIMAL}[broker]\ncommission_per_order = 1\n[benchmark]\ncommission_per_order = 0\n");
        let run = load_run_config(&make_config(&content)).unwrap();
        assert!((run.broker.commission_per_order - 1.0).abs() < f64::EPSILON);
        assert!(run.benchmark.commission_per_order.abs() < f64::EPSILON);
    }

    #[test]
    fn date_range_parses() {
        let content = "[data]\nsymbol = SPY\nstart_date = 2020-01-01\nend_date = 2020-12-31\n[strategy]\nkind = buy_and_hold\n";
        let run = load_run_config(&make_config(content)).unwrap();
        assert!(matches!(run.data.selection, DataSelection::Range { .. }));
    }

    #[test]
    fn missing_symbol_fails() {
        let err = load_run_config(&make_config("[strategy]\nkind = buy_and_hold\n")).unwrap_err();
        assert!(matches!(err, SimError::ConfigMissing { ref key, .. } if key == "symbol"));
    }

    #[test]
    fn missing_kind_fails() {
        let err = load_run_config(&make_config("[data]\nsymbol = SPY\n")).unwrap_err();
        assert!(matches!(err, SimError::ConfigMissing { ref key, .. } if key == "kind"));
    }

    #[test]
    fn negative_slippage_fails() {
        let content = format!("{MINIMAL}[broker]\nslippage_bps = -1\n");
        assert_invalid(load_run_config(&make_config(&content)), "slippage_bps");
    }

    #[test]
    fn benchmark_errors_name_their_section() {
        let content = format!("{MINIMAL}[benchmark]\ncommission_per_order = -1\n");
        match load_run_config(&make_config(&content)) {
            Err(SimError::ConfigInvalid { section, .. }) => assert_eq!(section, "benchmark"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_numeric_value_fails() {
        let content = format!("{MINIMAL}[backtest]\ninitial_capital = lots\n");
        assert_invalid(load_run_config(&make_config(&content)), "initial_capital");
    }

    #[test]
    fn bad_bool_fails() {
        let content = format!("{MINIMAL}[backtest]\nallow_margin = maybe\n");
        assert_invalid(load_run_config(&make_config(&content)), "allow_margin");
    }

    #[test]
    fn unknown_key_fails() {
        let content = format!("{MINIMAL}[broker]\ncommision_per_order = 1\n");
        assert_invalid(load_run_config(&make_config(&content)), "commision_per_order");
    }

    #[test]
    fn strategy_keys_depend_on_kind() {
        let content = "[data]\nsymbol = SPY\n[strategy]\nkind = sma_trend\noversold = 20\n";
        assert_invalid(load_run_config(&make_config(content)), "oversold");
    }

    #[test]
    fn unknown_strategy_fails() {
        let content = "[data]\nsymbol = SPY\n[strategy]\nkind = martingale\n";
        assert_invalid(load_run_config(&make_config(content)), "kind");
    }

    #[test]
    fn period_and_range_are_exclusive() {
        let content = "[data]\nsymbol = SPY\nperiod = 1y\nstart_date = 2020-01-01\n[strategy]\nkind = buy_and_hold\n";
        assert_invalid(load_run_config(&make_config(content)), "period");
    }

    #[test]
    fn half_open_range_fails() {
        let content = "[data]\nsymbol = SPY\nstart_date = 2020-01-01\n[strategy]\nkind = buy_and_hold\n";
        let err = load_run_config(&make_config(content)).unwrap_err();
        assert!(matches!(err, SimError::ConfigMissing { ref key, .. } if key == "end_date"));
    }

    #[test]
    fn invalid_date_format_fails() {
        let content = "[data]\nsymbol = SPY\nstart_date = 01/01/2020\nend_date = 2020-12-31\n[strategy]\nkind = buy_and_hold\n";
        assert_invalid(load_run_config(&make_config(content)), "start_date");
    }

    #[test]
    fn band_out_of_range_fails() {
        let content = format!("{MINIMAL}[backtest]\nrebalance_band = 1.0\n");
        assert_invalid(load_run_config(&make_config(&content)), "rebalance_band");
    }

    #[test]
    fn window_too_short_fails() {
        let content = "[data]\nsymbol = SPY\n[strategy]\nkind = sma_trend\nvol_window = 1\n";
        assert_invalid(load_run_config(&make_config(content)), "vol_window");
    }

    #[test]
    fn buy_and_hold_quantity() {
        let content = "[data]\nsymbol = SPY\n[strategy]\nkind = buy_and_hold\nquantity = 10\n";
        let run = load_run_config(&make_config(content)).unwrap();
        assert_eq!(
            run.strategy,
            StrategyConfig::BuyAndHold {
                symbol: "SPY".into(),
                quantity: Some(10.0)
            }
        );
    }
}
