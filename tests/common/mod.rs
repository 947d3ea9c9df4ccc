#![allow(dead_code)]

use chrono::NaiveDate;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tradesim::domain::backtest::{BacktestConfig, BacktestResult, Backtester};
use tradesim::domain::broker::{BrokerConfig, SimBroker};
use tradesim::domain::error::SimError;
pub use tradesim::domain::ohlcv::Bar;
use tradesim::domain::order::Target;
use tradesim::domain::selection::DataSelection;
use tradesim::domain::strategy::Strategy;
use tradesim::ports::data_port::DataPort;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(&self, symbol: &str, selection: &DataSelection) -> Result<Vec<Bar>, SimError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(SimError::DataSource {
                reason: reason.clone(),
            });
        }
        let bars = self.data.get(symbol).map(|b| selection.apply(b).to_vec());
        match bars {
            Some(bars) if !bars.is_empty() => Ok(bars),
            _ => Err(SimError::NoData {
                symbol: symbol.to_string(),
            }),
        }
    }

    fn list_symbols(&self) -> Result<Vec<String>, SimError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(&self, symbol: &str) -> Result<Option<(NaiveDate, NaiveDate, usize)>, SimError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(SimError::DataSource {
                reason: reason.clone(),
            });
        }
        match self.data.get(symbol) {
            Some(bars) if !bars.is_empty() => {
                let first = bars[0].date;
                let last = bars[bars.len() - 1].date;
                Ok(Some((first, last, bars.len())))
            }
            _ => Ok(None),
        }
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(symbol: &str, date: &str, open: f64, close: f64) -> Bar {
    Bar {
        symbol: symbol.to_string(),
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        open,
        high: open.max(close) + 1.0,
        low: open.min(close) - 1.0,
        close,
        volume: 1000.0,
    }
}

/// Daily bars from explicit (open, close) pairs starting 2024-01-01.
pub fn bars_from(symbol: &str, prices: &[(f64, f64)]) -> Vec<Bar> {
    let start = date(2024, 1, 1);
    prices
        .iter()
        .enumerate()
        .map(|(i, &(open, close))| Bar {
            symbol: symbol.to_string(),
            date: start + chrono::Days::new(i as u64),
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            volume: 1000.0,
        })
        .collect()
}

/// A deterministic zig-zag drifting upward: opens at the previous close.
pub fn generate_bars(symbol: &str, count: usize, start_price: f64) -> Vec<Bar> {
    let mut prices = Vec::with_capacity(count);
    let mut prev = start_price;
    for i in 0..count {
        let step = match i % 4 {
            0 => 1.5,
            1 => -0.8,
            2 => 0.6,
            _ => -1.0,
        };
        let close = (prev + step + i as f64 * 0.05).max(1.0);
        prices.push((prev, close));
        prev = close;
    }
    bars_from(symbol, &prices)
}

/// Replays a fixed list of targets, one per decision, then stays flat.
pub struct Scripted {
    pub symbol: String,
    pub targets: Vec<Target>,
    pub calls: usize,
}

impl Scripted {
    pub fn new(symbol: &str, targets: &[Target]) -> Self {
        Scripted {
            symbol: symbol.to_string(),
            targets: targets.to_vec(),
            calls: 0,
        }
    }
}

impl Strategy for Scripted {
    fn name(&self) -> &str {
        "Scripted"
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn on_bar(&mut self, _history: &[Bar]) -> Target {
        let target = self.targets.get(self.calls).copied().unwrap_or(Target::FLAT);
        self.calls += 1;
        target
    }
}

/// Records the history length and last date seen on every call.
pub struct Probe {
    pub symbol: String,
    pub seen: Rc<RefCell<Vec<(usize, NaiveDate)>>>,
}

impl Strategy for Probe {
    fn name(&self) -> &str {
        "Probe"
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn on_bar(&mut self, history: &[Bar]) -> Target {
        if let Some(last) = history.last() {
            self.seen.borrow_mut().push((history.len(), last.date));
        }
        Target::Weight(0.5)
    }
}

pub fn broker(commission: f64, slippage_bps: f64) -> SimBroker {
    SimBroker::new(BrokerConfig::new(commission, slippage_bps).unwrap()).unwrap()
}

pub fn frictionless_config(initial_capital: f64) -> BacktestConfig {
    BacktestConfig {
        initial_capital,
        rebalance_band: 0.0,
        ..BacktestConfig::default()
    }
}

pub fn run_with(
    config: BacktestConfig,
    broker: SimBroker,
    strategy: Box<dyn Strategy>,
    bars: &[Bar],
) -> BacktestResult {
    Backtester::new(config, broker, strategy)
        .unwrap()
        .run(bars)
        .unwrap()
}
