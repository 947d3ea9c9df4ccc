//! Backtest engine and event loop.
//!
//! Each step decides on bar t and settles on bar t+1:
//! 1. the strategy sees `bars[..=t]` and returns a target
//! 2. the target passes the rebalance band or is dropped
//! 3. a surviving target is sized and filled at bar t+1's open
//! 4. the portfolio is marked at bar t+1's close
//!
//! Bar 0 is marked before the first step, so the equity curve has one
//! sample per bar. The strategy is never asked about the final bar.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::broker::{BrokerConfig, SimBroker};
use super::error::SimError;
use super::ohlcv::{Bar, validate_sequence};
use super::order::{Fill, Order, Target};
use super::portfolio::{EquityPoint, MarginPolicy, Portfolio, log_returns};
use super::strategies::StrategyConfig;
use super::strategy::Strategy;
use super::trades::{ClosedTrade, round_trips};

/// What to do when a fill would break the no-margin rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FundsPolicy {
    /// Skip the order and keep going.
    #[default]
    Reject,
    /// Shrink the order to what cash covers.
    ScaleDown,
    /// Stop the run.
    Abort,
}

impl FundsPolicy {
    pub fn parse(value: &str) -> Option<FundsPolicy> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reject" => Some(FundsPolicy::Reject),
            "scale_down" => Some(FundsPolicy::ScaleDown),
            "abort" => Some(FundsPolicy::Abort),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FundsPolicy::Reject => "reject",
            FundsPolicy::ScaleDown => "scale_down",
            FundsPolicy::Abort => "abort",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub allow_margin: bool,
    pub cash_buffer: f64,
    pub allow_shorting: bool,
    pub rebalance_band: f64,
    pub funds_policy: FundsPolicy,
    pub risk_free_rate: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: 100_000.0,
            allow_margin: false,
            cash_buffer: 0.0,
            allow_shorting: false,
            rebalance_band: 0.02,
            funds_policy: FundsPolicy::Reject,
            risk_free_rate: 0.0,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(SimError::invalid(
                "backtest",
                "initial_capital",
                "initial_capital must be positive",
            ));
        }
        if !self.cash_buffer.is_finite() || self.cash_buffer < 0.0 {
            return Err(SimError::invalid(
                "backtest",
                "cash_buffer",
                "cash_buffer must be non-negative",
            ));
        }
        if !(0.0..1.0).contains(&self.rebalance_band) {
            return Err(SimError::invalid(
                "backtest",
                "rebalance_band",
                "rebalance_band must be in [0, 1)",
            ));
        }
        if !(0.0..1.0).contains(&self.risk_free_rate) {
            return Err(SimError::invalid(
                "backtest",
                "risk_free_rate",
                "risk_free_rate must be in [0, 1)",
            ));
        }
        Ok(())
    }

    pub fn margin(&self) -> MarginPolicy {
        MarginPolicy {
            allow_margin: self.allow_margin,
            cash_buffer: self.cash_buffer,
        }
    }
}

/// Lifecycle of a run. States only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Initialized,
    Running,
    AwaitSignal,
    AwaitFill,
    Settled,
    Complete,
    Failed,
}

impl RunState {
    pub fn can_advance_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Initialized, Running)
                | (Running, AwaitSignal)
                | (Running, Complete)
                | (AwaitSignal, AwaitFill)
                | (AwaitFill, Settled)
                | (Settled, AwaitSignal)
                | (Settled, Complete)
                | (Initialized | Running | AwaitSignal | AwaitFill | Settled, Failed)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub strategy: String,
    pub symbol: String,
    pub parameters: Vec<(String, String)>,
    pub equity_curve: Vec<EquityPoint>,
    pub trade_log: Vec<Fill>,
    /// Portfolio as it stood after the last processed bar.
    pub portfolio: Portfolio,
    pub bars_processed: usize,
    pub rejected_orders: usize,
    pub suppressed_orders: usize,
    /// False when the run was cancelled or failed before the last bar.
    pub completed: bool,
}

impl BacktestResult {
    /// Per-sample log returns aligned with `equity_curve` (leading 0), as
    /// written to `equity.csv`. Metrics use
    /// [`equity_log_returns`](crate::domain::metrics::equity_log_returns),
    /// which has no leading entry and drops steps from non-positive equity.
    pub fn returns(&self) -> Vec<f64> {
        log_returns(&self.equity_curve)
    }

    pub fn initial_capital(&self) -> f64 {
        self.portfolio.initial_capital
    }

    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map_or(self.portfolio.initial_capital, |p| p.equity)
    }

    pub fn total_return(&self) -> f64 {
        self.final_equity() / self.initial_capital() - 1.0
    }

    pub fn closed_trades(&self) -> Vec<ClosedTrade> {
        round_trips(&self.trade_log)
    }
}

/// A run stopped by an error, with everything settled before it.
#[derive(Debug, Error)]
#[error("backtest aborted at bar {bar_index}: {error}")]
pub struct BacktestFailure {
    #[source]
    pub error: SimError,
    pub partial: Box<BacktestResult>,
    pub bar_index: usize,
}

/// A decided target waiting for the next open.
#[derive(Debug, Clone, Copy)]
struct Rebalance {
    target: Target,
    decided_on: chrono::NaiveDate,
}

pub struct Backtester {
    config: BacktestConfig,
    broker: SimBroker,
    strategy: Box<dyn Strategy>,
    portfolio: Portfolio,
    state: RunState,
    trade_log: Vec<Fill>,
    /// Last target that was carried out; starts flat.
    active: Target,
    pending: Option<Rebalance>,
    bars_processed: usize,
    rejected: usize,
    suppressed: usize,
    warned_short: bool,
}

impl Backtester {
    pub fn new(
        config: BacktestConfig,
        broker: SimBroker,
        strategy: Box<dyn Strategy>,
    ) -> Result<Self, SimError> {
        config.validate()?;
        let portfolio = Portfolio::with_margin(config.initial_capital, config.margin());
        Ok(Backtester {
            config,
            broker,
            strategy,
            portfolio,
            state: RunState::Initialized,
            trade_log: Vec::new(),
            active: Target::FLAT,
            pending: None,
            bars_processed: 0,
            rejected: 0,
            suppressed: 0,
            warned_short: false,
        })
    }

    /// Validates and wires all three configs.
    pub fn from_configs(
        config: &BacktestConfig,
        broker: BrokerConfig,
        strategy: &StrategyConfig,
    ) -> Result<Self, SimError> {
        Backtester::new(config.clone(), SimBroker::new(broker)?, strategy.build()?)
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn run(self, bars: &[Bar]) -> Result<BacktestResult, BacktestFailure> {
        self.run_inner(bars, None)
    }

    /// Like [`Backtester::run`], but stops between bars once `cancel` is
    /// set. A cancelled run returns `Ok` with `completed == false`.
    pub fn run_cancellable(
        self,
        bars: &[Bar],
        cancel: &AtomicBool,
    ) -> Result<BacktestResult, BacktestFailure> {
        self.run_inner(bars, Some(cancel))
    }

    fn run_inner(
        mut self,
        bars: &[Bar],
        cancel: Option<&AtomicBool>,
    ) -> Result<BacktestResult, BacktestFailure> {
        info!(
            "Running backtest: {} on {} ({} bars)",
            self.strategy.name(),
            self.strategy.symbol(),
            bars.len()
        );
        match self.drive(bars, cancel) {
            Ok(()) => {
                let result = self.into_result();
                info!(
                    "Backtest {}: {} bars, {} fills, final equity {:.2}",
                    if result.completed { "complete" } else { "cancelled" },
                    result.bars_processed,
                    result.trade_log.len(),
                    result.final_equity()
                );
                Ok(result)
            }
            Err((error, bar_index)) => {
                self.enter(RunState::Failed);
                warn!("Backtest aborted at bar {}: {}", bar_index, error);
                Err(BacktestFailure {
                    error,
                    partial: Box::new(self.into_result()),
                    bar_index,
                })
            }
        }
    }

    fn enter(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }

    /// Processes the whole sequence. On error, returns the failing bar index.
    fn drive(&mut self, bars: &[Bar], cancel: Option<&AtomicBool>) -> Result<(), (SimError, usize)> {
        self.enter(RunState::Running);
        let symbol = self.strategy.symbol().to_string();
        if bars.is_empty() {
            return Err((SimError::NoData { symbol }, 0));
        }
        validate_sequence(&symbol, bars).map_err(|e| (e, 0))?;

        self.mark(&bars[0]).map_err(|e| (e, 0))?;

        for t in 0..bars.len() - 1 {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                info!("Backtest cancelled after {} bars", self.bars_processed);
                return Ok(());
            }
            self.step(bars, t).map_err(|e| (e, t + 1))?;
        }
        self.enter(RunState::Complete);
        Ok(())
    }

    /// Decides on bar t, fills at bar t+1's open, marks at bar t+1's close.
    fn step(&mut self, bars: &[Bar], t: usize) -> Result<(), SimError> {
        let bar = &bars[t];
        let next = &bars[t + 1];

        self.enter(RunState::AwaitSignal);
        let target = self.strategy.on_bar(&bars[..=t]);
        self.pending = self.screen(target, bar);

        self.enter(RunState::AwaitFill);
        next.checked_close()?;
        if let Some(rebalance) = self.pending.take() {
            self.execute(rebalance, next)?;
        }

        self.enter(RunState::Settled);
        self.mark(next)?;
        Ok(())
    }

    fn mark(&mut self, bar: &Bar) -> Result<f64, SimError> {
        let close = bar.checked_close()?;
        let closes = HashMap::from([(bar.symbol.clone(), close)]);
        let equity = self.portfolio.mark_to_market(bar.date, &closes);
        self.bars_processed += 1;
        Ok(equity)
    }

    /// Applies the shorting rule and the rebalance band to a fresh target.
    fn screen(&mut self, target: Target, bar: &Bar) -> Option<Rebalance> {
        let target = if target.is_short() && !self.config.allow_shorting {
            if !self.warned_short {
                warn!(
                    "{} asked for a short position; shorting is disabled, holding flat instead",
                    self.strategy.name()
                );
                self.warned_short = true;
            }
            target.long_only()
        } else {
            target
        };

        if target == self.active {
            return None;
        }
        let equity = self.portfolio.total_equity();
        let distance = band_distance(target, self.active, bar.close, equity);
        if distance < self.config.rebalance_band {
            self.suppressed += 1;
            debug!(
                "Rebalance suppressed on {}: target moved {:.4}, band {:.4}",
                bar.date, distance, self.config.rebalance_band
            );
            return None;
        }
        Some(Rebalance {
            target,
            decided_on: bar.date,
        })
    }

    fn execute(&mut self, rebalance: Rebalance, bar: &Bar) -> Result<(), SimError> {
        let symbol = self.strategy.symbol().to_string();
        let open = bar.checked_open()?;
        let current = self.portfolio.quantity(&symbol);

        let wanted = match rebalance.target {
            Target::Quantity(q) => q,
            Target::Weight(w) => {
                let equity = self
                    .portfolio
                    .equity_at(&HashMap::from([(symbol.clone(), open)]));
                if equity > 0.0 { (w * equity / open).trunc() } else { 0.0 }
            }
        };
        let mut delta = wanted - current;
        if delta > 0.0 && !self.config.allow_margin && matches!(rebalance.target, Target::Weight(_)) {
            delta = delta.min(self.affordable(bar)?);
        }
        if delta == 0.0 {
            if wanted == current {
                self.active = rebalance.target;
            }
            return Ok(());
        }

        let mut order = Order {
            symbol: symbol.clone(),
            delta_quantity: delta,
            decided_on: rebalance.decided_on,
        };
        let Some(mut fill) = self.broker.execute(&order, bar)? else {
            return Ok(());
        };

        if let Err(err) = self.portfolio.apply(&fill) {
            match self.config.funds_policy {
                FundsPolicy::Abort => return Err(err),
                FundsPolicy::Reject => {
                    self.rejected += 1;
                    warn!("Order rejected on {}: {}", bar.date, err);
                    return Ok(());
                }
                FundsPolicy::ScaleDown => {
                    delta = if delta > 0.0 {
                        delta.min(self.affordable(bar)?)
                    } else {
                        0.0
                    };
                    if delta == 0.0 {
                        self.rejected += 1;
                        warn!("Order rejected on {}: {}", bar.date, err);
                        return Ok(());
                    }
                    debug!("Order scaled down on {} to {}", bar.date, delta);
                    order.delta_quantity = delta;
                    let Some(scaled) = self.broker.execute(&order, bar)? else {
                        return Ok(());
                    };
                    if let Err(err) = self.portfolio.apply(&scaled) {
                        self.rejected += 1;
                        warn!("Order rejected on {}: {}", bar.date, err);
                        return Ok(());
                    }
                    fill = scaled;
                }
            }
        }

        debug!(
            "Filled {:?} {} {} @ {:.4} (commission {:.2}) on {}",
            fill.side, fill.quantity, fill.symbol, fill.price, fill.commission, fill.date
        );
        self.active = rebalance.target;
        self.strategy.on_fill(&fill);
        self.trade_log.push(fill);
        Ok(())
    }

    /// Whole units cash can pay for at `bar`'s open, commission included.
    fn affordable(&self, bar: &Bar) -> Result<f64, SimError> {
        let budget = self.portfolio.cash - self.portfolio.margin.cash_floor();
        self.broker.max_affordable(budget, bar)
    }

    fn into_result(self) -> BacktestResult {
        BacktestResult {
            strategy: self.strategy.name().to_string(),
            symbol: self.strategy.symbol().to_string(),
            parameters: self.strategy.parameters(),
            equity_curve: self.portfolio.equity_curve.clone(),
            trade_log: self.trade_log,
            completed: self.state == RunState::Complete,
            portfolio: self.portfolio,
            bars_processed: self.bars_processed,
            rejected_orders: self.rejected,
            suppressed_orders: self.suppressed,
        }
    }
}

/// Distance between two targets in weight space at `price`.
fn band_distance(a: Target, b: Target, price: f64, equity: f64) -> f64 {
    if equity <= 0.0 || !price.is_finite() {
        return if a == b { 0.0 } else { f64::INFINITY };
    }
    (a.as_weight(price, equity) - b.as_weight(price, equity)).abs()
}
