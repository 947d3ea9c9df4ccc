//! Buy-and-hold baseline for a finished run.
//!
//! Frictionless: equity = initial * close / close_0.
//! With costs: whole shares bought at close_0 worsened by slippage, after
//! one commission; leftover cash stays in the curve.

use super::backtest::BacktestResult;
use super::broker::{BrokerConfig, apply_slippage};
use super::error::SimError;
use super::metrics::Metrics;
use super::ohlcv::Bar;
use super::order::Side;
use super::portfolio::EquityPoint;

/// Strategy and baseline side by side.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub strategy_equity: Vec<EquityPoint>,
    pub benchmark_equity: Vec<EquityPoint>,
    pub strategy_metrics: Metrics,
    pub benchmark_metrics: Metrics,
}

impl Comparison {
    /// Strategy total return minus benchmark total return.
    pub fn excess_return(&self) -> f64 {
        self.strategy_metrics.total_return - self.benchmark_metrics.total_return
    }
}

pub fn buy_and_hold_equity(
    bars: &[Bar],
    initial_equity: f64,
    costs: &BrokerConfig,
) -> Result<Vec<EquityPoint>, SimError> {
    let Some(first) = bars.first() else {
        return Ok(Vec::new());
    };
    let base = first.checked_close()?;

    let curve = if costs.is_frictionless() {
        bars.iter()
            .map(|bar| EquityPoint {
                date: bar.date,
                equity: initial_equity * bar.close / base,
            })
            .collect()
    } else {
        let entry = apply_slippage(base, Side::Buy, costs.slippage_bps);
        let cash = (initial_equity - costs.commission_per_order).max(0.0);
        let shares = (cash / entry).floor();
        let leftover = cash - shares * entry;
        bars.iter()
            .map(|bar| EquityPoint {
                date: bar.date,
                equity: shares * bar.close + leftover,
            })
            .collect()
    };
    Ok(curve)
}

/// Builds the baseline over the same bars the run consumed and scores both.
/// The baseline starts from the run's first equity sample.
pub fn compare_to_buy_and_hold(
    result: &BacktestResult,
    bars: &[Bar],
    costs: &BrokerConfig,
    risk_free_rate: f64,
) -> Result<Comparison, SimError> {
    costs.validate()?;
    let Some(start) = result.equity_curve.first() else {
        return Err(SimError::NoData {
            symbol: result.symbol.clone(),
        });
    };
    if bars.is_empty() {
        return Err(SimError::NoData {
            symbol: result.symbol.clone(),
        });
    }
    let covered = &bars[..result.equity_curve.len().min(bars.len())];
    let benchmark_equity = buy_and_hold_equity(covered, start.equity, costs)?;

    Ok(Comparison {
        strategy_metrics: Metrics::from_equity(&result.equity_curve, risk_free_rate),
        benchmark_metrics: Metrics::from_equity(&benchmark_equity, risk_free_rate),
        strategy_equity: result.equity_curve.clone(),
        benchmark_equity,
    })
}
