//! Portfolio state and equity tracking.
//!
//! Cash and positions change only through [`Portfolio::apply`]; the equity
//! curve grows only through [`Portfolio::mark_to_market`]. Positions are
//! kept in a `BTreeMap` so equity sums run in a fixed order and repeated
//! runs produce identical floating point results.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use super::error::SimError;
use super::order::Fill;
use super::position::Position;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

/// How far cash may go below zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarginPolicy {
    pub allow_margin: bool,
    /// Tolerated overdraft when margin is disallowed.
    pub cash_buffer: f64,
}

impl Default for MarginPolicy {
    fn default() -> Self {
        MarginPolicy {
            allow_margin: false,
            cash_buffer: 0.0,
        }
    }
}

impl MarginPolicy {
    /// Lowest cash balance a fill may leave behind.
    pub fn cash_floor(&self) -> f64 {
        if self.allow_margin {
            f64::NEG_INFINITY
        } else {
            -self.cash_buffer
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    pub positions: BTreeMap<String, Position>,
    pub equity_curve: Vec<EquityPoint>,
    pub realized_pnl: f64,
    pub commissions_paid: f64,
    pub margin: MarginPolicy,
    marks: BTreeMap<String, f64>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Self::with_margin(initial_capital, MarginPolicy::default())
    }

    pub fn with_margin(initial_capital: f64, margin: MarginPolicy) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            positions: BTreeMap::new(),
            equity_curve: Vec::new(),
            realized_pnl: 0.0,
            commissions_paid: 0.0,
            margin,
            marks: BTreeMap::new(),
        }
    }

    pub fn get_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// Signed quantity held in `symbol`, zero when flat.
    pub fn quantity(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).map_or(0.0, |p| p.quantity)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn last_mark(&self, symbol: &str) -> Option<f64> {
        self.marks.get(symbol).copied()
    }

    /// Applies an executed trade.
    ///
    /// Cash moves by `-quantity * price - commission`. If margin is
    /// disallowed and the result would fall below the cash floor, the fill
    /// is refused with [`SimError::InsufficientFunds`] and nothing changes.
    pub fn apply(&mut self, fill: &Fill) -> Result<(), SimError> {
        let new_cash = self.cash + fill.cash_delta();
        if new_cash < self.margin.cash_floor() {
            return Err(SimError::InsufficientFunds {
                symbol: fill.symbol.clone(),
                required: -fill.cash_delta(),
                available: self.cash - self.margin.cash_floor(),
            });
        }

        let current = self
            .positions
            .get(&fill.symbol)
            .cloned()
            .unwrap_or_else(|| Position::flat(&fill.symbol));
        let (next, realized) = current.after_trade(fill.quantity, fill.price);

        self.cash = new_cash;
        self.realized_pnl += realized;
        self.commissions_paid += fill.commission;
        if next.is_flat() {
            self.positions.remove(&fill.symbol);
        } else {
            self.positions.insert(fill.symbol.clone(), next);
        }
        self.marks.entry(fill.symbol.clone()).or_insert(fill.price);
        Ok(())
    }

    /// Cash plus every held position at its last mark.
    pub fn total_equity(&self) -> f64 {
        let position_value: f64 = self
            .positions
            .values()
            .map(|pos| {
                let price = self.marks.get(&pos.symbol).copied().unwrap_or(pos.avg_entry_price);
                pos.market_value(price)
            })
            .sum();
        self.cash + position_value
    }

    /// Equity if the held positions were marked at `price_map` instead.
    /// Symbols missing from the map fall back to their last mark.
    pub fn equity_at(&self, price_map: &HashMap<String, f64>) -> f64 {
        let position_value: f64 = self
            .positions
            .values()
            .map(|pos| {
                let price = price_map
                    .get(&pos.symbol)
                    .or_else(|| self.marks.get(&pos.symbol))
                    .copied()
                    .unwrap_or(pos.avg_entry_price);
                pos.market_value(price)
            })
            .sum();
        self.cash + position_value
    }

    /// Records new closes and appends one equity sample. Call once per bar,
    /// after that bar's fills.
    pub fn mark_to_market(&mut self, date: NaiveDate, closes: &HashMap<String, f64>) -> f64 {
        for (symbol, &price) in closes {
            self.marks.insert(symbol.clone(), price);
        }
        let equity = self.total_equity();
        self.equity_curve.push(EquityPoint { date, equity });
        equity
    }

    /// Fraction of equity held in `symbol`, using its last mark.
    pub fn weight(&self, symbol: &str) -> f64 {
        let equity = self.total_equity();
        if equity <= 0.0 {
            return 0.0;
        }
        let value = match (self.positions.get(symbol), self.marks.get(symbol)) {
            (Some(pos), Some(&price)) => pos.market_value(price),
            _ => 0.0,
        };
        value / equity
    }

    /// Log returns of the equity curve, one per sample. The first sample,
    /// and any step from non-positive equity, yields 0. This is the report
    /// series; metrics drop those entries instead.
    pub fn log_returns(&self) -> Vec<f64> {
        log_returns(&self.equity_curve)
    }
}

pub fn log_returns(curve: &[EquityPoint]) -> Vec<f64> {
    let mut returns = Vec::with_capacity(curve.len());
    let mut prev: Option<f64> = None;
    for point in curve {
        let r = match prev {
            Some(p) if p > 0.0 && point.equity > 0.0 => (point.equity / p).ln(),
            _ => 0.0,
        };
        returns.push(r);
        prev = Some(point.equity);
    }
    returns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::Side;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn fill(quantity: f64, price: f64, commission: f64) -> Fill {
        Fill {
            symbol: "SPY".into(),
            side: Side::of(quantity).unwrap(),
            quantity,
            price,
            commission,
            date: day(3),
            decided_on: day(2),
        }
    }

    fn closes(price: f64) -> HashMap<String, f64> {
        HashMap::from([("SPY".to_string(), price)])
    }

    #[test]
    fn new_portfolio() {
        let portfolio = Portfolio::new(100_000.0);
        assert!((portfolio.cash - 100_000.0).abs() < f64::EPSILON);
        assert!(portfolio.positions.is_empty());
        assert!(portfolio.equity_curve.is_empty());
        assert!((portfolio.total_equity() - 100_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn apply_buy_moves_cash_and_position() {
        let mut portfolio = Portfolio::new(10_000.0);
        portfolio.apply(&fill(98.0, 102.0, 1.0)).unwrap();

        assert!((portfolio.cash - 3.0).abs() < 1e-9);
        assert_eq!(portfolio.quantity("SPY"), 98.0);
        assert_eq!(portfolio.get_position("SPY").unwrap().avg_entry_price, 102.0);
        assert!((portfolio.commissions_paid - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn apply_refuses_overdraft_without_side_effects() {
        let mut portfolio = Portfolio::new(10_000.0);
        let before = portfolio.clone();

        let err = portfolio.apply(&fill(99.0, 102.0, 1.0)).unwrap_err();

        assert!(matches!(err, SimError::InsufficientFunds { .. }));
        assert_eq!(portfolio, before);
    }

    #[test]
    fn cash_buffer_tolerates_small_overdraft() {
        let margin = MarginPolicy {
            allow_margin: false,
            cash_buffer: 200.0,
        };
        let mut portfolio = Portfolio::with_margin(10_000.0, margin);
        portfolio.apply(&fill(99.0, 102.0, 1.0)).unwrap();
        assert!((portfolio.cash + 99.0).abs() < 1e-9);
    }

    #[test]
    fn margin_allows_negative_cash() {
        let margin = MarginPolicy {
            allow_margin: true,
            cash_buffer: 0.0,
        };
        let mut portfolio = Portfolio::with_margin(1_000.0, margin);
        portfolio.apply(&fill(20.0, 100.0, 0.0)).unwrap();
        assert!((portfolio.cash + 1_000.0).abs() < 1e-9);
    }

    #[test]
    fn selling_everything_removes_position() {
        let mut portfolio = Portfolio::new(10_000.0);
        portfolio.apply(&fill(50.0, 100.0, 0.0)).unwrap();
        portfolio.apply(&fill(-50.0, 110.0, 0.0)).unwrap();

        assert_eq!(portfolio.position_count(), 0);
        assert!((portfolio.cash - 10_500.0).abs() < 1e-9);
        assert!((portfolio.realized_pnl - 500.0).abs() < 1e-9);
    }

    #[test]
    fn mark_to_market_appends_sample() {
        let mut portfolio = Portfolio::new(10_000.0);
        portfolio.apply(&fill(98.0, 102.0, 1.0)).unwrap();

        let equity = portfolio.mark_to_market(day(3), &closes(103.0));

        assert!((equity - (3.0 + 98.0 * 103.0)).abs() < 1e-9);
        assert_eq!(portfolio.equity_curve.len(), 1);
        assert_eq!(portfolio.equity_curve[0].date, day(3));
        assert_eq!(portfolio.last_mark("SPY"), Some(103.0));
    }

    #[test]
    fn equity_identity_holds_for_short() {
        let mut portfolio = Portfolio::new(10_000.0);
        portfolio.apply(&fill(-10.0, 100.0, 0.0)).unwrap();
        let equity = portfolio.mark_to_market(day(3), &closes(90.0));

        assert!((portfolio.cash - 11_000.0).abs() < 1e-9);
        assert!((equity - (11_000.0 - 900.0)).abs() < 1e-9);
    }

    #[test]
    fn equity_at_uses_supplied_prices() {
        let mut portfolio = Portfolio::new(10_000.0);
        portfolio.apply(&fill(10.0, 100.0, 0.0)).unwrap();
        portfolio.mark_to_market(day(3), &closes(100.0));

        assert!((portfolio.equity_at(&closes(120.0)) - 10_200.0).abs() < 1e-9);
        assert!((portfolio.equity_at(&HashMap::new()) - 10_000.0).abs() < 1e-9);
    }

    #[test]
    fn weight_reflects_marked_exposure() {
        let mut portfolio = Portfolio::new(10_000.0);
        portfolio.apply(&fill(50.0, 100.0, 0.0)).unwrap();
        portfolio.mark_to_market(day(3), &closes(100.0));
        assert!((portfolio.weight("SPY") - 0.5).abs() < 1e-12);
        assert_eq!(portfolio.weight("QQQ"), 0.0);
    }

    #[test]
    fn log_returns_start_at_zero() {
        let mut portfolio = Portfolio::new(100.0);
        portfolio.mark_to_market(day(2), &HashMap::new());
        portfolio.cash = 110.0;
        portfolio.mark_to_market(day(3), &HashMap::new());

        let returns = portfolio.log_returns();
        assert_eq!(returns.len(), 2);
        assert_eq!(returns[0], 0.0);
        assert!((returns[1] - (1.1f64).ln()).abs() < 1e-12);
    }
}
