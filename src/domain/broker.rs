//! Simulated order execution.
//!
//! The broker is stateless: it prices whatever bar it is handed at that
//! bar's open, worsened by slippage in the direction of the trade, and
//! charges a flat commission per non-empty order.

use super::error::SimError;
use super::ohlcv::Bar;
use super::order::{Fill, Order, Side};

/// Transaction cost model. All zeros models a frictionless market.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrokerConfig {
    pub commission_per_order: f64,
    pub slippage_bps: f64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        BrokerConfig {
            commission_per_order: 0.0,
            slippage_bps: 0.0,
        }
    }
}

impl BrokerConfig {
    pub fn new(commission_per_order: f64, slippage_bps: f64) -> Result<Self, SimError> {
        let config = BrokerConfig {
            commission_per_order,
            slippage_bps,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if !self.commission_per_order.is_finite() || self.commission_per_order < 0.0 {
            return Err(SimError::invalid(
                "broker",
                "commission_per_order",
                "commission_per_order must be non-negative",
            ));
        }
        if !self.slippage_bps.is_finite() || self.slippage_bps < 0.0 {
            return Err(SimError::invalid(
                "broker",
                "slippage_bps",
                "slippage_bps must be non-negative",
            ));
        }
        Ok(())
    }

    pub fn is_frictionless(&self) -> bool {
        self.commission_per_order == 0.0 && self.slippage_bps == 0.0
    }
}

/// Buys execute higher, sells execute lower.
/// execution_price = market_price * (1 ± slippage_bps / 10000)
pub fn apply_slippage(market_price: f64, side: Side, slippage_bps: f64) -> f64 {
    market_price * (1.0 + side.sign() * slippage_bps / 10_000.0)
}

#[derive(Debug, Clone)]
pub struct SimBroker {
    config: BrokerConfig,
}

impl SimBroker {
    pub fn new(config: BrokerConfig) -> Result<Self, SimError> {
        config.validate()?;
        Ok(SimBroker { config })
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Price a trade on `side` would get at `bar`'s open.
    pub fn quote(&self, side: Side, bar: &Bar) -> Result<f64, SimError> {
        let open = bar.checked_open()?;
        Ok(apply_slippage(open, side, self.config.slippage_bps))
    }

    /// Largest whole quantity whose cost plus commission fits in `budget`
    /// when bought at `bar`'s open.
    pub fn max_affordable(&self, budget: f64, bar: &Bar) -> Result<f64, SimError> {
        let price = self.quote(Side::Buy, bar)?;
        let spendable = budget - self.config.commission_per_order;
        if spendable <= 0.0 {
            return Ok(0.0);
        }
        Ok((spendable / price).floor())
    }

    /// Executes `order` at `bar`'s open. Empty orders produce no fill and
    /// cost nothing.
    pub fn execute(&self, order: &Order, bar: &Bar) -> Result<Option<Fill>, SimError> {
        let Some(side) = order.side() else {
            return Ok(None);
        };
        if order.symbol != bar.symbol {
            return Err(SimError::integrity(
                &order.symbol,
                bar.date,
                format!("execution bar belongs to {}", bar.symbol),
            ));
        }
        let price = self.quote(side, bar)?;

        Ok(Some(Fill {
            symbol: order.symbol.clone(),
            side,
            quantity: order.delta_quantity,
            price,
            commission: self.config.commission_per_order,
            date: bar.date,
            decided_on: order.decided_on,
        }))
    }
}
