//! Ready-made strategies.
//!
//! - [`BuyAndHold`]: fully invested from the first decision on
//! - [`SmaTrend`]: long above the moving average, volatility targeted
//! - [`RsiReversion`]: long when oversold, short when overbought, volatility targeted

mod buy_and_hold;
mod rsi_reversion;
mod sma_trend;

pub use buy_and_hold::BuyAndHold;
pub use rsi_reversion::{RsiReversion, RsiReversionConfig};
pub use sma_trend::{SmaTrend, SmaTrendConfig};

use super::error::SimError;
use super::strategy::Strategy;

/// Scales a directional signal to a weight that targets `vol_target`
/// annualized volatility:
///
/// weight = sign(signal) * min(cap, vol_target / realized_vol)
///
/// Flat when there is no signal or the realized volatility is missing,
/// zero, or not finite.
pub fn vol_target_weight(signal: f64, vol_target: f64, realized_vol: Option<f64>, cap: f64) -> f64 {
    if signal == 0.0 || !signal.is_finite() {
        return 0.0;
    }
    match realized_vol {
        Some(vol) if vol.is_finite() && vol > 0.0 => signal.signum() * (vol_target / vol).min(cap),
        _ => 0.0,
    }
}

/// Validated choice of strategy, immutable for the run.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyConfig {
    BuyAndHold { symbol: String, quantity: Option<f64> },
    SmaTrend(SmaTrendConfig),
    RsiReversion(RsiReversionConfig),
}

impl StrategyConfig {
    pub fn symbol(&self) -> &str {
        match self {
            StrategyConfig::BuyAndHold { symbol, .. } => symbol,
            StrategyConfig::SmaTrend(c) => &c.symbol,
            StrategyConfig::RsiReversion(c) => &c.symbol,
        }
    }

    pub fn validate(&self) -> Result<(), SimError> {
        match self {
            StrategyConfig::BuyAndHold { quantity, .. } => match quantity {
                Some(q) if !q.is_finite() || *q <= 0.0 => Err(SimError::invalid(
                    "strategy",
                    "quantity",
                    "quantity must be positive",
                )),
                _ => Ok(()),
            },
            StrategyConfig::SmaTrend(c) => c.validate(),
            StrategyConfig::RsiReversion(c) => c.validate(),
        }
    }

    pub fn build(&self) -> Result<Box<dyn Strategy>, SimError> {
        self.validate()?;
        let strategy: Box<dyn Strategy> = match self {
            StrategyConfig::BuyAndHold { symbol, quantity: Some(q) } => {
                Box::new(BuyAndHold::with_quantity(symbol, *q))
            }
            StrategyConfig::BuyAndHold { symbol, quantity: None } => Box::new(BuyAndHold::new(symbol)),
            StrategyConfig::SmaTrend(c) => Box::new(SmaTrend::new(c.clone())?),
            StrategyConfig::RsiReversion(c) => Box::new(RsiReversion::new(c.clone())?),
        };
        Ok(strategy)
    }
}

pub(crate) fn check_window(key: &str, value: usize) -> Result<(), SimError> {
    if value < 2 {
        return Err(SimError::invalid("strategy", key, format!("{key} must be at least 2")));
    }
    Ok(())
}

pub(crate) fn check_vol_target(vol_target: f64) -> Result<(), SimError> {
    if !vol_target.is_finite() || vol_target <= 0.0 || vol_target > 5.0 {
        return Err(SimError::invalid(
            "strategy",
            "vol_target",
            "vol_target must be in (0, 5]",
        ));
    }
    Ok(())
}

pub(crate) fn check_max_weight(max_weight: f64) -> Result<(), SimError> {
    if !max_weight.is_finite() || max_weight <= 0.0 || max_weight > 1.0 {
        return Err(SimError::invalid(
            "strategy",
            "max_weight",
            "max_weight must be in (0, 1]",
        ));
    }
    Ok(())
}
