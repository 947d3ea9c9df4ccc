//! Trend following on a simple moving average.
//!
//! Long while the close is above SMA(n), flat otherwise. Exposure is sized
//! so the position runs at the configured annualized volatility, measured
//! with the sample (n - 1) deviation of log returns.

use super::{check_max_weight, check_vol_target, check_window, vol_target_weight};
use crate::domain::error::SimError;
use crate::domain::indicator::{RealizedVol, Sma};
use crate::domain::ohlcv::Bar;
use crate::domain::order::Target;
use crate::domain::strategy::{HistoryCursor, Strategy};

#[derive(Debug, Clone, PartialEq)]
pub struct SmaTrendConfig {
    pub symbol: String,
    pub vol_target: f64,
    pub sma_window: usize,
    pub vol_window: usize,
    pub max_weight: f64,
}

impl SmaTrendConfig {
    pub fn new(symbol: &str) -> Self {
        SmaTrendConfig {
            symbol: symbol.to_string(),
            vol_target: 0.15,
            sma_window: 200,
            vol_window: 20,
            max_weight: 1.0,
        }
    }

    pub fn validate(&self) -> Result<(), SimError> {
        check_vol_target(self.vol_target)?;
        check_window("signal_window", self.sma_window)?;
        check_window("vol_window", self.vol_window)?;
        check_max_weight(self.max_weight)
    }
}

#[derive(Debug, Clone)]
pub struct SmaTrend {
    config: SmaTrendConfig,
    sma: Sma,
    vol: RealizedVol,
    cursor: HistoryCursor,
}

impl SmaTrend {
    pub fn new(config: SmaTrendConfig) -> Result<Self, SimError> {
        config.validate()?;
        Ok(SmaTrend {
            sma: Sma::new(config.sma_window),
            vol: RealizedVol::sample(config.vol_window),
            cursor: HistoryCursor::new(),
            config,
        })
    }
}

impl Strategy for SmaTrend {
    fn name(&self) -> &str {
        "SMA Trend"
    }

    fn symbol(&self) -> &str {
        &self.config.symbol
    }

    fn on_bar(&mut self, history: &[Bar]) -> Target {
        for bar in self.cursor.fresh(history) {
            self.sma.update(bar.close);
            self.vol.update(bar.close);
        }
        let (Some(bar), Some(sma)) = (history.last(), self.sma.value()) else {
            return Target::FLAT;
        };

        let signal = if bar.close > sma { 1.0 } else { 0.0 };
        Target::Weight(vol_target_weight(
            signal,
            self.config.vol_target,
            self.vol.value(),
            self.config.max_weight,
        ))
    }

    fn warmup_period(&self) -> usize {
        self.config.sma_window.max(self.config.vol_window + 1)
    }

    fn parameters(&self) -> Vec<(String, String)> {
        vec![
            ("vol_target".to_string(), self.config.vol_target.to_string()),
            ("signal_window".to_string(), self.config.sma_window.to_string()),
            ("vol_window".to_string(), self.config.vol_window.to_string()),
            ("max_weight".to_string(), self.config.max_weight.to_string()),
        ]
    }
}
