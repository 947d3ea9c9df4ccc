//! Mean reversion on RSI.
//!
//! Long below the oversold level, short above the overbought level, flat in
//! between. Exposure is volatility targeted and capped symmetrically.

use super::{check_max_weight, check_vol_target, check_window, vol_target_weight};
use crate::domain::error::SimError;
use crate::domain::indicator::{RealizedVol, Rsi};
use crate::domain::ohlcv::Bar;
use crate::domain::order::Target;
use crate::domain::strategy::{HistoryCursor, Strategy};

#[derive(Debug, Clone, PartialEq)]
pub struct RsiReversionConfig {
    pub symbol: String,
    pub vol_target: f64,
    pub rsi_window: usize,
    pub vol_window: usize,
    pub max_weight: f64,
    pub oversold: f64,
    pub overbought: f64,
}

impl RsiReversionConfig {
    pub fn new(symbol: &str) -> Self {
        RsiReversionConfig {
            symbol: symbol.to_string(),
            vol_target: 0.15,
            rsi_window: 14,
            vol_window: 20,
            max_weight: 1.0,
            oversold: 30.0,
            overbought: 70.0,
        }
    }

    pub fn validate(&self) -> Result<(), SimError> {
        check_vol_target(self.vol_target)?;
        check_window("signal_window", self.rsi_window)?;
        check_window("vol_window", self.vol_window)?;
        check_max_weight(self.max_weight)?;
        let in_range = |v: f64| (0.0..=100.0).contains(&v);
        if !in_range(self.oversold) || !in_range(self.overbought) || self.oversold >= self.overbought
        {
            return Err(SimError::invalid(
                "strategy",
                "oversold",
                "need 0 <= oversold < overbought <= 100",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RsiReversion {
    config: RsiReversionConfig,
    rsi: Rsi,
    vol: RealizedVol,
    cursor: HistoryCursor,
}

impl RsiReversion {
    pub fn new(config: RsiReversionConfig) -> Result<Self, SimError> {
        config.validate()?;
        Ok(RsiReversion {
            rsi: Rsi::new(config.rsi_window),
            vol: RealizedVol::new(config.vol_window),
            cursor: HistoryCursor::new(),
            config,
        })
    }

    fn signal(&self, rsi: f64) -> f64 {
        if rsi < self.config.oversold {
            1.0
        } else if rsi > self.config.overbought {
            -1.0
        } else {
            0.0
        }
    }
}

impl Strategy for RsiReversion {
    fn name(&self) -> &str {
        "RSI Reversion"
    }

    fn symbol(&self) -> &str {
        &self.config.symbol
    }

    fn on_bar(&mut self, history: &[Bar]) -> Target {
        for bar in self.cursor.fresh(history) {
            self.rsi.update(bar.close);
            self.vol.update(bar.close);
        }
        let Some(rsi) = self.rsi.value() else {
            return Target::FLAT;
        };
        Target::Weight(vol_target_weight(
            self.signal(rsi),
            self.config.vol_target,
            self.vol.value(),
            self.config.max_weight,
        ))
    }

    fn warmup_period(&self) -> usize {
        self.config.rsi_window.max(self.config.vol_window) + 1
    }

    fn parameters(&self) -> Vec<(String, String)> {
        vec![
            ("vol_target".to_string(), self.config.vol_target.to_string()),
            ("signal_window".to_string(), self.config.rsi_window.to_string()),
            ("vol_window".to_string(), self.config.vol_window.to_string()),
            ("max_weight".to_string(), self.config.max_weight.to_string()),
            ("oversold".to_string(), self.config.oversold.to_string()),
            ("overbought".to_string(), self.config.overbought.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bars(closes: &[f64]) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                symbol: "QQQ".into(),
                date: start + chrono::Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 0.0,
            })
            .collect()
    }

    fn strategy() -> RsiReversion {
        RsiReversion::new(RsiReversionConfig {
            rsi_window: 3,
            vol_window: 3,
            ..RsiReversionConfig::new("QQQ")
        })
        .unwrap()
    }

    fn last_target(s: &mut RsiReversion, all: &[Bar]) -> Target {
        let mut target = Target::FLAT;
        for t in 1..=all.len() {
            target = s.on_bar(&all[..t]);
        }
        target
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let config = RsiReversionConfig {
            oversold: 80.0,
            overbought: 20.0,
            ..RsiReversionConfig::new("QQQ")
        };
        assert!(RsiReversion::new(config).is_err());
    }

    #[test]
    fn long_after_selloff() {
        let mut s = strategy();
        let all = bars(&[100.0, 97.0, 95.0, 91.0, 88.0, 84.0]);
        match last_target(&mut s, &all) {
            Target::Weight(w) => assert!(w > 0.0),
            other => panic!("unexpected target {other:?}"),
        }
    }

    #[test]
    fn short_after_rally() {
        let mut s = strategy();
        let all = bars(&[100.0, 103.0, 105.0, 109.0, 112.0, 116.0]);
        match last_target(&mut s, &all) {
            Target::Weight(w) => assert!(w < 0.0 && w >= -1.0),
            other => panic!("unexpected target {other:?}"),
        }
    }

    #[test]
    fn flat_during_warmup() {
        let mut s = strategy();
        let all = bars(&[100.0, 90.0, 80.0]);
        assert_eq!(last_target(&mut s, &all), Target::FLAT);
    }
}
