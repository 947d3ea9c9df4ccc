//! OHLCV bar representation and bar sequence checks.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::SimError;

/// One price observation for one symbol at one time step. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Open price usable as an execution basis.
    pub fn checked_open(&self) -> Result<f64, SimError> {
        if !self.open.is_finite() || self.open <= 0.0 {
            return Err(SimError::integrity(
                &self.symbol,
                self.date,
                format!("open price {} is not a positive number", self.open),
            ));
        }
        Ok(self.open)
    }

    /// Close price usable for marking positions.
    pub fn checked_close(&self) -> Result<f64, SimError> {
        if !self.close.is_finite() || self.close <= 0.0 {
            return Err(SimError::integrity(
                &self.symbol,
                self.date,
                format!("close price {} is not a positive number", self.close),
            ));
        }
        Ok(self.close)
    }

    /// ln(close / prev_close)
    pub fn log_return(&self, prev_close: f64) -> f64 {
        (self.close / prev_close).ln()
    }
}

/// Checks that a bar sequence belongs to one symbol and is strictly
/// increasing in date. Gaps are fine; duplicates are not.
pub fn validate_sequence(symbol: &str, bars: &[Bar]) -> Result<(), SimError> {
    for bar in bars {
        if bar.symbol != symbol {
            return Err(SimError::integrity(
                symbol,
                bar.date,
                format!("bar belongs to {}", bar.symbol),
            ));
        }
    }
    for pair in bars.windows(2) {
        if pair[1].date <= pair[0].date {
            return Err(SimError::integrity(
                symbol,
                pair[1].date,
                format!("date does not follow {}", pair[0].date),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, open: f64, close: f64) -> Bar {
        Bar {
            symbol: "SPY".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open,
            high: open.max(close) + 1.0,
            low: open.min(close) - 1.0,
            close,
            volume: 1_000.0,
        }
    }

    #[test]
    fn checked_open_rejects_zero() {
        assert!(bar(2, 0.0, 100.0).checked_open().is_err());
        assert!(bar(2, f64::NAN, 100.0).checked_open().is_err());
        assert_eq!(bar(2, 101.0, 100.0).checked_open().unwrap(), 101.0);
    }

    #[test]
    fn checked_close_rejects_negative() {
        assert!(bar(2, 100.0, -1.0).checked_close().is_err());
        assert!(bar(2, 100.0, f64::INFINITY).checked_close().is_err());
    }

    #[test]
    fn log_return_of_unchanged_price_is_zero() {
        assert!(bar(2, 100.0, 100.0).log_return(100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sequence_increasing_is_valid() {
        let bars = vec![bar(2, 100.0, 101.0), bar(3, 101.0, 102.0), bar(5, 102.0, 99.0)];
        assert!(validate_sequence("SPY", &bars).is_ok());
    }

    #[test]
    fn sequence_duplicate_date_is_rejected() {
        let bars = vec![bar(2, 100.0, 101.0), bar(2, 101.0, 102.0)];
        let err = validate_sequence("SPY", &bars).unwrap_err();
        assert!(matches!(err, SimError::DataIntegrity { .. }));
    }

    #[test]
    fn sequence_out_of_order_is_rejected() {
        let bars = vec![bar(3, 100.0, 101.0), bar(2, 101.0, 102.0)];
        assert!(validate_sequence("SPY", &bars).is_err());
    }

    #[test]
    fn sequence_foreign_symbol_is_rejected() {
        let mut other = bar(3, 100.0, 101.0);
        other.symbol = "QQQ".into();
        let bars = vec![bar(2, 100.0, 101.0), other];
        assert!(validate_sequence("SPY", &bars).is_err());
    }

    #[test]
    fn empty_sequence_is_valid() {
        assert!(validate_sequence("SPY", &[]).is_ok());
    }
}
