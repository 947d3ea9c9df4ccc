//! Annualized realized volatility of log returns.
//!
//! r[i] = ln(C[i] / C[i-1])
//! VOL(n)[i] = sqrt(sum((r[i-j] - mean(r))^2 for j in 0..n) / (n - ddof)) * sqrt(252)
//! `new` is the population deviation (ddof 0), `sample` divides by n - 1.
//! Warmup: needs n returns, i.e. n+1 closes.

use super::{RollingWindow, TRADING_DAYS_PER_YEAR};

#[derive(Debug, Clone)]
pub struct RealizedVol {
    returns: RollingWindow,
    prev_close: Option<f64>,
    ddof: usize,
}

impl RealizedVol {
    pub fn new(period: usize) -> Self {
        RealizedVol {
            returns: RollingWindow::new(period),
            prev_close: None,
            ddof: 0,
        }
    }

    pub fn sample(period: usize) -> Self {
        RealizedVol {
            ddof: 1,
            ..RealizedVol::new(period)
        }
    }

    pub fn period(&self) -> usize {
        self.returns.capacity()
    }

    pub fn update(&mut self, close: f64) -> Option<f64> {
        match self.prev_close {
            Some(prev) if prev > 0.0 && close > 0.0 => {
                self.returns.push((close / prev).ln());
            }
            _ => {}
        }
        self.prev_close = Some(close);
        self.value()
    }

    pub fn value(&self) -> Option<f64> {
        if !self.returns.is_full() {
            return None;
        }
        let dof = self.returns.len().checked_sub(self.ddof).filter(|&d| d > 0)?;
        let mean = self.returns.mean()?;
        let variance = self.returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / dof as f64;
        Some(variance.sqrt() * TRADING_DAYS_PER_YEAR.sqrt())
    }
}
