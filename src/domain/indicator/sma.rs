//! Simple Moving Average over the last n closes.
//!
//! SMA(n)[i] = sum(C[i-j] for j in 0..n) / n
//! Warmup: undefined until n closes have been seen.

use super::RollingWindow;

#[derive(Debug, Clone)]
pub struct Sma {
    window: RollingWindow,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Sma {
            window: RollingWindow::new(period),
        }
    }

    pub fn period(&self) -> usize {
        self.window.capacity()
    }

    pub fn update(&mut self, close: f64) -> Option<f64> {
        self.window.push(close);
        self.value()
    }

    pub fn value(&self) -> Option<f64> {
        if self.window.is_full() {
            self.window.mean()
        } else {
            None
        }
    }
}
