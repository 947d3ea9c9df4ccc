//! RSI (Relative Strength Index), exponentially smoothed.
//!
//! Gains and losses of successive closes are each smoothed with
//! alpha = 1/n, seeded with the first change:
//! - avg[0] = x[0]
//! - avg[i] = (1 - alpha) * avg[i-1] + alpha * x[i]
//!
//! Formula: RSI = 100 - 100 / (1 + avg_gain / (avg_loss + 1e-6))
//!
//! Warmup: undefined until n price changes (n+1 closes) have been seen.

const EPSILON: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    alpha: f64,
    prev_close: Option<f64>,
    avg_gain: f64,
    avg_loss: f64,
    changes: usize,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Rsi {
            period,
            alpha: if period > 0 { 1.0 / period as f64 } else { 0.0 },
            prev_close: None,
            avg_gain: 0.0,
            avg_loss: 0.0,
            changes: 0,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn update(&mut self, close: f64) -> Option<f64> {
        if let Some(prev) = self.prev_close {
            let change = close - prev;
            let gain = change.max(0.0);
            let loss = (-change).max(0.0);
            if self.changes == 0 {
                self.avg_gain = gain;
                self.avg_loss = loss;
            } else {
                self.avg_gain = (1.0 - self.alpha) * self.avg_gain + self.alpha * gain;
                self.avg_loss = (1.0 - self.alpha) * self.avg_loss + self.alpha * loss;
            }
            self.changes += 1;
        }
        self.prev_close = Some(close);
        self.value()
    }

    pub fn value(&self) -> Option<f64> {
        if self.period == 0 || self.changes < self.period {
            return None;
        }
        let rs = self.avg_gain / (self.avg_loss + EPSILON);
        Some(100.0 - 100.0 / (1.0 + rs))
    }
}
