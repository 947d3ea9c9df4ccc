//! Incremental indicators owned by strategies.
//!
//! Every indicator is fed one observation per bar and reports `None` until
//! its window has filled. Nothing is ever reset mid-run.

pub mod rsi;
pub mod sma;
pub mod volatility;

use std::collections::VecDeque;

pub use rsi::Rsi;
pub use sma::Sma;
pub use volatility::RealizedVol;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Fixed-capacity FIFO of the most recent observations.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    capacity: usize,
    values: VecDeque<f64>,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        RollingWindow {
            capacity,
            values: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// Pushes `value`, returning the observation that fell out, if any.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        self.values.push_back(value);
        if self.values.len() > self.capacity {
            self.values.pop_front()
        } else {
            None
        }
    }

    pub fn is_full(&self) -> bool {
        self.capacity > 0 && self.values.len() == self.capacity
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.values.iter()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }
}
