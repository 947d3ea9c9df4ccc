//! Strategy contract.
//!
//! The backtester hands a strategy the bar history up to and including the
//! current bar, never beyond it. The strategy answers with the position it
//! wants to hold after the next rebalance.

use super::ohlcv::Bar;
use super::order::{Fill, Target};

pub trait Strategy {
    fn name(&self) -> &str;

    /// Symbol this strategy trades.
    fn symbol(&self) -> &str;

    /// Decide a target from `history`, whose last element is the current bar.
    fn on_bar(&mut self, history: &[Bar]) -> Target;

    /// Called after one of this strategy's orders has been filled.
    fn on_fill(&mut self, _fill: &Fill) {}

    /// Bars needed before the strategy can hold anything but flat.
    fn warmup_period(&self) -> usize {
        0
    }

    /// Parameters as key-value pairs for logs and reports.
    fn parameters(&self) -> Vec<(String, String)> {
        vec![]
    }
}

/// Tracks how much of a growing history a strategy has already consumed,
/// so rolling indicators see each bar exactly once.
#[derive(Debug, Clone, Default)]
pub struct HistoryCursor {
    seen: usize,
}

impl HistoryCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bars of `history` not returned by an earlier call.
    pub fn fresh<'a>(&mut self, history: &'a [Bar]) -> &'a [Bar] {
        let start = self.seen.min(history.len());
        self.seen = self.seen.max(history.len());
        &history[start..]
    }

    pub fn seen(&self) -> usize {
        self.seen
    }
}
