//! Buy & Hold baseline.

use crate::domain::ohlcv::Bar;
use crate::domain::order::Target;
use crate::domain::strategy::Strategy;

/// Holds the whole portfolio, or a fixed quantity, from the first bar on.
#[derive(Debug, Clone)]
pub struct BuyAndHold {
    symbol: String,
    target: Target,
}

impl BuyAndHold {
    pub fn new(symbol: &str) -> Self {
        BuyAndHold {
            symbol: symbol.to_string(),
            target: Target::Weight(1.0),
        }
    }

    pub fn with_quantity(symbol: &str, quantity: f64) -> Self {
        BuyAndHold {
            symbol: symbol.to_string(),
            target: Target::Quantity(quantity),
        }
    }
}

impl Strategy for BuyAndHold {
    fn name(&self) -> &str {
        "Buy & Hold"
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn on_bar(&mut self, _history: &[Bar]) -> Target {
        self.target
    }

    fn parameters(&self) -> Vec<(String, String)> {
        match self.target {
            Target::Quantity(q) => vec![("quantity".to_string(), q.to_string())],
            Target::Weight(w) => vec![("weight".to_string(), w.to_string())],
        }
    }
}
