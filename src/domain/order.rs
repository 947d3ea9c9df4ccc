//! Orders, targets and fills.

use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn of(quantity: f64) -> Option<Side> {
        if quantity > 0.0 {
            Some(Side::Buy)
        } else if quantity < 0.0 {
            Some(Side::Sell)
        } else {
            None
        }
    }

    /// +1 for buys, -1 for sells.
    pub fn sign(self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }
}

/// What a strategy wants to hold after the next rebalance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target {
    /// Signed number of units.
    Quantity(f64),
    /// Signed fraction of equity, nominally in [-1, 1].
    Weight(f64),
}

impl Target {
    pub const FLAT: Target = Target::Weight(0.0);

    pub fn is_short(&self) -> bool {
        match *self {
            Target::Quantity(q) => q < 0.0,
            Target::Weight(w) => w < 0.0,
        }
    }

    /// The same target with short exposure removed.
    pub fn long_only(self) -> Target {
        match self {
            Target::Quantity(q) => Target::Quantity(q.max(0.0)),
            Target::Weight(w) => Target::Weight(w.max(0.0)),
        }
    }

    /// Expresses the target as a fraction of `equity` at `price`.
    pub fn as_weight(&self, price: f64, equity: f64) -> f64 {
        match *self {
            Target::Weight(w) => w,
            Target::Quantity(q) => q * price / equity,
        }
    }
}

/// A resolved market order. Lives for one bar only.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub symbol: String,
    /// Signed; positive buys, negative sells.
    pub delta_quantity: f64,
    /// Date of the bar whose close produced the decision.
    pub decided_on: NaiveDate,
}

impl Order {
    pub fn side(&self) -> Option<Side> {
        Side::of(self.delta_quantity)
    }

    pub fn is_empty(&self) -> bool {
        self.delta_quantity == 0.0
    }
}

/// An executed trade as reported by the broker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fill {
    pub symbol: String,
    pub side: Side,
    /// Signed; matches the sign of the originating order.
    pub quantity: f64,
    pub price: f64,
    pub commission: f64,
    pub date: NaiveDate,
    pub decided_on: NaiveDate,
}

impl Fill {
    /// Cash change caused by this fill, commission included.
    pub fn cash_delta(&self) -> f64 {
        -self.quantity * self.price - self.commission
    }

    pub fn notional(&self) -> f64 {
        self.quantity.abs() * self.price
    }
}
