//! Position tracking with volume-weighted average entry price.

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    /// Signed; positive long, negative short, zero flat.
    pub quantity: f64,
    pub avg_entry_price: f64,
}

impl Position {
    pub fn flat(symbol: &str) -> Self {
        Position {
            symbol: symbol.to_string(),
            quantity: 0.0,
            avg_entry_price: 0.0,
        }
    }

    pub fn is_long(&self) -> bool {
        self.quantity > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.quantity < 0.0
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == 0.0
    }

    /// Signed value; shorts contribute negatively to equity.
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity * (price - self.avg_entry_price)
    }

    /// Position after trading `quantity` units at `price`, plus the PnL
    /// realized by any part of the trade that reduced exposure.
    ///
    /// Adding to a position re-weights the entry price by volume; reducing
    /// keeps it; crossing through zero starts a fresh entry at `price`.
    pub fn after_trade(&self, quantity: f64, price: f64) -> (Position, f64) {
        let old = self.quantity;
        let new = old + quantity;
        let mut next = self.clone();
        next.quantity = new;

        if old == 0.0 || old.signum() == quantity.signum() {
            let cost = old.abs() * self.avg_entry_price + quantity.abs() * price;
            next.avg_entry_price = cost / new.abs();
            return (next, 0.0);
        }

        let closed = quantity.abs().min(old.abs());
        let realized = closed * old.signum() * (price - self.avg_entry_price);

        if new == 0.0 {
            next.avg_entry_price = 0.0;
        } else if new.signum() != old.signum() {
            next.avg_entry_price = price;
        }
        (next, realized)
    }
}
