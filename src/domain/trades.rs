//! Round-trip trades reconstructed from the fill log.
//!
//! Fills are matched first-in first-out per symbol. A fill that reduces a
//! position closes the oldest open lots first; whatever is left over opens
//! a new lot on the other side. Commissions are spread over each fill's
//! units so partial closes carry their share of entry and exit costs.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

use super::order::{Fill, Side};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosedTrade {
    pub symbol: String,
    /// Side of the opening fill.
    pub direction: Side,
    pub quantity: f64,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_price: f64,
    pub exit_price: f64,
    pub commission: f64,
    /// Net of allocated commission.
    pub pnl: f64,
}

impl ClosedTrade {
    /// PnL relative to the capital committed at entry.
    pub fn return_pct(&self) -> f64 {
        let basis = self.entry_price * self.quantity;
        if basis > 0.0 { self.pnl / basis } else { 0.0 }
    }

    pub fn holding_days(&self) -> i64 {
        (self.exit_date - self.entry_date).num_days()
    }
}

#[derive(Debug, Clone)]
struct Lot {
    /// Signed remaining quantity.
    quantity: f64,
    price: f64,
    date: NaiveDate,
    commission_per_unit: f64,
}

/// Matches `fills` into closed round trips. Lots still open at the end are
/// not reported.
pub fn round_trips(fills: &[Fill]) -> Vec<ClosedTrade> {
    let mut books: BTreeMap<&str, VecDeque<Lot>> = BTreeMap::new();
    let mut closed = Vec::new();

    for fill in fills {
        if fill.quantity == 0.0 {
            continue;
        }
        let book = books.entry(fill.symbol.as_str()).or_default();
        let exit_cpu = fill.commission / fill.quantity.abs();
        let mut remaining = fill.quantity;

        while remaining != 0.0 {
            let Some(lot) = book.front_mut() else {
                break;
            };
            if lot.quantity.signum() == remaining.signum() {
                break;
            }
            let matched = remaining.abs().min(lot.quantity.abs());
            let direction = if lot.quantity > 0.0 { Side::Buy } else { Side::Sell };
            let commission = matched * (lot.commission_per_unit + exit_cpu);
            let gross = direction.sign() * (fill.price - lot.price) * matched;

            closed.push(ClosedTrade {
                symbol: fill.symbol.clone(),
                direction,
                quantity: matched,
                entry_date: lot.date,
                exit_date: fill.date,
                entry_price: lot.price,
                exit_price: fill.price,
                commission,
                pnl: gross - commission,
            });

            lot.quantity -= lot.quantity.signum() * matched;
            remaining -= remaining.signum() * matched;
            if lot.quantity == 0.0 {
                book.pop_front();
            }
        }

        if remaining != 0.0 {
            book.push_back(Lot {
                quantity: remaining,
                price: fill.price,
                date: fill.date,
                commission_per_unit: exit_cpu,
            });
        }
    }
    closed
}

/// Win/loss statistics over closed trades.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TradeSummary {
    pub total: usize,
    pub won: usize,
    pub lost: usize,
    pub breakeven: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_holding_days: f64,
    pub total_pnl: f64,
}

impl TradeSummary {
    pub fn from_trades(trades: &[ClosedTrade]) -> Self {
        let mut summary = TradeSummary {
            total: trades.len(),
            ..TradeSummary::default()
        };
        if trades.is_empty() {
            return summary;
        }

        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut total_days = 0i64;
        for trade in trades {
            let pnl = trade.pnl;
            if pnl > 0.0 {
                summary.won += 1;
                total_wins += pnl;
                summary.largest_win = summary.largest_win.max(pnl);
            } else if pnl < 0.0 {
                summary.lost += 1;
                total_losses += pnl.abs();
                summary.largest_loss = summary.largest_loss.max(pnl.abs());
            } else {
                summary.breakeven += 1;
            }
            total_days += trade.holding_days();
            summary.total_pnl += pnl;
        }

        let n = trades.len() as f64;
        summary.win_rate = summary.won as f64 / n;
        summary.profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };
        if summary.won > 0 {
            summary.avg_win = total_wins / summary.won as f64;
        }
        if summary.lost > 0 {
            summary.avg_loss = total_losses / summary.lost as f64;
        }
        summary.avg_holding_days = total_days as f64 / n;
        summary
    }
}
