//! Data access port trait.

use crate::domain::error::SimError;
use crate::domain::ohlcv::Bar;
use crate::domain::selection::DataSelection;
use chrono::NaiveDate;

/// Supplies ordered bar sequences. Implementations must return bars in
/// strictly increasing date order and must not reach past the data they
/// hold (lookbacks are measured from the last stored bar).
pub trait DataPort {
    fn fetch_bars(&self, symbol: &str, selection: &DataSelection) -> Result<Vec<Bar>, SimError>;

    fn list_symbols(&self) -> Result<Vec<String>, SimError>;

    /// First date, last date and bar count, or `None` without data.
    fn get_data_range(&self, symbol: &str) -> Result<Option<(NaiveDate, NaiveDate, usize)>, SimError>;
}
