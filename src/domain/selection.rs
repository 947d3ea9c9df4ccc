//! Which part of a bar history a run uses.

use chrono::{Days, Months, NaiveDate};

use super::error::SimError;
use super::ohlcv::Bar;

/// A lookback window such as `10y`, `6mo` or `30d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookback {
    Years(u32),
    Months(u32),
    Days(u64),
}

impl Lookback {
    /// Parses `<n>y`, `<n>mo` or `<n>d` with `n > 0`.
    pub fn parse(token: &str) -> Option<Lookback> {
        let token = token.trim().to_ascii_lowercase();
        let (digits, unit) = token.split_at(token.find(|c: char| !c.is_ascii_digit())?);
        let n: u32 = digits.parse().ok().filter(|n| *n > 0)?;
        match unit {
            "y" => Some(Lookback::Years(n)),
            "mo" => Some(Lookback::Months(n)),
            "d" => Some(Lookback::Days(u64::from(n))),
            _ => None,
        }
    }

    /// Earliest date excluded from a window ending at `last`.
    pub fn cutoff(&self, last: NaiveDate) -> Option<NaiveDate> {
        match *self {
            Lookback::Years(n) => last.checked_sub_months(Months::new(n.checked_mul(12)?)),
            Lookback::Months(n) => last.checked_sub_months(Months::new(n)),
            Lookback::Days(n) => last.checked_sub_days(Days::new(n)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataSelection {
    /// Everything available.
    #[default]
    Max,
    /// Inclusive date range.
    Range { start: NaiveDate, end: NaiveDate },
    /// Trailing window measured back from the last available bar.
    Lookback(Lookback),
}

impl DataSelection {
    /// Parses a period token: `max` or a [`Lookback`].
    pub fn parse_period(token: &str) -> Result<DataSelection, SimError> {
        if token.trim().eq_ignore_ascii_case("max") {
            return Ok(DataSelection::Max);
        }
        Lookback::parse(token).map(DataSelection::Lookback).ok_or_else(|| {
            SimError::invalid(
                "data",
                "period",
                format!("unrecognized period '{token}', expected max, <n>y, <n>mo or <n>d"),
            )
        })
    }

    pub fn range(start: NaiveDate, end: NaiveDate) -> Result<DataSelection, SimError> {
        if start > end {
            return Err(SimError::invalid(
                "data",
                "start_date",
                "start_date must not be after end_date",
            ));
        }
        Ok(DataSelection::Range { start, end })
    }

    /// Narrows an ordered bar sequence to this selection.
    pub fn apply<'a>(&self, bars: &'a [Bar]) -> &'a [Bar] {
        let (from, to) = match *self {
            DataSelection::Max => return bars,
            DataSelection::Range { start, end } => (
                bars.partition_point(|b| b.date < start),
                bars.partition_point(|b| b.date <= end),
            ),
            DataSelection::Lookback(lookback) => {
                let Some(last) = bars.last() else {
                    return bars;
                };
                match lookback.cutoff(last.date) {
                    Some(cutoff) => (bars.partition_point(|b| b.date <= cutoff), bars.len()),
                    None => (0, bars.len()),
                }
            }
        };
        &bars[from..to.max(from)]
    }
}
