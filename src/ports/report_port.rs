//! Report generation port trait.

use std::path::{Path, PathBuf};

use crate::domain::backtest::BacktestResult;
use crate::domain::benchmark::Comparison;
use crate::domain::error::SimError;
use crate::domain::metrics::Metrics;
use crate::domain::trades::TradeSummary;

/// Everything a report shows about one run. Read-only.
pub struct RunReport<'a> {
    pub result: &'a BacktestResult,
    pub metrics: &'a Metrics,
    pub trades: &'a TradeSummary,
    pub comparison: Option<&'a Comparison>,
}

/// Port for writing backtest reports.
pub trait ReportPort {
    /// Writes the report under `output_dir` and returns the files created.
    fn write(&self, report: &RunReport<'_>, output_dir: &Path) -> Result<Vec<PathBuf>, SimError>;
}
