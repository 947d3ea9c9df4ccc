//! CSV report adapter implementing ReportPort.
//!
//! Writes four files into the output directory:
//! - `equity.csv`: date, equity, log_return, benchmark_equity
//! - `trades.csv`: the fill log in execution order
//! - `round_trips.csv`: closed trades matched first-in first-out
//! - `summary.csv`: metric, strategy, benchmark

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::domain::error::SimError;
use crate::domain::portfolio::log_returns;
use crate::ports::report_port::{ReportPort, RunReport};

#[derive(Serialize)]
struct EquityRow {
    date: NaiveDate,
    equity: f64,
    log_return: f64,
    benchmark_equity: Option<f64>,
}

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        CsvReportAdapter
    }

    fn write_equity(report: &RunReport<'_>, path: &Path) -> Result<(), SimError> {
        let curve = &report.result.equity_curve;
        let returns = log_returns(curve);
        let benchmark = report.comparison.map(|c| &c.benchmark_equity);

        let mut wtr = csv::Writer::from_path(path)?;
        for (i, point) in curve.iter().enumerate() {
            wtr.serialize(EquityRow {
                date: point.date,
                equity: point.equity,
                log_return: returns[i],
                benchmark_equity: benchmark.and_then(|b| b.get(i)).map(|p| p.equity),
            })?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_serialized<T: Serialize>(rows: &[T], header: &[&str], path: &Path) -> Result<(), SimError> {
        let mut wtr = csv::Writer::from_path(path)?;
        // serialize() only emits a header alongside the first row
        if rows.is_empty() {
            wtr.write_record(header)?;
        }
        for row in rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_summary(report: &RunReport<'_>, path: &Path) -> Result<(), SimError> {
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(["metric", "strategy", "benchmark"])?;

        let benchmark_rows = report.comparison.map(|c| c.benchmark_metrics.rows());
        for (i, (name, value)) in report.metrics.rows().into_iter().enumerate() {
            let bench = benchmark_rows
                .as_ref()
                .and_then(|rows| rows.get(i))
                .map(|(_, v)| v.to_string())
                .unwrap_or_default();
            wtr.write_record([name.to_string(), value.to_string(), bench])?;
        }

        let t = report.trades;
        let trade_rows = [
            ("round_trips", t.total as f64),
            ("win_rate", t.win_rate),
            ("profit_factor", t.profit_factor),
            ("avg_win", t.avg_win),
            ("avg_loss", t.avg_loss),
            ("avg_holding_days", t.avg_holding_days),
            ("fills", report.result.trade_log.len() as f64),
            ("commissions_paid", report.result.portfolio.commissions_paid),
        ];
        for (name, value) in trade_rows {
            wtr.write_record([name.to_string(), value.to_string(), String::new()])?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, report: &RunReport<'_>, output_dir: &Path) -> Result<Vec<PathBuf>, SimError> {
        fs::create_dir_all(output_dir)?;

        let equity = output_dir.join("equity.csv");
        let trades = output_dir.join("trades.csv");
        let round_trips = output_dir.join("round_trips.csv");
        let summary = output_dir.join("summary.csv");

        Self::write_equity(report, &equity)?;
        Self::write_serialized(
            &report.result.trade_log,
            &["symbol", "side", "quantity", "price", "commission", "date", "decided_on"],
            &trades,
        )?;
        Self::write_serialized(
            &report.result.closed_trades(),
            &[
                "symbol",
                "direction",
                "quantity",
                "entry_date",
                "exit_date",
                "entry_price",
                "exit_price",
                "commission",
                "pnl",
            ],
            &round_trips,
        )?;
        Self::write_summary(report, &summary)?;

        info!("Report written to {}", output_dir.display());
        Ok(vec![equity, trades, round_trips, summary])
    }
}
