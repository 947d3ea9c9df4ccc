//! CSV file data adapter.
//!
//! One file per symbol, `<data_dir>/<SYMBOL>.csv`, with a header row.
//! Column names may be lower case, capitalized or upper case
//! (`date,open,...` or `Date,Open,...`). Extra columns such as `Adj Close`
//! are ignored and `volume` may be absent.

use crate::domain::error::SimError;
use crate::domain::ohlcv::{Bar, validate_sequence};
use crate::domain::selection::DataSelection;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct Row {
    #[serde(alias = "Date", alias = "DATE", alias = "datetime")]
    date: NaiveDate,
    #[serde(alias = "Open", alias = "OPEN")]
    open: Option<f64>,
    #[serde(alias = "High", alias = "HIGH")]
    high: Option<f64>,
    #[serde(alias = "Low", alias = "LOW")]
    low: Option<f64>,
    #[serde(alias = "Close", alias = "CLOSE")]
    close: Option<f64>,
    #[serde(default, alias = "Volume", alias = "VOLUME")]
    volume: Option<f64>,
}

impl Row {
    /// Empty price cells (gap rows in vendor exports) are integrity errors.
    fn into_bar(self, symbol: &str) -> Result<Bar, SimError> {
        let price = |value: Option<f64>, column: &str| {
            value.ok_or_else(|| SimError::integrity(symbol, self.date, format!("missing {column}")))
        };
        Ok(Bar {
            symbol: symbol.to_string(),
            date: self.date,
            open: price(self.open, "open")?,
            high: price(self.high, "high")?,
            low: price(self.low, "low")?,
            close: price(self.close, "close")?,
            volume: self.volume.unwrap_or(0.0),
        })
    }
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }

    /// Every bar stored for `symbol`, checked for ordering.
    fn load_all(&self, symbol: &str) -> Result<Vec<Bar>, SimError> {
        let path = self.csv_path(symbol);
        if !path.is_file() {
            return Err(SimError::NoData {
                symbol: symbol.to_string(),
            });
        }
        let content = fs::read_to_string(&path).map_err(|e| SimError::DataSource {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();
        for row in rdr.deserialize::<Row>() {
            bars.push(row?.into_bar(symbol)?);
        }
        validate_sequence(symbol, &bars)?;
        debug!("Loaded {} bars for {} from {}", bars.len(), symbol, path.display());
        Ok(bars)
    }
}

impl DataPort for CsvAdapter {
    fn fetch_bars(&self, symbol: &str, selection: &DataSelection) -> Result<Vec<Bar>, SimError> {
        let all = self.load_all(symbol)?;
        let picked = selection.apply(&all);
        if picked.is_empty() {
            return Err(SimError::NoData {
                symbol: symbol.to_string(),
            });
        }
        Ok(picked.to_vec())
    }

    fn list_symbols(&self) -> Result<Vec<String>, SimError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| SimError::DataSource {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                if let Some(stem) = path.file_stem() {
                    symbols.push(stem.to_string_lossy().into_owned());
                }
            }
        }
        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(&self, symbol: &str) -> Result<Option<(NaiveDate, NaiveDate, usize)>, SimError> {
        let bars = match self.load_all(symbol) {
            Ok(bars) => bars,
            Err(SimError::NoData { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, bars.len())),
            _ => None,
        })
    }
}
