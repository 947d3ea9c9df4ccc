//! Domain error types.
//!
//! Configuration errors surface before any bar is processed. Data integrity
//! and funding errors surface from inside the simulation loop and abort the
//! run (funding errors only under the `abort` policy).

use chrono::NaiveDate;

/// Top-level error type for tradesim.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data integrity error for {symbol} on {date}: {reason}")]
    DataIntegrity {
        symbol: String,
        date: NaiveDate,
        reason: String,
    },

    #[error("insufficient funds for {symbol}: need {required:.2}, have {available:.2}")]
    InsufficientFunds {
        symbol: String,
        required: f64,
        available: f64,
    },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SimError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        SimError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn integrity(symbol: &str, date: NaiveDate, reason: impl Into<String>) -> Self {
        SimError::DataIntegrity {
            symbol: symbol.to_string(),
            date,
            reason: reason.into(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SimError::ConfigParse { .. }
                | SimError::ConfigMissing { .. }
                | SimError::ConfigInvalid { .. }
        )
    }
}

impl From<&SimError> for std::process::ExitCode {
    fn from(err: &SimError) -> Self {
        let code: u8 = match err {
            SimError::Io(_) | SimError::Csv(_) => 1,
            SimError::ConfigParse { .. }
            | SimError::ConfigMissing { .. }
            | SimError::ConfigInvalid { .. } => 2,
            SimError::DataSource { .. } => 3,
            SimError::DataIntegrity { .. } => 4,
            SimError::InsufficientFunds { .. } => 5,
            SimError::NoData { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
