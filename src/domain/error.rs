//! Domain error types.
//!
//! Fatal families (`DataError`, `ConfigError`) abort a run before the first bar
//! is processed. `OrderError` is recoverable: the order is rejected and the
//! simulation continues.

use chrono::NaiveDateTime;

/// Malformed or out-of-order input bars.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataError {
    #[error("line {line}: {reason}")]
    Parse { line: u64, reason: String },

    #[error("bar {index} at {timestamp} does not follow {previous}")]
    NonMonotonic {
        index: usize,
        timestamp: NaiveDateTime,
        previous: NaiveDateTime,
    },

    #[error("bar {index} at {timestamp}: {seconds}s spacing breaks the {resolution}s resolution")]
    Gap {
        index: usize,
        timestamp: NaiveDateTime,
        seconds: i64,
        resolution: i64,
    },

    #[error("bar {index} at {timestamp}: {reason}")]
    InvalidBar {
        index: usize,
        timestamp: NaiveDateTime,
        reason: String,
    },

    #[error("no bars to replay")]
    Empty,
}

/// Invalid configuration, detected at setup.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("config parse error in {file}: {reason}")]
    Parse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    Missing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    Invalid {
        section: String,
        key: String,
        reason: String,
    },
}

impl ConfigError {
    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn missing(section: &str, key: &str) -> Self {
        ConfigError::Missing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }
}

/// Reasons an order is rejected at submission or at fill time.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("insufficient funds: need {required:.2}, have {available:.2}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("invalid order: {reason}")]
    InvalidOrder { reason: String },

    #[error("order {0} not found")]
    NotFound(u64),

    #[error("order {id} is already {status}")]
    NotActive { id: u64, status: String },
}

impl OrderError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        OrderError::InvalidOrder {
            reason: reason.into(),
        }
    }
}

/// Top-level error type for barreplay.
#[derive(Debug, thiserror::Error)]
pub enum BacktestError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("backtest not ready: {reason}")]
    NotReady { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&BacktestError> for std::process::ExitCode {
    fn from(err: &BacktestError) -> Self {
        let code: u8 = match err {
            BacktestError::Io(_) => 1,
            BacktestError::Config(_) => 2,
            BacktestError::Data(_) => 3,
            BacktestError::NotReady { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}
