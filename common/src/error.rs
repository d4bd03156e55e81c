use thiserror::Error;

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("Empty price series for {symbol}")]
    EmptySeries { symbol: String },

    #[error("Length mismatch for {what}: expected {expected} bars, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Signal timestamp differs from price timestamp at bar {index}")]
    TimestampMismatch { index: usize },

    #[error("Invalid {field} at bar {index}: {value}")]
    InvalidPrice {
        index: usize,
        field: &'static str,
        value: f64,
    },

    #[error("Timestamps not strictly increasing at bar {index}")]
    NonMonotonicTimestamp { index: usize },

    #[error("Position already open since bar {entry_index}")]
    PositionAlreadyOpen { entry_index: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Data loading error: {0}")]
    DataLoadError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parse error: {0}")]
    CsvError(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl BacktestError {
    /// Malformed or misaligned input; the caller must fix it, retrying won't help
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::EmptySeries { .. }
                | Self::LengthMismatch { .. }
                | Self::TimestampMismatch { .. }
                | Self::InvalidPrice { .. }
                | Self::NonMonotonicTimestamp { .. }
                | Self::InvalidParameter(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BacktestError>;
