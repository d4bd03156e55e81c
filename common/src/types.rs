use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BacktestError, Result};

/// OHLCV bar data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// Ordered bar series for a single instrument
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    pub bars: Vec<Bar>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Self {
        Self {
            symbol: symbol.into(),
            bars,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.bars.iter().map(|b| b.timestamp).collect()
    }

    /// Check the series is usable by the simulator.
    ///
    /// Requires at least one bar, finite positive prices, finite non-negative
    /// volume and strictly increasing timestamps.
    pub fn validate(&self) -> Result<()> {
        if self.bars.is_empty() {
            return Err(BacktestError::EmptySeries {
                symbol: self.symbol.clone(),
            });
        }

        for (index, bar) in self.bars.iter().enumerate() {
            let prices = [
                ("open", bar.open),
                ("high", bar.high),
                ("low", bar.low),
                ("close", bar.close),
            ];
            for (field, value) in prices {
                if !value.is_finite() || value <= 0.0 {
                    return Err(BacktestError::InvalidPrice {
                        index,
                        field,
                        value,
                    });
                }
            }
            if !bar.volume.is_finite() || bar.volume < 0.0 {
                return Err(BacktestError::InvalidPrice {
                    index,
                    field: "volume",
                    value: bar.volume,
                });
            }
            if index > 0 && bar.timestamp <= self.bars[index - 1].timestamp {
                return Err(BacktestError::NonMonotonicTimestamp { index });
            }
        }

        Ok(())
    }
}

/// Entry/exit flags aligned 1:1 with a price series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSeries {
    pub timestamps: Vec<DateTime<Utc>>,
    pub entry: Vec<bool>,
    pub exit: Vec<bool>,
}

impl SignalSeries {
    pub fn new(timestamps: Vec<DateTime<Utc>>, entry: Vec<bool>, exit: Vec<bool>) -> Self {
        Self {
            timestamps,
            entry,
            exit,
        }
    }

    /// All-false signals on the index of `series`
    pub fn flat(series: &PriceSeries) -> Self {
        let n = series.len();
        Self::new(series.timestamps(), vec![false; n], vec![false; n])
    }

    pub fn len(&self) -> usize {
        self.entry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_empty()
    }

    pub fn entry_count(&self) -> usize {
        self.entry.iter().filter(|&&e| e).count()
    }

    pub fn exit_count(&self) -> usize {
        self.exit.iter().filter(|&&e| e).count()
    }

    /// Check the signals share the exact index of `series`
    pub fn validate_against(&self, series: &PriceSeries) -> Result<()> {
        let n = series.len();
        for (name, len) in [
            ("entry", self.entry.len()),
            ("exit", self.exit.len()),
            ("timestamps", self.timestamps.len()),
        ] {
            if len != n {
                return Err(BacktestError::LengthMismatch {
                    what: name,
                    expected: n,
                    actual: len,
                });
            }
        }

        if let Some(index) = self
            .timestamps
            .iter()
            .zip(series.bars.iter())
            .position(|(ts, bar)| *ts != bar.timestamp)
        {
            return Err(BacktestError::TimestampMismatch { index });
        }

        Ok(())
    }
}

/// Trade side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

/// Open long position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub quantity: f64,
    pub entry_price: f64,
    pub entry_date: DateTime<Utc>,
    pub entry_index: usize,
    pub entry_fee: f64,
}

impl Position {
    pub fn entry_notional(&self) -> f64 {
        self.quantity * self.entry_price
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }
}

/// Closed trade record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub entry_date: DateTime<Utc>,
    pub entry_price: f64,
    pub entry_index: usize,
    pub exit_date: DateTime<Utc>,
    pub exit_price: f64,
    pub exit_index: usize,
    pub quantity: f64,
    pub entry_fee: f64,
    pub exit_fee: f64,
    pub gross_pnl: f64,
    pub net_pnl: f64,
    /// Net PnL as a fraction of entry notional
    pub return_pct: f64,
    pub duration_bars: usize,
    pub forced_close: bool,
}

impl Trade {
    pub fn total_fees(&self) -> f64 {
        self.entry_fee + self.exit_fee
    }

    pub fn is_winner(&self) -> bool {
        self.net_pnl > 0.0
    }
}

/// One equity value per bar
pub type EquityCurve = Vec<(DateTime<Utc>, f64)>;

/// Performance statistics for one simulation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return_pct: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: f64,
    pub win_rate_pct: f64,
    pub expectancy: f64,
    pub exposure_time_pct: f64,
    // Trade counts
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub forced_closes: usize,
}

/// Metrics row handed to the reporting side, one per (instrument, strategy)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub symbol: String,
    #[serde(rename = "strategy_name")]
    pub strategy: String,
    #[serde(rename = "Total Return [%]")]
    pub total_return_pct: f64,
    #[serde(rename = "Sharpe Ratio")]
    pub sharpe: f64,
    #[serde(rename = "Max Drawdown [%]")]
    pub max_drawdown_pct: f64,
    #[serde(rename = "Win Rate [%]")]
    pub win_rate_pct: f64,
    #[serde(rename = "Expectancy")]
    pub expectancy: f64,
    #[serde(rename = "Exposure Time [%]")]
    pub exposure_time_pct: f64,
}

impl MetricsRecord {
    pub fn from_metrics(
        symbol: impl Into<String>,
        strategy: impl Into<String>,
        metrics: &PerformanceMetrics,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            strategy: strategy.into(),
            total_return_pct: metrics.total_return_pct,
            sharpe: metrics.sharpe_ratio,
            max_drawdown_pct: metrics.max_drawdown_pct,
            win_rate_pct: metrics.win_rate_pct,
            expectancy: metrics.expectancy,
            exposure_time_pct: metrics.exposure_time_pct,
        }
    }
}
