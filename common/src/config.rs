use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BacktestError, Result};

const DAYS_PER_YEAR: f64 = 365.0;

/// Bar interval of the input data, used to annualize per-bar statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "1d")]
    Day1,
}

impl Interval {
    pub fn minutes(&self) -> u32 {
        match self {
            Interval::Minute1 => 1,
            Interval::Minute5 => 5,
            Interval::Minute15 => 15,
            Interval::Hour1 => 60,
            Interval::Hour4 => 240,
            Interval::Day1 => 1440,
        }
    }

    /// Bars in a 365-day year (crypto markets trade every day)
    pub fn bars_per_year(&self) -> f64 {
        DAYS_PER_YEAR * 1440.0 / self.minutes() as f64
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Minute1 => "1m",
            Interval::Minute5 => "5m",
            Interval::Minute15 => "15m",
            Interval::Hour1 => "1h",
            Interval::Hour4 => "4h",
            Interval::Day1 => "1d",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = BacktestError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "1m" => Ok(Interval::Minute1),
            "5m" => Ok(Interval::Minute5),
            "15m" => Ok(Interval::Minute15),
            "1h" => Ok(Interval::Hour1),
            "4h" => Ok(Interval::Hour4),
            "1d" => Ok(Interval::Day1),
            other => Err(BacktestError::InvalidParameter(format!(
                "unknown interval '{}'",
                other
            ))),
        }
    }
}

/// Cash and transaction cost settings for one simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub initial_cash: f64,
    /// Fraction of traded notional charged per fill
    pub fee_rate: f64,
    /// Fraction applied adversely to the fill price
    pub slippage_rate: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            initial_cash: 1000.0,
            fee_rate: 0.001,
            slippage_rate: 0.001,
        }
    }
}

impl SimulationConfig {
    /// Frictionless config: no fees, no slippage
    pub fn frictionless(initial_cash: f64) -> Self {
        Self {
            initial_cash,
            fee_rate: 0.0,
            slippage_rate: 0.0,
        }
    }

    pub fn with_cash(mut self, initial_cash: f64) -> Self {
        self.initial_cash = initial_cash;
        self
    }

    pub fn with_fee_rate(mut self, fee_rate: f64) -> Self {
        self.fee_rate = fee_rate;
        self
    }

    pub fn with_slippage_rate(mut self, slippage_rate: f64) -> Self {
        self.slippage_rate = slippage_rate;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.initial_cash.is_finite() || self.initial_cash <= 0.0 {
            return Err(BacktestError::InvalidParameter(format!(
                "initial_cash must be positive, got {}",
                self.initial_cash
            )));
        }
        if !self.fee_rate.is_finite() || self.fee_rate < 0.0 {
            return Err(BacktestError::InvalidParameter(format!(
                "fee_rate must be >= 0, got {}",
                self.fee_rate
            )));
        }
        // A sell fill at or below zero is meaningless
        if !self.slippage_rate.is_finite() || !(0.0..1.0).contains(&self.slippage_rate) {
            return Err(BacktestError::InvalidParameter(format!(
                "slippage_rate must be in [0, 1), got {}",
                self.slippage_rate
            )));
        }
        Ok(())
    }
}

/// Metric derivation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Annualization factor for the Sharpe ratio
    pub bars_per_year: f64,
    /// Count forced-close trades in win rate and expectancy
    pub include_forced_closes: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            bars_per_year: Interval::Minute1.bars_per_year(),
            include_forced_closes: true,
        }
    }
}

impl MetricsConfig {
    pub fn for_interval(interval: Interval) -> Self {
        Self {
            bars_per_year: interval.bars_per_year(),
            ..Default::default()
        }
    }

    pub fn excluding_forced_closes(mut self) -> Self {
        self.include_forced_closes = false;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.bars_per_year.is_finite() || self.bars_per_year <= 0.0 {
            return Err(BacktestError::InvalidParameter(format!(
                "bars_per_year must be positive, got {}",
                self.bars_per_year
            )));
        }
        Ok(())
    }
}

/// Session-wide settings for the run orchestrator and report writer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub simulation: SimulationConfig,
    pub metrics: MetricsConfig,
    pub results_dir: PathBuf,
    pub write_reports: bool,
    pub parallel: bool,
    /// Worker threads; None = available cores
    pub threads: Option<usize>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            metrics: MetricsConfig::default(),
            results_dir: PathBuf::from("results"),
            write_reports: true,
            parallel: true,
            threads: None,
        }
    }
}

impl RunConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            BacktestError::DataLoadError(format!("{}: {}", path.display(), e))
        })?;
        let config: RunConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_simulation(mut self, simulation: SimulationConfig) -> Self {
        self.simulation = simulation;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsConfig) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_dir = dir.into();
        self
    }

    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.simulation.validate()?;
        self.metrics.validate()?;
        if self.threads == Some(0) {
            return Err(BacktestError::InvalidParameter(
                "threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
