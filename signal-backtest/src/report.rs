//! CSV reports for a backtest session
//!
//! Layout under the results directory:
//! - `<strategy>_metrics.csv`: one row per instrument
//! - `equity/<symbol>_<strategy>_equity_curve.csv`: timestamp, equity, drawdown

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use common::{BacktestError, MetricsRecord, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::runner::{ReportSink, RunArtifacts};

const METRICS_SUFFIX: &str = "_metrics.csv";

#[derive(Debug, Serialize)]
struct EquityRow {
    timestamp: DateTime<Utc>,
    equity: f64,
    drawdown_pct: f64,
}

/// Writes metrics and equity curves as CSV files
pub struct CsvReportWriter {
    dir: PathBuf,
    write_equity: bool,
}

impl CsvReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_equity: true,
        })
    }

    /// Skip the per-run equity files
    pub fn metrics_only(mut self) -> Self {
        self.write_equity = false;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn metrics_path(&self, strategy: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}", file_component(strategy), METRICS_SUFFIX))
    }

    pub fn equity_path(&self, symbol: &str, strategy: &str) -> PathBuf {
        self.dir.join("equity").join(format!(
            "{}_{}_equity_curve.csv",
            file_component(symbol),
            file_component(strategy)
        ))
    }

    /// Write the rows of one strategy, replacing any previous file
    pub fn write_metrics(&self, strategy: &str, records: &[&MetricsRecord]) -> Result<PathBuf> {
        let path = self.metrics_path(strategy);
        let mut writer = csv::Writer::from_path(&path).map_err(csv_error)?;
        for record in records {
            writer.serialize(record).map_err(csv_error)?;
        }
        writer.flush()?;
        Ok(path)
    }

    fn write_equity_curve(&self, artifacts: &RunArtifacts) -> Result<PathBuf> {
        let record = &artifacts.record;
        let path = self.equity_path(&record.symbol, &record.strategy);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_path(&path).map_err(csv_error)?;
        let drawdown = artifacts.simulation.drawdown_curve();
        for ((timestamp, equity), (_, drawdown_pct)) in
            artifacts.simulation.equity_curve.iter().zip(drawdown)
        {
            writer
                .serialize(EquityRow {
                    timestamp: *timestamp,
                    equity: *equity,
                    drawdown_pct,
                })
                .map_err(csv_error)?;
        }
        writer.flush()?;
        Ok(path)
    }
}

impl ReportSink for CsvReportWriter {
    fn on_run(&mut self, artifacts: &RunArtifacts) -> Result<()> {
        if self.write_equity {
            let path = self.write_equity_curve(artifacts)?;
            debug!(path = %path.display(), "equity curve written");
        }
        Ok(())
    }

    fn finish(&mut self, records: &[MetricsRecord]) -> Result<()> {
        for strategy in strategy_order(records) {
            let rows: Vec<&MetricsRecord> =
                records.iter().filter(|r| r.strategy == strategy).collect();
            let path = self.write_metrics(&strategy, &rows)?;
            info!(strategy = %strategy, rows = rows.len(), path = %path.display(), "metrics written");
        }
        Ok(())
    }
}

/// Read every `*_metrics.csv` in `dir` and concatenate them, files in name order
pub fn load_all_metrics(dir: &Path) -> Result<Vec<MetricsRecord>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(METRICS_SUFFIX))
        })
        .collect();
    paths.sort();

    let mut records = Vec::new();
    for path in paths {
        let mut reader = csv::Reader::from_path(&path).map_err(csv_error)?;
        for row in reader.deserialize() {
            records.push(row.map_err(csv_error)?);
        }
    }
    Ok(records)
}

/// Per-strategy averages across instruments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySummary {
    pub strategy: String,
    pub runs: usize,
    pub avg_total_return_pct: f64,
    pub avg_sharpe: f64,
    pub avg_max_drawdown_pct: f64,
    pub avg_win_rate_pct: f64,
    pub avg_expectancy: f64,
    pub avg_exposure_time_pct: f64,
    /// Instrument with the highest total return
    pub best_symbol: String,
}

/// Average each metric per strategy, strategies in first-seen order
pub fn summarize_by_strategy(records: &[MetricsRecord]) -> Vec<StrategySummary> {
    strategy_order(records)
        .into_iter()
        .filter_map(|strategy| {
            let rows: Vec<&MetricsRecord> =
                records.iter().filter(|r| r.strategy == strategy).collect();
            let best = rows
                .iter()
                .max_by(|a, b| a.total_return_pct.total_cmp(&b.total_return_pct))?;
            let n = rows.len() as f64;
            let mean = |f: fn(&MetricsRecord) -> f64| rows.iter().map(|r| f(r)).sum::<f64>() / n;

            Some(StrategySummary {
                runs: rows.len(),
                avg_total_return_pct: mean(|r| r.total_return_pct),
                avg_sharpe: mean(|r| r.sharpe),
                avg_max_drawdown_pct: mean(|r| r.max_drawdown_pct),
                avg_win_rate_pct: mean(|r| r.win_rate_pct),
                avg_expectancy: mean(|r| r.expectancy),
                avg_exposure_time_pct: mean(|r| r.exposure_time_pct),
                best_symbol: best.symbol.clone(),
                strategy,
            })
        })
        .collect()
}

fn strategy_order(records: &[MetricsRecord]) -> Vec<String> {
    let mut order: Vec<String> = Vec::new();
    for record in records {
        if !order.contains(&record.strategy) {
            order.push(record.strategy.clone());
        }
    }
    order
}

/// Keep names readable but safe as a single path component
fn file_component(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}

fn csv_error(e: csv::Error) -> BacktestError {
    BacktestError::CsvError(e.to_string())
}
