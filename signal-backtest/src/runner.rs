//! Run orchestrator
//!
//! Runs every (strategy, instrument) pair through signal generation,
//! simulation and metrics. Pairs are independent, so they are spread over a
//! rayon pool; results come back in strategy-major, instrument-minor order
//! regardless of scheduling. A failing pair is logged and skipped.

use std::fmt;
use std::time::Instant;

use common::{BacktestError, MetricsRecord, PerformanceMetrics, PriceSeries, Result, RunConfig};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::engine::{BacktestEngine, SimulationResult};
use crate::metrics::MetricsCalculator;
use crate::signals::SignalProvider;

/// Everything produced by one successful (instrument, strategy) run
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    pub record: MetricsRecord,
    pub metrics: PerformanceMetrics,
    pub simulation: SimulationResult,
}

/// A run that was skipped, with the context needed to find it again
#[derive(Debug)]
pub struct RunFailure {
    pub symbol: String,
    pub strategy: String,
    pub error: BacktestError,
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}: {}", self.symbol, self.strategy, self.error)
    }
}

/// Receives each successful run on the collecting thread
pub trait ReportSink {
    fn on_run(&mut self, artifacts: &RunArtifacts) -> Result<()>;

    /// Called once after every run has been delivered
    fn finish(&mut self, _records: &[MetricsRecord]) -> Result<()> {
        Ok(())
    }
}

/// Session output: ordered metrics rows plus the skipped runs
#[derive(Debug, Default)]
pub struct RunReport {
    pub records: Vec<MetricsRecord>,
    pub failures: Vec<RunFailure>,
    /// Number of (instrument, strategy) pairs requested
    pub requested: usize,
    pub execution_time_ms: u64,
}

impl RunReport {
    pub fn is_complete(&self) -> bool {
        self.records.len() == self.requested
    }

    pub fn records_for(&self, strategy: &str) -> impl Iterator<Item = &MetricsRecord> {
        let strategy = strategy.to_string();
        self.records.iter().filter(move |r| r.strategy == strategy)
    }
}

pub struct Runner {
    config: RunConfig,
}

impl Runner {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Signals, simulation and metrics for a single pair
    pub fn run_one(
        &self,
        series: &PriceSeries,
        strategy: &dyn SignalProvider,
    ) -> Result<RunArtifacts> {
        let signals = strategy.generate(series)?;
        let simulation = BacktestEngine::new(self.config.simulation.clone()).run(series, &signals)?;
        let metrics = MetricsCalculator::calculate(
            &simulation.trades,
            &simulation.equity_curve,
            &self.config.metrics,
        );
        let record = MetricsRecord::from_metrics(&series.symbol, strategy.name(), &metrics);

        Ok(RunArtifacts {
            record,
            metrics,
            simulation,
        })
    }

    /// Run every strategy over every instrument
    pub fn run_all(
        &self,
        instruments: &[PriceSeries],
        strategies: &[Box<dyn SignalProvider>],
    ) -> Result<RunReport> {
        self.run_all_with_sink(instruments, strategies, &mut NullSink)
    }

    /// Run every strategy over every instrument, forwarding each result to `sink`
    pub fn run_all_with_sink(
        &self,
        instruments: &[PriceSeries],
        strategies: &[Box<dyn SignalProvider>],
        sink: &mut dyn ReportSink,
    ) -> Result<RunReport> {
        self.config.validate()?;
        let start_time = Instant::now();

        let jobs: Vec<(&PriceSeries, &dyn SignalProvider)> = strategies
            .iter()
            .flat_map(|strategy| {
                instruments
                    .iter()
                    .map(move |series| (series, strategy.as_ref()))
            })
            .collect();

        info!(
            strategies = strategies.len(),
            instruments = instruments.len(),
            parallel = self.config.parallel,
            "starting backtest session"
        );

        let outcomes: Vec<Result<RunArtifacts>> = if self.config.parallel {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.threads.unwrap_or(0))
                .build()
                .map_err(|e| BacktestError::InvalidParameter(format!("thread pool: {}", e)))?;
            pool.install(|| {
                jobs.par_iter()
                    .map(|(series, strategy)| self.run_logged(series, *strategy))
                    .collect()
            })
        } else {
            jobs.iter()
                .map(|(series, strategy)| self.run_logged(series, *strategy))
                .collect()
        };

        // Single writer from here on
        let mut report = RunReport {
            requested: jobs.len(),
            ..Default::default()
        };
        for ((series, strategy), outcome) in jobs.iter().zip(outcomes) {
            match outcome {
                Ok(artifacts) => {
                    log_degenerate(&artifacts);
                    if let Err(e) = sink.on_run(&artifacts) {
                        warn!(
                            symbol = %series.symbol,
                            strategy = strategy.name(),
                            error = %e,
                            "report sink failed"
                        );
                    }
                    report.records.push(artifacts.record);
                }
                Err(error) => {
                    let failure = RunFailure {
                        symbol: series.symbol.clone(),
                        strategy: strategy.name().to_string(),
                        error,
                    };
                    warn!(
                        symbol = %failure.symbol,
                        strategy = %failure.strategy,
                        error = %failure.error,
                        "run skipped"
                    );
                    report.failures.push(failure);
                }
            }
        }

        sink.finish(&report.records)?;
        report.execution_time_ms = start_time.elapsed().as_millis() as u64;

        info!(
            completed = report.records.len(),
            failed = report.failures.len(),
            elapsed_ms = report.execution_time_ms,
            "backtest session finished"
        );

        Ok(report)
    }

    fn run_logged(
        &self,
        series: &PriceSeries,
        strategy: &dyn SignalProvider,
    ) -> Result<RunArtifacts> {
        debug!(symbol = %series.symbol, strategy = strategy.name(), bars = series.len(), "run");
        self.run_one(series, strategy)
    }
}

/// Zero-trade and zero-variance runs are valid but worth a note
fn log_degenerate(artifacts: &RunArtifacts) {
    let record = &artifacts.record;
    if artifacts.metrics.total_trades == 0 {
        debug!(symbol = %record.symbol, strategy = %record.strategy, "degenerate run: no trades");
    } else if record.sharpe == 0.0 {
        debug!(symbol = %record.symbol, strategy = %record.strategy, "degenerate run: zero variance");
    }
}

struct NullSink;

impl ReportSink for NullSink {
    fn on_run(&mut self, _artifacts: &RunArtifacts) -> Result<()> {
        Ok(())
    }
}
