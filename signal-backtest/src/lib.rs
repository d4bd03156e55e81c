pub mod data;
pub mod engine;
pub mod execution;
pub mod indicators;
pub mod metrics;
pub mod portfolio;
pub mod report;
pub mod runner;
pub mod signals;

pub use data::{generate_synthetic_bars, generate_universe, load_dir, load_file, load_multi_symbol_csv};
pub use engine::{simulate, BacktestEngine, SimulationResult};
pub use execution::{CostModel, Fill, PriceAdjustments};
pub use metrics::{compute_metrics, MetricsCalculator};
pub use portfolio::Portfolio;
pub use report::{load_all_metrics, summarize_by_strategy, CsvReportWriter, StrategySummary};
pub use runner::{ReportSink, RunArtifacts, RunFailure, RunReport, Runner};
pub use signals::{RsiBollinger, SignalProvider, SmaCrossover, StrategyKind, VwapReversion};

// Re-export common types
pub use common::{
    BacktestError, Bar, EquityCurve, Interval, MetricsConfig, MetricsRecord, PerformanceMetrics,
    Position, PriceSeries, Result, RunConfig, Side, SignalSeries, SimulationConfig, Trade,
};
