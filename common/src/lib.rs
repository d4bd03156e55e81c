pub mod config;
pub mod error;
pub mod types;

pub use config::{Interval, MetricsConfig, RunConfig, SimulationConfig};
pub use error::{BacktestError, Result};
pub use types::*;
