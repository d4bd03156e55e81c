//! Signal providers
//!
//! A strategy is a pure function from a price series to aligned entry/exit
//! flags. The orchestrator only sees the [`SignalProvider`] trait.

pub mod rsi_bollinger;
pub mod sma_cross;
pub mod vwap_reversion;

use std::fmt;

use clap::ValueEnum;
use common::{PriceSeries, Result, SignalSeries};

pub use rsi_bollinger::RsiBollinger;
pub use sma_cross::SmaCrossover;
pub use vwap_reversion::VwapReversion;

/// Strategy contract used by the run orchestrator
pub trait SignalProvider: Send + Sync {
    /// Human-readable strategy identifier, used in reports
    fn name(&self) -> &str;

    /// Produce entry/exit flags aligned with `series`
    fn generate(&self, series: &PriceSeries) -> Result<SignalSeries>;
}

/// Built-in strategies selectable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyKind {
    #[value(name = "vwap")]
    VwapReversion,
    #[value(name = "rsi-bb")]
    RsiBollinger,
    #[value(name = "sma")]
    SmaCrossover,
}

impl StrategyKind {
    /// All built-in strategies, in report order
    pub fn all() -> Vec<StrategyKind> {
        vec![
            StrategyKind::VwapReversion,
            StrategyKind::RsiBollinger,
            StrategyKind::SmaCrossover,
        ]
    }

    /// Instance with default parameters
    pub fn build(&self) -> Box<dyn SignalProvider> {
        match self {
            StrategyKind::VwapReversion => Box::new(VwapReversion::default()),
            StrategyKind::RsiBollinger => Box::new(RsiBollinger::default()),
            StrategyKind::SmaCrossover => Box::new(SmaCrossover::default()),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::VwapReversion => vwap_reversion::NAME,
            StrategyKind::RsiBollinger => rsi_bollinger::NAME,
            StrategyKind::SmaCrossover => sma_cross::NAME,
        };
        f.write_str(name)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{Duration, TimeZone, Utc};
    use common::{Bar, PriceSeries};

    pub fn series_from_closes(closes: &[f64]) -> PriceSeries {
        series_with_volume(closes, &vec![1000.0; closes.len()])
    }

    pub fn series_with_volume(closes: &[f64], volumes: &[f64]) -> PriceSeries {
        let start = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let bars = closes
            .iter()
            .zip(volumes.iter())
            .enumerate()
            .map(|(i, (&c, &v))| Bar::new(start + Duration::minutes(i as i64), c, c, c, c, v))
            .collect();
        PriceSeries::new("BTCUSDT", bars)
    }
}
