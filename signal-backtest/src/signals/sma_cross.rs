use common::{BacktestError, PriceSeries, Result, SignalSeries};

use super::SignalProvider;
use crate::indicators::{calculate_sma, crossed_above, crossed_below};

pub(crate) const NAME: &str = "SMA Crossover";

/// Buy when the fast SMA crosses above the slow SMA, sell when it crosses below
#[derive(Debug, Clone)]
pub struct SmaCrossover {
    pub fast_window: usize,
    pub slow_window: usize,
}

impl Default for SmaCrossover {
    fn default() -> Self {
        Self {
            fast_window: 150,
            slow_window: 250,
        }
    }
}

impl SmaCrossover {
    pub fn new(fast_window: usize, slow_window: usize) -> Result<Self> {
        if fast_window == 0 || slow_window == 0 {
            return Err(BacktestError::InvalidParameter(
                "SMA windows must be positive".to_string(),
            ));
        }
        if fast_window >= slow_window {
            return Err(BacktestError::InvalidParameter(format!(
                "fast window ({}) must be shorter than slow window ({})",
                fast_window, slow_window
            )));
        }
        Ok(Self {
            fast_window,
            slow_window,
        })
    }
}

impl SignalProvider for SmaCrossover {
    fn name(&self) -> &str {
        NAME
    }

    fn generate(&self, series: &PriceSeries) -> Result<SignalSeries> {
        let closes = series.closes();
        let fast = calculate_sma(&closes, self.fast_window);
        let slow = calculate_sma(&closes, self.slow_window);

        Ok(SignalSeries::new(
            series.timestamps(),
            crossed_above(&fast, &slow),
            crossed_below(&fast, &slow),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::test_support::series_from_closes;

    #[test]
    fn test_signals_aligned() {
        let series = series_from_closes(&[100.0, 105.0, 110.0, 115.0, 120.0, 125.0]);
        let strategy = SmaCrossover::new(3, 5).unwrap();

        let signals = strategy.generate(&series).unwrap();

        assert_eq!(signals.len(), 6);
        assert!(signals.validate_against(&series).is_ok());
        // Steady uptrend: fast is above slow from the first defined bar, no crossing
        assert_eq!(signals.entry_count(), 0);
        assert_eq!(signals.exit_count(), 0);
    }

    #[test]
    fn test_crossover_up_and_down() {
        let closes = [10.0, 10.0, 10.0, 10.0, 14.0, 16.0, 16.0, 8.0, 6.0, 6.0];
        let series = series_from_closes(&closes);
        let strategy = SmaCrossover::new(2, 4).unwrap();

        let signals = strategy.generate(&series).unwrap();

        // fast(2) leaves slow(4) upward on bar 4 and drops below on bar 7
        assert!(signals.entry[4]);
        assert_eq!(signals.entry_count(), 1);
        assert!(signals.exit[7]);
        assert_eq!(signals.exit_count(), 1);
    }

    #[test]
    fn test_invalid_windows() {
        assert!(SmaCrossover::new(0, 5).is_err());
        assert!(SmaCrossover::new(10, 10).is_err());
    }
}
