use common::{BacktestError, PriceSeries, Result, SignalSeries};

use super::SignalProvider;
use crate::indicators::{calculate_bollinger_bands, calculate_rsi};

pub(crate) const NAME: &str = "RSI and Bollinger Bands";

/// Mean reversion on RSI extremes confirmed by a Bollinger Band break.
///
/// Buy when RSI is below `oversold` and the close is under the lower band;
/// sell when RSI is above `overbought` and the close is over the upper band.
#[derive(Debug, Clone)]
pub struct RsiBollinger {
    pub rsi_period: usize,
    pub bb_period: usize,
    pub bb_std_dev: f64,
    pub oversold: f64,
    pub overbought: f64,
}

impl Default for RsiBollinger {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            bb_period: 20,
            bb_std_dev: 2.0,
            oversold: 30.0,
            overbought: 70.0,
        }
    }
}

impl RsiBollinger {
    pub fn with_periods(mut self, rsi_period: usize, bb_period: usize) -> Self {
        self.rsi_period = rsi_period;
        self.bb_period = bb_period;
        self
    }

    pub fn with_thresholds(mut self, oversold: f64, overbought: f64) -> Self {
        self.oversold = oversold;
        self.overbought = overbought;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.rsi_period == 0 || self.bb_period == 0 {
            return Err(BacktestError::InvalidParameter(
                "RSI and Bollinger periods must be positive".to_string(),
            ));
        }
        if !(self.bb_std_dev.is_finite() && self.bb_std_dev >= 0.0) {
            return Err(BacktestError::InvalidParameter(format!(
                "invalid band width {}",
                self.bb_std_dev
            )));
        }
        if self.oversold >= self.overbought {
            return Err(BacktestError::InvalidParameter(format!(
                "oversold ({}) must be below overbought ({})",
                self.oversold, self.overbought
            )));
        }
        Ok(())
    }
}

impl SignalProvider for RsiBollinger {
    fn name(&self) -> &str {
        NAME
    }

    fn generate(&self, series: &PriceSeries) -> Result<SignalSeries> {
        self.validate()?;

        let closes = series.closes();
        let rsi = calculate_rsi(&closes, self.rsi_period);
        let bb = calculate_bollinger_bands(&closes, self.bb_period, self.bb_std_dev);

        let mut entry = vec![false; closes.len()];
        let mut exit = vec![false; closes.len()];

        for (i, close) in closes.iter().enumerate() {
            let Some(r) = rsi[i] else { continue };
            if let Some(lower) = bb.lower[i] {
                entry[i] = r < self.oversold && *close < lower;
            }
            if let Some(upper) = bb.upper[i] {
                exit[i] = r > self.overbought && *close > upper;
            }
        }

        Ok(SignalSeries::new(series.timestamps(), entry, exit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::test_support::series_from_closes;

    #[test]
    fn test_signals_aligned() {
        let series = series_from_closes(&[100.0, 105.0, 110.0, 115.0, 120.0]);
        let signals = RsiBollinger::default().generate(&series).unwrap();

        assert_eq!(signals.len(), 5);
        // Not enough data for either indicator
        assert_eq!(signals.entry_count(), 0);
        assert_eq!(signals.exit_count(), 0);
    }

    #[test]
    fn test_crash_then_spike() {
        let mut closes = vec![100.0; 10];
        closes.extend([99.0, 98.0, 80.0]); // sharp selloff
        closes.extend([100.0, 101.0, 120.0]); // sharp rally
        let series = series_from_closes(&closes);
        let strategy = RsiBollinger::default().with_periods(3, 10);

        let signals = strategy.generate(&series).unwrap();

        assert!(signals.entry[12]);
        assert!(signals.exit[15]);
        assert!(signals.entry[..10].iter().all(|e| !e));
    }

    #[test]
    fn test_invalid_thresholds() {
        let series = series_from_closes(&[1.0; 30]);
        let strategy = RsiBollinger::default().with_thresholds(70.0, 30.0);
        assert!(strategy.generate(&series).is_err());
    }
}
