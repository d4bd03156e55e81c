use common::{BacktestError, PriceSeries, Result, SignalSeries};

use super::SignalProvider;
use crate::indicators::calculate_vwap;

pub(crate) const NAME: &str = "VWAP Reversion";

/// Trade price deviations from the cumulative VWAP.
///
/// Buy when the close is more than `deviation_threshold` below VWAP, sell
/// when it is more than the same fraction above.
#[derive(Debug, Clone)]
pub struct VwapReversion {
    pub deviation_threshold: f64,
}

impl Default for VwapReversion {
    fn default() -> Self {
        Self {
            deviation_threshold: 0.01,
        }
    }
}

impl VwapReversion {
    pub fn new(deviation_threshold: f64) -> Result<Self> {
        if !deviation_threshold.is_finite() || deviation_threshold < 0.0 {
            return Err(BacktestError::InvalidParameter(format!(
                "deviation threshold must be >= 0, got {}",
                deviation_threshold
            )));
        }
        Ok(Self {
            deviation_threshold,
        })
    }
}

impl SignalProvider for VwapReversion {
    fn name(&self) -> &str {
        NAME
    }

    fn generate(&self, series: &PriceSeries) -> Result<SignalSeries> {
        let closes = series.closes();
        let vwap = calculate_vwap(&closes, &series.volumes());
        let lower = 1.0 - self.deviation_threshold;
        let upper = 1.0 + self.deviation_threshold;

        let (entry, exit): (Vec<bool>, Vec<bool>) = closes
            .iter()
            .zip(vwap.iter())
            .map(|(close, vwap)| match vwap {
                Some(v) => (*close < v * lower, *close > v * upper),
                None => (false, false),
            })
            .unzip();

        Ok(SignalSeries::new(series.timestamps(), entry, exit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::test_support::{series_from_closes, series_with_volume};

    #[test]
    fn test_uptrend_exits_only() {
        let series = series_with_volume(
            &[100.0, 105.0, 110.0, 115.0, 120.0],
            &[1000.0, 1200.0, 1300.0, 1400.0, 1500.0],
        );

        let signals = VwapReversion::default().generate(&series).unwrap();

        assert_eq!(signals.len(), 5);
        // Price keeps running ahead of its VWAP
        assert_eq!(signals.entry_count(), 0);
        assert!(!signals.exit[0]);
        assert!(signals.exit[1..].iter().all(|&e| e));
    }

    #[test]
    fn test_dip_below_vwap_enters() {
        let series = series_from_closes(&[100.0, 100.0, 97.0, 100.0]);

        let signals = VwapReversion::default().generate(&series).unwrap();

        // VWAP at bar 2 = 99, 97 < 98.01
        assert_eq!(signals.entry, vec![false, false, true, false]);
        assert_eq!(signals.exit_count(), 0);
    }

    #[test]
    fn test_zero_volume_never_signals() {
        let series = series_with_volume(&[100.0, 50.0], &[0.0, 0.0]);
        let signals = VwapReversion::default().generate(&series).unwrap();

        assert_eq!(signals.entry_count() + signals.exit_count(), 0);
    }

    #[test]
    fn test_negative_threshold_rejected() {
        assert!(VwapReversion::new(-0.5).is_err());
    }
}
