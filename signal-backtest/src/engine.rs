use chrono::{DateTime, Utc};
use common::{EquityCurve, PriceSeries, Result, SignalSeries, SimulationConfig, Trade};
use tracing::trace;

use crate::execution::CostModel;
use crate::metrics::MetricsCalculator;
use crate::portfolio::Portfolio;

/// Output of one simulation run
#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub trades: Vec<Trade>,
    pub equity_curve: EquityCurve,
    pub initial_cash: f64,
    pub final_equity: f64,
}

impl SimulationResult {
    pub fn drawdown_curve(&self) -> Vec<(DateTime<Utc>, f64)> {
        MetricsCalculator::calculate_drawdown_curve(&self.equity_curve)
    }

    pub fn forced_close(&self) -> Option<&Trade> {
        self.trades.last().filter(|t| t.forced_close)
    }
}

/// Bar-by-bar long-only trade simulator driven by entry/exit signals
pub struct BacktestEngine {
    config: SimulationConfig,
}

impl BacktestEngine {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Run the simulation over `series` using `signals`.
    ///
    /// On each bar an open position is closed if `exit` is set; otherwise a flat
    /// book opens a fully invested long if `entry` is set. Exit wins when both
    /// flags are set, so a position is never closed and reopened on the same
    /// bar. Equity is marked at the close of every bar. A position still open
    /// after the last bar is closed there and flagged `forced_close`; the
    /// curve keeps the mark-to-market value and `final_equity` holds the
    /// cash after that close.
    pub fn run(&self, series: &PriceSeries, signals: &SignalSeries) -> Result<SimulationResult> {
        let costs = CostModel::from_config(&self.config)?;
        series.validate()?;
        signals.validate_against(series)?;

        let bars = &series.bars;
        let mut portfolio = Portfolio::new(self.config.initial_cash);
        let mut equity_curve: EquityCurve = Vec::with_capacity(bars.len());

        for (i, bar) in bars.iter().enumerate() {
            if portfolio.has_position() {
                if signals.exit[i] {
                    let quantity = portfolio
                        .current_position()
                        .map(|p| p.quantity)
                        .unwrap_or(0.0);
                    let fill = costs.sell(bar.close, quantity);
                    portfolio.close_position(&fill, bar.timestamp, i, false);
                    trace!(bar = i, price = fill.fill_price, "exit");
                }
            } else if signals.entry[i] {
                let fill = costs.buy_all(bar.close, portfolio.cash());
                portfolio.open_position(&fill, bar.timestamp, i)?;
                trace!(bar = i, price = fill.fill_price, qty = fill.quantity, "entry");
            }

            equity_curve.push((bar.timestamp, portfolio.equity(bar.close)));
        }

        // Close any remaining position at the last bar
        if let (Some(pos), Some(last)) = (portfolio.current_position(), bars.last()) {
            let fill = costs.sell(last.close, pos.quantity);
            let last_index = bars.len() - 1;
            portfolio.close_position(&fill, last.timestamp, last_index, true);
        }

        // Flat from here, so cash is the realized equity
        let final_equity = portfolio.cash();

        Ok(SimulationResult {
            trades: portfolio.into_trades(),
            equity_curve,
            initial_cash: self.config.initial_cash,
            final_equity,
        })
    }
}

/// Convenience wrapper around [`BacktestEngine::run`]
pub fn simulate(
    series: &PriceSeries,
    signals: &SignalSeries,
    config: &SimulationConfig,
) -> Result<SimulationResult> {
    BacktestEngine::new(config.clone()).run(series, signals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone};
    use common::{BacktestError, Bar};

    fn make_series(closes: &[f64]) -> PriceSeries {
        let start = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new(start + Duration::minutes(i as i64), c, c, c, c, 1.0))
            .collect();
        PriceSeries::new("TEST", bars)
    }

    fn make_signals(series: &PriceSeries, entry: &[bool], exit: &[bool]) -> SignalSeries {
        SignalSeries::new(series.timestamps(), entry.to_vec(), exit.to_vec())
    }

    #[test]
    fn test_reference_scenario() {
        let series = make_series(&[100.0, 110.0, 90.0, 120.0]);
        let signals = make_signals(
            &series,
            &[true, false, false, false],
            &[false, false, true, false],
        );

        let result = simulate(&series, &signals, &SimulationConfig::frictionless(1000.0)).unwrap();

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.quantity, 10.0);
        assert_eq!(trade.entry_index, 0);
        assert_eq!(trade.exit_index, 2);
        assert_eq!(trade.exit_price, 90.0);
        assert_eq!(trade.net_pnl, -100.0);
        assert_eq!(trade.duration_bars, 2);
        assert!(!trade.forced_close);

        let equity: Vec<f64> = result.equity_curve.iter().map(|(_, e)| *e).collect();
        assert_eq!(equity, vec![1000.0, 1100.0, 900.0, 900.0]);
        assert_eq!(result.final_equity, 900.0);
    }

    #[test]
    fn test_no_signals_keeps_cash() {
        let series = make_series(&[10.0, 12.0, 8.0]);
        let signals = SignalSeries::flat(&series);

        let result = simulate(&series, &signals, &SimulationConfig::default()).unwrap();

        assert!(result.trades.is_empty());
        assert!(result.equity_curve.iter().all(|(_, e)| *e == 1000.0));
    }

    #[test]
    fn test_exit_takes_precedence_over_entry() {
        let series = make_series(&[100.0, 105.0, 110.0, 115.0]);
        let signals = make_signals(
            &series,
            &[true, true, true, false],
            &[false, true, false, false],
        );

        let result = simulate(&series, &signals, &SimulationConfig::frictionless(1000.0)).unwrap();

        // Bar 1 exits only; bar 2 re-enters; bar 3 forces the close
        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.trades[0].exit_index, 1);
        assert_eq!(result.trades[1].entry_index, 2);
        assert!(result.trades[1].forced_close);
    }

    #[test]
    fn test_flat_bar_with_both_flags_enters() {
        let series = make_series(&[100.0, 100.0]);
        let signals = make_signals(&series, &[true, false], &[true, false]);

        let result = simulate(&series, &signals, &SimulationConfig::frictionless(1000.0)).unwrap();

        // Exit while flat is ignored, the entry still opens
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].entry_index, 0);
        assert!(result.trades[0].forced_close);
    }

    #[test]
    fn test_forced_close_at_last_bar() {
        let series = make_series(&[100.0, 120.0, 150.0]);
        let signals = make_signals(&series, &[false, true, false], &[false, false, false]);
        let config = SimulationConfig::default()
            .with_fee_rate(0.001)
            .with_slippage_rate(0.001);

        let result = simulate(&series, &signals, &config).unwrap();

        assert_eq!(result.trades.len(), 1);
        let trade = result.forced_close().unwrap();
        assert_eq!(trade.exit_index, 2);
        assert_relative_eq!(trade.exit_price, 150.0 * 0.999);
        assert_eq!(trade.duration_bars, 1);
        // Final equity reflects the realized close
        assert_relative_eq!(result.final_equity, 1000.0 + trade.net_pnl, epsilon = 1e-9);
    }

    #[test]
    fn test_forced_close_keeps_marked_curve() {
        let series = make_series(&[100.0, 120.0]);
        let signals = make_signals(&series, &[true, false], &[false, false]);
        let config = SimulationConfig::default()
            .with_fee_rate(0.01)
            .with_slippage_rate(0.01);

        let result = simulate(&series, &signals, &config).unwrap();

        // 1000 buys at 101; the 10.0 entry fee leaves cash at -10
        let quantity = 1000.0 / 101.0;
        assert_relative_eq!(result.equity_curve[0].1, -10.0 + quantity * 100.0, epsilon = 1e-9);
        assert_relative_eq!(result.equity_curve[1].1, -10.0 + quantity * 120.0, epsilon = 1e-9);
        assert_relative_eq!(
            result.final_equity,
            -10.0 + quantity * 118.8 * 0.99,
            epsilon = 1e-9
        );
        assert!(result.final_equity < result.equity_curve[1].1);
        assert_relative_eq!(
            result.final_equity,
            1000.0 + result.trades[0].net_pnl,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_entries_while_long_are_ignored() {
        let series = make_series(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let signals = make_signals(&series, &[true; 5], &[false; 5]);

        let result = simulate(&series, &signals, &SimulationConfig::frictionless(1000.0)).unwrap();

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].quantity, 100.0);
        assert_eq!(result.final_equity, 1400.0);
    }

    #[test]
    fn test_single_bar_series() {
        let series = make_series(&[50.0]);
        let signals = make_signals(&series, &[true], &[false]);

        let result = simulate(&series, &signals, &SimulationConfig::frictionless(500.0)).unwrap();

        assert_eq!(result.equity_curve.len(), 1);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].duration_bars, 0);
        assert!(result.trades[0].forced_close);
    }

    #[test]
    fn test_invalid_inputs() {
        let series = make_series(&[10.0, 11.0]);
        let short = make_signals(&series, &[true], &[false]);
        let err = simulate(&series, &short, &SimulationConfig::default()).unwrap_err();
        assert!(err.is_invalid_input());

        let empty = make_series(&[]);
        let err = simulate(&empty, &SignalSeries::flat(&empty), &SimulationConfig::default())
            .unwrap_err();
        assert!(matches!(err, BacktestError::EmptySeries { .. }));

        let bad = make_series(&[10.0, -1.0]);
        let err = simulate(&bad, &SignalSeries::flat(&bad), &SimulationConfig::default())
            .unwrap_err();
        assert!(matches!(err, BacktestError::InvalidPrice { index: 1, .. }));

        let config = SimulationConfig::default().with_cash(-5.0);
        let err = simulate(&series, &SignalSeries::flat(&series), &config).unwrap_err();
        assert!(matches!(err, BacktestError::InvalidParameter(_)));
    }

    #[test]
    fn test_backtest_performance() {
        let closes: Vec<f64> = (0..50_000).map(|i| 100.0 + (i as f64 * 0.01).sin()).collect();
        let series = make_series(&closes);
        let entry: Vec<bool> = (0..closes.len()).map(|i| i % 100 == 0).collect();
        let exit: Vec<bool> = (0..closes.len()).map(|i| i % 100 == 50).collect();
        let signals = make_signals(&series, &entry, &exit);

        let result = simulate(&series, &signals, &SimulationConfig::default()).unwrap();

        assert_eq!(result.trades.len(), 500);
        assert_eq!(result.equity_curve.len(), closes.len());
    }
}
