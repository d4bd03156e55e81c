use chrono::{DateTime, Utc};
use common::{MetricsConfig, MetricsRecord, PerformanceMetrics, Trade};

/// Calculate performance metrics from equity curve and trades.
///
/// Every function is pure: the same ledger and curve always produce the same
/// numbers. Degenerate inputs (no trades, flat equity) produce documented
/// zero values rather than NaN.
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Calculate all performance metrics
    pub fn calculate(
        trades: &[Trade],
        equity_curve: &[(DateTime<Utc>, f64)],
        config: &MetricsConfig,
    ) -> PerformanceMetrics {
        if equity_curve.is_empty() {
            return PerformanceMetrics::default();
        }

        let period_returns = Self::calculate_period_returns(equity_curve);

        // Win rate and expectancy may leave out forced closes
        let scored: Vec<&Trade> = trades
            .iter()
            .filter(|t| config.include_forced_closes || !t.forced_close)
            .collect();
        let winning_trades = scored.iter().filter(|t| t.is_winner()).count();
        let losing_trades = scored.iter().filter(|t| t.net_pnl < 0.0).count();

        PerformanceMetrics {
            total_return_pct: Self::calculate_total_return(equity_curve),
            sharpe_ratio: Self::calculate_sharpe_ratio(&period_returns, config.bars_per_year),
            max_drawdown_pct: Self::calculate_max_drawdown(equity_curve),
            win_rate_pct: Self::calculate_win_rate(&scored),
            expectancy: Self::calculate_expectancy(&scored),
            exposure_time_pct: Self::calculate_exposure(equity_curve, trades),
            total_trades: trades.len(),
            winning_trades,
            losing_trades,
            forced_closes: trades.iter().filter(|t| t.forced_close).count(),
        }
    }

    /// Calculate metrics and label them for the report
    pub fn record(
        symbol: &str,
        strategy: &str,
        trades: &[Trade],
        equity_curve: &[(DateTime<Utc>, f64)],
        config: &MetricsConfig,
    ) -> MetricsRecord {
        let metrics = Self::calculate(trades, equity_curve, config);
        MetricsRecord::from_metrics(symbol, strategy, &metrics)
    }

    /// (last / first - 1) * 100
    pub fn calculate_total_return(equity_curve: &[(DateTime<Utc>, f64)]) -> f64 {
        match (equity_curve.first(), equity_curve.last()) {
            (Some((_, first)), Some((_, last))) if *first != 0.0 => (last / first - 1.0) * 100.0,
            _ => 0.0,
        }
    }

    /// Bar-over-bar simple returns
    pub fn calculate_period_returns(equity_curve: &[(DateTime<Utc>, f64)]) -> Vec<f64> {
        equity_curve
            .windows(2)
            .map(|w| {
                let prev = w[0].1;
                let curr = w[1].1;
                if prev != 0.0 {
                    curr / prev - 1.0
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// Annualized Sharpe ratio with zero risk-free rate.
    ///
    /// Uses the sample standard deviation. Returns 0.0 with fewer than two
    /// returns or zero deviation.
    pub fn calculate_sharpe_ratio(period_returns: &[f64], bars_per_year: f64) -> f64 {
        if period_returns.len() < 2 {
            return 0.0;
        }

        let n = period_returns.len() as f64;
        let mean = period_returns.iter().sum::<f64>() / n;
        let variance = period_returns
            .iter()
            .map(|r| (r - mean).powi(2))
            .sum::<f64>()
            / (n - 1.0);
        let std_dev = variance.sqrt();

        if std_dev == 0.0 || !std_dev.is_finite() {
            return 0.0;
        }

        mean / std_dev * bars_per_year.sqrt()
    }

    /// Deepest fall below the running peak, in percent (<= 0, >= -100)
    pub fn calculate_max_drawdown(equity_curve: &[(DateTime<Utc>, f64)]) -> f64 {
        Self::calculate_drawdown_curve(equity_curve)
            .into_iter()
            .map(|(_, dd)| dd)
            .fold(0.0, f64::min)
    }

    /// Calculate drawdown curve: percent below the running peak for every bar
    pub fn calculate_drawdown_curve(
        equity_curve: &[(DateTime<Utc>, f64)],
    ) -> Vec<(DateTime<Utc>, f64)> {
        let Some((_, first)) = equity_curve.first() else {
            return vec![];
        };

        let mut max_equity = *first;
        equity_curve
            .iter()
            .map(|(ts, equity)| {
                if *equity > max_equity {
                    max_equity = *equity;
                }
                let drawdown = if max_equity > 0.0 {
                    ((equity / max_equity - 1.0) * 100.0).clamp(-100.0, 0.0)
                } else {
                    0.0
                };
                (*ts, drawdown)
            })
            .collect()
    }

    /// Share of trades with positive net PnL, in percent
    fn calculate_win_rate(trades: &[&Trade]) -> f64 {
        if trades.is_empty() {
            return 0.0;
        }
        let winning = trades.iter().filter(|t| t.is_winner()).count();
        winning as f64 / trades.len() as f64 * 100.0
    }

    /// Mean net PnL per trade
    fn calculate_expectancy(trades: &[&Trade]) -> f64 {
        if trades.is_empty() {
            return 0.0;
        }
        trades.iter().map(|t| t.net_pnl).sum::<f64>() / trades.len() as f64
    }

    /// Bars spent in a position over total bars, in percent
    fn calculate_exposure(equity_curve: &[(DateTime<Utc>, f64)], trades: &[Trade]) -> f64 {
        if equity_curve.is_empty() {
            return 0.0;
        }
        let invested_bars: usize = trades.iter().map(|t| t.duration_bars).sum();
        invested_bars as f64 / equity_curve.len() as f64 * 100.0
    }
}

/// Metrics for one run with the default forced-close policy
pub fn compute_metrics(
    trades: &[Trade],
    equity_curve: &[(DateTime<Utc>, f64)],
    bars_per_year: f64,
) -> PerformanceMetrics {
    let config = MetricsConfig {
        bars_per_year,
        ..Default::default()
    };
    MetricsCalculator::calculate(trades, equity_curve, &config)
}
