use chrono::{DateTime, Utc};
use common::{BacktestError, Position, Result, Trade};

use crate::execution::Fill;

/// Single-instrument cash account holding at most one long position
#[derive(Debug)]
pub struct Portfolio {
    cash: f64,
    position: Option<Position>,
    trades: Vec<Trade>,
}

impl Portfolio {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            cash: initial_cash,
            position: None,
            trades: Vec::new(),
        }
    }

    /// Get current equity, marking any open position at `mark_price`
    pub fn equity(&self, mark_price: f64) -> f64 {
        self.cash + self.position_value(mark_price)
    }

    /// Get position market value
    pub fn position_value(&self, mark_price: f64) -> f64 {
        self.position
            .as_ref()
            .map(|p| p.market_value(mark_price))
            .unwrap_or(0.0)
    }

    /// Get available cash
    pub fn cash(&self) -> f64 {
        self.cash
    }

    /// Check if there's an open position
    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    /// Get current position reference
    pub fn current_position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    /// Get all closed trades
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn into_trades(self) -> Vec<Trade> {
        self.trades
    }

    /// Open a long position from a buy fill. Cash is reduced by notional plus fee.
    pub fn open_position(
        &mut self,
        fill: &Fill,
        timestamp: DateTime<Utc>,
        bar_index: usize,
    ) -> Result<()> {
        if let Some(pos) = &self.position {
            return Err(BacktestError::PositionAlreadyOpen {
                entry_index: pos.entry_index,
            });
        }

        self.cash -= fill.notional + fill.fee;
        self.position = Some(Position {
            quantity: fill.quantity,
            entry_price: fill.fill_price,
            entry_date: timestamp,
            entry_index: bar_index,
            entry_fee: fill.fee,
        });

        Ok(())
    }

    /// Close the open position with a sell fill, appending the trade to the ledger
    pub fn close_position(
        &mut self,
        fill: &Fill,
        timestamp: DateTime<Utc>,
        bar_index: usize,
        forced_close: bool,
    ) -> Option<Trade> {
        let position = self.position.take()?;

        let proceeds = position.quantity * fill.fill_price;
        let entry_notional = position.entry_notional();
        let gross_pnl = proceeds - entry_notional;
        let net_pnl = gross_pnl - position.entry_fee - fill.fee;

        self.cash += proceeds - fill.fee;

        let trade = Trade {
            entry_date: position.entry_date,
            entry_price: position.entry_price,
            entry_index: position.entry_index,
            exit_date: timestamp,
            exit_price: fill.fill_price,
            exit_index: bar_index,
            quantity: position.quantity,
            entry_fee: position.entry_fee,
            exit_fee: fill.fee,
            gross_pnl,
            net_pnl,
            return_pct: if entry_notional > 0.0 {
                net_pnl / entry_notional
            } else {
                0.0
            },
            duration_bars: bar_index.saturating_sub(position.entry_index),
            forced_close,
        };

        self.trades.push(trade.clone());
        Some(trade)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::CostModel;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_portfolio_new() {
        let portfolio = Portfolio::new(1000.0);
        assert_eq!(portfolio.equity(123.0), 1000.0);
        assert_eq!(portfolio.cash(), 1000.0);
        assert!(!portfolio.has_position());
    }

    #[test]
    fn test_open_and_close_position() {
        let model = CostModel::new(0.0, 0.0);
        let mut portfolio = Portfolio::new(1000.0);

        let buy = model.buy_all(50.0, portfolio.cash());
        portfolio.open_position(&buy, now(), 3).unwrap();

        assert!(portfolio.has_position());
        assert_eq!(portfolio.cash(), 0.0);
        assert_eq!(portfolio.position_value(50.0), 1000.0);
        assert_eq!(portfolio.equity(55.0), 1100.0);

        let sell = model.sell(55.0, 20.0);
        let trade = portfolio.close_position(&sell, now(), 7, false).unwrap();

        assert!(!portfolio.has_position());
        assert_eq!(portfolio.cash(), 1100.0);
        assert_eq!(trade.gross_pnl, 100.0);
        assert_eq!(trade.net_pnl, 100.0);
        assert_eq!(trade.return_pct, 0.1);
        assert_eq!(trade.duration_bars, 4);
        assert!(!trade.forced_close);
        assert_eq!(portfolio.trades().len(), 1);
    }

    #[test]
    fn test_fees_reduce_net_pnl() {
        let model = CostModel::new(0.01, 0.0);
        let mut portfolio = Portfolio::new(1000.0);

        let buy = model.buy_all(100.0, portfolio.cash());
        portfolio.open_position(&buy, now(), 0).unwrap();
        // Fee is paid on top of the fully invested notional
        assert_relative_eq!(portfolio.cash(), -10.0, epsilon = 1e-9);

        let sell = model.sell(100.0, 10.0);
        let trade = portfolio.close_position(&sell, now(), 1, false).unwrap();

        assert_relative_eq!(trade.gross_pnl, 0.0, epsilon = 1e-9);
        assert_relative_eq!(trade.total_fees(), 20.0, epsilon = 1e-9);
        assert_relative_eq!(trade.net_pnl, -20.0, epsilon = 1e-9);
        assert_relative_eq!(portfolio.cash(), 980.0, epsilon = 1e-9);
    }

    #[test]
    fn test_cannot_open_twice() {
        let model = CostModel::new(0.0, 0.0);
        let mut portfolio = Portfolio::new(1000.0);

        let buy = model.buy_all(10.0, portfolio.cash());
        portfolio.open_position(&buy, now(), 0).unwrap();
        let err = portfolio.open_position(&buy, now(), 1).unwrap_err();

        assert!(matches!(err, BacktestError::PositionAlreadyOpen { entry_index: 0 }));
    }

    #[test]
    fn test_close_without_position() {
        let model = CostModel::new(0.0, 0.0);
        let mut portfolio = Portfolio::new(1000.0);

        let sell = model.sell(10.0, 1.0);
        assert!(portfolio.close_position(&sell, now(), 0, false).is_none());
        assert_eq!(portfolio.cash(), 1000.0);
    }
}
