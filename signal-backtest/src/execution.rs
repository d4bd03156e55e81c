//! Deterministic fill model
//!
//! Every order fills in full at the bar close, moved adversely by a fixed
//! slippage fraction, and pays a fee proportional to the filled notional.

use common::{Result, Side, SimulationConfig};

/// Result of a simulated fill
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub side: Side,
    /// Final execution price (after slippage)
    pub fill_price: f64,
    pub quantity: f64,
    /// `quantity * fill_price`
    pub notional: f64,
    pub fee: f64,
    pub price_adjustments: PriceAdjustments,
}

/// Breakdown of price adjustments applied
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceAdjustments {
    pub base_price: f64,
    pub slippage: f64,
}

/// Fee and slippage model shared by entries and exits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    fee_rate: f64,
    slippage_rate: f64,
}

impl CostModel {
    pub fn new(fee_rate: f64, slippage_rate: f64) -> Self {
        Self {
            fee_rate,
            slippage_rate,
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config.fee_rate, config.slippage_rate))
    }

    pub fn fee_rate(&self) -> f64 {
        self.fee_rate
    }

    pub fn slippage_rate(&self) -> f64 {
        self.slippage_rate
    }

    /// Price paid when buying at `price`
    pub fn buy_price(&self, price: f64) -> f64 {
        price * (1.0 + self.slippage_rate)
    }

    /// Price received when selling at `price`
    pub fn sell_price(&self, price: f64) -> f64 {
        price * (1.0 - self.slippage_rate)
    }

    pub fn fee(&self, notional: f64) -> f64 {
        notional * self.fee_rate
    }

    /// Buy with the whole of `cash`, fractional units allowed.
    ///
    /// The fee is charged on top of the notional, so the cash left after
    /// the fill is `-fee`.
    pub fn buy_all(&self, price: f64, cash: f64) -> Fill {
        let fill_price = self.buy_price(price);
        let quantity = cash / fill_price;
        self.fill(Side::Buy, price, fill_price, quantity)
    }

    pub fn sell(&self, price: f64, quantity: f64) -> Fill {
        let fill_price = self.sell_price(price);
        self.fill(Side::Sell, price, fill_price, quantity)
    }

    fn fill(&self, side: Side, base_price: f64, fill_price: f64, quantity: f64) -> Fill {
        let notional = quantity * fill_price;
        Fill {
            side,
            fill_price,
            quantity,
            notional,
            fee: self.fee(notional),
            price_adjustments: PriceAdjustments {
                base_price,
                slippage: fill_price - base_price,
            },
        }
    }
}

impl Default for CostModel {
    fn default() -> Self {
        let config = SimulationConfig::default();
        Self::new(config.fee_rate, config.slippage_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_frictionless_fills_at_close() {
        let model = CostModel::new(0.0, 0.0);
        let fill = model.buy_all(100.0, 1000.0);

        assert_eq!(fill.fill_price, 100.0);
        assert_eq!(fill.quantity, 10.0);
        assert_eq!(fill.fee, 0.0);
        assert_eq!(fill.price_adjustments.slippage, 0.0);
    }

    #[test]
    fn test_slippage_is_adverse() {
        let model = CostModel::new(0.0, 0.01);

        let buy = model.buy_all(100.0, 1000.0);
        assert_relative_eq!(buy.fill_price, 101.0);
        assert!(buy.price_adjustments.slippage > 0.0);

        let sell = model.sell(100.0, 5.0);
        assert_relative_eq!(sell.fill_price, 99.0);
        assert!(sell.price_adjustments.slippage < 0.0);
        assert_eq!(sell.side, Side::Sell);
    }

    #[test]
    fn test_buy_all_spends_cash_and_charges_fee() {
        let model = CostModel::new(0.001, 0.001);
        let fill = model.buy_all(50.0, 1000.0);

        assert_relative_eq!(fill.notional, 1000.0, epsilon = 1e-9);
        assert_relative_eq!(fill.fee, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_from_config_rejects_negative_fee() {
        let config = SimulationConfig::default().with_fee_rate(-0.1);
        assert!(CostModel::from_config(&config).is_err());
    }
}
