/// Calculate RSI from simple rolling means of gains and losses
///
/// # Arguments
/// * `prices` - Slice of closing prices
/// * `period` - Number of price changes averaged (typically 14)
///
/// # Returns
/// Vector of Option<f64>, None for the first `period` bars
pub fn calculate_rsi(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = prices.len();
    let mut rsi = vec![None; n];
    if period == 0 || n < period + 1 {
        return rsi;
    }

    // changes[k] is the move into bar k + 1
    let (gains, losses): (Vec<f64>, Vec<f64>) = prices
        .windows(2)
        .map(|w| {
            let delta = w[1] - w[0];
            (delta.max(0.0), (-delta).max(0.0))
        })
        .unzip();

    // Sum each window directly so flat stretches stay exactly zero
    for i in period..n {
        let window = (i - period)..i;
        let avg_gain = gains[window.clone()].iter().sum::<f64>() / period as f64;
        let avg_loss = losses[window].iter().sum::<f64>() / period as f64;
        rsi[i] = Some(rsi_value(avg_gain, avg_loss));
    }

    rsi
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            50.0
        } else {
            100.0
        }
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - (100.0 / (1.0 + rs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rsi_basic() {
        let prices = vec![44.0, 44.25, 44.5, 43.75, 44.5, 44.25, 44.0, 43.5, 44.25, 44.5];
        let rsi = calculate_rsi(&prices, 2);

        assert_eq!(rsi.len(), prices.len());
        // Warmup values are undefined
        assert!(rsi[0].is_none());
        assert!(rsi[1].is_none());
        // RSI should be between 0 and 100
        for val in rsi.iter().flatten() {
            assert!(*val >= 0.0 && *val <= 100.0);
        }
    }

    #[test]
    fn test_rsi_rolling_mean() {
        let prices = vec![10.0, 11.0, 10.0, 12.0, 9.0, 9.5, 13.0, 12.0];
        let rsi = calculate_rsi(&prices, 3);

        // Gains 1, 0, 2 against losses 0, 1, 0
        assert_relative_eq!(rsi[3].unwrap(), 75.0, epsilon = 1e-9);
        // Gains 0, 2, 0 against losses 1, 0, 3
        assert_relative_eq!(rsi[4].unwrap(), 100.0 / 3.0, epsilon = 1e-9);
        // Gains 0, 0.5, 3.5 against losses 3, 0, 0
        assert_relative_eq!(rsi[6].unwrap(), 400.0 / 7.0, epsilon = 1e-9);
        // Gains 0.5, 3.5, 0 against losses 0, 0, 1
        assert_relative_eq!(rsi[7].unwrap(), 80.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rsi_flat_after_move() {
        // The early drop leaves the window, so the flat tail reads neutral
        let prices = vec![10.0, 9.0, 9.0, 9.0, 9.0];
        let rsi = calculate_rsi(&prices, 2);

        assert_eq!(rsi[2], Some(0.0));
        assert_eq!(rsi[3], Some(50.0));
        assert_eq!(rsi[4], Some(50.0));
    }

    #[test]
    fn test_rsi_all_gains() {
        let prices = vec![10.0, 11.0, 12.0, 13.0, 14.0, 15.0];
        let rsi = calculate_rsi(&prices, 2);

        // All gains should result in RSI = 100
        assert_eq!(rsi[rsi.len() - 1], Some(100.0));
    }

    #[test]
    fn test_rsi_all_losses() {
        let prices = vec![15.0, 14.0, 13.0, 12.0, 11.0, 10.0];
        let rsi = calculate_rsi(&prices, 2);

        // All losses should result in RSI = 0
        assert_eq!(rsi[rsi.len() - 1], Some(0.0));
    }

    #[test]
    fn test_rsi_flat_prices() {
        let rsi = calculate_rsi(&[5.0; 6], 3);
        assert_eq!(rsi[5], Some(50.0));
    }

    #[test]
    fn test_rsi_not_enough_data() {
        assert!(calculate_rsi(&[1.0, 2.0], 14).iter().all(|v| v.is_none()));
    }
}
