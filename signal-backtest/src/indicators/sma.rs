/// Calculate Simple Moving Average
///
/// # Arguments
/// * `prices` - Slice of prices
/// * `period` - SMA period
///
/// # Returns
/// Vector of Option<f64>, None for values before enough data is available
pub fn calculate_sma(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = prices.len();
    let mut sma = vec![None; n];

    if n < period || period == 0 {
        return sma;
    }

    let mut sum: f64 = prices[..period].iter().sum();
    sma[period - 1] = Some(sum / period as f64);

    // Sliding window for subsequent values
    for i in period..n {
        sum = sum - prices[i - period] + prices[i];
        sma[i] = Some(sum / period as f64);
    }

    sma
}

/// True on bars where `fast` moves from at-or-below `slow` to strictly above it.
///
/// Bars where either series (current or previous) is undefined never cross.
pub fn crossed_above(fast: &[Option<f64>], slow: &[Option<f64>]) -> Vec<bool> {
    crossings(fast, slow, |prev_f, prev_s, f, s| f > s && prev_f <= prev_s)
}

/// True on bars where `fast` moves from at-or-above `slow` to strictly below it.
pub fn crossed_below(fast: &[Option<f64>], slow: &[Option<f64>]) -> Vec<bool> {
    crossings(fast, slow, |prev_f, prev_s, f, s| f < s && prev_f >= prev_s)
}

fn crossings<F>(fast: &[Option<f64>], slow: &[Option<f64>], cross: F) -> Vec<bool>
where
    F: Fn(f64, f64, f64, f64) -> bool,
{
    let n = fast.len().min(slow.len());
    (0..n)
        .map(|i| {
            if i == 0 {
                return false;
            }
            match (fast[i - 1], slow[i - 1], fast[i], slow[i]) {
                (Some(pf), Some(ps), Some(f), Some(s)) => cross(pf, ps, f, s),
                _ => false,
            }
        })
        .collect()
}
