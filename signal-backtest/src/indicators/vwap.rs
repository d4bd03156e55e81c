/// Calculate cumulative Volume Weighted Average Price
///
/// VWAP[i] = sum(close * volume, 0..=i) / sum(volume, 0..=i).
/// None while cumulative volume is still zero.
pub fn calculate_vwap(closes: &[f64], volumes: &[f64]) -> Vec<Option<f64>> {
    let mut cum_volume = 0.0;
    let mut cum_price_volume = 0.0;

    closes
        .iter()
        .zip(volumes.iter())
        .map(|(close, volume)| {
            cum_volume += volume;
            cum_price_volume += close * volume;
            if cum_volume > 0.0 {
                Some(cum_price_volume / cum_volume)
            } else {
                None
            }
        })
        .collect()
}
