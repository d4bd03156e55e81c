use chrono::{Duration, TimeZone, Utc};
use common::{Bar, PriceSeries};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generate a reproducible one-minute random walk for demos and tests
pub fn generate_synthetic_bars(
    symbol: &str,
    bars: usize,
    initial_price: f64,
    seed: u64,
) -> PriceSeries {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = Vec::with_capacity(bars);

    let mut price = initial_price;
    let start = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).single().unwrap_or_default();

    // Crypto-like minute bars
    let bar_volatility = 0.002;
    let drift = 0.00001;

    for i in 0..bars {
        let random_return: f64 = rng.gen_range(-1.0..1.0);
        let bar_return = drift + bar_volatility * random_return;
        let new_price = (price * (1.0 + bar_return)).max(f64::MIN_POSITIVE);

        let range = price * rng.gen_range(0.0005..0.003);
        let open = price;
        let close = new_price;
        let high = open.max(close) + rng.gen_range(0.0..range);
        let low = (open.min(close) - rng.gen_range(0.0..range)).max(close.min(open) * 0.5);

        // Volume rises with the size of the move
        let volume = 100.0 * (1.0 + bar_return.abs() * 200.0) * rng.gen_range(0.5..1.5);

        out.push(Bar::new(
            start + Duration::minutes(i as i64),
            open,
            high,
            low,
            close,
            volume,
        ));

        price = new_price;
    }

    PriceSeries::new(symbol, out)
}

/// Several independent instruments with distinct seeds
pub fn generate_universe(symbols: usize, bars: usize, seed: u64) -> Vec<PriceSeries> {
    (0..symbols)
        .map(|i| {
            let symbol = format!("SYN{:02}USDT", i + 1);
            let initial_price = 10.0 * (i + 1) as f64;
            generate_synthetic_bars(&symbol, bars, initial_price, seed.wrapping_add(i as u64))
        })
        .collect()
}
