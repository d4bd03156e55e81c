pub mod bollinger;
pub mod rsi;
pub mod sma;
pub mod vwap;

pub use bollinger::{calculate_bollinger_bands, BollingerBands};
pub use rsi::calculate_rsi;
pub use sma::{calculate_sma, crossed_above, crossed_below};
pub use vwap::calculate_vwap;
