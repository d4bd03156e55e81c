pub mod loader;
pub mod synthetic;

pub use loader::{load_csv, load_dir, load_json, load_multi_symbol_csv, parse_timestamp};
pub use synthetic::{generate_synthetic_bars, generate_universe};

use std::path::Path;

use common::{BacktestError, PriceSeries, Result};

/// Load one instrument from file, detecting format from extension.
///
/// The symbol is the file stem (`BTCUSDT.csv` -> `BTCUSDT`).
pub fn load_file(path: &Path) -> Result<PriceSeries> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    let symbol = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("UNKNOWN")
        .to_string();

    let bars = match ext.as_str() {
        "csv" => load_csv(path)?,
        "json" => load_json(path)?,
        _ => {
            return Err(BacktestError::DataLoadError(format!(
                "Unsupported file format: {}",
                ext
            )))
        }
    };

    Ok(PriceSeries::new(symbol, bars))
}
