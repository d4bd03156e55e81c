use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use common::{BacktestError, Bar, PriceSeries, Result};
use serde::Deserialize;

/// Unix timestamps above this are taken as milliseconds (Binance kline exports)
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(alias = "open_time", alias = "date", alias = "time")]
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl CsvRow {
    fn into_bar(self) -> Result<(Option<String>, Bar)> {
        let timestamp = parse_timestamp(&self.timestamp)?;
        Ok((
            self.symbol,
            Bar::new(timestamp, self.open, self.high, self.low, self.close, self.volume),
        ))
    }
}

/// Load bars from a CSV file with `timestamp, open, high, low, close, volume` columns
pub fn load_csv(path: &Path) -> Result<Vec<Bar>> {
    let file = open(path)?;
    read_csv_rows(file)?
        .into_iter()
        .map(|row| row.into_bar().map(|(_, bar)| bar))
        .collect()
}

/// Load bars from JSON file
pub fn load_json(path: &Path) -> Result<Vec<Bar>> {
    let file = open(path)?;
    let bars: Vec<Bar> = serde_json::from_reader(BufReader::new(file))?;
    Ok(bars)
}

/// Load a CSV holding several instruments, split on the `symbol` column.
///
/// Instruments are returned in the order their first row appears.
pub fn load_multi_symbol_csv(path: &Path) -> Result<Vec<PriceSeries>> {
    let file = open(path)?;
    let mut instruments: Vec<PriceSeries> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (line, row) in read_csv_rows(file)?.into_iter().enumerate() {
        let (symbol, bar) = row.into_bar()?;
        let symbol = symbol.ok_or_else(|| {
            BacktestError::CsvError(format!("row {} has no symbol", line + 1))
        })?;

        match index.get(&symbol) {
            Some(&i) => instruments[i].bars.push(bar),
            None => {
                index.insert(symbol.clone(), instruments.len());
                instruments.push(PriceSeries::new(symbol, vec![bar]));
            }
        }
    }

    Ok(instruments)
}

fn read_csv_rows<R: Read>(reader: R) -> Result<Vec<CsvRow>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(reader));

    csv_reader
        .deserialize()
        .map(|row| row.map_err(|e| BacktestError::CsvError(e.to_string())))
        .collect()
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| BacktestError::DataLoadError(format!("{}: {}", path.display(), e)))
}

/// Load every `.csv`/`.json` file in `dir` as one instrument named after the file stem
pub fn load_dir(dir: &Path) -> Result<Vec<PriceSeries>> {
    let mut paths: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("csv") | Some("json")
            )
        })
        .collect();
    paths.sort();

    paths.iter().map(|p| super::load_file(p)).collect()
}

/// Parse timestamp from various formats
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    // Try ISO 8601 format first
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Try common formats
    let formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M:%S",
    ];
    for fmt in &formats {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Some(dt) = chrono::NaiveDate::parse_from_str(s, fmt)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
        {
            return Ok(Utc.from_utc_datetime(&dt));
        }
    }

    // Unix timestamp, seconds or milliseconds
    if let Ok(ts) = s.parse::<i64>() {
        let parsed = if ts.abs() >= MILLIS_THRESHOLD {
            DateTime::from_timestamp_millis(ts)
        } else {
            DateTime::from_timestamp(ts, 0)
        };
        if let Some(dt) = parsed {
            return Ok(dt);
        }
    }

    Err(BacktestError::CsvError(format!(
        "Unable to parse timestamp: {}",
        s
    )))
}
