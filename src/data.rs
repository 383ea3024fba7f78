//! Market-data loading: price and option CSVs merged into replay bars.
//!
//! Price rows without a matching option row for the same date key are
//! dropped; the merged series is sorted by parsed timestamp before replay.

use crate::models::Bar;
use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DATE_FMT: &str = "%Y-%m-%d";
pub const DATETIME_FMT: &str = "%Y-%m-%d %H:%M";

/// Row of `<symbol>_<year>_prices.csv`.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceRow {
    pub date: String,
    pub close: f64,
    pub realized_vol: f64,
}

/// Row of `<symbol>_<year>_options.csv`.
#[derive(Debug, Clone, Deserialize)]
pub struct OptionRow {
    pub date: String,
    pub option_mid: f64,
    pub iv: f64,
    pub delta: f64,
    pub gamma: f64,
    pub vega: f64,
    pub expiry_days: i64,
}

/// Timestamp resolution of a merged dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Daily,
    Intraday,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Daily => "daily",
            Granularity::Intraday => "intraday",
        }
    }
}

/// Parse a bar timestamp in either `YYYY-MM-DD HH:MM` or `YYYY-MM-DD` form.
pub fn parse_timestamp(text: &str) -> Result<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, DATETIME_FMT) {
        return Ok(dt);
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, DATE_FMT) {
        return Ok(date.and_hms_opt(0, 0, 0).expect("midnight is valid"));
    }
    bail!("Invalid timestamp '{text}'. Use '{DATE_FMT}' or '{DATETIME_FMT}'.")
}

/// Parse a user-supplied period boundary. A date-only end bound extends to
/// the end of that day so `--end-date 2025-03-14` includes intraday bars.
pub fn parse_user_boundary(text: Option<&str>, is_end: bool) -> Result<Option<NaiveDateTime>> {
    let Some(text) = text else {
        return Ok(None);
    };
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, DATETIME_FMT) {
        return Ok(Some(dt));
    }
    let date = NaiveDate::parse_from_str(text, DATE_FMT)
        .with_context(|| format!("Invalid boundary '{text}'. Use '{DATE_FMT}' or '{DATETIME_FMT}'."))?;
    let boundary = if is_end {
        date.and_hms_micro_opt(23, 59, 59, 999_999)
            .expect("end of day is valid")
    } else {
        date.and_hms_opt(0, 0, 0).expect("midnight is valid")
    };
    Ok(Some(boundary))
}

/// Dataset paths for a symbol/year pair, failing fast with a hint when the
/// files have not been generated yet.
pub fn resolve_input_paths(data_dir: &Path, symbol: &str, year: i32) -> Result<(PathBuf, PathBuf)> {
    let normalized = symbol.trim().to_lowercase();
    let prices = data_dir.join(format!("{normalized}_{year}_prices.csv"));
    let options = data_dir.join(format!("{normalized}_{year}_options.csv"));

    let missing: Vec<String> = [&prices, &options]
        .iter()
        .filter(|path| !path.exists())
        .map(|path| path.display().to_string())
        .collect();
    if !missing.is_empty() {
        bail!(
            "Missing dataset file(s): {}. Generate them first with: \
             dataset_gen --symbol {} --year {year}",
            missing.join(", "),
            symbol.trim().to_uppercase()
        );
    }

    Ok((prices, options))
}

pub fn load_prices(path: &Path) -> Result<Vec<PriceRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open prices CSV {}", path.display()))?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: PriceRow =
            record.with_context(|| format!("Malformed prices row in {}", path.display()))?;
        rows.push(row);
    }
    Ok(rows)
}

pub fn load_options(path: &Path) -> Result<HashMap<String, OptionRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open options CSV {}", path.display()))?;
    let mut rows = HashMap::new();
    for record in reader.deserialize() {
        let row: OptionRow =
            record.with_context(|| format!("Malformed options row in {}", path.display()))?;
        rows.insert(row.date.clone(), row);
    }
    Ok(rows)
}

/// Join price rows with option rows on the exact date key and sort the result
/// chronologically. Price rows without option data are dropped.
pub fn merge_market_data(
    prices: Vec<PriceRow>,
    options_by_date: HashMap<String, OptionRow>,
) -> Result<Vec<Bar>> {
    let mut merged = Vec::with_capacity(prices.len());
    for price in prices {
        let Some(option) = options_by_date.get(&price.date) else {
            continue;
        };
        merged.push(Bar {
            timestamp: parse_timestamp(&price.date)?,
            date: price.date,
            close: price.close,
            realized_vol: price.realized_vol,
            option_mid: option.option_mid,
            iv: option.iv,
            delta: option.delta,
            gamma: option.gamma,
            vega: option.vega,
            expiry_days: option.expiry_days,
        });
    }
    merged.sort_by_key(|bar| bar.timestamp);
    Ok(merged)
}

/// Inclusive period filter over pre-parsed bar timestamps.
pub fn filter_by_period(
    bars: Vec<Bar>,
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> Result<Vec<Bar>> {
    let start = parse_user_boundary(start_date, false)?;
    let end = parse_user_boundary(end_date, true)?;
    Ok(bars
        .into_iter()
        .filter(|bar| {
            if let Some(start) = start {
                if bar.timestamp < start {
                    return false;
                }
            }
            if let Some(end) = end {
                if bar.timestamp > end {
                    return false;
                }
            }
            true
        })
        .collect())
}

/// Daily data has no intraday `HH:MM` component; sampling the first hundred
/// rows is enough since granularity never changes mid-file.
pub fn infer_granularity(bars: &[Bar]) -> Granularity {
    if bars
        .iter()
        .take(100)
        .any(|bar| bar.date.contains(' '))
    {
        Granularity::Intraday
    } else {
        Granularity::Daily
    }
}
