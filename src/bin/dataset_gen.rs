//! Synthetic Dataset Generator
//!
//! Produces deterministic, replay-ready price and option CSVs for a
//! symbol/year pair: a seeded GBM price path, a rolling realized-vol
//! estimate, a proxy IV, and ATM-call Black-Scholes quote/greeks with a
//! rolling expiry countdown.
//!
//! Output files:
//! - `<data-dir>/<symbol>_<year>_prices.csv` (date, close, realized_vol)
//! - `<data-dir>/<symbol>_<year>_options.csv` (date, option_mid, iv, delta,
//!   gamma, vega, expiry_days)
//!
//! Usage:
//!   cargo run --release --bin dataset_gen -- --symbol SPY --year 2025 --bars 252
//!   cargo run --release --bin dataset_gen -- --interval intraday --seed 7

use anyhow::{ensure, Context, Result};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use clap::{Parser, ValueEnum};
use rand::distributions::Distribution;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use statrs::distribution::Normal;
use statrs::function::erf::erf;
use statrs::statistics::Statistics;
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const INTRADAY_BARS_PER_DAY: usize = 390;
const RV_CLAMP: (f64, f64) = (0.05, 2.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum IntervalArg {
    Daily,
    Intraday,
}

impl IntervalArg {
    fn bars_per_year(self) -> f64 {
        match self {
            IntervalArg::Daily => TRADING_DAYS_PER_YEAR,
            IntervalArg::Intraday => TRADING_DAYS_PER_YEAR * INTRADAY_BARS_PER_DAY as f64,
        }
    }

    fn default_rv_window(self) -> usize {
        match self {
            IntervalArg::Daily => 21,
            IntervalArg::Intraday => INTRADAY_BARS_PER_DAY * 5,
        }
    }
}

/// Generate replay CSVs from a synthetic market path.
#[derive(Parser, Debug)]
#[command(name = "dataset_gen")]
#[command(about = "Generate synthetic replay datasets (prices + ATM option proxy)")]
struct Cli {
    /// Ticker symbol used in output file names.
    #[arg(long, default_value = "SPY")]
    symbol: String,

    /// Year used for output file names and the date range.
    #[arg(long, default_value_t = 2025)]
    year: i32,

    /// Number of bars to generate.
    #[arg(long, default_value_t = 252)]
    bars: usize,

    /// Bar interval.
    #[arg(long, value_enum, default_value_t = IntervalArg::Daily)]
    interval: IntervalArg,

    /// RNG seed; identical seeds reproduce identical datasets.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Starting spot price.
    #[arg(long, default_value_t = 500.0)]
    spot0: f64,

    /// Annualized drift of the GBM path.
    #[arg(long, default_value_t = 0.05, allow_hyphen_values = true)]
    drift: f64,

    /// Annualized volatility of the GBM path.
    #[arg(long, default_value_t = 0.18)]
    vol: f64,

    /// Rolling return window for the realized-vol estimate (default: by interval).
    #[arg(long)]
    rv_window: Option<usize>,

    /// ATM option tenor in trading days.
    #[arg(long, default_value_t = 14)]
    option_tenor_days: i64,

    /// IV model: IV = rv * iv-multiplier + iv-spread.
    #[arg(long, default_value_t = 1.10)]
    iv_multiplier: f64,

    /// IV additive spread.
    #[arg(long, default_value_t = 0.01)]
    iv_spread: f64,

    /// Continuously compounded annualized rate for the Black-Scholes proxy.
    #[arg(long, default_value_t = 0.0)]
    risk_free_rate: f64,

    /// Output directory.
    #[arg(long, env = "VOLBOT_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,
}

fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    value.max(lo).min(hi)
}

fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

fn normal_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

/// ATM call (mid, delta, gamma, vega) with the quote clamps that keep the
/// replay inputs inside realistic ranges.
fn black_scholes_atm_call_metrics(
    spot: f64,
    iv: f64,
    expiry_days: i64,
    risk_free_rate: f64,
) -> (f64, f64, f64, f64) {
    let sigma = iv.max(1e-8);
    let t_years = expiry_days.max(1) as f64 / TRADING_DAYS_PER_YEAR;
    let sqrt_t = t_years.sqrt();
    let vol_sqrt_t = sigma * sqrt_t;

    let d1 = (risk_free_rate + 0.5 * sigma * sigma) * t_years / vol_sqrt_t.max(1e-12);
    let d2 = d1 - vol_sqrt_t;

    let nd1 = normal_cdf(d1);
    let nd2 = normal_cdf(d2);
    let pdf_d1 = normal_pdf(d1);

    let strike = spot;
    let option_mid = spot * nd1 - strike * (-risk_free_rate * t_years).exp() * nd2;
    let delta = nd1;
    let gamma = pdf_d1 / (spot * vol_sqrt_t).max(1e-12);
    let vega = spot * pdf_d1 * sqrt_t / 100.0;

    (
        option_mid.max(0.01),
        clamp(delta, 0.01, 0.99),
        clamp(gamma, 0.0001, 0.20),
        clamp(vega, 0.0, 5.0),
    )
}

fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Bar timestamps for the requested year: business days, optionally split
/// into 390 regular-session minutes.
fn bar_timestamps(year: i32, interval: IntervalArg, bars: usize) -> Vec<NaiveDateTime> {
    let mut out = Vec::with_capacity(bars);
    let mut date = NaiveDate::from_ymd_opt(year, 1, 1).expect("valid year start");
    let open = NaiveTime::from_hms_opt(9, 30, 0).expect("valid session open");
    while out.len() < bars {
        if is_business_day(date) {
            match interval {
                IntervalArg::Daily => {
                    out.push(date.and_hms_opt(0, 0, 0).expect("midnight is valid"));
                }
                IntervalArg::Intraday => {
                    for minute in 0..INTRADAY_BARS_PER_DAY {
                        if out.len() >= bars {
                            break;
                        }
                        out.push(date.and_time(open) + Duration::minutes(minute as i64));
                    }
                }
            }
        }
        date = date.succ_opt().expect("date overflow");
    }
    out
}

fn format_timestamp(ts: NaiveDateTime, interval: IntervalArg) -> String {
    match interval {
        IntervalArg::Daily => ts.format("%Y-%m-%d").to_string(),
        IntervalArg::Intraday => ts.format("%Y-%m-%d %H:%M").to_string(),
    }
}

/// Annualized realized vol over the trailing return window. Mirrors the
/// replay's expectations: clamped, and defined even with almost no history.
fn realized_vol(returns: &[f64], rv_window: usize, annualization: f64) -> f64 {
    let window_start = returns.len().saturating_sub(rv_window);
    let window = &returns[window_start..];
    if window.len() >= 2 {
        clamp(
            window.population_std_dev() * annualization,
            RV_CLAMP.0,
            RV_CLAMP.1,
        )
    } else if returns.len() == 1 {
        clamp(returns[0].abs() * annualization, RV_CLAMP.0, RV_CLAMP.1)
    } else {
        0.20
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    ensure!(cli.bars > 0, "bars must be positive");
    ensure!(cli.spot0 > 0.0, "spot0 must be positive");
    ensure!(cli.vol > 0.0, "vol must be positive");
    ensure!(cli.option_tenor_days > 0, "option-tenor-days must be positive");
    ensure!(cli.iv_multiplier > 0.0, "iv-multiplier must be positive");
    ensure!(cli.risk_free_rate >= 0.0, "risk-free-rate must be non-negative");
    let rv_window = cli.rv_window.unwrap_or(cli.interval.default_rv_window());
    ensure!(rv_window > 1, "rv-window must be greater than 1");

    let symbol_norm = cli.symbol.trim().to_lowercase();
    fs::create_dir_all(&cli.data_dir)
        .with_context(|| format!("Failed to create data dir {}", cli.data_dir.display()))?;
    let prices_path = cli
        .data_dir
        .join(format!("{symbol_norm}_{}_prices.csv", cli.year));
    let options_path = cli
        .data_dir
        .join(format!("{symbol_norm}_{}_options.csv", cli.year));

    let timestamps = bar_timestamps(cli.year, cli.interval, cli.bars);

    let bars_per_year = cli.interval.bars_per_year();
    let dt = 1.0 / bars_per_year;
    let annualization = bars_per_year.sqrt();
    let mut rng = ChaCha8Rng::seed_from_u64(cli.seed);
    let standard_normal = Normal::new(0.0, 1.0).expect("unit normal");

    let mut prices_writer = csv::Writer::from_path(&prices_path)
        .with_context(|| format!("Failed to create {}", prices_path.display()))?;
    prices_writer.write_record(["date", "close", "realized_vol"])?;
    let mut options_writer = csv::Writer::from_path(&options_path)
        .with_context(|| format!("Failed to create {}", options_path.display()))?;
    options_writer.write_record([
        "date",
        "option_mid",
        "iv",
        "delta",
        "gamma",
        "vega",
        "expiry_days",
    ])?;

    let mut close = cli.spot0;
    let mut returns: Vec<f64> = Vec::with_capacity(cli.bars);
    let mut prev_close: Option<f64> = None;
    let mut prev_trade_date: Option<NaiveDate> = None;
    let mut expiry_days = cli.option_tenor_days;

    for ts in &timestamps {
        let current_date = ts.date();
        if let Some(prev) = prev_trade_date {
            if current_date != prev {
                expiry_days -= 1;
                if expiry_days <= 0 {
                    expiry_days = cli.option_tenor_days;
                }
            }
        }
        prev_trade_date = Some(current_date);

        let z: f64 = standard_normal.sample(&mut rng);
        close *= ((cli.drift - 0.5 * cli.vol * cli.vol) * dt + cli.vol * dt.sqrt() * z).exp();

        if let Some(prev) = prev_close {
            if prev > 0.0 {
                returns.push((close / prev).ln());
            }
        }
        prev_close = Some(close);

        let rv = realized_vol(&returns, rv_window, annualization);
        let iv = clamp(rv * cli.iv_multiplier + cli.iv_spread, RV_CLAMP.0, RV_CLAMP.1);

        let (option_mid, delta, gamma, vega) =
            black_scholes_atm_call_metrics(close, iv, expiry_days, cli.risk_free_rate);

        let key = format_timestamp(*ts, cli.interval);
        prices_writer.write_record([
            key.as_str(),
            &format!("{close:.4}"),
            &format!("{rv:.4}"),
        ])?;
        options_writer.write_record([
            key.as_str(),
            &format!("{option_mid:.4}"),
            &format!("{iv:.4}"),
            &format!("{delta:.4}"),
            &format!("{gamma:.4}"),
            &format!("{vega:.4}"),
            &expiry_days.to_string(),
        ])?;
    }

    prices_writer.flush()?;
    options_writer.flush()?;

    info!(
        rows = timestamps.len(),
        interval = ?cli.interval,
        rv_window,
        seed = cli.seed,
        prices = %prices_path.display(),
        options = %options_path.display(),
        "dataset generated"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_skip_weekends() {
        // 2025-01-01 is a Wednesday; the first week yields Wed/Thu/Fri then
        // jumps to Monday the 6th.
        let ts = bar_timestamps(2025, IntervalArg::Daily, 4);
        let dates: Vec<String> = ts
            .iter()
            .map(|t| format_timestamp(*t, IntervalArg::Daily))
            .collect();
        assert_eq!(
            dates,
            vec!["2025-01-01", "2025-01-02", "2025-01-03", "2025-01-06"]
        );
    }

    #[test]
    fn test_intraday_timestamps_have_minutes() {
        let ts = bar_timestamps(2025, IntervalArg::Intraday, 3);
        let first = format_timestamp(ts[0], IntervalArg::Intraday);
        assert_eq!(first, "2025-01-01 09:30");
        assert_eq!(format_timestamp(ts[2], IntervalArg::Intraday), "2025-01-01 09:32");
    }

    #[test]
    fn test_realized_vol_fallbacks() {
        let ann = TRADING_DAYS_PER_YEAR.sqrt();
        assert_eq!(realized_vol(&[], 21, ann), 0.20);
        // One return: scaled absolute value, clamped to the floor here.
        let single = realized_vol(&[0.001], 21, ann);
        assert!((single - clamp(0.001 * ann, 0.05, 2.0)).abs() < 1e-12);
        // Constant returns: zero dispersion clamps to the floor.
        let flat = realized_vol(&[0.01, 0.01, 0.01], 21, ann);
        assert_eq!(flat, 0.05);
    }

    #[test]
    fn test_black_scholes_clamps() {
        let (mid, delta, gamma, vega) = black_scholes_atm_call_metrics(500.0, 0.2, 14, 0.0);
        assert!(mid > 0.01);
        assert!((0.01..=0.99).contains(&delta));
        assert!((0.0001..=0.20).contains(&gamma));
        assert!((0.0..=5.0).contains(&vega));
        // Near-zero vol pins the quote at its floors instead of NaN.
        let (mid, _, gamma, _) = black_scholes_atm_call_metrics(500.0, 1e-9, 14, 0.0);
        assert!(mid >= 0.01);
        assert!(gamma <= 0.20);
    }
}
