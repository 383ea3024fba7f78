//! Integration tests for the replay engine.
//!
//! These drive the full simulation loop over synthetic bar series and verify
//! the orchestration-level guarantees: the one-bar decision-to-execution
//! delay, sign changes passing through a flat bar in adaptive mode, artifact
//! generation, and degenerate-equity behavior.

use chrono::{Duration, NaiveDate};
use volbot_backend::config::{ReplayConfig, SignalConfig};
use volbot_backend::data::{load_options, load_prices, merge_market_data};
use volbot_backend::models::{Bar, Stance, StrategyMode};
use volbot_backend::report::write_mode_artifacts;
use volbot_backend::simulation::run_mode;

fn bar(day_offset: i64, close: f64, realized_vol: f64, option_mid: f64, iv: f64) -> Bar {
    let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap() + Duration::days(day_offset);
    Bar {
        date: date.format("%Y-%m-%d").to_string(),
        timestamp: date.and_hms_opt(0, 0, 0).unwrap(),
        close,
        realized_vol,
        option_mid,
        iv,
        delta: 0.5,
        gamma: 0.002,
        vega: 0.05,
        expiry_days: 14,
    }
}

fn tiny_signal_config() -> SignalConfig {
    SignalConfig {
        rv_short_window: 1,
        rv_medium_window: 2,
        trend_window: 2,
        chop_window: 2,
        cooldown_bars: 0,
        adaptive_enter_persist_bars: 1,
        adaptive_exit_persist_bars: 1,
        adaptive_pause_bars: 0,
        ..SignalConfig::default()
    }
}

fn config() -> ReplayConfig {
    ReplayConfig {
        signal: tiny_signal_config(),
        ..ReplayConfig::default()
    }
}

#[test]
fn test_trade_lags_signal_by_exactly_one_bar() {
    // No edge for the first five bars, then the signal flips on at a known
    // bar and stays on.
    let mut bars: Vec<Bar> = (0..5).map(|d| bar(d, 100.0, 0.10, 2.0, 0.10)).collect();
    bars.extend((5..12).map(|d| bar(d, 100.0, 0.10, 2.0, 0.14)));

    let result = run_mode(StrategyMode::ShortVol, "SYN", &bars, &config(), 0);
    assert_eq!(result.steps.len(), bars.len());

    // The flip bar is the first SHORT_VOL decision; index 5 by construction.
    let flip = result
        .steps
        .iter()
        .position(|s| s.stance == Stance::ShortVol)
        .expect("signal never flipped");
    assert_eq!(flip, 5);

    // Nothing executes on the flip bar itself; the queued target fills on
    // the next bar.
    assert_eq!(result.steps[flip].executed_target_contracts, 0);
    assert_ne!(result.steps[flip].queued_option_contracts, 0);
    assert_eq!(
        result.steps[flip + 1].executed_target_contracts,
        result.steps[flip].queued_option_contracts
    );
    assert_eq!(
        result.steps[flip + 1].option_contracts,
        result.steps[flip].queued_option_contracts
    );

    // Globally: bar t executes exactly what bar t-1 queued.
    for pair in result.steps.windows(2) {
        assert_eq!(
            pair[1].requested_option_contracts,
            pair[0].queued_option_contracts
        );
    }
}

#[test]
fn test_adaptive_sign_change_passes_through_flat_bar() {
    // Phase A: rich vol, calm path -> short regime. Phase B: cheap vol with
    // a vol-of-vol spike -> long regime.
    let mut bars: Vec<Bar> = (0..8).map(|d| bar(d, 100.0, 0.10, 2.0, 0.30)).collect();
    bars.extend(
        (8..16).map(|d| {
            let rv = if d % 2 == 0 { 0.30 } else { 0.20 };
            bar(d, 100.0, rv, 2.0, 0.10)
        }),
    );

    let result = run_mode(StrategyMode::Adaptive, "SYN", &bars, &config(), 0);

    let signs: Vec<i64> = result
        .steps
        .iter()
        .map(|s| s.option_contracts.signum())
        .collect();
    assert!(signs.contains(&-1), "short leg never held: {signs:?}");
    assert!(signs.contains(&1), "long leg never held: {signs:?}");

    // A nonzero sign may only follow the opposite sign via a bar at exactly
    // zero contracts.
    for pair in result.steps.windows(2) {
        let prev = pair[0].option_contracts;
        let next = pair[1].option_contracts;
        assert!(
            prev == 0 || next == 0 || prev.signum() == next.signum(),
            "direct sign flip {} -> {} on {}",
            prev,
            next,
            pair[1].date
        );
    }
}

#[test]
fn test_full_run_writes_artifacts_from_csv_dataset() {
    // End to end: dataset CSVs on disk -> loaders -> replay -> artifacts.
    let dir = tempfile::tempdir().unwrap();
    let prices_path = dir.path().join("syn_2025_prices.csv");
    let options_path = dir.path().join("syn_2025_options.csv");

    let mut prices = String::from("date,close,realized_vol\n");
    let mut options = String::from("date,option_mid,iv,delta,gamma,vega,expiry_days\n");
    for d in 0..12 {
        let date = (NaiveDate::from_ymd_opt(2025, 1, 1).unwrap() + Duration::days(d))
            .format("%Y-%m-%d")
            .to_string();
        let iv = if d >= 5 { 0.14 } else { 0.10 };
        prices.push_str(&format!("{date},100.0000,0.1000\n"));
        options.push_str(&format!("{date},2.0000,{iv:.4},0.5000,0.0020,0.0500,14\n"));
    }
    std::fs::write(&prices_path, prices).unwrap();
    std::fs::write(&options_path, options).unwrap();

    let bars = merge_market_data(
        load_prices(&prices_path).unwrap(),
        load_options(&options_path).unwrap(),
    )
    .unwrap();
    assert_eq!(bars.len(), 12);

    let result = run_mode(StrategyMode::ShortVol, "SYN", &bars, &config(), 0);
    let paths = write_mode_artifacts(dir.path(), &result, false).unwrap();

    let timestep = std::fs::read_to_string(&paths.timestep).unwrap();
    assert_eq!(timestep.lines().count(), 13); // header + one row per bar
    assert!(timestep.lines().nth(1).unwrap().starts_with("2025-01-01,SYN,short,"));

    let equity = std::fs::read_to_string(&paths.equity).unwrap();
    assert_eq!(equity.lines().count(), 13);

    let events = std::fs::read_to_string(&paths.events).unwrap();
    assert!(events.contains("STANCE FLAT->SHORT_VOL"));

    let pnl = std::fs::read_to_string(&paths.pnl).unwrap();
    let row = pnl.lines().nth(1).unwrap();
    assert!(row.starts_with("short,"));
}

#[test]
fn test_exhausted_equity_blocks_new_risk_and_run_completes() {
    // Enter short at full size, then the option reprices 30x against the
    // position, driving equity below zero.
    let mut bars: Vec<Bar> = (0..5).map(|d| bar(d, 100.0, 0.10, 2.0, 0.14)).collect();
    bars.extend((5..12).map(|d| bar(d, 100.0, 0.10, 60.0, 0.14)));

    let result = run_mode(StrategyMode::ShortVol, "SYN", &bars, &config(), 0);
    assert_eq!(result.steps.len(), bars.len(), "run must finish every bar");

    let crash = 5;
    assert!(result.steps[crash - 1].option_contracts < 0);
    assert!(
        result.steps[crash].equity < 0.0,
        "equity survived the repricing: {}",
        result.steps[crash].equity
    );

    // The global drawdown kill flattens the book on the crash bar, and the
    // forced de-risk bypasses the limiter.
    assert_eq!(result.steps[crash].option_contracts, 0);
    assert!(result
        .events
        .iter()
        .any(|e| e.contains("GLOBAL_DRAWDOWN_KILL")));

    // Degenerate state is not an error: the run continues, reporting the
    // damage, and never re-risks while equity is exhausted.
    for step in &result.steps[crash..] {
        assert!(step.equity < 0.0);
        assert_eq!(step.option_contracts, 0);
        assert_eq!(step.queued_option_contracts, 0);
    }
    assert!(result.summary.ending_equity < 0.0);
    assert!(result.summary.max_drawdown > 1.0);
}
