//! Flat artifact writers: per-bar timestep CSV, equity curve, PnL summaries,
//! the chronological event log, and run-level snapshots.
//!
//! All numeric cells are rendered here, at the boundary; engine types carry
//! enums and floats, never display strings. Non-finite values (chop score,
//! leverage on exhausted equity) are written as `inf`.

use crate::analytics::{EquityCurveStats, EquityPoint};
use crate::config::ReplayConfig;
use crate::models::StrategyMode;
use crate::simulation::{ModeRunResult, ModeSummary, StepRecord};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

fn fmt6(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.6}")
    } else {
        "inf".to_string()
    }
}

fn fmt4(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.4}")
    } else {
        "inf".to_string()
    }
}

/// Artifact path for one mode; multi-mode runs get a `_<mode>` suffix.
pub fn output_path(
    results_dir: &Path,
    name: &str,
    mode: StrategyMode,
    multi_mode: bool,
    ext: &str,
) -> PathBuf {
    let suffix = if multi_mode {
        format!("_{}", mode.as_str())
    } else {
        String::new()
    };
    results_dir.join(format!("{name}{suffix}.{ext}"))
}

const TIMESTEP_HEADER: &[&str] = &[
    "date",
    "symbol",
    "strategy_mode",
    "stance",
    "signal",
    "signal_reason",
    "strategy_gate_reason",
    "pricing_filter_passed",
    "path_filter_passed",
    "instability_filter_passed",
    "two_way_filter_passed",
    "rv_short",
    "rv_medium",
    "edge_iv_minus_rv",
    "edge_velocity",
    "trend_strength",
    "jump_abs_return",
    "rv_change",
    "choppiness",
    "chop_score",
    "cooldown_remaining",
    "cooldown_active",
    "long_pause_remaining",
    "spot",
    "option_mid",
    "requested_option_contracts",
    "executed_target_contracts",
    "option_contracts",
    "queued_option_contracts",
    "hedge_shares",
    "delta",
    "gamma",
    "vega",
    "requested_notional_exposure",
    "executed_target_notional_exposure",
    "requested_gamma_abs",
    "executed_target_gamma_abs",
    "requested_vega_abs",
    "executed_target_vega_abs",
    "notional_exposure",
    "cash_usage",
    "drawdown",
    "leverage",
    "equity",
    "daily_return",
    "option_mtm_pnl",
    "hedge_pnl",
    "fees",
    "slippage",
    "total_day_pnl",
    "kill_switch_events",
    "risk_events",
    "gamma_risk",
    "gamma_zone",
    "gamma_band_size_factor",
    "effective_size_factor",
    "risk_block_reason",
];

pub fn write_timestep_csv(path: &Path, steps: &[StepRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create timestep CSV {}", path.display()))?;
    writer.write_record(TIMESTEP_HEADER)?;
    for step in steps {
        let record: Vec<String> = vec![
            step.date.clone(),
            step.symbol.clone(),
            step.strategy_mode.as_str().to_string(),
            step.stance.as_str().to_string(),
            step.signal.to_string(),
            step.signal_reason.clone(),
            step.strategy_gate_reason
                .map_or(String::new(), |r| r.as_str().to_string()),
            step.pricing_filter_passed.to_string(),
            step.path_filter_passed.to_string(),
            step.instability_filter_passed.to_string(),
            step.two_way_filter_passed.to_string(),
            fmt6(step.rv_short),
            fmt6(step.rv_medium),
            fmt6(step.edge_iv_minus_rv),
            fmt6(step.edge_velocity),
            fmt6(step.trend_strength),
            fmt6(step.jump_abs_return),
            fmt6(step.rv_change),
            fmt6(step.choppiness),
            fmt6(step.chop_score),
            step.cooldown_remaining.to_string(),
            step.cooldown_active.to_string(),
            step.long_pause_remaining.to_string(),
            fmt4(step.spot),
            fmt4(step.option_mid),
            step.requested_option_contracts.to_string(),
            step.executed_target_contracts.to_string(),
            step.option_contracts.to_string(),
            step.queued_option_contracts.to_string(),
            step.hedge_shares.to_string(),
            fmt6(step.delta_exposure),
            fmt6(step.gamma_exposure),
            fmt6(step.vega_exposure),
            fmt6(step.requested_notional_exposure),
            fmt6(step.executed_target_notional_exposure),
            fmt6(step.requested_gamma_abs),
            fmt6(step.executed_target_gamma_abs),
            fmt6(step.requested_vega_abs),
            fmt6(step.executed_target_vega_abs),
            fmt6(step.notional_exposure),
            fmt6(step.cash_usage),
            fmt6(step.drawdown),
            fmt6(step.leverage),
            fmt6(step.equity),
            fmt6(step.daily_return),
            fmt6(step.option_mtm_pnl),
            fmt6(step.hedge_pnl),
            fmt6(step.fees),
            fmt6(step.slippage),
            fmt6(step.total_day_pnl),
            step.kill_switch_events.clone(),
            step.risk_events.clone(),
            fmt6(step.gamma_risk),
            step.gamma_zone.to_string(),
            fmt6(step.gamma_band_size_factor),
            fmt6(step.effective_size_factor),
            step.risk_block_reason.unwrap_or("").to_string(),
        ];
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_equity_csv(path: &Path, points: &[EquityPoint]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create equity CSV {}", path.display()))?;
    writer.write_record(["date", "equity", "drawdown"])?;
    for point in points {
        writer.write_record([
            point.date.as_str(),
            &fmt6(point.equity),
            &fmt6(point.drawdown),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

const SUMMARY_HEADER: &[&str] = &[
    "strategy_mode",
    "option_mtm_pnl",
    "hedge_pnl",
    "fees",
    "slippage",
    "total_pnl",
    "ending_equity",
    "max_drawdown",
];

fn summary_record(summary: &ModeSummary) -> Vec<String> {
    vec![
        summary.strategy_mode.clone(),
        fmt6(summary.option_mtm_pnl),
        fmt6(summary.hedge_pnl),
        fmt6(summary.fees),
        fmt6(summary.slippage),
        fmt6(summary.total_pnl),
        fmt6(summary.ending_equity),
        fmt6(summary.max_drawdown),
    ]
}

pub fn write_pnl_summary_csv(path: &Path, summary: &ModeSummary) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create PnL summary CSV {}", path.display()))?;
    writer.write_record(SUMMARY_HEADER)?;
    writer.write_record(summary_record(summary))?;
    writer.flush()?;
    Ok(())
}

/// Cross-mode comparison written only for multi-mode runs.
pub fn write_comparison_csv(path: &Path, summaries: &[ModeSummary]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create comparison CSV {}", path.display()))?;
    let mut header: Vec<&str> = SUMMARY_HEADER.to_vec();
    header.push("events_count");
    writer.write_record(header)?;
    for summary in summaries {
        let mut record = summary_record(summary);
        record.push(summary.events_count.to_string());
        writer.write_record(record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_events_log(path: &Path, events: &[String]) -> Result<()> {
    let mut file = fs::File::create(path)
        .with_context(|| format!("Failed to create event log {}", path.display()))?;
    for line in events {
        writeln!(file, "{line}")?;
    }
    Ok(())
}

/// Resolved-config snapshot so a run's thresholds can be reproduced exactly.
pub fn write_config_snapshot(path: &Path, config: &ReplayConfig) -> Result<()> {
    let rendered = toml::to_string_pretty(config).context("Failed to render config snapshot")?;
    fs::write(path, rendered)
        .with_context(|| format!("Failed to write config snapshot {}", path.display()))?;
    Ok(())
}

/// Per-mode block of the run summary JSON.
#[derive(Debug, Clone, Serialize)]
pub struct ModeReport {
    #[serde(flatten)]
    pub summary: ModeSummary,
    pub equity_stats: EquityCurveStats,
}

/// Top-level run summary written as JSON next to the CSV artifacts.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub symbol: String,
    pub year: i32,
    pub granularity: String,
    pub bars: usize,
    pub modes: Vec<ModeReport>,
}

pub fn write_summary_json(path: &Path, summary: &RunSummary) -> Result<()> {
    let rendered =
        serde_json::to_string_pretty(summary).context("Failed to render run summary")?;
    fs::write(path, rendered)
        .with_context(|| format!("Failed to write run summary {}", path.display()))?;
    Ok(())
}

/// Paths of the four per-mode artifacts.
#[derive(Debug, Clone)]
pub struct ModeArtifactPaths {
    pub timestep: PathBuf,
    pub equity: PathBuf,
    pub pnl: PathBuf,
    pub events: PathBuf,
}

/// Write every per-mode artifact for one completed run.
pub fn write_mode_artifacts(
    results_dir: &Path,
    result: &ModeRunResult,
    multi_mode: bool,
) -> Result<ModeArtifactPaths> {
    let paths = ModeArtifactPaths {
        timestep: output_path(results_dir, "timestep_log", result.mode, multi_mode, "csv"),
        equity: output_path(results_dir, "equity_curve", result.mode, multi_mode, "csv"),
        pnl: output_path(results_dir, "pnl_summary", result.mode, multi_mode, "csv"),
        events: output_path(results_dir, "events", result.mode, multi_mode, "log"),
    };
    write_timestep_csv(&paths.timestep, &result.steps)?;
    write_equity_csv(&paths.equity, &result.equity_curve)?;
    write_pnl_summary_csv(&paths.pnl, &result.summary)?;
    write_events_log(&paths.events, &result.events)?;
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SignalConfig;
    use crate::models::Bar;
    use crate::simulation::run_mode;
    use chrono::NaiveDate;

    fn bars(count: u32) -> Vec<Bar> {
        (1..=count)
            .map(|d| {
                let date = NaiveDate::from_ymd_opt(2025, 3, d).unwrap();
                Bar {
                    date: date.format("%Y-%m-%d").to_string(),
                    timestamp: date.and_hms_opt(0, 0, 0).unwrap(),
                    close: 100.0,
                    realized_vol: 0.10,
                    option_mid: 2.0,
                    iv: if d > 4 { 0.14 } else { 0.10 },
                    delta: 0.5,
                    gamma: 0.002,
                    vega: 0.05,
                    expiry_days: 14,
                }
            })
            .collect()
    }

    fn run() -> ModeRunResult {
        let config = ReplayConfig {
            signal: SignalConfig {
                rv_short_window: 2,
                rv_medium_window: 3,
                trend_window: 3,
                chop_window: 3,
                ..SignalConfig::default()
            },
            ..ReplayConfig::default()
        };
        run_mode(StrategyMode::ShortVol, "TEST", &bars(9), &config, 0)
    }

    #[test]
    fn test_mode_artifacts_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let result = run();
        let paths = write_mode_artifacts(dir.path(), &result, false).unwrap();

        let timestep = fs::read_to_string(&paths.timestep).unwrap();
        let mut lines = timestep.lines();
        assert_eq!(lines.next().unwrap(), TIMESTEP_HEADER.join(","));
        assert_eq!(timestep.lines().count(), result.steps.len() + 1);
        // Flat-drift market: chop score renders as inf, not NaN noise.
        assert!(timestep.contains(",inf,"));

        let equity = fs::read_to_string(&paths.equity).unwrap();
        assert!(equity.starts_with("date,equity,drawdown"));

        let pnl = fs::read_to_string(&paths.pnl).unwrap();
        assert!(pnl.starts_with(&SUMMARY_HEADER.join(",")));
        assert!(pnl.contains("short"));

        let events = fs::read_to_string(&paths.events).unwrap();
        assert_eq!(events.lines().count(), result.events.len());
    }

    #[test]
    fn test_multi_mode_paths_are_suffixed() {
        let dir = tempfile::tempdir().unwrap();
        let path = output_path(dir.path(), "timestep_log", StrategyMode::ShortVol, true, "csv");
        assert!(path.ends_with("timestep_log_short.csv"));
        let path = output_path(dir.path(), "events", StrategyMode::Adaptive, false, "log");
        assert!(path.ends_with("events.log"));
    }

    #[test]
    fn test_comparison_and_snapshot_writers() {
        let dir = tempfile::tempdir().unwrap();
        let result = run();

        let comparison = dir.path().join("pnl_summary_all_modes.csv");
        write_comparison_csv(&comparison, &[result.summary.clone()]).unwrap();
        let text = fs::read_to_string(&comparison).unwrap();
        assert!(text.starts_with("strategy_mode,"));
        assert!(text.contains("events_count"));

        let snapshot = dir.path().join("config_resolved.toml");
        write_config_snapshot(&snapshot, &ReplayConfig::default()).unwrap();
        let text = fs::read_to_string(&snapshot).unwrap();
        assert!(text.contains("[signal]"));
        assert!(text.contains("rv_short_window"));

        let summary_path = dir.path().join("run_summary.json");
        write_summary_json(
            &summary_path,
            &RunSummary {
                symbol: "TEST".into(),
                year: 2025,
                granularity: "daily".into(),
                bars: result.steps.len(),
                modes: vec![ModeReport {
                    summary: result.summary.clone(),
                    equity_stats: result.equity_stats.clone(),
                }],
            },
        )
        .unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&summary_path).unwrap()).unwrap();
        assert_eq!(parsed["symbol"], "TEST");
        assert_eq!(parsed["modes"][0]["strategy_mode"], "short");
    }
}
