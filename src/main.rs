//! Volbot Replay CLI
//!
//! Replays a delta-hedged volatility strategy bar-by-bar over a recorded
//! price/option dataset and writes equity, exposure, and event artifacts.
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --bin volbot -- \
//!   --symbol SPY --year 2025 \
//!   --strategy-mode both \
//!   --start-date 2025-02-01 --end-date 2025-06-30
//! ```
//!
//! Datasets are two CSVs per symbol/year (`<sym>_<year>_prices.csv`,
//! `<sym>_<year>_options.csv`) produced by the `dataset_gen` tool.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use rayon::prelude::*;
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use volbot_backend::config::{
    KillSwitchConfig, OverlayConfig, ReplayConfig, RiskLimitsConfig, SignalConfig,
};
use volbot_backend::data::{
    filter_by_period, infer_granularity, load_options, load_prices, merge_market_data,
    resolve_input_paths, Granularity,
};
use volbot_backend::models::StrategyMode;
use volbot_backend::report::{
    write_comparison_csv, write_config_snapshot, write_mode_artifacts, write_summary_json,
    ModeReport, RunSummary,
};
use volbot_backend::simulation::{run_mode, ModeRunResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Short,
    Long,
    Both,
    Adaptive,
}

impl ModeArg {
    fn modes(self) -> Vec<StrategyMode> {
        match self {
            ModeArg::Short => vec![StrategyMode::ShortVol],
            ModeArg::Long => vec![StrategyMode::LongVol],
            ModeArg::Both => vec![StrategyMode::ShortVol, StrategyMode::LongVol],
            ModeArg::Adaptive => vec![StrategyMode::Adaptive],
        }
    }
}

/// Run delta-hedged volatility replay with risk controls.
#[derive(Parser, Debug)]
#[command(name = "volbot")]
#[command(about = "Replay a delta-hedged volatility strategy with risk controls")]
struct Cli {
    /// Ticker symbol for dataset selection.
    #[arg(long, default_value = "SPY")]
    symbol: String,

    /// Dataset year.
    #[arg(long, default_value_t = 2025)]
    year: i32,

    /// Inclusive start timestamp, YYYY-MM-DD or "YYYY-MM-DD HH:MM".
    #[arg(long)]
    start_date: Option<String>,

    /// Inclusive end timestamp, YYYY-MM-DD or "YYYY-MM-DD HH:MM".
    #[arg(long)]
    end_date: Option<String>,

    /// Directory holding the dataset CSVs.
    #[arg(long, env = "VOLBOT_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Directory receiving the run artifacts.
    #[arg(long, env = "VOLBOT_RESULTS_DIR", default_value = "results")]
    results_dir: PathBuf,

    /// Strategy mode: short-vol, long-vol, both, or adaptive.
    #[arg(long, value_enum, default_value_t = ModeArg::Both)]
    strategy_mode: ModeArg,

    /// Log progress every N bars (0 disables).
    #[arg(long, default_value_t = 10_000)]
    progress_every: usize,

    // Gamma band kill switch.
    /// G1 threshold for the green gamma zone.
    #[arg(long, default_value_t = 5.0)]
    gamma_green_threshold: f64,
    /// G2 threshold for the red gamma zone.
    #[arg(long, default_value_t = 10.0)]
    gamma_red_threshold: f64,
    /// Size multiplier in the yellow zone.
    #[arg(long, default_value_t = 0.50)]
    gamma_yellow_size_factor: f64,
    /// Size multiplier in the red zone.
    #[arg(long, default_value_t = 0.25)]
    gamma_red_size_factor: f64,
    /// D1 drawdown threshold for the flatten kill in the red zone.
    #[arg(long, default_value_t = 0.12)]
    gamma_kill_drawdown_threshold: f64,

    // Hard budgets.
    /// Starting capital per mode.
    #[arg(long, default_value_t = 10_000.0)]
    initial_capital: f64,
    /// Max |option notional| / equity ratio.
    #[arg(long, default_value_t = 0.20)]
    max_capital_at_risk: f64,
    /// Global maximum leverage limit.
    #[arg(long, default_value_t = 6.0)]
    max_leverage: f64,
    /// Hard cap on absolute gamma exposure.
    #[arg(long, default_value_t = 75.0)]
    max_abs_gamma: f64,
    /// Hard cap on absolute vega exposure.
    #[arg(long, default_value_t = 300.0)]
    max_abs_vega: f64,

    // Drawdown overlays.
    /// Throttle size when drawdown reaches this level, independent of gamma.
    #[arg(long, default_value_t = 0.10)]
    global_drawdown_throttle_threshold: f64,
    /// Size multiplier applied while the global drawdown throttle is active.
    #[arg(long, default_value_t = 0.50)]
    global_drawdown_throttle_size_factor: f64,
    /// Flatten positions when drawdown reaches this level, independent of gamma.
    #[arg(long, default_value_t = 0.20)]
    global_drawdown_kill_threshold: f64,
    /// Long-vol pause trigger drawdown threshold.
    #[arg(long, default_value_t = 0.10)]
    long_pause_drawdown_threshold: f64,
    /// Hard-kill drawdown threshold for long-vol exposure.
    #[arg(long, default_value_t = 0.40)]
    long_catastrophic_kill_threshold: f64,
    /// Long-vol sizing uses target |vega| = equity * ratio.
    #[arg(long, default_value_t = 0.015)]
    long_vega_budget_ratio: f64,

    // Signal windows.
    /// Short realized-vol rolling window (bars).
    #[arg(long, default_value_t = 30)]
    rv_short_window: usize,
    /// Medium realized-vol rolling window (bars).
    #[arg(long, default_value_t = 240)]
    rv_medium_window: usize,
    /// Trend filter rolling window (bars).
    #[arg(long, default_value_t = 120)]
    trend_window: usize,
    /// Choppiness rolling window (bars).
    #[arg(long, default_value_t = 30)]
    chop_window: usize,

    // Short-vol filters.
    /// Minimum IV-RV edge for short-vol entries.
    #[arg(long, default_value_t = 0.02)]
    short_edge_threshold: f64,
    /// Max allowed edge deterioration per bar for the short-vol gate.
    #[arg(long, default_value_t = 0.005)]
    short_edge_collapse_tolerance: f64,
    /// Max trend strength allowed for short-vol.
    #[arg(long, default_value_t = 0.004)]
    short_trend_threshold: f64,
    /// Max absolute 1-bar return allowed for short-vol.
    #[arg(long, default_value_t = 0.006)]
    short_jump_threshold: f64,
    /// Max |RV short - RV medium| allowed for short-vol.
    #[arg(long, default_value_t = 0.06)]
    short_rv_change_threshold: f64,
    /// Bars to stay FLAT after a short-mode exit.
    #[arg(long, default_value_t = 30)]
    cooldown_bars: u32,

    // Adaptive regime machine.
    /// Consecutive bars required to confirm adaptive regime entry.
    #[arg(long, default_value_t = 3)]
    adaptive_enter_persist_bars: u32,
    /// Consecutive bars required to confirm adaptive regime exit.
    #[arg(long, default_value_t = 2)]
    adaptive_exit_persist_bars: u32,
    /// Bars to stay paused after an adaptive exit or risk pause.
    #[arg(long, default_value_t = 30)]
    adaptive_pause_bars: u32,
    /// Adaptive short entry edge threshold E (IV-RV_short > E).
    #[arg(long, default_value_t = 0.02)]
    adaptive_short_edge_enter: f64,
    /// Adaptive short exit edge threshold E_exit (IV-RV_short < E_exit).
    #[arg(long, default_value_t = 0.01)]
    adaptive_short_edge_exit: f64,
    /// Adaptive short entry trend threshold T_low (trend < T_low).
    #[arg(long, default_value_t = 0.004)]
    adaptive_short_trend_enter: f64,
    /// Adaptive short exit trend threshold T_high (trend > T_high).
    #[arg(long, default_value_t = 0.006)]
    adaptive_short_trend_exit: f64,
    /// Low vol-of-vol threshold V_low for short entry.
    #[arg(long, default_value_t = 0.003)]
    adaptive_vov_low: f64,
    /// High vol-of-vol threshold V_high for short exit / long entry.
    #[arg(long, default_value_t = 0.006)]
    adaptive_vov_high: f64,
    /// Long exit vol-of-vol threshold V_exit.
    #[arg(long, default_value_t = 0.004)]
    adaptive_vov_exit: f64,
    /// Adaptive long entry cheapness C (RV_short-IV > C). Can be negative.
    #[arg(long, default_value_t = 0.003, allow_hyphen_values = true)]
    adaptive_long_cheapness_enter: f64,
    /// Adaptive long exit cheapness C_exit (RV_short-IV < C_exit). Can be negative.
    #[arg(long, default_value_t = 0.0015, allow_hyphen_values = true)]
    adaptive_long_cheapness_exit: f64,
    /// Adaptive long trend cap T_max (trend < T_max).
    #[arg(long, default_value_t = 0.008)]
    adaptive_long_trend_max: f64,
    /// Minimum strength-score gap required to pick a side when both adaptive
    /// regimes qualify on the same bar.
    #[arg(long, default_value_t = 0.001)]
    adaptive_confidence_buffer: f64,
}

impl Cli {
    fn signal_config(&self) -> SignalConfig {
        SignalConfig {
            rv_short_window: self.rv_short_window,
            rv_medium_window: self.rv_medium_window,
            trend_window: self.trend_window,
            chop_window: self.chop_window,
            short_edge_threshold: self.short_edge_threshold,
            short_edge_collapse_tolerance: self.short_edge_collapse_tolerance,
            short_trend_threshold: self.short_trend_threshold,
            short_jump_threshold: self.short_jump_threshold,
            short_rv_change_threshold: self.short_rv_change_threshold,
            cooldown_bars: self.cooldown_bars,
            adaptive_enter_persist_bars: self.adaptive_enter_persist_bars,
            adaptive_exit_persist_bars: self.adaptive_exit_persist_bars,
            adaptive_pause_bars: self.adaptive_pause_bars,
            adaptive_short_edge_enter: self.adaptive_short_edge_enter,
            adaptive_short_edge_exit: self.adaptive_short_edge_exit,
            adaptive_short_trend_enter: self.adaptive_short_trend_enter,
            adaptive_short_trend_exit: self.adaptive_short_trend_exit,
            adaptive_vov_low: self.adaptive_vov_low,
            adaptive_vov_high: self.adaptive_vov_high,
            adaptive_vov_exit: self.adaptive_vov_exit,
            adaptive_long_cheapness_enter: self.adaptive_long_cheapness_enter,
            adaptive_long_cheapness_exit: self.adaptive_long_cheapness_exit,
            adaptive_long_trend_max: self.adaptive_long_trend_max,
            adaptive_confidence_buffer: self.adaptive_confidence_buffer,
        }
    }

    fn replay_config(&self) -> ReplayConfig {
        ReplayConfig {
            signal: self.signal_config(),
            kill_switch: KillSwitchConfig {
                gamma_green_threshold: self.gamma_green_threshold,
                gamma_red_threshold: self.gamma_red_threshold,
                gamma_yellow_size_factor: self.gamma_yellow_size_factor,
                gamma_red_size_factor: self.gamma_red_size_factor,
                kill_drawdown_threshold: self.gamma_kill_drawdown_threshold,
            },
            limits: RiskLimitsConfig {
                initial_capital: self.initial_capital,
                max_capital_at_risk: self.max_capital_at_risk,
                max_leverage: self.max_leverage,
                max_abs_gamma: self.max_abs_gamma,
                max_abs_vega: self.max_abs_vega,
            },
            overlay: OverlayConfig {
                global_drawdown_throttle_threshold: self.global_drawdown_throttle_threshold,
                global_drawdown_throttle_size_factor: self.global_drawdown_throttle_size_factor,
                global_drawdown_kill_threshold: self.global_drawdown_kill_threshold,
                long_pause_drawdown_threshold: self.long_pause_drawdown_threshold,
                long_catastrophic_kill_threshold: self.long_catastrophic_kill_threshold,
                long_vega_budget_ratio: self.long_vega_budget_ratio,
            },
            execution: Default::default(),
        }
    }
}

/// Pick the signal config for the dataset's granularity. Daily bars fall back
/// to the built-in daily preset wherever the user left the intraday defaults
/// untouched.
fn resolve_signal_config(user: SignalConfig, granularity: Granularity) -> SignalConfig {
    if granularity == Granularity::Intraday {
        info!("detected intraday timestamps; using intraday/default signal parameters");
        return user;
    }
    if user == SignalConfig::default() {
        info!("detected daily timestamps with default signal settings; applying daily preset");
        return SignalConfig::daily_preset();
    }
    info!("detected daily timestamps; applying daily preset baseline with user overrides");
    SignalConfig::daily_with_overrides(&user)
}

fn log_mode_summary(result: &ModeRunResult) {
    let summary = &result.summary;
    info!(
        mode = %summary.strategy_mode,
        ending_equity = summary.ending_equity,
        max_drawdown = summary.max_drawdown,
        "simulation complete"
    );
    info!(
        mode = %summary.strategy_mode,
        option_mtm = summary.option_mtm_pnl,
        hedge = summary.hedge_pnl,
        fees = summary.fees,
        slippage = summary.slippage,
        total = summary.total_pnl,
        "pnl decomposition"
    );
    info!(
        mode = %summary.strategy_mode,
        events = summary.events_count,
        "event log entries"
    );
}

fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.replay_config();
    // All threshold combinations are checked before any bar is touched.
    config.validate().context("Invalid configuration")?;

    let symbol = cli.symbol.trim().to_uppercase();
    let (prices_path, options_path) = resolve_input_paths(&cli.data_dir, &symbol, cli.year)?;
    info!(prices = %prices_path.display(), options = %options_path.display(), "loading dataset");

    let bars = merge_market_data(load_prices(&prices_path)?, load_options(&options_path)?)?;
    let bars = filter_by_period(
        bars,
        cli.start_date.as_deref(),
        cli.end_date.as_deref(),
    )?;
    if bars.is_empty() {
        bail!(
            "No market data available after loading/filtering. \
             Check symbol/year files and start/end dates."
        );
    }

    let granularity = infer_granularity(&bars);
    let config = ReplayConfig {
        signal: resolve_signal_config(config.signal.clone(), granularity),
        ..config
    };
    config.validate().context("Invalid resolved configuration")?;

    let modes = cli.strategy_mode.modes();
    let multi_mode = modes.len() > 1;
    info!(
        symbol = %symbol,
        year = cli.year,
        bars = bars.len(),
        granularity = granularity.as_str(),
        modes = ?modes.iter().map(|m| m.as_str()).collect::<Vec<_>>(),
        "starting replay"
    );

    // Modes share nothing mutable, so a multi-mode run fans out in parallel.
    let results: Vec<ModeRunResult> = if multi_mode {
        modes
            .par_iter()
            .map(|&mode| run_mode(mode, &symbol, &bars, &config, cli.progress_every))
            .collect()
    } else {
        modes
            .iter()
            .map(|&mode| run_mode(mode, &symbol, &bars, &config, cli.progress_every))
            .collect()
    };

    fs::create_dir_all(&cli.results_dir).with_context(|| {
        format!("Failed to create results dir {}", cli.results_dir.display())
    })?;

    for result in &results {
        let paths = write_mode_artifacts(&cli.results_dir, result, multi_mode)?;
        log_mode_summary(result);
        info!(
            mode = result.mode.as_str(),
            timestep = %paths.timestep.display(),
            equity = %paths.equity.display(),
            pnl = %paths.pnl.display(),
            events = %paths.events.display(),
            "artifacts written"
        );
    }

    if multi_mode {
        let comparison = cli.results_dir.join("pnl_summary_all_modes.csv");
        write_comparison_csv(
            &comparison,
            &results.iter().map(|r| r.summary.clone()).collect::<Vec<_>>(),
        )?;
        info!(path = %comparison.display(), "cross-mode summary written");
    }

    let snapshot = cli.results_dir.join("config_resolved.toml");
    write_config_snapshot(&snapshot, &config)?;

    let summary_path = cli.results_dir.join("run_summary.json");
    write_summary_json(
        &summary_path,
        &RunSummary {
            symbol: symbol.clone(),
            year: cli.year,
            granularity: granularity.as_str().to_string(),
            bars: bars.len(),
            modes: results
                .iter()
                .map(|r| ModeReport {
                    summary: r.summary.clone(),
                    equity_stats: r.equity_stats.clone(),
                })
                .collect(),
        },
    )?;
    info!(path = %summary_path.display(), "run summary written");

    Ok(())
}
