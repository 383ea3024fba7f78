//! Run configuration: signal thresholds, risk budgets, overlay levels, and
//! execution costs.
//!
//! Every threshold is validated once at startup; an invalid combination is a
//! fatal error raised before the first bar is processed, never mid-run.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

// =============================================================================
// SIGNAL CONFIGURATION
// =============================================================================

/// Thresholds and windows consumed by the regime signal engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Short realized-vol rolling window (bars).
    pub rv_short_window: usize,
    /// Medium realized-vol rolling window (bars).
    pub rv_medium_window: usize,
    /// Trend filter rolling window (bars).
    pub trend_window: usize,
    /// Choppiness rolling window (bars).
    pub chop_window: usize,

    /// Minimum IV-RV edge for short-vol entries.
    pub short_edge_threshold: f64,
    /// Max allowed edge deterioration per bar for the short-vol gate.
    pub short_edge_collapse_tolerance: f64,
    /// Max trend strength allowed for short-vol.
    pub short_trend_threshold: f64,
    /// Max absolute 1-bar return allowed for short-vol.
    pub short_jump_threshold: f64,
    /// Max |RV short - RV medium| allowed for short-vol.
    pub short_rv_change_threshold: f64,

    /// Bars to stay FLAT after a short-mode exit.
    pub cooldown_bars: u32,

    /// Consecutive bars required to confirm adaptive regime entry.
    pub adaptive_enter_persist_bars: u32,
    /// Consecutive bars required to confirm adaptive regime exit.
    pub adaptive_exit_persist_bars: u32,
    /// Bars to stay paused after an adaptive exit or risk pause.
    pub adaptive_pause_bars: u32,
    /// Adaptive short entry edge threshold (edge > E).
    pub adaptive_short_edge_enter: f64,
    /// Adaptive short exit edge threshold (edge < E_exit).
    pub adaptive_short_edge_exit: f64,
    /// Adaptive short entry trend threshold (trend < T_low).
    pub adaptive_short_trend_enter: f64,
    /// Adaptive short exit trend threshold (trend > T_high).
    pub adaptive_short_trend_exit: f64,
    /// Low vol-of-vol threshold for short entry.
    pub adaptive_vov_low: f64,
    /// High vol-of-vol threshold for short exit / long entry.
    pub adaptive_vov_high: f64,
    /// Long exit vol-of-vol threshold.
    pub adaptive_vov_exit: f64,
    /// Adaptive long entry cheapness threshold (-edge > C). Can be negative.
    pub adaptive_long_cheapness_enter: f64,
    /// Adaptive long exit cheapness threshold (-edge < C_exit). Can be negative.
    pub adaptive_long_cheapness_exit: f64,
    /// Adaptive long trend cap (trend < T_max).
    pub adaptive_long_trend_max: f64,
    /// Minimum strength-score gap required to pick a side when both adaptive
    /// regimes qualify on the same bar.
    pub adaptive_confidence_buffer: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            rv_short_window: 30,
            rv_medium_window: 240,
            trend_window: 120,
            chop_window: 30,
            short_edge_threshold: 0.02,
            short_edge_collapse_tolerance: 0.005,
            short_trend_threshold: 0.004,
            short_jump_threshold: 0.006,
            short_rv_change_threshold: 0.06,
            cooldown_bars: 30,
            adaptive_enter_persist_bars: 3,
            adaptive_exit_persist_bars: 2,
            adaptive_pause_bars: 30,
            adaptive_short_edge_enter: 0.02,
            adaptive_short_edge_exit: 0.01,
            adaptive_short_trend_enter: 0.004,
            adaptive_short_trend_exit: 0.006,
            adaptive_vov_low: 0.003,
            adaptive_vov_high: 0.006,
            adaptive_vov_exit: 0.004,
            adaptive_long_cheapness_enter: 0.003,
            adaptive_long_cheapness_exit: 0.0015,
            adaptive_long_trend_max: 0.008,
            adaptive_confidence_buffer: 0.001,
        }
    }
}

impl SignalConfig {
    /// Bars of history required before any non-FLAT stance is possible.
    pub fn min_warmup_bars(&self) -> usize {
        self.rv_short_window
            .max(self.rv_medium_window)
            .max(self.trend_window)
    }

    /// Built-in baseline tuned for daily bars. The intraday defaults are far
    /// too tight for daily granularity and would never trigger.
    pub fn daily_preset() -> Self {
        Self {
            rv_short_window: 5,
            rv_medium_window: 20,
            trend_window: 20,
            chop_window: 10,
            short_edge_threshold: 0.005,
            short_edge_collapse_tolerance: 0.02,
            short_trend_threshold: 0.03,
            short_jump_threshold: 0.03,
            short_rv_change_threshold: 0.20,
            cooldown_bars: 3,
            adaptive_enter_persist_bars: 2,
            adaptive_exit_persist_bars: 2,
            adaptive_pause_bars: 2,
            adaptive_short_edge_enter: 0.02,
            adaptive_short_edge_exit: 0.0,
            adaptive_short_trend_enter: 0.015,
            adaptive_short_trend_exit: 0.03,
            adaptive_vov_low: 0.01,
            adaptive_vov_high: 0.02,
            adaptive_vov_exit: 0.015,
            adaptive_long_cheapness_enter: -0.04,
            adaptive_long_cheapness_exit: -0.04,
            adaptive_long_trend_max: 0.05,
            adaptive_confidence_buffer: 0.0,
        }
    }

    /// Daily-preset baseline with user overrides applied: a field wins over
    /// the preset only where the user moved it away from the intraday default.
    pub fn daily_with_overrides(user: &Self) -> Self {
        let d = Self::default();
        let p = Self::daily_preset();
        Self {
            rv_short_window: pick(user.rv_short_window, d.rv_short_window, p.rv_short_window),
            rv_medium_window: pick(user.rv_medium_window, d.rv_medium_window, p.rv_medium_window),
            trend_window: pick(user.trend_window, d.trend_window, p.trend_window),
            chop_window: pick(user.chop_window, d.chop_window, p.chop_window),
            short_edge_threshold: pick(
                user.short_edge_threshold,
                d.short_edge_threshold,
                p.short_edge_threshold,
            ),
            short_edge_collapse_tolerance: pick(
                user.short_edge_collapse_tolerance,
                d.short_edge_collapse_tolerance,
                p.short_edge_collapse_tolerance,
            ),
            short_trend_threshold: pick(
                user.short_trend_threshold,
                d.short_trend_threshold,
                p.short_trend_threshold,
            ),
            short_jump_threshold: pick(
                user.short_jump_threshold,
                d.short_jump_threshold,
                p.short_jump_threshold,
            ),
            short_rv_change_threshold: pick(
                user.short_rv_change_threshold,
                d.short_rv_change_threshold,
                p.short_rv_change_threshold,
            ),
            cooldown_bars: pick(user.cooldown_bars, d.cooldown_bars, p.cooldown_bars),
            adaptive_enter_persist_bars: pick(
                user.adaptive_enter_persist_bars,
                d.adaptive_enter_persist_bars,
                p.adaptive_enter_persist_bars,
            ),
            adaptive_exit_persist_bars: pick(
                user.adaptive_exit_persist_bars,
                d.adaptive_exit_persist_bars,
                p.adaptive_exit_persist_bars,
            ),
            adaptive_pause_bars: pick(
                user.adaptive_pause_bars,
                d.adaptive_pause_bars,
                p.adaptive_pause_bars,
            ),
            adaptive_short_edge_enter: pick(
                user.adaptive_short_edge_enter,
                d.adaptive_short_edge_enter,
                p.adaptive_short_edge_enter,
            ),
            adaptive_short_edge_exit: pick(
                user.adaptive_short_edge_exit,
                d.adaptive_short_edge_exit,
                p.adaptive_short_edge_exit,
            ),
            adaptive_short_trend_enter: pick(
                user.adaptive_short_trend_enter,
                d.adaptive_short_trend_enter,
                p.adaptive_short_trend_enter,
            ),
            adaptive_short_trend_exit: pick(
                user.adaptive_short_trend_exit,
                d.adaptive_short_trend_exit,
                p.adaptive_short_trend_exit,
            ),
            adaptive_vov_low: pick(user.adaptive_vov_low, d.adaptive_vov_low, p.adaptive_vov_low),
            adaptive_vov_high: pick(
                user.adaptive_vov_high,
                d.adaptive_vov_high,
                p.adaptive_vov_high,
            ),
            adaptive_vov_exit: pick(
                user.adaptive_vov_exit,
                d.adaptive_vov_exit,
                p.adaptive_vov_exit,
            ),
            adaptive_long_cheapness_enter: pick(
                user.adaptive_long_cheapness_enter,
                d.adaptive_long_cheapness_enter,
                p.adaptive_long_cheapness_enter,
            ),
            adaptive_long_cheapness_exit: pick(
                user.adaptive_long_cheapness_exit,
                d.adaptive_long_cheapness_exit,
                p.adaptive_long_cheapness_exit,
            ),
            adaptive_long_trend_max: pick(
                user.adaptive_long_trend_max,
                d.adaptive_long_trend_max,
                p.adaptive_long_trend_max,
            ),
            adaptive_confidence_buffer: pick(
                user.adaptive_confidence_buffer,
                d.adaptive_confidence_buffer,
                p.adaptive_confidence_buffer,
            ),
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.rv_short_window > 0 && self.rv_medium_window > 0,
            "rv-short-window and rv-medium-window must be positive"
        );
        ensure!(
            self.rv_short_window <= self.rv_medium_window,
            "rv-short-window should be <= rv-medium-window"
        );
        ensure!(
            self.trend_window > 0 && self.chop_window > 0,
            "trend-window and chop-window must be positive"
        );
        ensure!(
            self.short_edge_threshold >= 0.0,
            "short-edge-threshold must be non-negative"
        );
        ensure!(
            self.adaptive_enter_persist_bars >= 1,
            "adaptive-enter-persist-bars must be positive"
        );
        ensure!(
            self.adaptive_exit_persist_bars >= 1,
            "adaptive-exit-persist-bars must be positive"
        );
        ensure!(
            self.adaptive_short_edge_enter >= 0.0 && self.adaptive_short_edge_exit >= 0.0,
            "adaptive short edge thresholds must be non-negative"
        );
        ensure!(
            self.adaptive_short_edge_exit <= self.adaptive_short_edge_enter,
            "adaptive-short-edge-exit must be <= adaptive-short-edge-enter"
        );
        ensure!(
            self.adaptive_short_trend_enter >= 0.0 && self.adaptive_short_trend_exit >= 0.0,
            "adaptive short trend thresholds must be non-negative"
        );
        ensure!(
            self.adaptive_short_trend_exit >= self.adaptive_short_trend_enter,
            "adaptive-short-trend-exit must be >= adaptive-short-trend-enter"
        );
        ensure!(
            self.adaptive_vov_low >= 0.0 && self.adaptive_vov_high >= 0.0 && self.adaptive_vov_exit >= 0.0,
            "adaptive vol-of-vol thresholds must be non-negative"
        );
        ensure!(
            self.adaptive_vov_high > self.adaptive_vov_low,
            "adaptive-vov-high must be > adaptive-vov-low"
        );
        ensure!(
            self.adaptive_vov_low <= self.adaptive_vov_exit
                && self.adaptive_vov_exit <= self.adaptive_vov_high,
            "adaptive-vov-exit must be between adaptive-vov-low and adaptive-vov-high"
        );
        ensure!(
            self.adaptive_long_cheapness_exit <= self.adaptive_long_cheapness_enter,
            "adaptive-long-cheapness-exit must be <= adaptive-long-cheapness-enter"
        );
        ensure!(
            self.adaptive_long_trend_max >= 0.0,
            "adaptive-long-trend-max must be non-negative"
        );
        ensure!(
            self.adaptive_confidence_buffer >= 0.0,
            "adaptive-confidence-buffer must be non-negative"
        );
        Ok(())
    }
}

fn pick<T: Copy + PartialEq>(user: T, default: T, preset: T) -> T {
    if user != default {
        user
    } else {
        preset
    }
}

// =============================================================================
// RISK CONFIGURATION
// =============================================================================

/// Gamma-band kill switch thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KillSwitchConfig {
    /// G1: gamma risk at or below this stays green.
    pub gamma_green_threshold: f64,
    /// G2: gamma risk above this is red.
    pub gamma_red_threshold: f64,
    /// Size multiplier applied in the yellow zone.
    pub gamma_yellow_size_factor: f64,
    /// Size multiplier applied in the red zone.
    pub gamma_red_size_factor: f64,
    /// D1: drawdown above which a red zone also flattens positions.
    pub kill_drawdown_threshold: f64,
}

impl Default for KillSwitchConfig {
    fn default() -> Self {
        Self {
            gamma_green_threshold: 5.0,
            gamma_red_threshold: 10.0,
            gamma_yellow_size_factor: 0.50,
            gamma_red_size_factor: 0.25,
            kill_drawdown_threshold: 0.12,
        }
    }
}

impl KillSwitchConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.gamma_green_threshold >= 0.0 && self.gamma_red_threshold >= 0.0,
            "gamma thresholds must be non-negative"
        );
        ensure!(
            self.gamma_green_threshold < self.gamma_red_threshold,
            "require gamma-green-threshold < gamma-red-threshold"
        );
        ensure!(
            self.gamma_yellow_size_factor > 0.0 && self.gamma_yellow_size_factor <= 1.0,
            "gamma-yellow-size-factor must be in (0, 1]"
        );
        ensure!(
            self.gamma_red_size_factor > 0.0 && self.gamma_red_size_factor <= 1.0,
            "gamma-red-size-factor must be in (0, 1]"
        );
        ensure!(
            self.gamma_red_size_factor <= self.gamma_yellow_size_factor,
            "gamma-red-size-factor should be <= gamma-yellow-size-factor"
        );
        ensure!(
            self.kill_drawdown_threshold >= 0.0,
            "gamma-kill-drawdown-threshold must be non-negative"
        );
        Ok(())
    }
}

/// Hard position/risk budgets enforced by the trade limiter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskLimitsConfig {
    pub initial_capital: f64,
    /// Max |option notional| / equity ratio.
    pub max_capital_at_risk: f64,
    /// Max total notional / equity ratio.
    pub max_leverage: f64,
    /// Hard cap on absolute gamma exposure.
    pub max_abs_gamma: f64,
    /// Hard cap on absolute vega exposure.
    pub max_abs_vega: f64,
}

impl Default for RiskLimitsConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            max_capital_at_risk: 0.20,
            max_leverage: 6.0,
            max_abs_gamma: 75.0,
            max_abs_vega: 300.0,
        }
    }
}

impl RiskLimitsConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.initial_capital > 0.0, "initial-capital must be > 0");
        ensure!(
            self.max_capital_at_risk > 0.0,
            "max-capital-at-risk must be > 0"
        );
        ensure!(self.max_leverage > 0.0, "max-leverage must be > 0");
        ensure!(self.max_abs_gamma > 0.0, "max-abs-gamma must be > 0");
        ensure!(self.max_abs_vega > 0.0, "max-abs-vega must be > 0");
        Ok(())
    }
}

/// Mode-level drawdown overlays stacked on top of the kill switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Throttle size when drawdown reaches this level, independent of gamma.
    pub global_drawdown_throttle_threshold: f64,
    /// Size multiplier applied while the global drawdown throttle is active.
    pub global_drawdown_throttle_size_factor: f64,
    /// Flatten positions when drawdown reaches this level, independent of gamma.
    pub global_drawdown_kill_threshold: f64,
    /// Long-vol pause trigger drawdown threshold.
    pub long_pause_drawdown_threshold: f64,
    /// Hard-kill drawdown threshold for long-vol exposure.
    pub long_catastrophic_kill_threshold: f64,
    /// Long-vol sizing budget: target |vega| = equity * ratio.
    pub long_vega_budget_ratio: f64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            global_drawdown_throttle_threshold: 0.10,
            global_drawdown_throttle_size_factor: 0.50,
            global_drawdown_kill_threshold: 0.20,
            long_pause_drawdown_threshold: 0.10,
            long_catastrophic_kill_threshold: 0.40,
            long_vega_budget_ratio: 0.015,
        }
    }
}

impl OverlayConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.global_drawdown_throttle_threshold >= 0.0,
            "global-drawdown-throttle-threshold must be non-negative"
        );
        ensure!(
            self.global_drawdown_kill_threshold >= 0.0,
            "global-drawdown-kill-threshold must be non-negative"
        );
        ensure!(
            self.global_drawdown_kill_threshold >= self.global_drawdown_throttle_threshold,
            "global-drawdown-kill-threshold must be >= global-drawdown-throttle-threshold"
        );
        ensure!(
            self.global_drawdown_throttle_size_factor > 0.0
                && self.global_drawdown_throttle_size_factor <= 1.0,
            "global-drawdown-throttle-size-factor must be in (0, 1]"
        );
        ensure!(
            self.long_pause_drawdown_threshold >= 0.0,
            "long-pause-drawdown-threshold must be non-negative"
        );
        ensure!(
            self.long_catastrophic_kill_threshold >= 0.0,
            "long-catastrophic-kill-threshold must be non-negative"
        );
        ensure!(
            self.long_catastrophic_kill_threshold >= self.long_pause_drawdown_threshold,
            "long-catastrophic-kill-threshold must be >= long-pause-drawdown-threshold"
        );
        ensure!(
            self.long_vega_budget_ratio > 0.0,
            "long-vega-budget-ratio must be > 0"
        );
        Ok(())
    }
}

/// Per-leg execution cost model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub option_fee_per_contract: f64,
    pub option_slippage_bps: f64,
    pub hedge_fee_per_share: f64,
    pub hedge_slippage_bps: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            option_fee_per_contract: 0.65,
            option_slippage_bps: 5.0,
            hedge_fee_per_share: 0.005,
            hedge_slippage_bps: 1.0,
        }
    }
}

impl ExecutionConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.option_fee_per_contract >= 0.0
                && self.option_slippage_bps >= 0.0
                && self.hedge_fee_per_share >= 0.0
                && self.hedge_slippage_bps >= 0.0,
            "execution fees and slippage must be non-negative"
        );
        Ok(())
    }
}

// =============================================================================
// AGGREGATE
// =============================================================================

/// Everything a single replay run needs, resolved and validated up front.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    pub signal: SignalConfig,
    pub kill_switch: KillSwitchConfig,
    pub limits: RiskLimitsConfig,
    pub overlay: OverlayConfig,
    pub execution: ExecutionConfig,
}

impl ReplayConfig {
    pub fn validate(&self) -> Result<()> {
        self.signal.validate()?;
        self.kill_switch.validate()?;
        self.limits.validate()?;
        self.overlay.validate()?;
        self.execution.validate()?;
        Ok(())
    }
}
