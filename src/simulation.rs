//! Per-bar replay orchestration.
//!
//! Each bar is processed in a fixed order: mark the opening position to
//! market, evaluate the kill switch and mode-specific drawdown overlays on
//! pre-trade state, execute the target queued on the *previous* bar (the
//! one-bar decision-to-execution delay), then compute this bar's signal and
//! queue the next target behind the strategy gates. Overlays stack
//! additively: every trigger appends its own reason tag and several tags can
//! coexist on one bar.

use crate::analytics::{
    compute_exposures, summarize_equity_curve, DrawdownTracker, EquityCurveStats, EquityPoint,
    PnlBreakdown,
};
use crate::config::{OverlayConfig, ReplayConfig};
use crate::execution::{execute_option_trade, rebalance_delta_hedge};
use crate::models::{
    Bar, GateReason, ReasonSet, RiskReason, Stance, StrategyMode, CONTRACT_MULTIPLIER,
};
use crate::risk::kill_switch::{KillSwitch, KillSwitchAction};
use crate::risk::limits::{projected_hedge_shares, RiskLimits};
use crate::signal::engine::RegimeSignalEngine;
use crate::sizing::{target_by_capital_budget, target_by_vega_budget};
use serde::Serialize;
use tracing::info;

/// Gamma exposure scaled by spot so band thresholds stay comparable across
/// underlyings.
pub fn gamma_risk_metric(gamma_exposure: f64, spot_price: f64) -> f64 {
    gamma_exposure.abs() * spot_price.max(0.0) * 1e-4
}

/// Which exposure side a risk-overlay pause applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PauseSide {
    Short,
    Long,
}

/// Combined verdict of the kill switch plus mode-specific drawdown overlays.
#[derive(Debug, Clone)]
struct OverlayDecision {
    reasons: ReasonSet,
    effective_size_factor: f64,
    flatten_for_risk: bool,
    pause_side: Option<PauseSide>,
    /// Pause only applies if this bar's stance no longer validates the side.
    pause_requires_invalid: bool,
}

/// Stack the global and long-exposure drawdown overlays on top of the gamma
/// kill switch. Additions, never replacements.
fn apply_risk_overlays(
    mode: StrategyMode,
    kill_action: &KillSwitchAction,
    drawdown_before_trade: f64,
    opening_option_contracts: i64,
    overlay: &OverlayConfig,
) -> OverlayDecision {
    let mut reasons = ReasonSet::new();
    reasons.extend_from(&kill_action.reasons);
    let mut decision = OverlayDecision {
        reasons,
        effective_size_factor: kill_action.size_factor,
        flatten_for_risk: kill_action.flatten_positions,
        pause_side: None,
        pause_requires_invalid: false,
    };

    match mode {
        StrategyMode::ShortVol => {
            if drawdown_before_trade >= overlay.global_drawdown_kill_threshold {
                decision.flatten_for_risk = true;
                decision.reasons.push(RiskReason::GlobalDrawdownKill);
            } else if drawdown_before_trade >= overlay.global_drawdown_throttle_threshold {
                decision.effective_size_factor *= overlay.global_drawdown_throttle_size_factor;
                decision.reasons.push(RiskReason::GlobalDrawdownThrottle);
            }
        }
        StrategyMode::LongVol => {
            let has_exposure = opening_option_contracts > 0;
            if drawdown_before_trade >= overlay.global_drawdown_kill_threshold && has_exposure {
                decision.flatten_for_risk = true;
                decision.pause_side = Some(PauseSide::Long);
                decision.reasons.push(RiskReason::GlobalDrawdownKill);
            } else if drawdown_before_trade >= overlay.global_drawdown_throttle_threshold
                && has_exposure
            {
                decision.effective_size_factor *= overlay.global_drawdown_throttle_size_factor;
                decision.reasons.push(RiskReason::GlobalDrawdownThrottle);
            }

            if drawdown_before_trade >= overlay.long_catastrophic_kill_threshold && has_exposure {
                decision.flatten_for_risk = true;
                decision.pause_side = Some(PauseSide::Long);
                decision.reasons.push(RiskReason::LongCatastrophicKill);
            } else if drawdown_before_trade >= overlay.long_pause_drawdown_threshold && has_exposure
            {
                decision.pause_side = Some(PauseSide::Long);
                decision.pause_requires_invalid = true;
                decision.reasons.push(RiskReason::LongPauseDrawdown);
            }

            if kill_action.flatten_positions && has_exposure {
                decision.flatten_for_risk = true;
                decision.pause_side = Some(PauseSide::Long);
            }
        }
        StrategyMode::Adaptive => {
            let has_exposure = opening_option_contracts != 0;
            let side = if opening_option_contracts < 0 {
                PauseSide::Short
            } else {
                PauseSide::Long
            };
            if drawdown_before_trade >= overlay.global_drawdown_kill_threshold && has_exposure {
                decision.flatten_for_risk = true;
                decision.pause_side = Some(side);
                decision.reasons.push(RiskReason::GlobalDrawdownKill);
            } else if drawdown_before_trade >= overlay.global_drawdown_throttle_threshold
                && has_exposure
            {
                decision.effective_size_factor *= overlay.global_drawdown_throttle_size_factor;
                decision.reasons.push(RiskReason::GlobalDrawdownThrottle);
            }

            // The drawdown kills specific to long-vol exposure only apply
            // while the book is actually long.
            if side == PauseSide::Long {
                if drawdown_before_trade >= overlay.long_catastrophic_kill_threshold && has_exposure
                {
                    decision.flatten_for_risk = true;
                    decision.pause_side = Some(PauseSide::Long);
                    decision.reasons.push(RiskReason::LongCatastrophicKill);
                } else if drawdown_before_trade >= overlay.long_pause_drawdown_threshold
                    && has_exposure
                {
                    decision.pause_side = Some(PauseSide::Long);
                    decision.pause_requires_invalid = true;
                    decision.reasons.push(RiskReason::LongPauseDrawdown);
                }
            }

            if kill_action.flatten_positions && has_exposure {
                decision.flatten_for_risk = true;
                if decision.pause_side.is_none() {
                    decision.pause_side = Some(side);
                }
            }
        }
    }

    decision
}

/// Full per-bar record written to the timestep artifact.
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub date: String,
    pub symbol: String,
    pub strategy_mode: StrategyMode,
    pub stance: Stance,
    pub signal: i32,
    pub signal_reason: String,
    pub strategy_gate_reason: Option<GateReason>,
    pub pricing_filter_passed: bool,
    pub path_filter_passed: bool,
    pub instability_filter_passed: bool,
    pub two_way_filter_passed: bool,
    pub rv_short: f64,
    pub rv_medium: f64,
    pub edge_iv_minus_rv: f64,
    pub edge_velocity: f64,
    pub trend_strength: f64,
    pub jump_abs_return: f64,
    pub rv_change: f64,
    pub choppiness: f64,
    pub chop_score: f64,
    pub cooldown_remaining: u32,
    pub cooldown_active: bool,
    pub long_pause_remaining: u32,
    pub spot: f64,
    pub option_mid: f64,
    pub requested_option_contracts: i64,
    pub executed_target_contracts: i64,
    pub option_contracts: i64,
    pub queued_option_contracts: i64,
    pub hedge_shares: i64,
    pub delta_exposure: f64,
    pub gamma_exposure: f64,
    pub vega_exposure: f64,
    pub requested_notional_exposure: f64,
    pub executed_target_notional_exposure: f64,
    pub requested_gamma_abs: f64,
    pub executed_target_gamma_abs: f64,
    pub requested_vega_abs: f64,
    pub executed_target_vega_abs: f64,
    pub notional_exposure: f64,
    pub cash_usage: f64,
    pub drawdown: f64,
    pub leverage: f64,
    pub equity: f64,
    pub daily_return: f64,
    pub option_mtm_pnl: f64,
    pub hedge_pnl: f64,
    pub fees: f64,
    pub slippage: f64,
    pub total_day_pnl: f64,
    pub kill_switch_events: String,
    pub risk_events: String,
    pub gamma_risk: f64,
    pub gamma_zone: &'static str,
    pub gamma_band_size_factor: f64,
    pub effective_size_factor: f64,
    pub risk_block_reason: Option<&'static str>,
}

/// Cumulative outcome of one mode's run.
#[derive(Debug, Clone, Serialize)]
pub struct ModeSummary {
    pub strategy_mode: String,
    pub option_mtm_pnl: f64,
    pub hedge_pnl: f64,
    /// Reported negated: costs reduce PnL.
    pub fees: f64,
    pub slippage: f64,
    pub total_pnl: f64,
    pub ending_equity: f64,
    pub max_drawdown: f64,
    pub events_count: usize,
}

#[derive(Debug, Clone)]
pub struct ModeRunResult {
    pub mode: StrategyMode,
    pub steps: Vec<StepRecord>,
    pub equity_curve: Vec<EquityPoint>,
    /// Chronological event log, one rendered line per occurrence.
    pub events: Vec<String>,
    pub summary: ModeSummary,
    pub equity_stats: EquityCurveStats,
}

/// Deferred first-long-entry diagnostic; emitted on the following bar with
/// the realized next-bar return.
struct LongEntryDiagnostic {
    entry_time: String,
    entry_spot: f64,
    iv: f64,
    rv_short: f64,
    rv_medium: f64,
    trend_strength: f64,
    contracts: i64,
    delta_exposure: f64,
    gamma_exposure: f64,
    vega_exposure: f64,
}

impl LongEntryDiagnostic {
    fn render(&self, event_date: &str, next_bar_return: Option<f64>) -> String {
        let next = match next_bar_return {
            Some(value) => format!("{value:.6}"),
            None => "NA".to_string(),
        };
        format!(
            "{} LONG_DIAGNOSTIC (entry_time={}, iv={:.6}, rv_short={:.6}, rv_medium={:.6}, \
             trend_strength={:.6}, contracts={}, delta={:.6}, gamma={:.6}, vega={:.6}, \
             next_bar_return={})",
            event_date,
            self.entry_time,
            self.iv,
            self.rv_short,
            self.rv_medium,
            self.trend_strength,
            self.contracts,
            self.delta_exposure,
            self.gamma_exposure,
            self.vega_exposure,
            next
        )
    }
}

/// Replay one strategy mode over the full bar sequence.
///
/// All state lives in this call frame; independent modes never share
/// anything mutable, so callers may fan modes out in parallel.
pub fn run_mode(
    mode: StrategyMode,
    symbol: &str,
    bars: &[Bar],
    config: &ReplayConfig,
    progress_every: usize,
) -> ModeRunResult {
    let initial_capital = config.limits.initial_capital;
    let risk_limits = RiskLimits::new(config.limits.clone());
    let kill_switch = KillSwitch::new(config.kill_switch.clone());
    let mut signal_engine = RegimeSignalEngine::new(mode, config.signal.clone());
    let mut drawdown = DrawdownTracker::new(initial_capital);
    let mut pnl = PnlBreakdown::default();

    let mut cash = initial_capital;
    let mut option_contracts: i64 = 0;
    let mut hedge_shares: i64 = 0;

    let mut prev_spot: Option<f64> = None;
    let mut prev_option_mid: Option<f64> = None;
    let mut prev_equity = initial_capital;
    let mut prev_stance = Stance::Flat;

    let mut spot_history: Vec<f64> = Vec::with_capacity(bars.len());
    let mut rv_history: Vec<f64> = Vec::with_capacity(bars.len());
    let mut return_history: Vec<f64> = Vec::with_capacity(bars.len());

    let mut steps: Vec<StepRecord> = Vec::with_capacity(bars.len());
    let mut equity_curve: Vec<EquityPoint> = Vec::with_capacity(bars.len());
    let mut events: Vec<String> = Vec::new();
    let mut pending_target_contracts: i64 = 0;
    let mut first_long_pending: Option<LongEntryDiagnostic> = None;
    let mut first_long_logged = false;
    let mut adaptive_short_pause_remaining: u32 = 0;
    let mut adaptive_long_pause_remaining: u32 = 0;

    let pause_len = config.signal.adaptive_pause_bars.max(config.signal.cooldown_bars);
    let total_bars = bars.len();
    info!(mode = mode.as_str(), bars = total_bars, "starting replay mode");

    for (idx, bar) in bars.iter().enumerate() {
        // Step 1: loop-owned risk-pause counters tick before anything else.
        adaptive_short_pause_remaining = adaptive_short_pause_remaining.saturating_sub(1);
        adaptive_long_pause_remaining = adaptive_long_pause_remaining.saturating_sub(1);

        let spot = bar.close;
        let option_mid = bar.option_mid;

        if let Some(diagnostic) = first_long_pending.take() {
            let next_bar_return = if diagnostic.entry_spot > 0.0 {
                Some((spot / diagnostic.entry_spot).ln())
            } else {
                Some(0.0)
            };
            let line = diagnostic.render(&bar.date, next_bar_return);
            info!(mode = mode.as_str(), "{line}");
            events.push(line);
            first_long_logged = true;
        }

        if let Some(prev) = prev_spot {
            if prev > 0.0 {
                return_history.push((spot / prev).ln());
            }
        }
        spot_history.push(spot);
        rv_history.push(bar.realized_vol);

        let opening_option_contracts = option_contracts;
        let opening_hedge_shares = hedge_shares;

        // Step 2: mark the opening position to this bar's prices.
        let mut option_mtm = 0.0;
        let mut hedge_mtm = 0.0;
        if let (Some(prev_s), Some(prev_m)) = (prev_spot, prev_option_mid) {
            option_mtm =
                opening_option_contracts as f64 * CONTRACT_MULTIPLIER * (option_mid - prev_m);
            hedge_mtm = opening_hedge_shares as f64 * (spot - prev_s);
        }
        pnl.record_mtm(option_mtm, hedge_mtm);

        // Step 3: pre-trade equity and drawdown.
        let equity_before_trade = cash
            + opening_option_contracts as f64 * CONTRACT_MULTIPLIER * option_mid
            + opening_hedge_shares as f64 * spot;
        let daily_return = if prev_equity <= 0.0 {
            0.0
        } else {
            (equity_before_trade - prev_equity) / prev_equity
        };
        let drawdown_before_trade = drawdown.peek(equity_before_trade);

        let exposures_before = compute_exposures(
            opening_option_contracts,
            opening_hedge_shares,
            spot,
            option_mid,
            bar.delta,
            bar.gamma,
            bar.vega,
        );

        // Steps 4-5: kill switch plus cumulative drawdown overlays.
        let gamma_risk = gamma_risk_metric(exposures_before.gamma_exposure, spot);
        let kill_action = kill_switch.evaluate(gamma_risk, drawdown_before_trade);
        let overlays = apply_risk_overlays(
            mode,
            &kill_action,
            drawdown_before_trade,
            opening_option_contracts,
            &config.overlay,
        );

        if !overlays.reasons.is_empty() {
            events.push(format!(
                "{} RISK {} (mode={}, dd={:.4}, gamma_risk={:.2}, zone={}, size_factor={:.4})",
                bar.date,
                overlays.reasons.render(),
                mode.as_str(),
                drawdown_before_trade,
                gamma_risk,
                kill_action.zone.as_str(),
                overlays.effective_size_factor
            ));
        }

        // Step 6: execute the target queued on the previous bar; a flatten
        // overrides it unconditionally.
        let requested_target_contracts = pending_target_contracts;
        let requested_exposure = compute_exposures(
            requested_target_contracts,
            projected_hedge_shares(requested_target_contracts, bar.delta),
            spot,
            option_mid,
            bar.delta,
            bar.gamma,
            bar.vega,
        );

        let mut target_contracts = pending_target_contracts;
        if overlays.flatten_for_risk {
            target_contracts = 0;
        }

        // Step 7: risk-limit check. Forced flattens bypass the limiter so
        // de-risking is never blocked.
        let mut risk_block_reason: Option<&'static str> = None;
        if !overlays.flatten_for_risk {
            let (verdict, _) =
                risk_limits.evaluate_projected_trade(target_contracts, bar, equity_before_trade);
            if let Err(blocked) = verdict {
                let reducing_risk = target_contracts.abs() < opening_option_contracts.abs();
                if reducing_risk {
                    events.push(format!(
                        "{} RISK_ALLOW_DERISK mode={} (target={}, opening={}, reason={})",
                        bar.date,
                        mode.as_str(),
                        target_contracts,
                        opening_option_contracts,
                        blocked.as_str()
                    ));
                    risk_block_reason = Some(blocked.as_str());
                } else {
                    let clamped = risk_limits.clamp_target_to_risk_limits(
                        target_contracts,
                        bar,
                        equity_before_trade,
                    );
                    if clamped.abs() > opening_option_contracts.abs() {
                        events.push(format!(
                            "{} RISK_CLAMP mode={} (requested={}, clamped={}, reason={})",
                            bar.date,
                            mode.as_str(),
                            target_contracts,
                            clamped,
                            blocked.as_str()
                        ));
                        target_contracts = clamped;
                    } else {
                        target_contracts = opening_option_contracts;
                        events.push(format!(
                            "{} RISK_BLOCK mode={} {}",
                            bar.date,
                            mode.as_str(),
                            blocked.as_str()
                        ));
                        risk_block_reason = Some(blocked.as_str());
                    }
                }
            }
        }

        let executed_target_contracts = target_contracts;
        let executed_exposure = compute_exposures(
            executed_target_contracts,
            projected_hedge_shares(executed_target_contracts, bar.delta),
            spot,
            option_mid,
            bar.delta,
            bar.gamma,
            bar.vega,
        );

        // Step 8: option leg first, then re-derive the hedge from the new
        // option delta against post-option cash.
        let option_trade = execute_option_trade(
            opening_option_contracts,
            target_contracts,
            option_mid,
            cash,
            &config.execution,
        );
        option_contracts = option_trade.new_contracts;
        cash = option_trade.cash;
        pnl.record_costs(option_trade.fees, option_trade.slippage);

        let target_hedge_shares = projected_hedge_shares(option_contracts, bar.delta);
        let hedge_trade = rebalance_delta_hedge(
            opening_hedge_shares,
            target_hedge_shares,
            spot,
            cash,
            &config.execution,
        );
        hedge_shares = hedge_trade.new_shares;
        cash = hedge_trade.cash;
        pnl.record_costs(hedge_trade.fees, hedge_trade.slippage);

        // Step 9: post-trade exposures, equity, drawdown.
        let exposures_after = compute_exposures(
            option_contracts,
            hedge_shares,
            spot,
            option_mid,
            bar.delta,
            bar.gamma,
            bar.vega,
        );
        let equity = cash
            + option_contracts as f64 * CONTRACT_MULTIPLIER * option_mid
            + hedge_shares as f64 * spot;
        let drawdown_after_trade = drawdown.update(equity);

        let fees_today = option_trade.fees + hedge_trade.fees;
        let slippage_today = option_trade.slippage + hedge_trade.slippage;
        let total_day_pnl = option_mtm + hedge_mtm - fees_today - slippage_today;

        let leverage = if equity > 0.0 {
            exposures_after.notional_exposure / equity
        } else {
            f64::INFINITY
        };
        let cash_usage = ((initial_capital - cash) / initial_capital).max(0.0);

        // Step 10: this bar's signal, safe now since it only shapes the next
        // bar's execution.
        let decision = signal_engine.decide(
            bar.iv,
            &rv_history,
            spot,
            &spot_history,
            &return_history,
        );

        if decision.stance != prev_stance {
            events.push(format!(
                "{} STANCE {}->{} (mode={}, reason={})",
                bar.date,
                prev_stance.as_str(),
                decision.stance.as_str(),
                mode.as_str(),
                decision.reason
            ));
        }
        prev_stance = decision.stance;

        // Step 11: size the desired next-bar target. Short-vol legs size off
        // the capital budget, long-vol legs off the vega budget.
        let capital_base = equity.max(0.0);
        let mut next_target_contracts = match mode {
            StrategyMode::ShortVol => target_by_capital_budget(
                decision.signal,
                option_mid,
                capital_base,
                risk_limits.max_capital_at_risk(),
                overlays.effective_size_factor,
            ),
            StrategyMode::LongVol => target_by_vega_budget(
                decision.signal,
                capital_base,
                bar.vega,
                config.overlay.long_vega_budget_ratio,
                overlays.effective_size_factor,
            ),
            StrategyMode::Adaptive => {
                if decision.signal < 0 {
                    target_by_capital_budget(
                        -1,
                        option_mid,
                        capital_base,
                        risk_limits.max_capital_at_risk(),
                        overlays.effective_size_factor,
                    )
                } else if decision.signal > 0 {
                    target_by_vega_budget(
                        1,
                        capital_base,
                        bar.vega,
                        config.overlay.long_vega_budget_ratio,
                        overlays.effective_size_factor,
                    )
                } else {
                    0
                }
            }
        };

        // Step 12: strategy-level gating of the queued target.
        let mut strategy_gate_reason: Option<GateReason> = None;
        match mode {
            StrategyMode::ShortVol => {
                if !decision.pricing_filter_passed || !decision.path_filter_passed {
                    if next_target_contracts != 0 || option_contracts != 0 {
                        events.push(format!(
                            "{} STRATEGY_GATE mode={} SHORT_GATE_FORCE_FLAT \
                             (pricing_ok={}, path_ok={})",
                            bar.date,
                            mode.as_str(),
                            decision.pricing_filter_passed,
                            decision.path_filter_passed
                        ));
                    }
                    next_target_contracts = 0;
                    strategy_gate_reason = Some(GateReason::ShortGateForceFlat);
                }
                if overlays.flatten_for_risk {
                    next_target_contracts = 0;
                    strategy_gate_reason = Some(GateReason::ShortRiskFlatten);
                }
            }
            StrategyMode::LongVol => {
                if next_target_contracts < 0 {
                    next_target_contracts = 0;
                }

                let pause_applied = match overlays.pause_side {
                    Some(PauseSide::Long) => {
                        !overlays.pause_requires_invalid || decision.stance != Stance::LongVol
                    }
                    _ => false,
                };
                if pause_applied {
                    adaptive_long_pause_remaining = adaptive_long_pause_remaining.max(pause_len);
                    strategy_gate_reason = Some(GateReason::AdaptiveLongPausedRisk);
                    next_target_contracts = 0;
                }

                if decision.stance == Stance::Paused {
                    next_target_contracts = 0;
                    strategy_gate_reason = Some(GateReason::AdaptivePaused);
                } else if overlays.flatten_for_risk {
                    next_target_contracts = 0;
                    strategy_gate_reason = Some(GateReason::AdaptiveRiskFlatten);
                }

                if next_target_contracts > 0 && adaptive_long_pause_remaining > 0 {
                    next_target_contracts = 0;
                    strategy_gate_reason = Some(GateReason::AdaptiveLongPaused);
                }
            }
            StrategyMode::Adaptive => {
                let pause_applied = match overlays.pause_side {
                    Some(PauseSide::Short) => {
                        !overlays.pause_requires_invalid || decision.stance != Stance::ShortVol
                    }
                    Some(PauseSide::Long) => {
                        !overlays.pause_requires_invalid || decision.stance != Stance::LongVol
                    }
                    None => false,
                };
                if pause_applied {
                    match overlays.pause_side {
                        Some(PauseSide::Short) => {
                            adaptive_short_pause_remaining =
                                adaptive_short_pause_remaining.max(pause_len);
                            strategy_gate_reason = Some(GateReason::AdaptiveShortPausedRisk);
                        }
                        Some(PauseSide::Long) => {
                            adaptive_long_pause_remaining =
                                adaptive_long_pause_remaining.max(pause_len);
                            strategy_gate_reason = Some(GateReason::AdaptiveLongPausedRisk);
                        }
                        None => {}
                    }
                    next_target_contracts = 0;
                }

                if decision.stance == Stance::Paused {
                    next_target_contracts = 0;
                    strategy_gate_reason = Some(GateReason::AdaptivePaused);
                } else if overlays.flatten_for_risk {
                    next_target_contracts = 0;
                    strategy_gate_reason = Some(GateReason::AdaptiveRiskFlatten);
                }

                if next_target_contracts < 0 && adaptive_short_pause_remaining > 0 {
                    next_target_contracts = 0;
                    strategy_gate_reason = Some(GateReason::AdaptiveShortPaused);
                } else if next_target_contracts > 0 && adaptive_long_pause_remaining > 0 {
                    next_target_contracts = 0;
                    strategy_gate_reason = Some(GateReason::AdaptiveLongPaused);
                }

                // A sign flip must pass through a flat bar first.
                if (option_contracts < 0 && next_target_contracts > 0)
                    || (option_contracts > 0 && next_target_contracts < 0)
                {
                    next_target_contracts = 0;
                    strategy_gate_reason = Some(GateReason::AdaptiveSwitchThroughFlat);
                }
            }
        }

        // Step 13: queue for the next bar's step 6.
        pending_target_contracts = next_target_contracts;

        if matches!(mode, StrategyMode::LongVol | StrategyMode::Adaptive)
            && !first_long_logged
            && first_long_pending.is_none()
            && opening_option_contracts <= 0
            && option_contracts > 0
        {
            first_long_pending = Some(LongEntryDiagnostic {
                entry_time: bar.date.clone(),
                entry_spot: spot,
                iv: bar.iv,
                rv_short: decision.metrics.rv_short,
                rv_medium: decision.metrics.rv_medium,
                trend_strength: decision.metrics.trend_strength,
                contracts: option_contracts,
                delta_exposure: exposures_after.delta_exposure,
                gamma_exposure: exposures_after.gamma_exposure,
                vega_exposure: exposures_after.vega_exposure,
            });
        }

        let long_pause_remaining = match mode {
            StrategyMode::LongVol => decision
                .cooldown_remaining
                .max(adaptive_long_pause_remaining),
            StrategyMode::Adaptive => decision
                .cooldown_remaining
                .max(adaptive_short_pause_remaining)
                .max(adaptive_long_pause_remaining),
            StrategyMode::ShortVol => 0,
        };

        steps.push(StepRecord {
            date: bar.date.clone(),
            symbol: symbol.to_string(),
            strategy_mode: mode,
            stance: decision.stance,
            signal: decision.signal,
            signal_reason: decision.reason.clone(),
            strategy_gate_reason,
            pricing_filter_passed: decision.pricing_filter_passed,
            path_filter_passed: decision.path_filter_passed,
            instability_filter_passed: decision.instability_filter_passed,
            two_way_filter_passed: decision.two_way_filter_passed,
            rv_short: decision.metrics.rv_short,
            rv_medium: decision.metrics.rv_medium,
            edge_iv_minus_rv: decision.metrics.edge,
            edge_velocity: decision.metrics.edge_velocity,
            trend_strength: decision.metrics.trend_strength,
            jump_abs_return: decision.metrics.jump_abs_return,
            rv_change: decision.metrics.rv_change,
            choppiness: decision.metrics.choppiness,
            chop_score: decision.metrics.chop_score,
            cooldown_remaining: decision.cooldown_remaining,
            cooldown_active: decision.cooldown_active,
            long_pause_remaining,
            spot,
            option_mid,
            requested_option_contracts: requested_target_contracts,
            executed_target_contracts,
            option_contracts,
            queued_option_contracts: pending_target_contracts,
            hedge_shares,
            delta_exposure: exposures_after.delta_exposure,
            gamma_exposure: exposures_after.gamma_exposure,
            vega_exposure: exposures_after.vega_exposure,
            requested_notional_exposure: requested_exposure.notional_exposure,
            executed_target_notional_exposure: executed_exposure.notional_exposure,
            requested_gamma_abs: requested_exposure.gamma_exposure.abs(),
            executed_target_gamma_abs: executed_exposure.gamma_exposure.abs(),
            requested_vega_abs: requested_exposure.vega_exposure.abs(),
            executed_target_vega_abs: executed_exposure.vega_exposure.abs(),
            notional_exposure: exposures_after.notional_exposure,
            cash_usage,
            drawdown: drawdown_after_trade,
            leverage,
            equity,
            daily_return,
            option_mtm_pnl: option_mtm,
            hedge_pnl: hedge_mtm,
            fees: -fees_today,
            slippage: -slippage_today,
            total_day_pnl,
            kill_switch_events: kill_action
                .reasons
                .iter()
                .map(|r| r.as_str())
                .collect::<Vec<_>>()
                .join("|"),
            risk_events: overlays.reasons.render(),
            gamma_risk,
            gamma_zone: kill_action.zone.as_str(),
            gamma_band_size_factor: kill_action.size_factor,
            effective_size_factor: overlays.effective_size_factor,
            risk_block_reason,
        });
        equity_curve.push(EquityPoint {
            date: bar.date.clone(),
            equity,
            drawdown: drawdown_after_trade,
        });

        prev_spot = Some(spot);
        prev_option_mid = Some(option_mid);
        prev_equity = equity;

        if progress_every > 0 && (idx + 1) % progress_every == 0 {
            info!(
                mode = mode.as_str(),
                bar = idx + 1,
                total = total_bars,
                date = %bar.date,
                equity,
                stance = decision.stance.as_str(),
                "replay progress"
            );
        }
    }

    // End-of-data: a still-pending entry diagnostic has no next bar.
    if let Some(diagnostic) = first_long_pending.take() {
        let line = diagnostic.render(&diagnostic.entry_time, None);
        info!(mode = mode.as_str(), "{line}");
        events.push(line);
    }

    if events.is_empty() {
        if let Some(first) = bars.first() {
            events.push(format!(
                "{} INFO mode={} NO_EVENTS No stance/risk transitions occurred. \
                 Tune signal thresholds/windows for this data regime.",
                first.date,
                mode.as_str()
            ));
        }
    }

    let equity_stats = summarize_equity_curve(&equity_curve);
    let summary = ModeSummary {
        strategy_mode: mode.as_str().to_string(),
        option_mtm_pnl: pnl.option_mtm_pnl,
        hedge_pnl: pnl.hedge_pnl,
        fees: -pnl.fees,
        slippage: -pnl.slippage,
        total_pnl: pnl.total_pnl(),
        ending_equity: prev_equity,
        max_drawdown: drawdown.max_drawdown(),
        events_count: events.len(),
    };

    ModeRunResult {
        mode,
        steps,
        equity_curve,
        events,
        summary,
        equity_stats,
    }
}
