//! Shared domain types for the volatility replay engine.
//!
//! Stances, strategy modes, and risk/gate reason codes are closed enums;
//! everything rendered into artifacts goes through `as_str` at the logging
//! boundary rather than carrying ad hoc strings through the engine.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Shares controlled by one option contract.
pub const CONTRACT_MULTIPLIER: f64 = 100.0;

/// Strategy mode selecting the regime transition table for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyMode {
    ShortVol,
    LongVol,
    Adaptive,
}

impl StrategyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyMode::ShortVol => "short",
            StrategyMode::LongVol => "long",
            StrategyMode::Adaptive => "adaptive",
        }
    }
}

/// Public stance reported by the signal engine each bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stance {
    Flat,
    ShortVol,
    LongVol,
    Paused,
}

impl Stance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stance::Flat => "FLAT",
            Stance::ShortVol => "SHORT_VOL",
            Stance::LongVol => "LONG_VOL",
            Stance::Paused => "PAUSED",
        }
    }

    /// Directional signal implied by the stance: SHORT_VOL -1, LONG_VOL +1.
    pub fn signal(&self) -> i32 {
        match self {
            Stance::ShortVol => -1,
            Stance::LongVol => 1,
            Stance::Flat | Stance::Paused => 0,
        }
    }
}

/// One merged market-data bar. Arrives strictly ascending in time.
#[derive(Debug, Clone, Serialize)]
pub struct Bar {
    /// Original timestamp text; used as the artifact row key.
    pub date: String,
    #[serde(skip)]
    pub timestamp: NaiveDateTime,
    pub close: f64,
    pub realized_vol: f64,
    pub option_mid: f64,
    pub iv: f64,
    pub delta: f64,
    pub gamma: f64,
    pub vega: f64,
    pub expiry_days: i64,
}

/// Risk-overlay reason codes accumulated per bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskReason {
    GammaYellowThrottle,
    GammaRedThrottle,
    GammaRedDrawdownKill,
    GlobalDrawdownThrottle,
    GlobalDrawdownKill,
    LongCatastrophicKill,
    LongPauseDrawdown,
}

impl RiskReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskReason::GammaYellowThrottle => "GAMMA_YELLOW_THROTTLE",
            RiskReason::GammaRedThrottle => "GAMMA_RED_THROTTLE",
            RiskReason::GammaRedDrawdownKill => "GAMMA_RED_DRAWDOWN_KILL",
            RiskReason::GlobalDrawdownThrottle => "GLOBAL_DRAWDOWN_THROTTLE",
            RiskReason::GlobalDrawdownKill => "GLOBAL_DRAWDOWN_KILL",
            RiskReason::LongCatastrophicKill => "LONG_CATASTROPHIC_KILL",
            RiskReason::LongPauseDrawdown => "LONG_PAUSE_DRAWDOWN",
        }
    }
}

/// Insertion-ordered, deduplicating set of risk reasons.
///
/// Overlays stack additively on one bar, so downstream consumers get the full
/// reason set rather than a single collapsed cause.
#[derive(Debug, Clone, Default)]
pub struct ReasonSet {
    reasons: Vec<RiskReason>,
}

impl ReasonSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, reason: RiskReason) {
        if !self.reasons.contains(&reason) {
            self.reasons.push(reason);
        }
    }

    pub fn extend_from(&mut self, other: &[RiskReason]) {
        for reason in other {
            self.push(*reason);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.reasons.is_empty()
    }

    pub fn as_slice(&self) -> &[RiskReason] {
        &self.reasons
    }

    /// Pipe-joined rendering for event lines and CSV cells.
    pub fn render(&self) -> String {
        self.reasons
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// Strategy-gate reason codes applied to the queued next-bar target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateReason {
    ShortGateForceFlat,
    ShortRiskFlatten,
    AdaptivePaused,
    AdaptiveRiskFlatten,
    AdaptiveShortPausedRisk,
    AdaptiveLongPausedRisk,
    AdaptiveShortPaused,
    AdaptiveLongPaused,
    AdaptiveSwitchThroughFlat,
}

impl GateReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateReason::ShortGateForceFlat => "SHORT_GATE_FORCE_FLAT",
            GateReason::ShortRiskFlatten => "SHORT_RISK_FLATTEN",
            GateReason::AdaptivePaused => "ADAPTIVE_PAUSED",
            GateReason::AdaptiveRiskFlatten => "ADAPTIVE_RISK_FLATTEN",
            GateReason::AdaptiveShortPausedRisk => "ADAPTIVE_SHORT_PAUSED_RISK",
            GateReason::AdaptiveLongPausedRisk => "ADAPTIVE_LONG_PAUSED_RISK",
            GateReason::AdaptiveShortPaused => "ADAPTIVE_SHORT_PAUSED",
            GateReason::AdaptiveLongPaused => "ADAPTIVE_LONG_PAUSED",
            GateReason::AdaptiveSwitchThroughFlat => "ADAPTIVE_SWITCH_THROUGH_FLAT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stance_signal_mapping() {
        assert_eq!(Stance::ShortVol.signal(), -1);
        assert_eq!(Stance::LongVol.signal(), 1);
        assert_eq!(Stance::Flat.signal(), 0);
        assert_eq!(Stance::Paused.signal(), 0);
    }

    #[test]
    fn test_reason_set_dedups_and_keeps_order() {
        let mut set = ReasonSet::new();
        set.push(RiskReason::GammaRedThrottle);
        set.push(RiskReason::GlobalDrawdownKill);
        set.push(RiskReason::GammaRedThrottle);
        assert_eq!(set.as_slice().len(), 2);
        assert_eq!(set.render(), "GAMMA_RED_THROTTLE|GLOBAL_DRAWDOWN_KILL");
    }
}
