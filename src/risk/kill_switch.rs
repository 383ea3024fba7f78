//! Gamma-band throttling and drawdown-conditioned kill switch.
//!
//! A pure function of (gamma risk, total drawdown): the zone is a step
//! function of gamma risk alone, and flattening can only fire from the red
//! zone, never from green or yellow.

use crate::config::KillSwitchConfig;
use crate::models::RiskReason;
use serde::Serialize;

/// Gamma exposure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GammaZone {
    Green,
    Yellow,
    Red,
}

impl GammaZone {
    pub fn as_str(&self) -> &'static str {
        match self {
            GammaZone::Green => "green",
            GammaZone::Yellow => "yellow",
            GammaZone::Red => "red",
        }
    }
}

/// Verdict for one bar.
#[derive(Debug, Clone)]
pub struct KillSwitchAction {
    pub zone: GammaZone,
    pub size_factor: f64,
    pub flatten_positions: bool,
    pub reasons: Vec<RiskReason>,
}

#[derive(Debug, Clone)]
pub struct KillSwitch {
    config: KillSwitchConfig,
}

impl KillSwitch {
    pub fn new(config: KillSwitchConfig) -> Self {
        Self { config }
    }

    /// Exact policy:
    /// - green: gamma <= G1, size 1.0
    /// - yellow: G1 < gamma <= G2, size = yellow factor
    /// - red: gamma > G2, size = red factor
    /// - flatten only when gamma > G2 AND drawdown > D1
    pub fn evaluate(&self, gamma_risk: f64, total_drawdown: f64) -> KillSwitchAction {
        if gamma_risk <= self.config.gamma_green_threshold {
            return KillSwitchAction {
                zone: GammaZone::Green,
                size_factor: 1.0,
                flatten_positions: false,
                reasons: Vec::new(),
            };
        }

        if gamma_risk <= self.config.gamma_red_threshold {
            return KillSwitchAction {
                zone: GammaZone::Yellow,
                size_factor: self.config.gamma_yellow_size_factor,
                flatten_positions: false,
                reasons: vec![RiskReason::GammaYellowThrottle],
            };
        }

        let mut reasons = vec![RiskReason::GammaRedThrottle];
        let flatten = total_drawdown > self.config.kill_drawdown_threshold;
        if flatten {
            reasons.push(RiskReason::GammaRedDrawdownKill);
        }
        KillSwitchAction {
            zone: GammaZone::Red,
            size_factor: self.config.gamma_red_size_factor,
            flatten_positions: flatten,
            reasons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn switch() -> KillSwitch {
        KillSwitch::new(KillSwitchConfig::default())
    }

    #[test]
    fn test_green_zone_inclusive_boundary() {
        let action = switch().evaluate(5.0, 0.50);
        assert_eq!(action.zone, GammaZone::Green);
        assert_eq!(action.size_factor, 1.0);
        assert!(!action.flatten_positions);
        assert!(action.reasons.is_empty());
    }

    #[test]
    fn test_yellow_zone_throttles_without_flatten() {
        let action = switch().evaluate(7.5, 0.50);
        assert_eq!(action.zone, GammaZone::Yellow);
        assert_eq!(action.size_factor, 0.50);
        // Drawdown never flattens outside the red zone.
        assert!(!action.flatten_positions);
        assert_eq!(action.reasons, vec![RiskReason::GammaYellowThrottle]);

        let boundary = switch().evaluate(10.0, 0.50);
        assert_eq!(boundary.zone, GammaZone::Yellow);
    }

    #[test]
    fn test_red_zone_with_drawdown_kill() {
        let action = switch().evaluate(12.0, 0.15);
        assert_eq!(action.zone, GammaZone::Red);
        assert_eq!(action.size_factor, 0.25);
        assert!(action.flatten_positions);
        assert_eq!(
            action.reasons,
            vec![
                RiskReason::GammaRedThrottle,
                RiskReason::GammaRedDrawdownKill
            ]
        );
    }

    #[test]
    fn test_red_zone_without_drawdown_only_throttles() {
        let action = switch().evaluate(12.0, 0.12);
        assert_eq!(action.zone, GammaZone::Red);
        assert!(!action.flatten_positions, "flatten requires dd > D1");
        assert_eq!(action.reasons, vec![RiskReason::GammaRedThrottle]);
    }

    #[test]
    fn test_zone_is_monotone_in_gamma() {
        let sw = switch();
        let mut last_rank = 0u8;
        for step in 0..300 {
            let gamma = step as f64 * 0.05;
            let rank = match sw.evaluate(gamma, 0.0).zone {
                GammaZone::Green => 0,
                GammaZone::Yellow => 1,
                GammaZone::Red => 2,
            };
            assert!(rank >= last_rank, "zone regressed at gamma_risk={gamma}");
            last_rank = rank;
        }
    }
}
