//! Hard position/risk budget limiter.
//!
//! `trade_allowed` applies its checks in a fixed priority order and reports
//! the first failure; `clamp_target_to_risk_limits` binary-searches the
//! largest contract magnitude that still passes.

use crate::analytics::{compute_exposures, Exposures};
use crate::config::RiskLimitsConfig;
use crate::models::{Bar, CONTRACT_MULTIPLIER};
use serde::Serialize;

/// First failing budget check, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    EquityExhausted,
    CapitalAtRisk,
    Leverage,
    Gamma,
    Vega,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::EquityExhausted => "Equity exhausted",
            BlockReason::CapitalAtRisk => "Blocked: capital-at-risk limit breached",
            BlockReason::Leverage => "Blocked: leverage limit breached",
            BlockReason::Gamma => "Blocked: gamma limit breached",
            BlockReason::Vega => "Blocked: vega limit breached",
        }
    }
}

/// Hedge share count implied by a contract position at the given delta.
pub fn projected_hedge_shares(option_contracts: i64, option_delta: f64) -> i64 {
    (-(option_contracts as f64) * option_delta * CONTRACT_MULTIPLIER).round() as i64
}

#[derive(Debug, Clone)]
pub struct RiskLimits {
    config: RiskLimitsConfig,
}

impl RiskLimits {
    pub fn new(config: RiskLimitsConfig) -> Self {
        Self { config }
    }

    pub fn initial_capital(&self) -> f64 {
        self.config.initial_capital
    }

    pub fn max_capital_at_risk(&self) -> f64 {
        self.config.max_capital_at_risk
    }

    /// Budget checks in strict short-circuit priority order. The equity check
    /// runs first so a degenerate run deterministically blocks every
    /// risk-increasing trade instead of dividing by a non-positive equity.
    pub fn trade_allowed(
        &self,
        projected_option_contracts: i64,
        option_price: f64,
        projected_notional: f64,
        projected_gamma_abs: f64,
        projected_vega_abs: f64,
        projected_equity: f64,
    ) -> Result<(), BlockReason> {
        if projected_equity <= 0.0 {
            return Err(BlockReason::EquityExhausted);
        }

        let capital_at_risk_ratio = (projected_option_contracts as f64
            * option_price
            * CONTRACT_MULTIPLIER)
            .abs()
            / projected_equity;
        if capital_at_risk_ratio > self.config.max_capital_at_risk {
            return Err(BlockReason::CapitalAtRisk);
        }

        let leverage = projected_notional / projected_equity;
        if leverage > self.config.max_leverage {
            return Err(BlockReason::Leverage);
        }
        if projected_gamma_abs > self.config.max_abs_gamma {
            return Err(BlockReason::Gamma);
        }
        if projected_vega_abs > self.config.max_abs_vega {
            return Err(BlockReason::Vega);
        }

        Ok(())
    }

    /// Check a projected contract position against this bar's quote, with the
    /// hedge leg implied from the option delta.
    pub fn evaluate_projected_trade(
        &self,
        projected_option_contracts: i64,
        bar: &Bar,
        projected_equity: f64,
    ) -> (Result<(), BlockReason>, Exposures) {
        let hedge = projected_hedge_shares(projected_option_contracts, bar.delta);
        let exposure = compute_exposures(
            projected_option_contracts,
            hedge,
            bar.close,
            bar.option_mid,
            bar.delta,
            bar.gamma,
            bar.vega,
        );
        let verdict = self.trade_allowed(
            projected_option_contracts,
            bar.option_mid,
            exposure.notional_exposure,
            exposure.gamma_exposure.abs(),
            exposure.vega_exposure.abs(),
            projected_equity,
        );
        (verdict, exposure)
    }

    /// Largest magnitude in [0, |desired|] that still passes `trade_allowed`,
    /// sign preserved from `desired`.
    ///
    /// The search assumes the checks are monotonically non-increasing in
    /// contract magnitude. That holds for every implemented check (capital at
    /// risk, leverage, gamma, and vega all scale with magnitude; the equity
    /// check ignores it) but is an assumption, not a proof: any future
    /// size-dependent check added to `trade_allowed` must preserve it or this
    /// search must be replaced with a linear scan.
    pub fn clamp_target_to_risk_limits(
        &self,
        desired_contracts: i64,
        bar: &Bar,
        projected_equity: f64,
    ) -> i64 {
        if desired_contracts == 0 {
            return 0;
        }

        let sign = desired_contracts.signum();
        let mut low: i64 = 0;
        let mut high = desired_contracts.abs();
        let mut best_abs: i64 = 0;

        while low <= high {
            let mid = (low + high) / 2;
            let (verdict, _) = self.evaluate_projected_trade(sign * mid, bar, projected_equity);
            if verdict.is_ok() {
                best_abs = mid;
                low = mid + 1;
            } else {
                high = mid - 1;
            }
        }

        sign * best_abs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn limits() -> RiskLimits {
        RiskLimits::new(RiskLimitsConfig::default())
    }

    fn quote(spot: f64, option_mid: f64, delta: f64, gamma: f64, vega: f64) -> Bar {
        Bar {
            date: "2025-01-02".to_string(),
            timestamp: NaiveDate::from_ymd_opt(2025, 1, 2)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            close: spot,
            realized_vol: 0.2,
            option_mid,
            iv: 0.22,
            delta,
            gamma,
            vega,
            expiry_days: 14,
        }
    }

    #[test]
    fn test_equity_exhausted_reported_first() {
        // Even a position that would trip every other limit reports the
        // equity failure, and so does a flat book.
        let verdict = limits().trade_allowed(1_000, 2.0, 1e9, 1e9, 1e9, 0.0);
        assert_eq!(verdict, Err(BlockReason::EquityExhausted));
        let flat = limits().trade_allowed(0, 2.0, 0.0, 0.0, 0.0, -1.0);
        assert_eq!(flat, Err(BlockReason::EquityExhausted));
    }

    #[test]
    fn test_check_priority_order() {
        // 50 contracts at $2.00: option notional 10_000 vs 10_000 equity ->
        // capital-at-risk ratio 1.0 > 0.2, caught before the leverage check.
        let verdict = limits().trade_allowed(50, 2.0, 100_000.0, 1_000.0, 10_000.0, 10_000.0);
        assert_eq!(verdict, Err(BlockReason::CapitalAtRisk));

        // Capital-at-risk passes (1 contract), leverage is breached next.
        let verdict = limits().trade_allowed(1, 2.0, 100_000.0, 1_000.0, 10_000.0, 10_000.0);
        assert_eq!(verdict, Err(BlockReason::Leverage));

        let verdict = limits().trade_allowed(1, 2.0, 1_000.0, 1_000.0, 10_000.0, 10_000.0);
        assert_eq!(verdict, Err(BlockReason::Gamma));

        let verdict = limits().trade_allowed(1, 2.0, 1_000.0, 10.0, 10_000.0, 10_000.0);
        assert_eq!(verdict, Err(BlockReason::Vega));

        let verdict = limits().trade_allowed(1, 2.0, 1_000.0, 10.0, 100.0, 10_000.0);
        assert!(verdict.is_ok());
    }

    #[test]
    fn test_projected_hedge_rounding() {
        assert_eq!(projected_hedge_shares(10, 0.5), -500);
        assert_eq!(projected_hedge_shares(-10, 0.5), 500);
        assert_eq!(projected_hedge_shares(3, 0.333), -100);
        assert_eq!(projected_hedge_shares(0, 0.9), 0);
    }

    #[test]
    fn test_clamp_preserves_sign_and_bound() {
        let bar = quote(100.0, 2.0, 0.5, 0.002, 0.05);
        let lim = limits();

        let clamped = lim.clamp_target_to_risk_limits(500, &bar, 10_000.0);
        assert!(clamped >= 0 && clamped <= 500);
        let (verdict, _) = lim.evaluate_projected_trade(clamped, &bar, 10_000.0);
        assert!(verdict.is_ok());
        // One more contract must fail, or the clamp was not maximal.
        let (next, _) = lim.evaluate_projected_trade(clamped + 1, &bar, 10_000.0);
        assert!(next.is_err());

        let negative = lim.clamp_target_to_risk_limits(-500, &bar, 10_000.0);
        assert_eq!(negative, -clamped);
    }

    #[test]
    fn test_clamp_returns_zero_when_even_flat_fails() {
        let bar = quote(100.0, 2.0, 0.5, 0.002, 0.05);
        assert_eq!(limits().clamp_target_to_risk_limits(40, &bar, 0.0), 0);
        assert_eq!(limits().clamp_target_to_risk_limits(0, &bar, 10_000.0), 0);
    }

    #[test]
    fn test_trade_allowed_is_monotone_in_magnitude() {
        // Guards the clamp's search assumption: allowed must never flip back
        // on after a block as magnitude grows.
        let bar = quote(480.0, 2.4, 0.52, 0.015, 0.6);
        let lim = limits();
        let mut seen_block = false;
        for magnitude in 0..400 {
            let (verdict, _) = lim.evaluate_projected_trade(magnitude, &bar, 10_000.0);
            if verdict.is_err() {
                seen_block = true;
            } else {
                assert!(
                    !seen_block,
                    "allowed at {} after a smaller magnitude was blocked",
                    magnitude
                );
            }
        }
        assert!(seen_block, "sweep never reached a blocking magnitude");
    }
}
