//! Exposure, drawdown, and PnL bookkeeping for a replay run.

use crate::models::CONTRACT_MULTIPLIER;
use serde::Serialize;
use statrs::statistics::Statistics;

/// Greek and notional exposures for one (option, hedge) position at one quote.
#[derive(Debug, Clone, Copy, Default)]
pub struct Exposures {
    /// Net share-equivalent delta: option delta in shares plus hedge shares.
    pub delta_exposure: f64,
    pub gamma_exposure: f64,
    pub vega_exposure: f64,
    pub option_notional: f64,
    pub hedge_notional: f64,
    /// Option plus hedge notional, both taken absolute.
    pub notional_exposure: f64,
}

pub fn compute_exposures(
    option_contracts: i64,
    hedge_shares: i64,
    spot_price: f64,
    option_price: f64,
    option_delta: f64,
    option_gamma: f64,
    option_vega: f64,
) -> Exposures {
    let contracts = option_contracts as f64;
    let shares = hedge_shares as f64;
    let option_delta_shares = contracts * option_delta * CONTRACT_MULTIPLIER;
    let option_notional = (contracts * option_price * CONTRACT_MULTIPLIER).abs();
    let hedge_notional = (shares * spot_price).abs();
    Exposures {
        delta_exposure: option_delta_shares + shares,
        gamma_exposure: contracts * option_gamma * CONTRACT_MULTIPLIER,
        vega_exposure: contracts * option_vega * CONTRACT_MULTIPLIER,
        option_notional,
        hedge_notional,
        notional_exposure: option_notional + hedge_notional,
    }
}

/// Peak-equity drawdown tracker. `peek` is read-only so risk overlays can see
/// this bar's drawdown before the trade updates the peak.
#[derive(Debug, Clone)]
pub struct DrawdownTracker {
    peak_equity: f64,
    max_drawdown: f64,
}

impl DrawdownTracker {
    pub fn new(initial_equity: f64) -> Self {
        Self {
            peak_equity: initial_equity,
            max_drawdown: 0.0,
        }
    }

    /// Drawdown against the running peak without mutating tracker state.
    pub fn peek(&self, equity: f64) -> f64 {
        let peak = self.peak_equity.max(equity);
        if peak <= 0.0 {
            return 0.0;
        }
        ((peak - equity) / peak).max(0.0)
    }

    /// Fold this equity observation into the peak and max-drawdown state.
    pub fn update(&mut self, equity: f64) -> f64 {
        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
        let current = self.peek(equity);
        if current > self.max_drawdown {
            self.max_drawdown = current;
        }
        current
    }

    pub fn max_drawdown(&self) -> f64 {
        self.max_drawdown
    }
}

/// Cumulative PnL decomposition. Fees and slippage accumulate as positive
/// costs and are reported negated.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PnlBreakdown {
    pub option_mtm_pnl: f64,
    pub hedge_pnl: f64,
    pub fees: f64,
    pub slippage: f64,
}

impl PnlBreakdown {
    pub fn record_mtm(&mut self, option_mtm: f64, hedge_mtm: f64) {
        self.option_mtm_pnl += option_mtm;
        self.hedge_pnl += hedge_mtm;
    }

    pub fn record_costs(&mut self, fees: f64, slippage: f64) {
        self.fees += fees;
        self.slippage += slippage;
    }

    pub fn total_pnl(&self) -> f64 {
        self.option_mtm_pnl + self.hedge_pnl - self.fees - self.slippage
    }
}

/// One equity-curve observation, taken after the bar's trades settle.
#[derive(Debug, Clone, Serialize)]
pub struct EquityPoint {
    pub date: String,
    pub equity: f64,
    pub drawdown: f64,
}

/// Summary statistics over the per-bar equity returns.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EquityCurveStats {
    pub bars: usize,
    pub mean_bar_return: f64,
    pub bar_return_stddev: f64,
    /// Mean bar return over its standard deviation; not annualized since the
    /// bar interval is data-dependent.
    pub return_over_vol: f64,
}

pub fn summarize_equity_curve(points: &[EquityPoint]) -> EquityCurveStats {
    let returns: Vec<f64> = points
        .windows(2)
        .filter(|w| w[0].equity > 0.0)
        .map(|w| (w[1].equity - w[0].equity) / w[0].equity)
        .collect();
    if returns.len() < 2 {
        return EquityCurveStats {
            bars: points.len(),
            ..EquityCurveStats::default()
        };
    }
    let mean = returns.as_slice().mean();
    let stddev = returns.as_slice().std_dev();
    EquityCurveStats {
        bars: points.len(),
        mean_bar_return: mean,
        bar_return_stddev: stddev,
        return_over_vol: if stddev > 1e-12 { mean / stddev } else { 0.0 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exposures_arithmetic() {
        let e = compute_exposures(-10, 500, 100.0, 2.0, 0.5, 0.02, 0.1);
        assert!((e.delta_exposure - (-10.0 * 0.5 * 100.0 + 500.0)).abs() < 1e-9);
        assert!((e.gamma_exposure - (-20.0)).abs() < 1e-9);
        assert!((e.vega_exposure - (-100.0)).abs() < 1e-9);
        assert!((e.option_notional - 2000.0).abs() < 1e-9);
        assert!((e.hedge_notional - 50_000.0).abs() < 1e-9);
        assert!((e.notional_exposure - 52_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_drawdown_peek_does_not_mutate() {
        let mut tracker = DrawdownTracker::new(10_000.0);
        assert_eq!(tracker.peek(9_000.0), 0.1);
        // Peek must not have moved the peak.
        assert_eq!(tracker.peek(9_000.0), 0.1);

        tracker.update(12_000.0);
        let dd = tracker.update(9_000.0);
        assert!((dd - 0.25).abs() < 1e-12);
        assert!((tracker.max_drawdown() - 0.25).abs() < 1e-12);

        // Recovery lowers current drawdown but never the max.
        let recovered = tracker.update(12_000.0);
        assert_eq!(recovered, 0.0);
        assert!((tracker.max_drawdown() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_drawdown_never_negative() {
        let mut tracker = DrawdownTracker::new(1_000.0);
        assert_eq!(tracker.update(2_000.0), 0.0);
        assert!(tracker.peek(-500.0) >= 0.0);
        // Non-positive peak is defined as zero drawdown.
        let broke = DrawdownTracker::new(-100.0);
        assert_eq!(broke.peek(-200.0), 0.0);
    }

    #[test]
    fn test_pnl_breakdown_totals() {
        let mut pnl = PnlBreakdown::default();
        pnl.record_mtm(150.0, -30.0);
        pnl.record_costs(5.0, 2.0);
        pnl.record_mtm(-50.0, 10.0);
        assert!((pnl.total_pnl() - (100.0 - 20.0 - 5.0 - 2.0)).abs() < 1e-9);
    }

    #[test]
    fn test_equity_curve_stats_flat_curve() {
        let points: Vec<EquityPoint> = (0..5)
            .map(|i| EquityPoint {
                date: format!("2025-01-0{}", i + 1),
                equity: 10_000.0,
                drawdown: 0.0,
            })
            .collect();
        let stats = summarize_equity_curve(&points);
        assert_eq!(stats.bars, 5);
        assert_eq!(stats.mean_bar_return, 0.0);
        assert_eq!(stats.return_over_vol, 0.0);
    }
}
