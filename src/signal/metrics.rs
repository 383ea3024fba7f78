//! Rolling market statistics feeding the regime signal engine.
//!
//! Every statistic is defined for arbitrarily short history: rolling windows
//! shrink to the available data, and each division carries an explicit
//! limiting value instead of letting NaN/inf leak out (the lone exception is
//! `chop_score`, which is +inf by definition in a drift-free market).

/// Denominator floor for near-zero guards.
const EPS: f64 = 1e-12;

/// One bar's worth of derived statistics.
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    /// Rolling mean of realized vol over the short window.
    pub rv_short: f64,
    /// Rolling mean of realized vol over the medium window.
    pub rv_medium: f64,
    /// Implied vol minus short realized vol.
    pub edge: f64,
    /// First difference of edge across consecutive bars (0 on the first).
    pub edge_velocity: f64,
    /// |spot / rolling price mean - 1|, 0 on a non-positive baseline.
    pub trend_strength: f64,
    /// Magnitude of the most recent single-bar log return.
    pub jump_abs_return: f64,
    /// |rv_short - rv_medium|, the vol-of-vol proxy.
    pub rv_change: f64,
    /// Rolling mean of absolute returns.
    pub choppiness: f64,
    /// choppiness / |rolling mean return|; +inf when drift is ~0.
    pub chop_score: f64,
}

/// Mean of the trailing `window` values, shrinking to the available history.
pub fn rolling_mean(values: &[f64], window: usize) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let w = window.clamp(1, values.len());
    let tail = &values[values.len() - w..];
    tail.iter().sum::<f64>() / tail.len() as f64
}

fn trend_strength(spot: f64, prices: &[f64], window: usize) -> f64 {
    let baseline = rolling_mean(prices, window);
    if baseline <= 0.0 {
        return 0.0;
    }
    (spot / baseline - 1.0).abs()
}

/// Windows consumed by [`compute`].
#[derive(Debug, Clone, Copy)]
pub struct MetricWindows {
    pub rv_short: usize,
    pub rv_medium: usize,
    pub trend: usize,
    pub chop: usize,
}

/// Derive this bar's snapshot from raw history.
///
/// `prev_edge` is the edge from the previous evaluation, if any; velocity is
/// defined as 0 on the very first bar.
pub fn compute(
    implied_vol: f64,
    realized_vols: &[f64],
    spot: f64,
    prices: &[f64],
    returns: &[f64],
    windows: MetricWindows,
    prev_edge: Option<f64>,
) -> MetricsSnapshot {
    let rv_short = rolling_mean(realized_vols, windows.rv_short);
    let rv_medium = rolling_mean(realized_vols, windows.rv_medium);
    let edge = implied_vol - rv_short;
    let edge_velocity = match prev_edge {
        Some(prev) => edge - prev,
        None => 0.0,
    };

    let jump_abs_return = returns.last().map_or(0.0, |r| r.abs());
    let abs_returns: Vec<f64> = returns.iter().map(|r| r.abs()).collect();
    let choppiness = rolling_mean(&abs_returns, windows.chop);
    let avg_return = rolling_mean(returns, windows.chop);
    let chop_score = if avg_return.abs() > EPS {
        choppiness / avg_return.abs()
    } else {
        f64::INFINITY
    };

    MetricsSnapshot {
        rv_short,
        rv_medium,
        edge,
        edge_velocity,
        trend_strength: trend_strength(spot, prices, windows.trend),
        jump_abs_return,
        rv_change: (rv_short - rv_medium).abs(),
        choppiness,
        chop_score,
    }
}
