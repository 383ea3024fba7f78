//! Trade execution models for the option and delta-hedge legs.
//!
//! Both legs charge fees per unit traded plus proportional slippage, and both
//! settle against cash immediately. The hedge leg always executes after the
//! option leg so it sees post-option cash.

use crate::config::ExecutionConfig;
use crate::models::CONTRACT_MULTIPLIER;

/// Result of one option-leg fill.
#[derive(Debug, Clone, Copy)]
pub struct OptionTradeResult {
    pub new_contracts: i64,
    pub cash: f64,
    pub traded_contracts: i64,
    pub notional_traded: f64,
    pub fees: f64,
    pub slippage: f64,
}

/// Result of one hedge-leg fill.
#[derive(Debug, Clone, Copy)]
pub struct HedgeTradeResult {
    pub new_shares: i64,
    pub cash: f64,
    pub traded_shares: i64,
    pub notional_traded: f64,
    pub fees: f64,
    pub slippage: f64,
}

pub fn execute_option_trade(
    current_contracts: i64,
    target_contracts: i64,
    option_price: f64,
    cash: f64,
    config: &ExecutionConfig,
) -> OptionTradeResult {
    let trade_qty = target_contracts - current_contracts;
    let notional = (trade_qty as f64 * option_price * CONTRACT_MULTIPLIER).abs();
    let fees = trade_qty.abs() as f64 * config.option_fee_per_contract;
    let slippage = notional * (config.option_slippage_bps / 10_000.0);

    // Buying (trade_qty > 0) spends cash; selling releases it.
    let cash_change =
        -(trade_qty as f64 * option_price * CONTRACT_MULTIPLIER) - fees - slippage;

    OptionTradeResult {
        new_contracts: target_contracts,
        cash: cash + cash_change,
        traded_contracts: trade_qty,
        notional_traded: notional,
        fees,
        slippage,
    }
}

pub fn rebalance_delta_hedge(
    current_shares: i64,
    target_shares: i64,
    spot_price: f64,
    cash: f64,
    config: &ExecutionConfig,
) -> HedgeTradeResult {
    let trade_shares = target_shares - current_shares;
    let notional = (trade_shares as f64 * spot_price).abs();
    let fees = trade_shares.abs() as f64 * config.hedge_fee_per_share;
    let slippage = notional * (config.hedge_slippage_bps / 10_000.0);

    let cash_change = -(trade_shares as f64 * spot_price) - fees - slippage;

    HedgeTradeResult {
        new_shares: target_shares,
        cash: cash + cash_change,
        traded_shares: trade_shares,
        notional_traded: notional,
        fees,
        slippage,
    }
}
