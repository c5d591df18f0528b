//! Derived financial ratios.
//!
//! Every function here is tri-state aware: `Some(0.0)` is a real zero,
//! `None` is "no value available", and the two are never conflated. A ratio
//! is computed only when all of its required inputs are present; otherwise
//! it is absent, not zero.

use chrono::NaiveDate;

use crate::statement::{FinancialStatement, fields};

/// Haircut applied to investment securities in the net-cash estimate.
pub const INVESTMENT_HAIRCUT: f64 = 0.7;

/// Equity / total assets. Absent whenever assets is absent or zero,
/// regardless of the equity value.
pub fn equity_ratio(equity: Option<f64>, assets: Option<f64>) -> Option<f64> {
    match (equity, assets) {
        (Some(equity), Some(assets)) if assets != 0.0 => Some(equity / assets),
        _ => None,
    }
}

/// Conservative solvency estimate:
/// current assets + 70% of investment securities − total liabilities.
///
/// Current assets and total liabilities are required; investments are
/// optional and contribute nothing when absent.
pub fn net_cash(
    current_assets: Option<f64>,
    investments: Option<f64>,
    total_liabilities: Option<f64>,
) -> Option<f64> {
    let (current_assets, total_liabilities) = match (current_assets, total_liabilities) {
        (Some(ca), Some(tl)) => (ca, tl),
        _ => return None,
    };

    let discounted = investments.map_or(0.0, |v| v * INVESTMENT_HAIRCUT);
    Some(current_assets + discounted - total_liabilities)
}

/// Net cash / market cap. Requires both inputs present and nonzero: a
/// present-but-zero market cap is not a divisor, and a zero net cash makes
/// the ratio meaningless downstream.
pub fn net_cash_ratio(net_cash: Option<f64>, market_cap: Option<f64>) -> Option<f64> {
    match (net_cash, market_cap) {
        (Some(nc), Some(mc)) if nc != 0.0 && mc != 0.0 => Some(nc / mc),
        _ => None,
    }
}

// ── Prior-year earnings ───────────────────────────────────────────────────────

/// EPS for the second-most-recent reporting period, with its period end date
/// so a historical price can be looked up against it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorEarnings {
    pub period: NaiveDate,
    pub eps: f64,
}

/// Prior-year EPS from an income statement: second period's net income over
/// its diluted (fallback: basic) average share count. Absent when the
/// statement has fewer than two periods, or either input is missing, or the
/// share count is zero.
pub fn prior_year_eps(income: &FinancialStatement) -> Option<PriorEarnings> {
    let period = *income.periods().get(1)?;
    let net_income = income.value_at(fields::NET_INCOME, 1)?;
    let shares =
        income.value_with_fallbacks_at(fields::DILUTED_SHARES, fields::DILUTED_SHARES_FALLBACKS, 1)?;

    if shares == 0.0 {
        return None;
    }

    Some(PriorEarnings {
        period,
        eps: net_income / shares,
    })
}

/// Price over EPS. Absent at zero EPS rather than producing an unbounded
/// multiple.
pub fn price_earnings(price: f64, eps: f64) -> Option<f64> {
    if eps == 0.0 { None } else { Some(price / eps) }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
