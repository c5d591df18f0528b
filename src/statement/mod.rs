//! Period × field tables for annual financial statements.
//!
//! The provider reports each metric as a sparse series of (period end,
//! value) points. `FinancialStatement` aligns them into one table with
//! period columns sorted most-recent-first, so "the latest column" is
//! always index 0 and "the prior year" index 1.
//!
//! Absence is a first-class result everywhere in this module: a missing
//! row, a missing cell, or an empty table all read as `None`, never as an
//! error.

use std::collections::HashMap;

use chrono::NaiveDate;

// ── Field names ───────────────────────────────────────────────────────────────

/// Provider metric names, with ordered fallback lists covering the vendor's
/// naming drift across reporting periods.
pub mod fields {
    pub const TOTAL_REVENUE: &str = "TotalRevenue";
    pub const OPERATING_INCOME: &str = "OperatingIncome";
    pub const NET_INCOME: &str = "NetIncome";
    pub const DILUTED_SHARES: &str = "DilutedAverageShares";
    pub const DILUTED_SHARES_FALLBACKS: &[&str] = &["BasicAverageShares"];

    pub const TOTAL_ASSETS: &str = "TotalAssets";
    pub const TOTAL_LIABILITIES: &str = "TotalLiabilitiesNetMinorityInterest";
    pub const TOTAL_LIABILITIES_FALLBACKS: &[&str] = &["TotalLiab"];
    pub const CURRENT_LIABILITIES: &str = "CurrentLiabilities";
    pub const CURRENT_LIABILITIES_FALLBACKS: &[&str] = &["TotalCurrentLiabilities"];
    pub const CURRENT_ASSETS: &str = "CurrentAssets";
    pub const CURRENT_ASSETS_FALLBACKS: &[&str] = &["TotalCurrentAssets"];
    pub const EQUITY: &str = "StockholdersEquity";
    pub const EQUITY_FALLBACKS: &[&str] = &["TotalStockholderEquity"];
    pub const TOTAL_DEBT: &str = "TotalDebt";
    pub const CASH: &str = "CashAndCashEquivalents";
    pub const CASH_FALLBACKS: &[&str] = &["CashCashEquivalentsAndShortTermInvestments"];
    pub const INVESTMENTS: &str = "AvailableForSaleSecurities";
    pub const INVESTMENTS_FALLBACKS: &[&str] =
        &["ShortTermInvestments", "InvestmentinFinancialAssets"];
}

// ── Statement table ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinancialStatement {
    /// Period end dates, most recent first.
    periods: Vec<NaiveDate>,
    /// Field rows, each aligned with `periods`.
    rows: HashMap<String, Vec<Option<f64>>>,
}

impl FinancialStatement {
    /// Build a table from sparse (field, period, value) cells. Periods are
    /// collected from the cells and sorted descending.
    pub fn from_cells(cells: Vec<(String, NaiveDate, f64)>) -> Self {
        let mut periods: Vec<NaiveDate> = cells.iter().map(|(_, d, _)| *d).collect();
        periods.sort_unstable_by(|a, b| b.cmp(a));
        periods.dedup();

        let index: HashMap<NaiveDate, usize> =
            periods.iter().enumerate().map(|(i, d)| (*d, i)).collect();

        let mut rows: HashMap<String, Vec<Option<f64>>> = HashMap::new();
        for (field, date, value) in cells {
            if let Some(&idx) = index.get(&date) {
                rows.entry(field)
                    .or_insert_with(|| vec![None; periods.len()])[idx] = Some(value);
            }
        }

        FinancialStatement { periods, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    pub fn periods(&self) -> &[NaiveDate] {
        &self.periods
    }

    pub fn latest_period(&self) -> Option<NaiveDate> {
        self.periods.first().copied()
    }

    /// Cell at (field, period index). Absent row, absent cell, or an index
    /// past the known periods all yield `None`.
    pub fn value_at(&self, field: &str, period_idx: usize) -> Option<f64> {
        self.rows
            .get(field)?
            .get(period_idx)
            .copied()
            .flatten()
    }

    /// Latest-period value under the primary name, falling back through
    /// `fallbacks` in order.
    ///
    /// The first name whose row exists decides the result: a present row
    /// with an absent latest cell yields `None` without consulting the
    /// remaining names.
    pub fn latest_with_fallbacks(&self, primary: &str, fallbacks: &[&str]) -> Option<f64> {
        self.value_with_fallbacks_at(primary, fallbacks, 0)
    }

    /// Same fallback semantics as [`latest_with_fallbacks`], at an arbitrary
    /// period index.
    ///
    /// [`latest_with_fallbacks`]: Self::latest_with_fallbacks
    pub fn value_with_fallbacks_at(
        &self,
        primary: &str,
        fallbacks: &[&str],
        period_idx: usize,
    ) -> Option<f64> {
        if self.is_empty() {
            return None;
        }

        for name in std::iter::once(primary).chain(fallbacks.iter().copied()) {
            if let Some(cells) = self.rows.get(name) {
                return cells.get(period_idx).copied().flatten();
            }
        }

        None
    }

    /// Latest-period value under a single name.
    pub fn latest(&self, field: &str) -> Option<f64> {
        self.latest_with_fallbacks(field, &[])
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
