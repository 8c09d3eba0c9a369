use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::portfolio::{Security, TxDelta};

/// Realized capital gains and gross income, total and by year.
#[derive(Clone, Debug, Default)]
pub struct CumulativeGains {
    pub capital_gains_total: Decimal,
    pub capital_gains_year_totals: HashMap<i32, Decimal>,
    pub gross_income_total: Decimal,
    pub gross_income_year_totals: HashMap<i32, Decimal>,
}

impl CumulativeGains {
    pub fn capital_gains_years_sorted(&self) -> Vec<i32> {
        let mut years: Vec<i32> =
            self.capital_gains_year_totals.keys().copied().collect();
        years.sort();
        years
    }
}

pub fn calc_security_cumulative_gains(deltas: &[TxDelta]) -> CumulativeGains {
    let mut gains = CumulativeGains::default();
    for d in deltas {
        let year = d.tx.settlement_date.year();
        // Registered-affiliate sells have no capital gain, but their gross
        // income still counts toward income reporting.
        if let Some(cap_gain) = d.capital_gain.value() {
            gains.capital_gains_total += cap_gain;
            *gains.capital_gains_year_totals.entry(year).or_default() +=
                cap_gain;
            gains.gross_income_total += d.gross_income;
            *gains.gross_income_year_totals.entry(year).or_default() +=
                d.gross_income;
        } else if !d.gross_income.is_zero() {
            gains.gross_income_total += d.gross_income;
            *gains.gross_income_year_totals.entry(year).or_default() +=
                d.gross_income;
        }
    }
    gains
}

pub fn calc_portfolio_cumulative_gains(
    gains_by_security: &HashMap<Security, CumulativeGains>,
) -> CumulativeGains {
    let mut total = CumulativeGains::default();
    for gains in gains_by_security.values() {
        total.capital_gains_total += gains.capital_gains_total;
        total.gross_income_total += gains.gross_income_total;
        for (year, amount) in &gains.capital_gains_year_totals {
            *total.capital_gains_year_totals.entry(*year).or_default() +=
                amount;
        }
        for (year, amount) in &gains.gross_income_year_totals {
            *total.gross_income_year_totals.entry(*year).or_default() += amount;
        }
    }
    total
}
