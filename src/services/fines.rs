//! Fine calculation

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

/// Whole days between the due date and the return date, never negative
pub fn overdue_days(due_date: NaiveDate, return_date: NaiveDate) -> i64 {
    (return_date - due_date).num_days().max(0)
}

/// Fine owed for `overdue_days` late days at `daily_rate` per day.
///
/// The product is exact; `None` when it does not fit in a `Decimal`.
pub fn compute_fine(overdue_days: i64, daily_rate: Decimal) -> Option<Decimal> {
    if overdue_days <= 0 {
        return Some(Decimal::ZERO);
    }
    Decimal::from(overdue_days).checked_mul(daily_rate)
}

/// Amount charged to the reader, in cents (half away from zero, as NUMERIC does)
pub fn charged_amount(fine: Decimal) -> Decimal {
    fine.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
