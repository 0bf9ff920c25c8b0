//! Proration of partial billing periods.
//!
//! On immediate cancellation and on upgrades, the unused remainder of the
//! current period is converted back into money: `price * remaining / total`
//! whole days. The caller decides whether the result becomes a credit note
//! (only when a billable invoice already exists and the amount is strictly
//! positive).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: i64 = 86_400;

/// Number of whole days between two instants, rounded to the nearest day
/// and floored at 0 (never negative).
#[must_use]
pub fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    let seconds = (to - from).num_seconds();
    if seconds <= 0 {
        return 0;
    }
    (seconds + SECONDS_PER_DAY / 2) / SECONDS_PER_DAY
}

/// The day split a proration was computed from.
///
/// Recorded in credit-note metadata so finance can audit the calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProrationDetails {
    /// Whole days of the period not yet consumed.
    pub remaining_days: i64,

    /// Whole days in the full period.
    pub total_days: i64,
}

impl ProrationDetails {
    /// Compute the day split for a period at instant `now`.
    #[must_use]
    pub fn compute(
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        let total_days = days_between(period_start, period_end);
        let used_days = days_between(period_start, now);
        Self {
            remaining_days: (total_days - used_days).max(0),
            total_days,
        }
    }

    /// Monetary value of the unused remainder at the given per-period price.
    ///
    /// Zero-length periods prorate to 0.
    #[must_use]
    pub fn apply(&self, period_price: Decimal) -> Decimal {
        if self.total_days == 0 {
            return Decimal::ZERO;
        }
        period_price * Decimal::from(self.remaining_days) / Decimal::from(self.total_days)
    }
}

/// Monetary value of the unused remainder of a billing period.
///
/// `period_price * remaining_days / total_days`, where days are rounded to
/// the nearest whole day and floored at 0.
#[must_use]
pub fn prorate(
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    now: DateTime<Utc>,
    period_price: Decimal,
) -> Decimal {
    ProrationDetails::compute(period_start, period_end, now).apply(period_price)
}
