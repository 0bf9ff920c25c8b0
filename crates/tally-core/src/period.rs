//! Billing period arithmetic.

use chrono::{DateTime, Days, Duration, Months, Utc};

use crate::error::{BillingError, Result};
use crate::plan::BillingInterval;

/// Compute the end of the billing period starting at `start`.
///
/// One unit of the interval is added using calendar arithmetic, not fixed
/// durations: monthly periods preserve the day of month where possible and
/// clamp on month-length overflow (Jan 31 + 1 month = Feb 28/29), quarterly
/// and yearly periods do the same over 3 and 12 months.
///
/// # Errors
///
/// Returns a `Configuration` error if the resulting instant is not
/// representable (far-future overflow).
pub fn period_end(start: DateTime<Utc>, interval: BillingInterval) -> Result<DateTime<Utc>> {
    let end = match interval {
        BillingInterval::Hourly => start.checked_add_signed(Duration::hours(1)),
        BillingInterval::Daily => start.checked_add_days(Days::new(1)),
        BillingInterval::Weekly => start.checked_add_days(Days::new(7)),
        BillingInterval::Monthly => start.checked_add_months(Months::new(1)),
        BillingInterval::Quarterly => start.checked_add_months(Months::new(3)),
        BillingInterval::Yearly => start.checked_add_months(Months::new(12)),
    };

    end.ok_or_else(|| {
        BillingError::Configuration(format!(
            "period end out of range: {start} + 1 {}",
            interval.as_str()
        ))
    })
}
