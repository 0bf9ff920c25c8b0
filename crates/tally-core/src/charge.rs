//! Charge configuration types.
//!
//! A charge binds a billable metric to a plan with a pricing model. The
//! model-specific parameters live in [`PricingModel`], a tagged union
//! resolved by exhaustive pattern match in the calculator; there is no
//! untyped property bag.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{BillingError, Result};
use crate::ids::{BillableMetricId, ChargeId, PlanId};
use crate::plan::{BillingTiming, Currency};
use crate::pricing;

/// One tier of a graduated or volume price.
///
/// Ranges sorted by position must form a contiguous, gapless partition of
/// `[0, ∞)`: each range's `from_value` equals the previous range's
/// `to_value`, and exactly the last range is unbounded. This is enforced at
/// charge construction, not at calculation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraduatedRange {
    /// Inclusive lower bound.
    pub from_value: Decimal,

    /// Inclusive upper bound; `None` for the final, unbounded range.
    pub to_value: Option<Decimal>,

    /// Price per unit within this range.
    pub per_unit_amount: Decimal,

    /// Fixed fee charged once if usage reaches this range.
    pub flat_amount: Decimal,
}

/// Model-specific pricing parameters, one variant per charge model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "model")]
pub enum PricingModel {
    /// Flat unit price times usage.
    Standard {
        /// Price per unit.
        amount: Decimal,
        /// Price currency.
        currency: Currency,
    },

    /// Usage billed in whole packages, partial packages rounded up.
    Package {
        /// Price per package.
        amount: Decimal,
        /// Units per package; must be strictly positive.
        package_size: Decimal,
        /// Price currency.
        currency: Currency,
    },

    /// A rate applied to usage above a free allowance, plus a fixed fee.
    Percentage {
        /// Multiplier applied to billable usage (0.05 = 5%).
        rate: Decimal,
        /// Fixed fee added to every period's charge.
        fixed_amount: Decimal,
        /// Units exempted from the total aggregated usage before the rate applies.
        free_units_per_total_aggregation: Decimal,
        /// Per-event exemption, applied upstream during aggregation.
        /// Carried for configuration round-trips; the calculator ignores it.
        free_units_per_event: Decimal,
    },

    /// Marginal tiered pricing: each slice of usage billed at its tier's rate.
    Graduated {
        /// Contiguous tiers partitioning `[0, ∞)`.
        ranges: Vec<GraduatedRange>,
    },

    /// Single-tier pricing: the tier reached by total usage prices all of it.
    Volume {
        /// Contiguous tiers partitioning `[0, ∞)`.
        ranges: Vec<GraduatedRange>,
    },
}

impl PricingModel {
    /// Get the model name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Standard { .. } => "standard",
            Self::Package { .. } => "package",
            Self::Percentage { .. } => "percentage",
            Self::Graduated { .. } => "graduated",
            Self::Volume { .. } => "volume",
        }
    }
}

/// Restricts a charge to a subset of metric dimension values.
///
/// Matching happens in the external aggregation pipeline; the charge only
/// carries the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeFilter {
    /// The metric dimension the filter applies to.
    pub dimension: String,

    /// Accepted values for the dimension.
    pub values: Vec<String>,
}

/// The binding of a billable metric to a plan with a pricing model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Charge {
    /// The charge identifier.
    pub id: ChargeId,

    /// The plan this charge belongs to.
    pub plan_id: PlanId,

    /// The billable metric whose aggregated usage this charge prices.
    pub billable_metric_id: BillableMetricId,

    /// Model-specific pricing parameters.
    pub model: PricingModel,

    /// Whether this charge is billed in advance or in arrears.
    pub timing: BillingTiming,

    /// Name shown on invoice lines.
    pub invoice_display_name: String,

    /// Floor applied to the computed amount, if configured.
    pub min_amount: Option<Decimal>,

    /// Whether the charge amount is prorated over partial periods.
    pub prorated: bool,

    /// Filters restricting the charge to a subset of dimension values.
    pub filters: Vec<ChargeFilter>,
}

impl Charge {
    /// Create a charge, validating the pricing model configuration.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error for a non-positive package size or for
    /// graduated/volume ranges that do not form a contiguous partition of
    /// `[0, ∞)`.
    pub fn new(
        plan_id: PlanId,
        billable_metric_id: BillableMetricId,
        model: PricingModel,
        timing: BillingTiming,
        invoice_display_name: impl Into<String>,
    ) -> Result<Self> {
        match &model {
            PricingModel::Package { package_size, .. } => {
                if *package_size <= Decimal::ZERO {
                    return Err(BillingError::Validation(format!(
                        "package size must be positive, got {package_size}"
                    )));
                }
            }
            PricingModel::Graduated { ranges } | PricingModel::Volume { ranges } => {
                validate_ranges(ranges)?;
            }
            PricingModel::Standard { .. } | PricingModel::Percentage { .. } => {}
        }

        Ok(Self {
            id: ChargeId::generate(),
            plan_id,
            billable_metric_id,
            model,
            timing,
            invoice_display_name: invoice_display_name.into(),
            min_amount: None,
            prorated: false,
            filters: Vec::new(),
        })
    }

    /// Set the minimum amount floor.
    #[must_use]
    pub fn with_min_amount(mut self, min_amount: Decimal) -> Self {
        self.min_amount = Some(min_amount);
        self
    }

    /// Set the dimension filters.
    #[must_use]
    pub fn with_filters(mut self, filters: Vec<ChargeFilter>) -> Self {
        self.filters = filters;
        self
    }

    /// Amount owed for this charge given the period's aggregated usage,
    /// floored at `min_amount` when configured.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error for negative usage.
    pub fn amount_due(&self, aggregated_usage: Decimal) -> Result<Decimal> {
        let computed = pricing::compute(&self.model, aggregated_usage)?;
        Ok(match self.min_amount {
            Some(min) => computed.max(min),
            None => computed,
        })
    }
}

/// Validate that ranges form a contiguous, gapless partition of `[0, ∞)`.
///
/// # Errors
///
/// Returns a `Validation` error if the list is empty, does not start at 0,
/// has a gap or overlap between consecutive ranges, a bounded range with
/// `to <= from`, or any range other than the last unbounded.
pub fn validate_ranges(ranges: &[GraduatedRange]) -> Result<()> {
    let Some(first) = ranges.first() else {
        return Err(BillingError::Validation(
            "graduated ranges must not be empty".into(),
        ));
    };

    if first.from_value != Decimal::ZERO {
        return Err(BillingError::Validation(format!(
            "first range must start at 0, got {}",
            first.from_value
        )));
    }

    for (position, window) in ranges.windows(2).enumerate() {
        let (current, next) = (&window[0], &window[1]);
        match current.to_value {
            None => {
                return Err(BillingError::Validation(format!(
                    "only the last range may be unbounded, range {position} is not last"
                )));
            }
            Some(to) => {
                if to <= current.from_value {
                    return Err(BillingError::Validation(format!(
                        "range {position} upper bound {to} must exceed lower bound {}",
                        current.from_value
                    )));
                }
                if next.from_value != to {
                    return Err(BillingError::Validation(format!(
                        "range {} lower bound {} does not continue previous upper bound {to}",
                        position + 1,
                        next.from_value
                    )));
                }
            }
        }
    }

    // ranges.first() succeeded, so last() exists
    if let Some(last) = ranges.last() {
        if last.to_value.is_some() {
            return Err(BillingError::Validation(
                "last range must be unbounded".into(),
            ));
        }
    }

    Ok(())
}
