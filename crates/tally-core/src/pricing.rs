//! The charge calculator.
//!
//! Converts an aggregated usage value into a monetary amount under the five
//! pricing models. Pure function of its inputs; identical inputs always
//! yield identical output.

use rust_decimal::Decimal;

use crate::charge::{GraduatedRange, PricingModel};
use crate::error::{BillingError, Result};

/// Compute the amount owed for a charge in the current period.
///
/// `aggregated_usage` is the single numeric measurement produced by the
/// external aggregation pipeline for one (subscription, charge, period).
///
/// # Errors
///
/// Returns a `Validation` error for negative usage (a correct aggregation
/// pipeline never produces it, so it is rejected rather than clamped) and
/// for a non-positive package size, which `Charge::new` rejects but a
/// deserialized model can still carry.
pub fn compute(model: &PricingModel, aggregated_usage: Decimal) -> Result<Decimal> {
    if aggregated_usage < Decimal::ZERO {
        return Err(BillingError::Validation(format!(
            "aggregated usage must not be negative, got {aggregated_usage}"
        )));
    }

    let amount = match model {
        PricingModel::Standard { amount, .. } => *amount * aggregated_usage,

        PricingModel::Package {
            amount,
            package_size,
            ..
        } => {
            if *package_size <= Decimal::ZERO {
                return Err(BillingError::Validation(format!(
                    "package size must be positive, got {package_size}"
                )));
            }
            *amount * (aggregated_usage / *package_size).ceil()
        }

        PricingModel::Percentage {
            rate,
            fixed_amount,
            free_units_per_total_aggregation,
            ..
        } => {
            let billable = (aggregated_usage - *free_units_per_total_aggregation).max(Decimal::ZERO);
            *rate * billable + *fixed_amount
        }

        PricingModel::Graduated { ranges } => graduated(ranges, aggregated_usage),

        PricingModel::Volume { ranges } => volume(ranges, aggregated_usage),
    };

    Ok(amount)
}

/// Marginal tiered pricing: each intersected range bills its own slice of
/// usage at its own rate, plus its flat fee once the range is entered.
fn graduated(ranges: &[GraduatedRange], usage: Decimal) -> Decimal {
    let mut total = Decimal::ZERO;

    for range in ranges {
        if usage <= range.from_value {
            break;
        }
        let upper = range.to_value.map_or(usage, |to| to.min(usage));
        total += (upper - range.from_value) * range.per_unit_amount;
        total += range.flat_amount;
    }

    total
}

/// Single-tier pricing: the entire quantity is billed at the rate of the
/// tier total usage falls into. Boundary values resolve to the lower tier.
fn volume(ranges: &[GraduatedRange], usage: Decimal) -> Decimal {
    if usage == Decimal::ZERO {
        return Decimal::ZERO;
    }

    // Validation guarantees the last range is unbounded, so the fallback
    // only matters for adversarial inputs.
    let tier = ranges
        .iter()
        .find(|r| r.to_value.map_or(true, |to| usage <= to))
        .or_else(|| ranges.last());

    match tier {
        Some(range) => usage * range.per_unit_amount + range.flat_amount,
        None => Decimal::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Currency;
    use rust_decimal_macros::dec;

    fn two_tier_ranges() -> Vec<GraduatedRange> {
        vec![
            GraduatedRange {
                from_value: dec!(0),
                to_value: Some(dec!(1000)),
                per_unit_amount: dec!(0.01),
                flat_amount: dec!(0),
            },
            GraduatedRange {
                from_value: dec!(1000),
                to_value: None,
                per_unit_amount: dec!(0.005),
                flat_amount: dec!(5),
            },
        ]
    }

    #[test]
    fn standard_is_unit_price_times_usage() {
        let model = PricingModel::Standard {
            amount: dec!(0.02),
            currency: Currency::new("USD"),
        };
        assert_eq!(compute(&model, dec!(500)).unwrap(), dec!(10));
        assert_eq!(compute(&model, dec!(0)).unwrap(), dec!(0));
    }

    #[test]
    fn package_rounds_partial_packages_up() {
        let model = PricingModel::Package {
            amount: dec!(5),
            package_size: dec!(100),
            currency: Currency::new("USD"),
        };
        // 250 units = 3 packages.
        assert_eq!(compute(&model, dec!(250)).unwrap(), dec!(15));
        // Exactly 2 packages.
        assert_eq!(compute(&model, dec!(200)).unwrap(), dec!(10));
        // Zero usage, zero packages.
        assert_eq!(compute(&model, dec!(0)).unwrap(), dec!(0));
    }

    #[test]
    fn package_with_non_positive_size_is_rejected() {
        // A model that never went through Charge::new (deserialized, or
        // built field by field) must fail cleanly instead of dividing by
        // zero.
        for size in [dec!(0), dec!(-100)] {
            let model = PricingModel::Package {
                amount: dec!(5),
                package_size: size,
                currency: Currency::new("USD"),
            };
            assert!(matches!(
                compute(&model, dec!(250)),
                Err(BillingError::Validation(_))
            ));
        }
    }

    #[test]
    fn percentage_exempts_free_units_before_rate() {
        let model = PricingModel::Percentage {
            rate: dec!(0.05),
            fixed_amount: dec!(2),
            free_units_per_total_aggregation: dec!(100),
            free_units_per_event: dec!(0),
        };
        // (1100 - 100) * 0.05 + 2 = 52.
        assert_eq!(compute(&model, dec!(1100)).unwrap(), dec!(52));
        // Usage below the allowance still pays the fixed fee.
        assert_eq!(compute(&model, dec!(50)).unwrap(), dec!(2));
        assert_eq!(compute(&model, dec!(0)).unwrap(), dec!(2));
    }

    #[test]
    fn graduated_bills_each_slice_at_its_tier() {
        let model = PricingModel::Graduated {
            ranges: two_tier_ranges(),
        };
        // 1000 * 0.01 + 500 * 0.005 + 5 = 17.5
        assert_eq!(compute(&model, dec!(1500)).unwrap(), dec!(17.5));
    }

    #[test]
    fn graduated_zero_usage_is_free() {
        let model = PricingModel::Graduated {
            ranges: two_tier_ranges(),
        };
        assert_eq!(compute(&model, dec!(0)).unwrap(), dec!(0));
    }

    #[test]
    fn graduated_flat_fee_only_for_entered_ranges() {
        let model = PricingModel::Graduated {
            ranges: two_tier_ranges(),
        };
        // Usage at exactly the boundary never enters the second range.
        assert_eq!(compute(&model, dec!(1000)).unwrap(), dec!(10));
    }

    #[test]
    fn volume_bills_entire_quantity_at_reached_tier() {
        let model = PricingModel::Volume {
            ranges: two_tier_ranges(),
        };
        // 1500 falls in the second tier: 1500 * 0.005 + 5 = 12.5
        assert_eq!(compute(&model, dec!(1500)).unwrap(), dec!(12.5));
    }

    #[test]
    fn volume_boundary_resolves_to_lower_tier() {
        let model = PricingModel::Volume {
            ranges: two_tier_ranges(),
        };
        assert_eq!(compute(&model, dec!(1000)).unwrap(), dec!(10));
    }

    #[test]
    fn volume_zero_usage_is_free() {
        let model = PricingModel::Volume {
            ranges: two_tier_ranges(),
        };
        assert_eq!(compute(&model, dec!(0)).unwrap(), dec!(0));
    }

    #[test]
    fn graduated_and_volume_agree_on_single_full_range() {
        let ranges = vec![GraduatedRange {
            from_value: dec!(0),
            to_value: None,
            per_unit_amount: dec!(0.02),
            flat_amount: dec!(3),
        }];
        let graduated = PricingModel::Graduated {
            ranges: ranges.clone(),
        };
        let volume = PricingModel::Volume { ranges };

        for usage in [dec!(1), dec!(250), dec!(10000)] {
            assert_eq!(
                compute(&graduated, usage).unwrap(),
                compute(&volume, usage).unwrap()
            );
        }
    }

    #[test]
    fn negative_usage_rejected_for_every_model() {
        let models = [
            PricingModel::Standard {
                amount: dec!(1),
                currency: Currency::new("USD"),
            },
            PricingModel::Package {
                amount: dec!(1),
                package_size: dec!(10),
                currency: Currency::new("USD"),
            },
            PricingModel::Percentage {
                rate: dec!(0.1),
                fixed_amount: dec!(0),
                free_units_per_total_aggregation: dec!(0),
                free_units_per_event: dec!(0),
            },
            PricingModel::Graduated {
                ranges: two_tier_ranges(),
            },
            PricingModel::Volume {
                ranges: two_tier_ranges(),
            },
        ];
        for model in &models {
            let result = compute(model, dec!(-1));
            assert!(
                matches!(result, Err(BillingError::Validation(_))),
                "{} accepted negative usage",
                model.as_str()
            );
        }
    }

    #[test]
    fn compute_is_deterministic() {
        let model = PricingModel::Graduated {
            ranges: two_tier_ranges(),
        };
        let first = compute(&model, dec!(1234.5)).unwrap();
        let second = compute(&model, dec!(1234.5)).unwrap();
        assert_eq!(first, second);
    }
}
