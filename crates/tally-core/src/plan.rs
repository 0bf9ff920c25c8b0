//! Plan and pricing configuration types.
//!
//! A plan defines a billing interval, a billing timing, and one price per
//! configured currency. Plans are referenced by subscriptions and never
//! mutated by the lifecycle manager.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BillingError;
use crate::ids::PlanId;

/// An ISO-4217 currency code (e.g. "USD").
///
/// Currency is fixed per subscription at creation time and must match one of
/// the plan's configured prices. No conversion is ever performed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    /// Create a currency from a code, normalizing to uppercase.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_ascii_uppercase())
    }

    /// Return the currency code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Currency {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// How often a subscription on this plan is billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    /// Billed every hour.
    Hourly,
    /// Billed every day.
    Daily,
    /// Billed every 7 days.
    Weekly,
    /// Billed every calendar month.
    Monthly,
    /// Billed every 3 calendar months.
    Quarterly,
    /// Billed every calendar year.
    Yearly,
}

impl BillingInterval {
    /// Get the interval name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Yearly => "yearly",
        }
    }
}

impl FromStr for BillingInterval {
    type Err = BillingError;

    /// Parse an interval name.
    ///
    /// Unrecognized values fail with a `Configuration` error rather than
    /// defaulting to monthly.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            "yearly" => Ok(Self::Yearly),
            other => Err(BillingError::Configuration(format!(
                "unrecognized billing interval: {other}"
            ))),
        }
    }
}

impl fmt::Display for BillingInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a subscription is billed before or after the period it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingTiming {
    /// Billed at the start of the period it covers.
    InAdvance,
    /// Billed at the end of the period it covers.
    InArrears,
}

impl BillingTiming {
    /// Get the timing name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InAdvance => "in_advance",
            Self::InArrears => "in_arrears",
        }
    }
}

/// A per-period price in a single currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// The price currency.
    pub currency: Currency,

    /// The per-period amount.
    pub amount: Decimal,
}

/// A billing plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// The plan identifier.
    pub id: PlanId,

    /// Human-readable plan name (recorded in credit-note metadata).
    pub name: String,

    /// How often subscriptions on this plan are billed.
    pub interval: BillingInterval,

    /// Whether subscriptions are billed in advance or in arrears.
    pub timing: BillingTiming,

    /// One price per configured currency.
    pub prices: Vec<Price>,

    /// Whether new subscriptions may reference this plan.
    pub is_active: bool,

    /// When the plan was created.
    pub created_at: DateTime<Utc>,
}

impl Plan {
    /// Create a new active plan.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        interval: BillingInterval,
        timing: BillingTiming,
        prices: Vec<Price>,
    ) -> Self {
        Self {
            id: PlanId::generate(),
            name: name.into(),
            interval,
            timing,
            prices,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    /// Look up the per-period amount configured for a currency.
    #[must_use]
    pub fn price_for(&self, currency: &Currency) -> Option<Decimal> {
        self.prices
            .iter()
            .find(|p| p.currency == *currency)
            .map(|p| p.amount)
    }
}
