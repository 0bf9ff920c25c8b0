//! Subscription entity and its state machine.
//!
//! Status is a closed sum type and every transition is a method that
//! pattern-matches on the current status, returning a typed error when the
//! transition is forbidden. Nothing outside these methods mutates status.
//! Subscriptions are never deleted; cancellation is a status, not a removal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{BillingError, Result};
use crate::ids::{CustomerId, PlanId, SubscriptionId};
use crate::plan::{BillingTiming, Currency};

/// Status of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// In a free trial; becomes active when the trial ends.
    Trialing,

    /// Active and billed every period.
    Active,

    /// Temporarily paused; period fields untouched.
    Paused,

    /// Canceled. Terminal.
    Canceled,
}

impl SubscriptionStatus {
    /// Get the status name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trialing => "trialing",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A plan change deferred to the end of the current period.
///
/// Downgrades (and equal-price changes) do not take effect immediately; the
/// manager records this intent and an external scheduler performs the
/// cutover once `effective_at` passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledPlanChange {
    /// The plan the subscription will move to.
    pub new_plan_id: PlanId,

    /// When the change takes effect (the current period's end).
    pub effective_at: DateTime<Utc>,
}

/// A customer's subscription to a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    /// The subscription identifier.
    pub id: SubscriptionId,

    /// The subscribed customer.
    pub customer_id: CustomerId,

    /// The current plan.
    pub plan_id: PlanId,

    /// The previous plan, set on plan change.
    pub previous_plan_id: Option<PlanId>,

    /// Billing currency, fixed at creation. Must match a configured plan price.
    pub currency: Currency,

    /// Billing timing, copied from the plan at creation.
    pub timing: BillingTiming,

    /// Current status.
    pub status: SubscriptionStatus,

    /// Start of the current billing period.
    pub current_period_start: DateTime<Utc>,

    /// End of the current billing period. Always after the start.
    pub current_period_end: DateTime<Utc>,

    /// Trial start, if a trial was granted.
    pub trial_start: Option<DateTime<Utc>>,

    /// Trial end, if a trial was granted.
    pub trial_end: Option<DateTime<Utc>>,

    /// Set when cancellation is scheduled for period end.
    pub cancel_at: Option<DateTime<Utc>>,

    /// Set when cancellation was immediate.
    pub canceled_at: Option<DateTime<Utc>>,

    /// Deferred plan change, if a downgrade is scheduled.
    pub scheduled_change: Option<ScheduledPlanChange>,

    /// Free-form metadata.
    pub metadata: serde_json::Value,

    /// Optimistic concurrency version, bumped by the store on every commit.
    pub version: u64,

    /// When the subscription was created.
    pub created_at: DateTime<Utc>,

    /// When the subscription was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Create an active subscription with its first billing period.
    #[must_use]
    pub fn new(
        customer_id: CustomerId,
        plan_id: PlanId,
        currency: Currency,
        timing: BillingTiming,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Self {
        debug_assert!(period_end > period_start);
        Self {
            id: SubscriptionId::generate(),
            customer_id,
            plan_id,
            previous_plan_id: None,
            currency,
            timing,
            status: SubscriptionStatus::Active,
            current_period_start: period_start,
            current_period_end: period_end,
            trial_start: None,
            trial_end: None,
            cancel_at: None,
            canceled_at: None,
            scheduled_change: None,
            metadata: serde_json::Value::Null,
            version: 0,
            created_at: period_start,
            updated_at: period_start,
        }
    }

    /// Convert a fresh subscription into a trialing one.
    ///
    /// The trial covers the first billing period: `current_period_end`
    /// becomes the trial end.
    #[must_use]
    pub fn with_trial(mut self, trial_end: DateTime<Utc>) -> Self {
        debug_assert!(trial_end > self.current_period_start);
        self.status = SubscriptionStatus::Trialing;
        self.trial_start = Some(self.current_period_start);
        self.trial_end = Some(trial_end);
        self.current_period_end = trial_end;
        self
    }

    /// Whether the subscription has been canceled.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.status == SubscriptionStatus::Canceled
    }

    /// Pause billing. Allowed only from ACTIVE; period fields untouched.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` when the subscription is not active.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<()> {
        match self.status {
            SubscriptionStatus::Active => {
                self.status = SubscriptionStatus::Paused;
                self.updated_at = now;
                Ok(())
            }
            status => Err(BillingError::InvalidState {
                operation: "pause",
                status,
            }),
        }
    }

    /// Resume billing. Allowed only from PAUSED.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` when the subscription is not paused.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<()> {
        match self.status {
            SubscriptionStatus::Paused => {
                self.status = SubscriptionStatus::Active;
                self.updated_at = now;
                Ok(())
            }
            status => Err(BillingError::InvalidState {
                operation: "resume",
                status,
            }),
        }
    }

    /// Cancel immediately. Allowed from any non-CANCELED state.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` when already canceled; idempotency is the
    /// caller's responsibility, not automatic.
    pub fn cancel_now(&mut self, now: DateTime<Utc>) -> Result<()> {
        match self.status {
            SubscriptionStatus::Canceled => Err(BillingError::InvalidState {
                operation: "cancel",
                status: SubscriptionStatus::Canceled,
            }),
            _ => {
                self.status = SubscriptionStatus::Canceled;
                self.canceled_at = Some(now);
                self.updated_at = now;
                Ok(())
            }
        }
    }

    /// Schedule cancellation for the end of the current period.
    ///
    /// Status does not change here; an external scheduler performs the
    /// transition once `cancel_at <= now`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` when already canceled.
    pub fn schedule_cancel(&mut self, now: DateTime<Utc>) -> Result<()> {
        match self.status {
            SubscriptionStatus::Canceled => Err(BillingError::InvalidState {
                operation: "cancel",
                status: SubscriptionStatus::Canceled,
            }),
            _ => {
                self.cancel_at = Some(self.current_period_end);
                self.updated_at = now;
                Ok(())
            }
        }
    }

    /// Apply a plan change immediately (upgrade): a new billing period
    /// begins now under the new plan's terms.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` when the subscription is canceled.
    pub fn apply_plan_change(
        &mut self,
        new_plan_id: PlanId,
        now: DateTime<Utc>,
        new_period_end: DateTime<Utc>,
    ) -> Result<()> {
        if self.is_canceled() {
            return Err(BillingError::InvalidState {
                operation: "change plan on",
                status: SubscriptionStatus::Canceled,
            });
        }
        self.previous_plan_id = Some(self.plan_id);
        self.plan_id = new_plan_id;
        self.current_period_start = now;
        self.current_period_end = new_period_end;
        self.scheduled_change = None;
        self.updated_at = now;
        Ok(())
    }

    /// Record a deferred plan change (downgrade or equal price), effective
    /// at the end of the current period. The plan id does not change yet.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` when the subscription is canceled.
    pub fn schedule_plan_change(&mut self, new_plan_id: PlanId, now: DateTime<Utc>) -> Result<()> {
        if self.is_canceled() {
            return Err(BillingError::InvalidState {
                operation: "change plan on",
                status: SubscriptionStatus::Canceled,
            });
        }
        self.previous_plan_id = Some(self.plan_id);
        self.scheduled_change = Some(ScheduledPlanChange {
            new_plan_id,
            effective_at: self.current_period_end,
        });
        self.updated_at = now;
        Ok(())
    }
}
