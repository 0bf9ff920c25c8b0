//! The subscription lifecycle manager.

use std::sync::Arc;

use chrono::{DateTime, Days, Utc};
use rust_decimal::Decimal;

use tally_core::{
    period_end, BillingError, BillingTiming, CreditNote, Currency, CustomerId, DomainEvent,
    EventPayload, Plan, PlanId, ProrationCredit, ProrationDetails, Result, Subscription,
    SubscriptionId,
};
use tally_store::{Store, StoreError};

/// How a cancellation takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelMode {
    /// Cancel immediately, prorating the unused remainder of the period.
    Now,

    /// Record `cancel_at = current_period_end`; an external scheduler
    /// performs the transition at the period boundary.
    PeriodEnd,
}

/// Orchestrates subscription state transitions against the store.
///
/// Each operation is a read-then-write sequence committed through the
/// store's atomic compound operations, so a subscription update, the credit
/// note it produced, and the domain events describing it either all persist
/// or none do.
pub struct SubscriptionManager<S: Store> {
    store: Arc<S>,
}

impl<S: Store> SubscriptionManager<S> {
    /// Create a new manager over a store.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Create a subscription for a customer on a plan.
    ///
    /// With `trial_days > 0` the subscription starts TRIALING and its first
    /// period ends at the trial end; otherwise it starts ACTIVE with a full
    /// billing period. For in-advance billing without a trial, the created
    /// event instructs the invoicing collaborator to generate the first
    /// invoice immediately.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the plan does not exist.
    /// - `ConfigurationMismatch` if the plan is inactive or has no price
    ///   configured for `currency`.
    pub fn subscribe(
        &self,
        customer_id: CustomerId,
        plan_id: PlanId,
        currency: Currency,
        trial_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Subscription> {
        let plan = self.load_plan(plan_id)?;
        require_subscribable(&plan, &currency)?;

        let subscription = if trial_days > 0 {
            let trial_end = now
                .checked_add_days(Days::new(u64::from(trial_days)))
                .ok_or_else(|| {
                    BillingError::Configuration(format!("trial end out of range: {trial_days} days"))
                })?;
            Subscription::new(customer_id, plan.id, currency, plan.timing, now, trial_end)
                .with_trial(trial_end)
        } else {
            let end = period_end(now, plan.interval)?;
            Subscription::new(customer_id, plan.id, currency, plan.timing, now, end)
        };

        let generate_invoice = trial_days == 0 && plan.timing == BillingTiming::InAdvance;
        let event = DomainEvent::new(
            subscription.id,
            customer_id,
            now,
            EventPayload::Created {
                plan_id: plan.id,
                trial: trial_days > 0,
                generate_invoice,
            },
        );

        self.store
            .create_subscription(&subscription, &[event])
            .map_err(|e| map_store_error(e, subscription.id))?;

        tracing::info!(
            subscription_id = %subscription.id,
            customer_id = %customer_id,
            plan_id = %plan.id,
            status = %subscription.status,
            "subscription created"
        );

        Ok(subscription)
    }

    /// Pause an active subscription.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the subscription does not exist.
    /// - `InvalidState` if it is not ACTIVE.
    pub fn pause(&self, id: SubscriptionId, now: DateTime<Utc>) -> Result<Subscription> {
        let mut subscription = self.load_subscription(id)?;
        let expected = subscription.version;

        subscription.pause(now)?;

        let event = DomainEvent::new(id, subscription.customer_id, now, EventPayload::Paused);
        subscription.version = self
            .store
            .commit_transition(expected, &subscription, None, &[event])
            .map_err(|e| map_store_error(e, id))?;

        tracing::info!(subscription_id = %id, "subscription paused");
        Ok(subscription)
    }

    /// Resume a paused subscription.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the subscription does not exist.
    /// - `InvalidState` if it is not PAUSED.
    pub fn resume(&self, id: SubscriptionId, now: DateTime<Utc>) -> Result<Subscription> {
        let mut subscription = self.load_subscription(id)?;
        let expected = subscription.version;

        subscription.resume(now)?;

        let event = DomainEvent::new(id, subscription.customer_id, now, EventPayload::Resumed);
        subscription.version = self
            .store
            .commit_transition(expected, &subscription, None, &[event])
            .map_err(|e| map_store_error(e, id))?;

        tracing::info!(subscription_id = %id, "subscription resumed");
        Ok(subscription)
    }

    /// Cancel a subscription.
    ///
    /// `CancelMode::Now` cancels immediately: the unused remainder of the
    /// current period is prorated against the plan's price for the
    /// subscription currency, and a credit note is issued when a prior
    /// invoice exists and the credit is strictly positive. A failed
    /// proration aborts the cancellation; the status never changes without
    /// its financial side effect.
    ///
    /// `CancelMode::PeriodEnd` only records `cancel_at`; the status is
    /// untouched until the external scheduler acts.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the subscription or its plan does not exist.
    /// - `InvalidState` if the subscription is already CANCELED.
    pub fn cancel(
        &self,
        id: SubscriptionId,
        mode: CancelMode,
        now: DateTime<Utc>,
    ) -> Result<Subscription> {
        let mut subscription = self.load_subscription(id)?;
        let expected = subscription.version;

        match mode {
            CancelMode::PeriodEnd => {
                subscription.schedule_cancel(now)?;
                subscription.version = self
                    .store
                    .commit_transition(expected, &subscription, None, &[])
                    .map_err(|e| map_store_error(e, id))?;

                tracing::info!(
                    subscription_id = %id,
                    cancel_at = ?subscription.cancel_at,
                    "cancellation scheduled for period end"
                );
                Ok(subscription)
            }
            CancelMode::Now => {
                let plan = self.load_plan(subscription.plan_id)?;
                // A missing price for the subscription currency credits 0.
                let price = plan
                    .price_for(&subscription.currency)
                    .unwrap_or(Decimal::ZERO);
                let details = ProrationDetails::compute(
                    subscription.current_period_start,
                    subscription.current_period_end,
                    now,
                );
                let credit = details.apply(price);

                subscription.cancel_now(now)?;

                let (note, proration) =
                    self.proration_credit(&subscription, credit, details, &plan.name, None)?;

                let event = DomainEvent::new(
                    id,
                    subscription.customer_id,
                    now,
                    EventPayload::Canceled { proration },
                );
                subscription.version = self
                    .store
                    .commit_transition(expected, &subscription, note.as_ref(), &[event])
                    .map_err(|e| map_store_error(e, id))?;

                tracing::info!(
                    subscription_id = %id,
                    credited = %credit,
                    "subscription canceled"
                );
                Ok(subscription)
            }
        }
    }

    /// Change a subscription's plan.
    ///
    /// An upgrade (new price strictly above the old price in the
    /// subscription currency) applies immediately: the old period's unused
    /// remainder is prorated and credited, and a fresh period starts now
    /// under the new plan. A downgrade or equal-price change is recorded as
    /// a [`tally_core::ScheduledPlanChange`] effective at period end; the
    /// plan id does not change yet.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the subscription or either plan does not exist.
    /// - `ConfigurationMismatch` if the new plan is inactive or has no
    ///   price for the subscription currency.
    /// - `InvalidState` if the subscription is CANCELED.
    pub fn change_plan(
        &self,
        id: SubscriptionId,
        new_plan_id: PlanId,
        now: DateTime<Utc>,
    ) -> Result<Subscription> {
        let mut subscription = self.load_subscription(id)?;
        let expected = subscription.version;

        let new_plan = self.load_plan(new_plan_id)?;
        require_subscribable(&new_plan, &subscription.currency)?;
        let new_price = new_plan
            .price_for(&subscription.currency)
            .unwrap_or(Decimal::ZERO);

        let old_plan = self.load_plan(subscription.plan_id)?;
        // A missing old price is treated as 0, making any priced plan an upgrade.
        let old_price = old_plan
            .price_for(&subscription.currency)
            .unwrap_or(Decimal::ZERO);

        if new_price > old_price {
            let details = ProrationDetails::compute(
                subscription.current_period_start,
                subscription.current_period_end,
                now,
            );
            let credit = details.apply(old_price);

            let new_end = period_end(now, new_plan.interval)?;
            subscription.apply_plan_change(new_plan.id, now, new_end)?;

            let (note, proration) = self.proration_credit(
                &subscription,
                credit,
                details,
                &old_plan.name,
                Some(&new_plan.name),
            )?;

            let event = DomainEvent::new(
                id,
                subscription.customer_id,
                now,
                EventPayload::PlanChanged {
                    previous_plan_id: old_plan.id,
                    new_plan_id: new_plan.id,
                    proration,
                },
            );
            subscription.version = self
                .store
                .commit_transition(expected, &subscription, note.as_ref(), &[event])
                .map_err(|e| map_store_error(e, id))?;

            tracing::info!(
                subscription_id = %id,
                old_plan = %old_plan.id,
                new_plan = %new_plan.id,
                credited = %credit,
                "plan upgraded"
            );
        } else {
            subscription.schedule_plan_change(new_plan.id, now)?;

            let event = DomainEvent::new(
                id,
                subscription.customer_id,
                now,
                EventPayload::PlanChangeScheduled {
                    new_plan_id: new_plan.id,
                    effective_at: subscription.current_period_end,
                },
            );
            subscription.version = self
                .store
                .commit_transition(expected, &subscription, None, &[event])
                .map_err(|e| map_store_error(e, id))?;

            tracing::info!(
                subscription_id = %id,
                old_plan = %old_plan.id,
                new_plan = %new_plan.id,
                effective_at = %subscription.current_period_end,
                "plan change scheduled for period end"
            );
        }

        Ok(subscription)
    }

    /// Build the proration credit note for a cancel or upgrade, if one is
    /// issuable: a prior invoice must exist and the credit must be strictly
    /// positive.
    fn proration_credit(
        &self,
        subscription: &Subscription,
        credit: Decimal,
        details: ProrationDetails,
        old_plan_name: &str,
        new_plan_name: Option<&str>,
    ) -> Result<(Option<CreditNote>, Option<ProrationCredit>)> {
        if credit <= Decimal::ZERO {
            return Ok((None, None));
        }

        let Some(invoice) = self
            .store
            .latest_invoice(&subscription.id)
            .map_err(|e| map_store_error(e, subscription.id))?
        else {
            return Ok((None, None));
        };

        let note = CreditNote::proration(
            invoice.id,
            subscription.customer_id,
            credit,
            subscription.currency.clone(),
            details,
            old_plan_name,
            new_plan_name,
        );
        let summary = ProrationCredit {
            credit_note_id: note.id,
            amount: credit,
            remaining_days: details.remaining_days,
            total_days: details.total_days,
        };

        Ok((Some(note), Some(summary)))
    }

    fn load_subscription(&self, id: SubscriptionId) -> Result<Subscription> {
        self.store
            .get_subscription(&id)
            .map_err(|e| map_store_error(e, id))?
            .ok_or_else(|| BillingError::NotFound {
                entity: "subscription",
                id: id.to_string(),
            })
    }

    fn load_plan(&self, id: PlanId) -> Result<Plan> {
        self.store
            .get_plan(&id)
            .map_err(|e| BillingError::Storage(e.to_string()))?
            .ok_or_else(|| BillingError::NotFound {
                entity: "plan",
                id: id.to_string(),
            })
    }
}

/// Check that a plan can accept a subscription in the given currency.
fn require_subscribable(plan: &Plan, currency: &Currency) -> Result<()> {
    if !plan.is_active {
        return Err(BillingError::ConfigurationMismatch(format!(
            "plan {} is not active",
            plan.id
        )));
    }
    if plan.price_for(currency).is_none() {
        return Err(BillingError::ConfigurationMismatch(format!(
            "plan {} has no {currency} price configured",
            plan.id
        )));
    }
    Ok(())
}

/// Map storage failures into the billing error taxonomy.
fn map_store_error(err: StoreError, subscription_id: SubscriptionId) -> BillingError {
    match err {
        StoreError::NotFound { entity, id } => BillingError::NotFound { entity, id },
        StoreError::VersionConflict { .. } => BillingError::ConcurrentUpdate {
            id: subscription_id.to_string(),
        },
        StoreError::Database(msg) => BillingError::Storage(msg),
        StoreError::Serialization(msg) => BillingError::Serialization(msg),
    }
}
