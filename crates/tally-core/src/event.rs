//! Domain events emitted by the lifecycle manager.
//!
//! Events are written to the store's outbox in the same atomic batch as the
//! state change they describe; a separate dispatcher consumes them with
//! at-least-once delivery. The manager never waits for consumers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{CreditNoteId, CustomerId, EventId, PlanId, SubscriptionId};

/// Summary of a proration credit attached to a cancel or plan-change event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProrationCredit {
    /// The issued credit note.
    pub credit_note_id: CreditNoteId,

    /// The credited amount.
    pub amount: Decimal,

    /// Whole days of the period not yet consumed.
    pub remaining_days: i64,

    /// Whole days in the full period.
    pub total_days: i64,
}

/// Transition-specific event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum EventPayload {
    /// A subscription was created.
    Created {
        /// The subscribed plan.
        plan_id: PlanId,
        /// Whether the subscription started in a trial.
        trial: bool,
        /// Instructs the invoicing collaborator to generate the first
        /// invoice immediately (in-advance billing without a trial).
        generate_invoice: bool,
    },

    /// A subscription was canceled immediately.
    Canceled {
        /// Proration credit issued for the unused remainder, if any.
        proration: Option<ProrationCredit>,
    },

    /// A subscription was paused.
    Paused,

    /// A paused subscription was resumed.
    Resumed,

    /// An upgrade was applied immediately.
    PlanChanged {
        /// The plan the subscription moved from.
        previous_plan_id: PlanId,
        /// The plan the subscription moved to.
        new_plan_id: PlanId,
        /// Proration credit issued for the unused remainder, if any.
        proration: Option<ProrationCredit>,
    },

    /// A downgrade was recorded for cutover at period end.
    PlanChangeScheduled {
        /// The plan the subscription will move to.
        new_plan_id: PlanId,
        /// When the change takes effect.
        effective_at: DateTime<Utc>,
    },
}

/// A domain event describing one subscription transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    /// The event identifier (ULID, time-ordered).
    pub id: EventId,

    /// The subscription the event concerns.
    pub subscription_id: SubscriptionId,

    /// The subscription's customer.
    pub customer_id: CustomerId,

    /// When the transition occurred.
    pub occurred_at: DateTime<Utc>,

    /// Transition-specific payload.
    pub payload: EventPayload,
}

impl DomainEvent {
    /// Create a new event.
    #[must_use]
    pub fn new(
        subscription_id: SubscriptionId,
        customer_id: CustomerId,
        occurred_at: DateTime<Utc>,
        payload: EventPayload,
    ) -> Self {
        Self {
            id: EventId::generate(),
            subscription_id,
            customer_id,
            occurred_at,
            payload,
        }
    }

    /// The dotted event name consumed by webhook and email dispatchers.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match &self.payload {
            EventPayload::Created { .. } => "subscription.created",
            EventPayload::Canceled { .. } => "subscription.canceled",
            EventPayload::Paused => "subscription.paused",
            EventPayload::Resumed => "subscription.resumed",
            EventPayload::PlanChanged { .. } => "subscription.plan_changed",
            EventPayload::PlanChangeScheduled { .. } => "subscription.plan_change_scheduled",
        }
    }
}
