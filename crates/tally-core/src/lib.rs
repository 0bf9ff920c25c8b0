//! Core types and billing calculators for tally.
//!
//! This crate provides the foundational types used throughout the tally
//! billing platform:
//!
//! - **Identifiers**: `CustomerId`, `PlanId`, `SubscriptionId`, `InvoiceId`, `CreditNoteId`
//! - **Plans**: `Plan`, `Price`, `BillingInterval`, `BillingTiming`
//! - **Subscriptions**: `Subscription`, `SubscriptionStatus`, `ScheduledPlanChange`
//! - **Charges**: `Charge`, `PricingModel`, `GraduatedRange`
//! - **Calculators**: [`period::period_end`], [`proration::prorate`], [`pricing::compute`]
//! - **Events**: `DomainEvent`, `EventPayload`
//!
//! # Money
//!
//! All monetary amounts and aggregated usage quantities are
//! `rust_decimal::Decimal` in the subscription's currency. The calculators
//! never round; presentation rounding belongs to the invoicing layer.
//!
//! The three calculators ([`period`], [`proration`], [`pricing`]) are pure
//! functions with no I/O and may run with unbounded parallelism.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod charge;
pub mod credit_note;
pub mod error;
pub mod event;
pub mod ids;
pub mod invoice;
pub mod period;
pub mod plan;
pub mod pricing;
pub mod proration;
pub mod subscription;

pub use charge::{Charge, ChargeFilter, GraduatedRange, PricingModel};
pub use credit_note::{CreditNote, CreditNoteReason, CreditNoteStatus};
pub use error::{BillingError, Result};
pub use event::{DomainEvent, EventPayload, ProrationCredit};
pub use ids::{
    BillableMetricId, ChargeId, CreditNoteId, CustomerId, EventId, IdError, InvoiceId, PlanId,
    SubscriptionId,
};
pub use invoice::Invoice;
pub use period::period_end;
pub use plan::{BillingInterval, BillingTiming, Currency, Plan, Price};
pub use pricing::compute;
pub use proration::{days_between, prorate, ProrationDetails};
pub use subscription::{ScheduledPlanChange, Subscription, SubscriptionStatus};
