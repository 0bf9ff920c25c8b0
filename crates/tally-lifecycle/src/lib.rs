//! Subscription lifecycle manager for tally.
//!
//! This crate orchestrates the pure calculators in `tally-core` against the
//! storage layer in `tally-store`: it creates subscriptions, transitions
//! their status, applies proration on cancellation and upgrades, defers
//! downgrades to period end, and writes domain events to the outbox in the
//! same atomic batch as the state change they describe.
//!
//! Every operation validates its preconditions before mutating anything and
//! surfaces violations as typed [`tally_core::BillingError`] values. Nothing
//! is retried internally; callers decide retry policy. Concurrent operations
//! on the same subscription are serialized by optimistic versioning, and the
//! loser of a race observes [`tally_core::BillingError::ConcurrentUpdate`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod manager;

pub use manager::{CancelMode, SubscriptionManager};
