//! `RocksDB` storage layer for tally.
//!
//! This crate provides persistent storage for plans, subscriptions, invoice
//! references, credit notes, and the domain-event outbox, using `RocksDB`
//! with column families for efficient indexing.
//!
//! # Architecture
//!
//! - `plans`: plan records, keyed by `plan_id`
//! - `subscriptions`: subscription records, keyed by `subscription_id`
//! - `invoices`: invoice references, keyed by `invoice_id` (ULID)
//! - `invoices_by_subscription`: index for latest-invoice lookup
//! - `credit_notes`: credit notes, keyed by `credit_note_id` (ULID)
//! - `credit_notes_by_customer`: index for listing credits by customer
//! - `outbox`: pending domain events, keyed by `event_id` (ULID)
//!
//! Subscriptions carry an optimistic-concurrency version. All writes that
//! accompany a state transition go through [`Store::commit_transition`],
//! which checks the version and applies the subscription, any credit note,
//! and the outbox events in a single atomic batch.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use tally_core::{
    CreditNote, CreditNoteId, CustomerId, DomainEvent, EventId, Invoice, Plan, PlanId,
    Subscription, SubscriptionId,
};

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different
/// implementations. All operations are synchronous; concurrency control for
/// subscriptions is optimistic via [`Store::commit_transition`].
pub trait Store: Send + Sync {
    // =========================================================================
    // Plan Operations
    // =========================================================================

    /// Insert or update a plan record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_plan(&self, plan: &Plan) -> Result<()>;

    /// Get a plan by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_plan(&self, plan_id: &PlanId) -> Result<Option<Plan>>;

    // =========================================================================
    // Subscription Operations
    // =========================================================================

    /// Insert a new subscription record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_subscription(&self, subscription: &Subscription) -> Result<()>;

    /// Get a subscription by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_subscription(&self, subscription_id: &SubscriptionId) -> Result<Option<Subscription>>;

    // =========================================================================
    // Invoice Operations
    // =========================================================================

    /// Record an invoice reference.
    ///
    /// This also maintains the subscription index.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_invoice(&self, invoice: &Invoice) -> Result<()>;

    /// Get the most recent invoice for a subscription, if any.
    ///
    /// Needed only to decide whether a proration credit note is issuable.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn latest_invoice(&self, subscription_id: &SubscriptionId) -> Result<Option<Invoice>>;

    // =========================================================================
    // Credit Note Operations
    // =========================================================================

    /// Get a credit note by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_credit_note(&self, credit_note_id: &CreditNoteId) -> Result<Option<CreditNote>>;

    /// List credit notes for a customer, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_credit_notes_by_customer(
        &self,
        customer_id: &CustomerId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditNote>>;

    // =========================================================================
    // Outbox Operations
    // =========================================================================

    /// List pending outbox events, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn pending_events(&self, limit: usize) -> Result<Vec<DomainEvent>>;

    /// Remove a dispatched event from the outbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn mark_dispatched(&self, event_id: &EventId) -> Result<()>;

    // =========================================================================
    // Compound Operations
    // =========================================================================

    /// Create a subscription atomically with the domain events describing
    /// its creation. Either all persist or none.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn create_subscription(
        &self,
        subscription: &Subscription,
        events: &[DomainEvent],
    ) -> Result<()>;

    /// Commit a subscription transition atomically: the updated subscription
    /// (with its version bumped), any credit note the transition produced,
    /// and the domain events describing it. Either all persist or none.
    ///
    /// `expected_version` is the version the caller read; a mismatch means a
    /// concurrent writer won and the whole transition is rejected. The
    /// subscription is stored with its version bumped past
    /// `expected_version`; the new version is returned.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the subscription doesn't exist.
    /// - `StoreError::VersionConflict` if `expected_version` is stale.
    fn commit_transition(
        &self,
        expected_version: u64,
        subscription: &Subscription,
        credit_note: Option<&CreditNote>,
        events: &[DomainEvent],
    ) -> Result<u64>;
}
