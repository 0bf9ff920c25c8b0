//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Plan records, keyed by `plan_id`.
    pub const PLANS: &str = "plans";

    /// Subscription records, keyed by `subscription_id`.
    pub const SUBSCRIPTIONS: &str = "subscriptions";

    /// Invoice references, keyed by `invoice_id` (ULID).
    pub const INVOICES: &str = "invoices";

    /// Index: invoices by subscription, keyed by
    /// `subscription_id || invoice_id`. Value is empty (index only).
    pub const INVOICES_BY_SUBSCRIPTION: &str = "invoices_by_subscription";

    /// Credit notes, keyed by `credit_note_id` (ULID).
    pub const CREDIT_NOTES: &str = "credit_notes";

    /// Index: credit notes by customer, keyed by
    /// `customer_id || credit_note_id`. Value is empty (index only).
    pub const CREDIT_NOTES_BY_CUSTOMER: &str = "credit_notes_by_customer";

    /// Pending domain events, keyed by `event_id` (ULID, dispatch order).
    pub const OUTBOX: &str = "outbox";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::PLANS,
        cf::SUBSCRIPTIONS,
        cf::INVOICES,
        cf::INVOICES_BY_SUBSCRIPTION,
        cf::CREDIT_NOTES,
        cf::CREDIT_NOTES_BY_CUSTOMER,
        cf::OUTBOX,
    ]
}
