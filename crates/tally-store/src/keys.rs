//! Key encoding utilities for `RocksDB`.
//!
//! This module provides functions for encoding and decoding keys used in
//! column families. Index keys append a ULID to the parent id, so entries
//! under one parent sort chronologically.

use tally_core::{CreditNoteId, CustomerId, EventId, InvoiceId, PlanId, SubscriptionId};

/// Create a plan key from a plan ID.
#[must_use]
pub fn plan_key(plan_id: &PlanId) -> Vec<u8> {
    plan_id.as_bytes().to_vec()
}

/// Create a subscription key from a subscription ID.
#[must_use]
pub fn subscription_key(subscription_id: &SubscriptionId) -> Vec<u8> {
    subscription_id.as_bytes().to_vec()
}

/// Create an invoice key from an invoice ID.
#[must_use]
pub fn invoice_key(invoice_id: &InvoiceId) -> Vec<u8> {
    invoice_id.to_bytes().to_vec()
}

/// Create a subscription-invoice index key.
///
/// Format: `subscription_id (16 bytes) || invoice_id (16 bytes)`
///
/// Since ULIDs are time-ordered, invoices for a subscription sort by time.
#[must_use]
pub fn subscription_invoice_key(
    subscription_id: &SubscriptionId,
    invoice_id: &InvoiceId,
) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(subscription_id.as_bytes());
    key.extend_from_slice(&invoice_id.to_bytes());
    key
}

/// Create a prefix for iterating all invoices for a subscription.
#[must_use]
pub fn subscription_invoices_prefix(subscription_id: &SubscriptionId) -> Vec<u8> {
    subscription_id.as_bytes().to_vec()
}

/// Extract the invoice ID from a subscription-invoice index key.
///
/// # Panics
///
/// Panics if the key is not at least 32 bytes.
#[must_use]
pub fn extract_invoice_id(key: &[u8]) -> InvoiceId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[16..32]);
    InvoiceId::from_bytes(bytes).expect("valid ULID bytes")
}

/// Create a credit note key from a credit note ID.
#[must_use]
pub fn credit_note_key(credit_note_id: &CreditNoteId) -> Vec<u8> {
    credit_note_id.to_bytes().to_vec()
}

/// Create a customer-credit-note index key.
///
/// Format: `customer_id (16 bytes) || credit_note_id (16 bytes)`
#[must_use]
pub fn customer_credit_note_key(
    customer_id: &CustomerId,
    credit_note_id: &CreditNoteId,
) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(customer_id.as_bytes());
    key.extend_from_slice(&credit_note_id.to_bytes());
    key
}

/// Create a prefix for iterating all credit notes for a customer.
#[must_use]
pub fn customer_credit_notes_prefix(customer_id: &CustomerId) -> Vec<u8> {
    customer_id.as_bytes().to_vec()
}

/// Extract the credit note ID from a customer-credit-note index key.
///
/// # Panics
///
/// Panics if the key is not at least 32 bytes.
#[must_use]
pub fn extract_credit_note_id(key: &[u8]) -> CreditNoteId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[16..32]);
    CreditNoteId::from_bytes(bytes).expect("valid ULID bytes")
}

/// Create an outbox key from an event ID.
///
/// ULID ordering gives the dispatcher oldest-first iteration.
#[must_use]
pub fn outbox_key(event_id: &EventId) -> Vec<u8> {
    event_id.to_bytes().to_vec()
}
