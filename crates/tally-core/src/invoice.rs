//! Invoice reference type.
//!
//! Invoice generation lives outside this core; the lifecycle manager only
//! needs enough of an invoice to decide whether a proration credit note is
//! issuable (a credit must have something to be credited against).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{CustomerId, InvoiceId, SubscriptionId};
use crate::plan::Currency;

/// A billed invoice for a subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    /// The invoice identifier (ULID, time-ordered).
    pub id: InvoiceId,

    /// The subscription the invoice bills.
    pub subscription_id: SubscriptionId,

    /// The billed customer.
    pub customer_id: CustomerId,

    /// Total invoiced amount.
    pub amount: Decimal,

    /// Invoice currency.
    pub currency: Currency,

    /// When the invoice was issued.
    pub issued_at: DateTime<Utc>,
}

impl Invoice {
    /// Create a new invoice record.
    #[must_use]
    pub fn new(
        subscription_id: SubscriptionId,
        customer_id: CustomerId,
        amount: Decimal,
        currency: Currency,
    ) -> Self {
        Self {
            id: InvoiceId::generate(),
            subscription_id,
            customer_id,
            amount,
            currency,
            issued_at: Utc::now(),
        }
    }
}
