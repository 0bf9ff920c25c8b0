//! Credit note types.
//!
//! Credit notes are issued against a prior invoice when a cancellation or
//! upgrade leaves part of an already-billed period unused. They are created
//! only when such an invoice exists and the computed credit is strictly
//! positive.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{CreditNoteId, CustomerId, InvoiceId};
use crate::plan::Currency;
use crate::proration::ProrationDetails;

/// Why a credit note was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditNoteReason {
    /// A subscription order changed (cancellation, upgrade).
    OrderChange,

    /// The invoice duplicated another.
    Duplicate,

    /// The product did not satisfy the customer.
    ProductUnsatisfactory,

    /// Any other reason.
    Other,
}

impl CreditNoteReason {
    /// Get the reason name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OrderChange => "order_change",
            Self::Duplicate => "duplicate",
            Self::ProductUnsatisfactory => "product_unsatisfactory",
            Self::Other => "other",
        }
    }
}

/// Status of a credit note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditNoteStatus {
    /// Created but not yet finalized.
    Draft,

    /// Finalized and applicable against the invoice.
    Finalized,

    /// Voided; no longer applicable.
    Voided,
}

/// A credit issued against a prior invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditNote {
    /// The credit note identifier (ULID, time-ordered).
    pub id: CreditNoteId,

    /// The invoice the credit is issued against.
    pub invoice_id: InvoiceId,

    /// The credited customer.
    pub customer_id: CustomerId,

    /// The credited amount. Strictly positive.
    pub amount: Decimal,

    /// Credit currency (the subscription's currency).
    pub currency: Currency,

    /// Why the credit was issued.
    pub reason: CreditNoteReason,

    /// Current status.
    pub status: CreditNoteStatus,

    /// Free-form metadata recording the proration inputs.
    pub metadata: serde_json::Value,

    /// When the credit note was created.
    pub created_at: DateTime<Utc>,
}

impl CreditNote {
    /// Create a finalized proration credit for the unused remainder of a
    /// billing period, recording the day split and plan names for audit.
    #[must_use]
    pub fn proration(
        invoice_id: InvoiceId,
        customer_id: CustomerId,
        amount: Decimal,
        currency: Currency,
        details: ProrationDetails,
        old_plan_name: &str,
        new_plan_name: Option<&str>,
    ) -> Self {
        Self {
            id: CreditNoteId::generate(),
            invoice_id,
            customer_id,
            amount,
            currency,
            reason: CreditNoteReason::OrderChange,
            status: CreditNoteStatus::Finalized,
            metadata: serde_json::json!({
                "remaining_days": details.remaining_days,
                "total_days": details.total_days,
                "old_plan": old_plan_name,
                "new_plan": new_plan_name,
            }),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn proration_credit_records_day_split() {
        let note = CreditNote::proration(
            InvoiceId::generate(),
            CustomerId::generate(),
            dec!(19.33),
            Currency::new("USD"),
            ProrationDetails {
                remaining_days: 20,
                total_days: 30,
            },
            "Starter",
            Some("Premium"),
        );

        assert_eq!(note.reason, CreditNoteReason::OrderChange);
        assert_eq!(note.status, CreditNoteStatus::Finalized);
        assert_eq!(note.metadata["remaining_days"], 20);
        assert_eq!(note.metadata["total_days"], 30);
        assert_eq!(note.metadata["old_plan"], "Starter");
        assert_eq!(note.metadata["new_plan"], "Premium");
    }
}
