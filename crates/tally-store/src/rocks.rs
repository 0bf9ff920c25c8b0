//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use tally_core::{
    CreditNote, CreditNoteId, CustomerId, DomainEvent, EventId, Invoice, Plan, PlanId,
    Subscription, SubscriptionId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::Store;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    /// Serializes the read-check-write of `commit_transition`. Without it,
    /// two writers with the same expected version can both pass the check
    /// and the second batch overwrites the first.
    commit_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            commit_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Plan Operations
    // =========================================================================

    fn put_plan(&self, plan: &Plan) -> Result<()> {
        let cf = self.cf(cf::PLANS)?;
        let key = keys::plan_key(&plan.id);
        let value = Self::serialize(plan)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_plan(&self, plan_id: &PlanId) -> Result<Option<Plan>> {
        let cf = self.cf(cf::PLANS)?;
        let key = keys::plan_key(plan_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    // =========================================================================
    // Subscription Operations
    // =========================================================================

    fn put_subscription(&self, subscription: &Subscription) -> Result<()> {
        let cf = self.cf(cf::SUBSCRIPTIONS)?;
        let key = keys::subscription_key(&subscription.id);
        let value = Self::serialize(subscription)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_subscription(&self, subscription_id: &SubscriptionId) -> Result<Option<Subscription>> {
        let cf = self.cf(cf::SUBSCRIPTIONS)?;
        let key = keys::subscription_key(subscription_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    // =========================================================================
    // Invoice Operations
    // =========================================================================

    fn put_invoice(&self, invoice: &Invoice) -> Result<()> {
        let cf_invoices = self.cf(cf::INVOICES)?;
        let cf_by_sub = self.cf(cf::INVOICES_BY_SUBSCRIPTION)?;

        let invoice_key = keys::invoice_key(&invoice.id);
        let index_key = keys::subscription_invoice_key(&invoice.subscription_id, &invoice.id);
        let value = Self::serialize(invoice)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_invoices, &invoice_key, &value);
        batch.put_cf(&cf_by_sub, &index_key, []); // Index entry (empty value)

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn latest_invoice(&self, subscription_id: &SubscriptionId) -> Result<Option<Invoice>> {
        let cf_by_sub = self.cf(cf::INVOICES_BY_SUBSCRIPTION)?;
        let prefix = keys::subscription_invoices_prefix(subscription_id);

        let iter = self.db.iterator_cf(
            &cf_by_sub,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        // ULID suffixes sort chronologically, so the newest invoice owns the
        // greatest key in the prefix range.
        let mut newest_key: Option<Vec<u8>> = None;
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            newest_key = Some(key.to_vec());
        }

        let Some(key) = newest_key else {
            return Ok(None);
        };

        let invoice_id = keys::extract_invoice_id(&key);
        let cf_invoices = self.cf(cf::INVOICES)?;
        self.db
            .get_cf(&cf_invoices, keys::invoice_key(&invoice_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    // =========================================================================
    // Credit Note Operations
    // =========================================================================

    fn get_credit_note(&self, credit_note_id: &CreditNoteId) -> Result<Option<CreditNote>> {
        let cf = self.cf(cf::CREDIT_NOTES)?;
        let key = keys::credit_note_key(credit_note_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_credit_notes_by_customer(
        &self,
        customer_id: &CustomerId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditNote>> {
        let cf_by_customer = self.cf(cf::CREDIT_NOTES_BY_CUSTOMER)?;
        let prefix = keys::customer_credit_notes_prefix(customer_id);

        let iter = self.db.iterator_cf(
            &cf_by_customer,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        let mut all_keys: Vec<Vec<u8>> = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            all_keys.push(key.to_vec());
        }

        // Reverse to get newest first.
        all_keys.reverse();

        let mut notes = Vec::new();
        for key in all_keys.into_iter().skip(offset) {
            if notes.len() >= limit {
                break;
            }
            let note_id = keys::extract_credit_note_id(&key);
            if let Some(note) = self.get_credit_note(&note_id)? {
                notes.push(note);
            }
        }

        Ok(notes)
    }

    // =========================================================================
    // Outbox Operations
    // =========================================================================

    fn pending_events(&self, limit: usize) -> Result<Vec<DomainEvent>> {
        let cf = self.cf(cf::OUTBOX)?;
        let iter = self.db.iterator_cf(&cf, IteratorMode::Start);

        let mut events = Vec::new();
        for item in iter {
            if events.len() >= limit {
                break;
            }
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            events.push(Self::deserialize(&value)?);
        }

        Ok(events)
    }

    fn mark_dispatched(&self, event_id: &EventId) -> Result<()> {
        let cf = self.cf(cf::OUTBOX)?;
        self.db
            .delete_cf(&cf, keys::outbox_key(event_id))
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    // =========================================================================
    // Compound Operations
    // =========================================================================

    fn create_subscription(
        &self,
        subscription: &Subscription,
        events: &[DomainEvent],
    ) -> Result<()> {
        let cf_subs = self.cf(cf::SUBSCRIPTIONS)?;
        let cf_outbox = self.cf(cf::OUTBOX)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(
            &cf_subs,
            keys::subscription_key(&subscription.id),
            Self::serialize(subscription)?,
        );
        for event in events {
            batch.put_cf(&cf_outbox, keys::outbox_key(&event.id), Self::serialize(event)?);
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn commit_transition(
        &self,
        expected_version: u64,
        subscription: &Subscription,
        credit_note: Option<&CreditNote>,
        events: &[DomainEvent],
    ) -> Result<u64> {
        let _guard = self
            .commit_lock
            .lock()
            .map_err(|_| StoreError::Database("commit lock poisoned".to_string()))?;

        let stored = self
            .get_subscription(&subscription.id)?
            .ok_or(StoreError::NotFound {
                entity: "subscription",
                id: subscription.id.to_string(),
            })?;

        if stored.version != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                actual: stored.version,
            });
        }

        let new_version = expected_version + 1;
        let mut updated = subscription.clone();
        updated.version = new_version;

        let cf_subs = self.cf(cf::SUBSCRIPTIONS)?;
        let cf_notes = self.cf(cf::CREDIT_NOTES)?;
        let cf_notes_by_customer = self.cf(cf::CREDIT_NOTES_BY_CUSTOMER)?;
        let cf_outbox = self.cf(cf::OUTBOX)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(
            &cf_subs,
            keys::subscription_key(&subscription.id),
            Self::serialize(&updated)?,
        );

        if let Some(note) = credit_note {
            batch.put_cf(
                &cf_notes,
                keys::credit_note_key(&note.id),
                Self::serialize(note)?,
            );
            batch.put_cf(
                &cf_notes_by_customer,
                keys::customer_credit_note_key(&note.customer_id, &note.id),
                [],
            );
        }

        for event in events {
            batch.put_cf(&cf_outbox, keys::outbox_key(&event.id), Self::serialize(event)?);
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(
            subscription_id = %subscription.id,
            version = new_version,
            events = events.len(),
            credit_note = credit_note.is_some(),
            "committed subscription transition"
        );

        Ok(new_version)
    }
}
